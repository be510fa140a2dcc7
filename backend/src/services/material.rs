//! Material catalog service

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::geometry;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{unique_violation, AppError, AppResult};
use crate::models::{
    classify_stock_level, convert_all, total_available, Dimensions, MaterialRow, MaterialSpec, Shape, StockLevel,
    StockTotals, UnitOfMeasure, MATERIAL_COLUMNS,
};
use crate::services::stock::fetch_open_lots;

/// Load a catalog entry
pub async fn fetch_material(conn: &mut PgConnection, material_id: Uuid) -> AppResult<MaterialSpec> {
    let sql = format!("SELECT {} FROM materials WHERE id = $1", MATERIAL_COLUMNS);
    sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(material_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Material"))?
        .try_into()
}

/// Load a catalog entry and hold its row lock until the transaction ends
pub async fn fetch_material_for_update(conn: &mut PgConnection, material_id: Uuid) -> AppResult<MaterialSpec> {
    let sql = format!("SELECT {} FROM materials WHERE id = $1 FOR UPDATE", MATERIAL_COLUMNS);
    sqlx::query_as::<_, MaterialRow>(&sql)
        .bind(material_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Material"))?
        .try_into()
}

/// Input for creating a material
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialInput {
    #[validate(length(min = 2, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub shape: Shape,
    #[serde(default)]
    pub dimensions: Dimensions,
    pub density: Decimal,
    pub weight_per_meter: Option<Decimal>,
    pub unit: UnitOfMeasure,
    pub standard_length_mm: Option<Decimal>,
    #[serde(default)]
    pub min_stock: Decimal,
    #[serde(default)]
    pub safety_stock: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

/// One row of a catalog spreadsheet, already split into fields.
///
/// Shape and unit arrive as free text and accept the usual aliases.
#[derive(Debug, Deserialize, Validate)]
pub struct CatalogRowInput {
    #[validate(length(min = 2, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub shape: String,
    pub diameter_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub height_mm: Option<Decimal>,
    pub wall_thickness_mm: Option<Decimal>,
    pub density: Decimal,
    pub weight_per_meter: Option<Decimal>,
    pub unit: String,
    pub standard_length_mm: Option<Decimal>,
    pub min_stock: Option<Decimal>,
    pub safety_stock: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

impl CatalogRowInput {
    fn into_material_input(self) -> AppResult<CreateMaterialInput> {
        let shape: Shape = self.shape.parse()?;
        let unit = UnitOfMeasure::from_str(self.unit.trim().to_lowercase().as_str()).ok_or_else(|| {
            AppError::Validation {
                field: "unit".to_string(),
                message: format!("Unknown unit '{}', expected kg, m or pcs", self.unit),
            }
        })?;
        Ok(CreateMaterialInput {
            code: self.code.trim().to_uppercase(),
            name: self.name.trim().to_string(),
            shape,
            dimensions: Dimensions {
                diameter_mm: self.diameter_mm,
                width_mm: self.width_mm,
                height_mm: self.height_mm,
                wall_thickness_mm: self.wall_thickness_mm,
            },
            density: self.density,
            weight_per_meter: self.weight_per_meter,
            unit,
            standard_length_mm: self.standard_length_mm,
            min_stock: self.min_stock.unwrap_or_default(),
            safety_stock: self.safety_stock.unwrap_or_default(),
            unit_price: self.unit_price.unwrap_or_default(),
        })
    }
}

/// Catalog entry with its live stock position
#[derive(Debug, Clone, Serialize)]
pub struct MaterialStock {
    pub material: MaterialSpec,
    pub totals: StockTotals,
    pub level: StockLevel,
}

/// Check the input and fill in kg/m from the profile when it is not given
fn prepare(input: &CreateMaterialInput) -> AppResult<Option<Decimal>> {
    let field_error = |field: &str, message: &str| AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    };
    shared::validate_material_code(&input.code).map_err(|m| field_error("code", m))?;
    shared::validate_density(input.density).map_err(|m| field_error("density", m))?;
    shared::validate_thresholds(input.min_stock, input.safety_stock).map_err(|m| field_error("min_stock", m))?;
    shared::validate_amount(input.unit_price).map_err(|m| field_error("unit_price", m))?;
    if let Some(length) = input.standard_length_mm {
        shared::validate_positive_quantity(length).map_err(|m| field_error("standard_length_mm", m))?;
    }

    match input.weight_per_meter {
        Some(kgm) => {
            shared::validate_positive_quantity(kgm).map_err(|m| field_error("weight_per_meter", m))?;
            if !input.dimensions.is_empty() {
                shared::validate_dimensions(input.shape, &input.dimensions)?;
            }
            Ok(Some(kgm))
        }
        None if input.dimensions.is_empty() => Ok(None),
        None => Ok(Some(geometry::weight_per_meter(
            input.shape,
            &input.dimensions,
            input.density,
        )?)),
    }
}

/// Material catalog service
#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
}

impl MaterialService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a catalog entry
    pub async fn create_material(&self, input: CreateMaterialInput) -> AppResult<MaterialSpec> {
        input.validate()?;
        let weight_per_meter = prepare(&input)?;

        let sql = format!(
            r#"
            INSERT INTO materials (code, name, shape, diameter_mm, width_mm, height_mm, wall_thickness_mm,
                                   density, weight_per_meter, unit, standard_length_mm, min_stock,
                                   safety_stock, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        );
        let material: MaterialSpec = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(&input.code)
            .bind(&input.name)
            .bind(input.shape.as_str())
            .bind(input.dimensions.diameter_mm)
            .bind(input.dimensions.width_mm)
            .bind(input.dimensions.height_mm)
            .bind(input.dimensions.wall_thickness_mm)
            .bind(input.density)
            .bind(weight_per_meter)
            .bind(input.unit.as_str())
            .bind(input.standard_length_mm)
            .bind(input.min_stock)
            .bind(input.safety_stock)
            .bind(input.unit_price)
            .fetch_one(&self.db)
            .await
            .map_err(unique_violation("code"))?
            .try_into()?;

        tracing::info!(material_id = %material.id, code = %material.code, "Material created");
        Ok(material)
    }

    /// Insert or update a catalog entry by code.
    ///
    /// Cost history and alert state survive a re-import.
    pub async fn import_catalog_row(&self, row: CatalogRowInput) -> AppResult<MaterialSpec> {
        row.validate()?;
        let input = row.into_material_input()?;
        let weight_per_meter = prepare(&input)?;

        let sql = format!(
            r#"
            INSERT INTO materials (code, name, shape, diameter_mm, width_mm, height_mm, wall_thickness_mm,
                                   density, weight_per_meter, unit, standard_length_mm, min_stock,
                                   safety_stock, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                shape = EXCLUDED.shape,
                diameter_mm = EXCLUDED.diameter_mm,
                width_mm = EXCLUDED.width_mm,
                height_mm = EXCLUDED.height_mm,
                wall_thickness_mm = EXCLUDED.wall_thickness_mm,
                density = EXCLUDED.density,
                weight_per_meter = EXCLUDED.weight_per_meter,
                unit = EXCLUDED.unit,
                standard_length_mm = EXCLUDED.standard_length_mm,
                min_stock = EXCLUDED.min_stock,
                safety_stock = EXCLUDED.safety_stock,
                unit_price = CASE WHEN EXCLUDED.unit_price > 0 THEN EXCLUDED.unit_price
                                  ELSE materials.unit_price END,
                updated_at = NOW()
            RETURNING {}
            "#,
            MATERIAL_COLUMNS
        );
        let material: MaterialSpec = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(&input.code)
            .bind(&input.name)
            .bind(input.shape.as_str())
            .bind(input.dimensions.diameter_mm)
            .bind(input.dimensions.width_mm)
            .bind(input.dimensions.height_mm)
            .bind(input.dimensions.wall_thickness_mm)
            .bind(input.density)
            .bind(weight_per_meter)
            .bind(input.unit.as_str())
            .bind(input.standard_length_mm)
            .bind(input.min_stock)
            .bind(input.safety_stock)
            .bind(input.unit_price)
            .fetch_one(&self.db)
            .await?
            .try_into()?;

        tracing::info!(material_id = %material.id, code = %material.code, "Catalog row imported");
        Ok(material)
    }

    pub async fn get_material(&self, material_id: Uuid) -> AppResult<MaterialSpec> {
        let mut conn = self.db.acquire().await?;
        fetch_material(&mut *conn, material_id).await
    }

    /// List the catalog ordered by code
    pub async fn list_materials(&self) -> AppResult<Vec<MaterialSpec>> {
        let sql = format!("SELECT {} FROM materials ORDER BY code", MATERIAL_COLUMNS);
        let rows = sqlx::query_as::<_, MaterialRow>(&sql).fetch_all(&self.db).await?;
        convert_all(rows)
    }

    /// Catalog entry plus the aggregate of its available lots
    pub async fn get_material_stock(&self, material_id: Uuid) -> AppResult<MaterialStock> {
        let mut conn = self.db.acquire().await?;
        let material = fetch_material(&mut *conn, material_id).await?;
        let lots = fetch_open_lots(&mut *conn, material_id).await?;
        let totals = total_available(&lots, material.unit);
        let level = classify_stock_level(totals.quantity, material.min_stock, material.safety_stock);
        Ok(MaterialStock {
            material,
            totals,
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(shape: Shape, dimensions: Dimensions, weight_per_meter: Option<Decimal>) -> CreateMaterialInput {
        CreateMaterialInput {
            code: "RB-50".to_string(),
            name: "Round bar 50".to_string(),
            shape,
            dimensions,
            density: Decimal::new(785, 2),
            weight_per_meter,
            unit: UnitOfMeasure::Kg,
            standard_length_mm: Some(Decimal::from(6000)),
            min_stock: Decimal::from(10),
            safety_stock: Decimal::from(50),
            unit_price: Decimal::from(42),
        }
    }

    #[test]
    fn derives_weight_per_meter_from_profile() {
        let kgm = prepare(&input(Shape::Round, Dimensions::round(Decimal::from(50)), None)).unwrap();
        assert_eq!(kgm, Some(Decimal::new(1541, 2)));
    }

    #[test]
    fn keeps_supplied_weight_per_meter() {
        let kgm = prepare(&input(Shape::Plate, Dimensions::default(), Some(Decimal::from(3)))).unwrap();
        assert_eq!(kgm, Some(Decimal::from(3)));
    }

    #[test]
    fn rejects_incomplete_profile() {
        let result = prepare(&input(Shape::Tube, Dimensions::round(Decimal::from(60)), None));
        assert!(matches!(result, Err(AppError::Domain(_))));
    }

    #[test]
    fn catalog_row_accepts_aliases() {
        let row = CatalogRowInput {
            code: " pl-10x100 ".to_string(),
            name: "Flat bar".to_string(),
            shape: "Flat".to_string(),
            diameter_mm: None,
            width_mm: Some(Decimal::from(100)),
            height_mm: Some(Decimal::from(10)),
            wall_thickness_mm: None,
            density: Decimal::new(785, 2),
            weight_per_meter: None,
            unit: "KG".to_string(),
            standard_length_mm: None,
            min_stock: None,
            safety_stock: None,
            unit_price: None,
        };
        let input = row.into_material_input().unwrap();
        assert_eq!(input.shape, Shape::Plate);
        assert_eq!(input.unit, UnitOfMeasure::Kg);
        assert_eq!(input.code, "PL-10X100");
    }

    #[test]
    fn catalog_row_rejects_unknown_shape() {
        let row = CatalogRowInput {
            code: "X-1".to_string(),
            name: "Mystery".to_string(),
            shape: "oval".to_string(),
            diameter_mm: None,
            width_mm: None,
            height_mm: None,
            wall_thickness_mm: None,
            density: Decimal::ONE,
            weight_per_meter: None,
            unit: "kg".to_string(),
            standard_length_mm: None,
            min_stock: None,
            safety_stock: None,
            unit_price: None,
        };
        assert!(matches!(
            row.into_material_input(),
            Err(AppError::Domain(shared::DomainError::UnsupportedShape(_)))
        ));
    }
}
