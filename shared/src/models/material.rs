//! Material catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::geometry;

/// Cross-section of a stock material
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Round,
    /// Hexagonal bar, sized by the across-flats distance
    Hex,
    Tube,
    /// Flat plate or rectangular box section
    Plate,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Round => "round",
            Shape::Hex => "hex",
            Shape::Tube => "tube",
            Shape::Plate => "plate",
        }
    }
}

impl std::str::FromStr for Shape {
    type Err = DomainError;

    /// Accepts the canonical names plus the aliases used in supplier catalogs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round" | "rod" => Ok(Shape::Round),
            "hex" | "hexagon" | "hexagonal" => Ok(Shape::Hex),
            "tube" | "pipe" => Ok(Shape::Tube),
            "plate" | "box" | "flat" | "rectangular" => Ok(Shape::Plate),
            other => Err(DomainError::UnsupportedShape(other.to_string())),
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit a material is stocked and costed in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    /// Mass in kilograms
    Kg,
    /// Length in metres
    M,
    /// Piece count
    Pcs,
}

impl UnitOfMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Kg => "kg",
            UnitOfMeasure::M => "m",
            UnitOfMeasure::Pcs => "pcs",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(UnitOfMeasure::Kg),
            "m" => Some(UnitOfMeasure::M),
            "pcs" => Some(UnitOfMeasure::Pcs),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensional profile, all values in millimetres.
///
/// Which fields are meaningful depends on the [`Shape`]:
/// round and hex use `diameter_mm` (across flats for hex), tube uses
/// `diameter_mm` plus `wall_thickness_mm`, plate uses `width_mm` and `height_mm`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub diameter_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub height_mm: Option<Decimal>,
    pub wall_thickness_mm: Option<Decimal>,
}

impl Dimensions {
    pub fn round(diameter_mm: Decimal) -> Self {
        Self {
            diameter_mm: Some(diameter_mm),
            ..Default::default()
        }
    }

    pub fn tube(outer_diameter_mm: Decimal, wall_thickness_mm: Decimal) -> Self {
        Self {
            diameter_mm: Some(outer_diameter_mm),
            wall_thickness_mm: Some(wall_thickness_mm),
            ..Default::default()
        }
    }

    pub fn plate(width_mm: Decimal, height_mm: Decimal) -> Self {
        Self {
            width_mm: Some(width_mm),
            height_mm: Some(height_mm),
            ..Default::default()
        }
    }

    /// True when no dimension is set at all
    pub fn is_empty(&self) -> bool {
        self.diameter_mm.is_none()
            && self.width_mm.is_none()
            && self.height_mm.is_none()
            && self.wall_thickness_mm.is_none()
    }
}

/// A catalog entry describing a material type, independent of stock on hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub id: Uuid,
    /// Unique catalog code (e.g., "RB-50-S45C")
    pub code: String,
    pub name: String,
    pub shape: Shape,
    pub dimensions: Dimensions,
    /// Density in g/cm³
    pub density: Decimal,
    /// Mass per metre in kg/m
    pub weight_per_meter: Option<Decimal>,
    pub unit: UnitOfMeasure,
    /// Nominal length of a full bar
    pub standard_length_mm: Option<Decimal>,
    /// Critical reorder threshold
    pub min_stock: Decimal,
    /// Warning reorder threshold
    pub safety_stock: Decimal,
    /// Last known purchase price per unit
    pub unit_price: Decimal,
    /// Weighted-average cost per unit
    pub average_cost: Decimal,
    pub last_alerted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialSpec {
    /// Unit cost captured on movements: the weighted average when known,
    /// otherwise the last purchase price
    pub fn cost_snapshot(&self) -> Decimal {
        if self.average_cost > Decimal::ZERO {
            self.average_cost
        } else {
            self.unit_price.max(Decimal::ZERO)
        }
    }

    /// Reject operations expressed in a different unit than the catalog entry
    pub fn ensure_unit(&self, unit: UnitOfMeasure) -> DomainResult<()> {
        if unit != self.unit {
            return Err(DomainError::UnitMismatch {
                expected: self.unit,
                actual: unit,
            });
        }
        Ok(())
    }

    /// kg/m from the catalog, or derived from the profile when dimensions allow
    pub fn effective_weight_per_meter(&self) -> DomainResult<Option<Decimal>> {
        if let Some(kgm) = self.weight_per_meter {
            return Ok(Some(kgm));
        }
        match geometry::weight_per_meter(self.shape, &self.dimensions, self.density) {
            Ok(kgm) => Ok(Some(kgm)),
            Err(DomainError::MissingDimension { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Weighted-average unit cost after receiving `quantity` at `unit_cost`
pub fn weighted_average_cost(
    on_hand: Decimal,
    current_average: Decimal,
    quantity: Decimal,
    unit_cost: Decimal,
) -> Decimal {
    let on_hand = on_hand.max(Decimal::ZERO);
    let new_qty = on_hand + quantity;
    if new_qty <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((on_hand * current_average + quantity * unit_cost) / new_qty).round_dp(4)
}

/// Stock level relative to the reorder thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    Ok,
    Warning,
    Critical,
}

impl StockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::Ok => "ok",
            StockLevel::Warning => "warning",
            StockLevel::Critical => "critical",
        }
    }
}

/// Critical at or below `min_stock`, warning at or below `safety_stock`.
/// A zero threshold is treated as "not configured".
pub fn classify_stock_level(total: Decimal, min_stock: Decimal, safety_stock: Decimal) -> StockLevel {
    if min_stock > Decimal::ZERO && total <= min_stock {
        StockLevel::Critical
    } else if safety_stock > Decimal::ZERO && total <= safety_stock {
        StockLevel::Warning
    } else {
        StockLevel::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_parses_catalog_aliases() {
        assert_eq!("Round".parse::<Shape>().unwrap(), Shape::Round);
        assert_eq!("hexagon".parse::<Shape>().unwrap(), Shape::Hex);
        assert_eq!("pipe".parse::<Shape>().unwrap(), Shape::Tube);
        assert_eq!(" box ".parse::<Shape>().unwrap(), Shape::Plate);
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let err = "triangle".parse::<Shape>().unwrap_err();
        assert_eq!(err, DomainError::UnsupportedShape("triangle".to_string()));
    }

    #[test]
    fn unit_round_trips_through_str() {
        for unit in [UnitOfMeasure::Kg, UnitOfMeasure::M, UnitOfMeasure::Pcs] {
            assert_eq!(UnitOfMeasure::from_str(unit.as_str()), Some(unit));
        }
        assert_eq!(UnitOfMeasure::from_str("lb"), None);
    }

    #[test]
    fn weighted_average_blends_receipts() {
        // 100 kg @ 20 + 50 kg @ 30 = 3500 / 150
        let avg = weighted_average_cost(Decimal::from(100), Decimal::from(20), Decimal::from(50), Decimal::from(30));
        assert_eq!(avg, Decimal::new(233333, 4));
    }

    #[test]
    fn weighted_average_from_empty_stock_is_receipt_price() {
        let avg = weighted_average_cost(Decimal::ZERO, Decimal::ZERO, Decimal::from(10), Decimal::from(42));
        assert_eq!(avg, Decimal::from(42));
    }

    #[test]
    fn stock_level_thresholds() {
        let min = Decimal::from(10);
        let safety = Decimal::from(25);
        assert_eq!(classify_stock_level(Decimal::from(5), min, safety), StockLevel::Critical);
        assert_eq!(classify_stock_level(Decimal::from(10), min, safety), StockLevel::Critical);
        assert_eq!(classify_stock_level(Decimal::from(20), min, safety), StockLevel::Warning);
        assert_eq!(classify_stock_level(Decimal::from(30), min, safety), StockLevel::Ok);
        assert_eq!(
            classify_stock_level(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            StockLevel::Ok
        );
    }
}
