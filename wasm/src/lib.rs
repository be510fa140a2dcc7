//! WebAssembly module for the Metal Stock platform
//!
//! Provides client-side computation for:
//! - Bar weight from profile, length and density
//! - Weight per metre of a profile
//! - Round-bar length for a target weight
//! - Stock level classification and catalog code checks

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;

use shared::geometry;

fn to_decimal(field: &str, value: f64) -> Result<Decimal, String> {
    Decimal::from_f64(value).ok_or_else(|| format!("{} must be a finite number", field))
}

fn to_number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn parse_profile(shape: &str, dimensions_json: &str) -> Result<(Shape, Dimensions), String> {
    let shape: Shape = shape.parse().map_err(|e: shared::DomainError| e.to_string())?;
    let dimensions: Dimensions =
        serde_json::from_str(dimensions_json).map_err(|e| format!("Invalid dimensions JSON: {}", e))?;
    Ok((shape, dimensions))
}

fn weight_kg(shape: &str, dimensions_json: &str, length_mm: f64, density: f64) -> Result<f64, String> {
    let (shape, dimensions) = parse_profile(shape, dimensions_json)?;
    let kg = geometry::weight(
        shape,
        &dimensions,
        to_decimal("length_mm", length_mm)?,
        to_decimal("density", density)?,
    )
    .map_err(|e| e.to_string())?;
    Ok(to_number(kg))
}

fn kg_per_meter(shape: &str, dimensions_json: &str, density: f64) -> Result<f64, String> {
    let (shape, dimensions) = parse_profile(shape, dimensions_json)?;
    let kgm = geometry::weight_per_meter(shape, &dimensions, to_decimal("density", density)?)
        .map_err(|e| e.to_string())?;
    Ok(to_number(kgm))
}

fn round_bar_length(weight_kg: f64, diameter_mm: f64, density: f64) -> Result<f64, String> {
    let mm = geometry::length_for_weight(
        to_decimal("weight_kg", weight_kg)?,
        to_decimal("diameter_mm", diameter_mm)?,
        to_decimal("density", density)?,
    )
    .map_err(|e| e.to_string())?;
    Ok(to_number(mm))
}

fn rejected(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    js_sys::Error::new(&message).into()
}

/// Weight in kg of a bar; `dimensions_json` uses the catalog field names
/// (`diameter_mm`, `width_mm`, `height_mm`, `wall_thickness_mm`)
#[wasm_bindgen]
pub fn calculate_weight(shape: &str, dimensions_json: &str, length_mm: f64, density: f64) -> Result<f64, JsValue> {
    weight_kg(shape, dimensions_json, length_mm, density).map_err(rejected)
}

/// Mass of one metre of the profile in kg/m
#[wasm_bindgen]
pub fn calculate_weight_per_meter(shape: &str, dimensions_json: &str, density: f64) -> Result<f64, JsValue> {
    kg_per_meter(shape, dimensions_json, density).map_err(rejected)
}

/// Length in mm of round bar that weighs `weight_kg`
#[wasm_bindgen]
pub fn calculate_length_for_weight(weight_kg: f64, diameter_mm: f64, density: f64) -> Result<f64, JsValue> {
    round_bar_length(weight_kg, diameter_mm, density).map_err(rejected)
}

/// "ok", "warning" or "critical"
#[wasm_bindgen]
pub fn classify_stock(total: f64, min_stock: f64, safety_stock: f64) -> String {
    let level = classify_stock_level(
        Decimal::from_f64(total).unwrap_or(Decimal::ZERO),
        Decimal::from_f64(min_stock).unwrap_or(Decimal::ZERO),
        Decimal::from_f64(safety_stock).unwrap_or(Decimal::ZERO),
    );
    level.as_str().to_string()
}

#[wasm_bindgen]
pub fn is_valid_material_code(code: &str) -> bool {
    shared::validation::validate_material_code(code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_bar_weight() {
        let kg = weight_kg("round", r#"{"diameter_mm": 50}"#, 1000.0, 7.85).unwrap();
        assert!((kg - 15.41).abs() < 1e-9);
    }

    #[test]
    fn test_catalog_alias_is_accepted() {
        let kg = weight_kg("Pipe", r#"{"diameter_mm": 60, "wall_thickness_mm": 5}"#, 1000.0, 7.85).unwrap();
        assert!((kg - 6.78).abs() < 1e-9);
    }

    #[test]
    fn test_weight_per_meter() {
        let kgm = kg_per_meter("plate", r#"{"width_mm": 100, "height_mm": 20}"#, 2.7).unwrap();
        assert!((kgm - 5.4).abs() < 1e-9);
    }

    #[test]
    fn test_length_for_weight() {
        let mm = round_bar_length(15.41, 50.0, 7.85).unwrap();
        assert!((mm - 1000.0).abs() < 0.5);
    }

    #[test]
    fn test_bad_input_is_reported() {
        assert!(weight_kg("octagon", r#"{"diameter_mm": 50}"#, 1000.0, 7.85).is_err());
        assert!(weight_kg("round", "not json", 1000.0, 7.85).is_err());
        assert!(weight_kg("round", r#"{"diameter_mm": 50}"#, f64::NAN, 7.85).is_err());
        assert!(round_bar_length(10.0, 0.0, 7.85).is_err());
    }

    #[test]
    fn test_classify_stock() {
        assert_eq!(classify_stock(5.0, 10.0, 20.0), "critical");
        assert_eq!(classify_stock(15.0, 10.0, 20.0), "warning");
        assert_eq!(classify_stock(50.0, 10.0, 20.0), "ok");
    }

    #[test]
    fn test_material_code_check() {
        assert!(is_valid_material_code("S235-RB50"));
        assert!(!is_valid_material_code("x"));
    }
}
