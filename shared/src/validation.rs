//! Validation utilities for catalog and stock input

use rust_decimal::Decimal;

use crate::error::DomainResult;
use crate::geometry;
use crate::models::{Dimensions, Shape};

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate material code format (2-32 chars, uppercase alphanumeric plus `-` `_` `.`)
pub fn validate_material_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Material code must be at least 2 characters");
    }
    if code.len() > 32 {
        return Err("Material code must be at most 32 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err("Material code must be uppercase alphanumeric, '-', '_' or '.'");
    }
    Ok(())
}

/// Validate density in g/cm³ (must be positive, below osmium)
pub fn validate_density(density: Decimal) -> Result<(), &'static str> {
    if density <= Decimal::ZERO {
        return Err("Density must be greater than zero");
    }
    if density > Decimal::new(23, 0) {
        return Err("Density must be at most 23 g/cm³");
    }
    Ok(())
}

/// Validate that the profile carries every dimension its shape needs and
/// that they describe a real section
pub fn validate_dimensions(shape: Shape, dimensions: &Dimensions) -> DomainResult<()> {
    geometry::volume_cm3(shape, dimensions, Decimal::ONE).map(|_| ())
}

/// Validate reorder thresholds: critical level cannot exceed the warning level
pub fn validate_thresholds(min_stock: Decimal, safety_stock: Decimal) -> Result<(), &'static str> {
    if min_stock < Decimal::ZERO || safety_stock < Decimal::ZERO {
        return Err("Stock thresholds cannot be negative");
    }
    if safety_stock > Decimal::ZERO && min_stock > safety_stock {
        return Err("Minimum stock cannot exceed safety stock");
    }
    Ok(())
}

// ============================================================================
// Stock & Project Validations
// ============================================================================

/// Validate a quantity that must be strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Largest piece count a single lot may hold
pub const MAX_LOT_COUNT: i64 = 1_000_000;
/// Longest bar accepted on receipt, in mm
pub const MAX_BAR_LENGTH_MM: i64 = 100_000;
/// Heaviest lot accepted on receipt, in kg
pub const MAX_LOT_WEIGHT_KG: i64 = 10_000_000;
/// Largest price or cost amount
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Validate a price or cost amount
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount > Decimal::from(MAX_AMOUNT) {
        return Err("Amount is too large");
    }
    Ok(())
}

/// Validate the piece count of a lot (0..=MAX_LOT_COUNT)
pub fn validate_lot_count(count: Decimal) -> Result<(), &'static str> {
    if count < Decimal::ZERO {
        return Err("Count cannot be negative");
    }
    if count > Decimal::from(MAX_LOT_COUNT) {
        return Err("Count exceeds the per-lot limit");
    }
    Ok(())
}

/// Validate a received bar length in mm
pub fn validate_bar_length(length_mm: Decimal) -> Result<(), &'static str> {
    if length_mm <= Decimal::ZERO {
        return Err("Length must be greater than zero");
    }
    if length_mm > Decimal::from(MAX_BAR_LENGTH_MM) {
        return Err("Length exceeds the longest accepted bar");
    }
    Ok(())
}

/// Validate a lot weight in kg
pub fn validate_lot_weight(weight_kg: Decimal) -> Result<(), &'static str> {
    if weight_kg < Decimal::ZERO {
        return Err("Weight cannot be negative");
    }
    if weight_kg > Decimal::from(MAX_LOT_WEIGHT_KG) {
        return Err("Weight exceeds the per-lot limit");
    }
    Ok(())
}

/// Validate labor hours for a single entry (0 < hours <= 24)
pub fn validate_labor_hours(hours: Decimal) -> Result<(), &'static str> {
    if hours <= Decimal::ZERO {
        return Err("Hours must be greater than zero");
    }
    if hours > Decimal::from(24) {
        return Err("A labor entry cannot exceed 24 hours");
    }
    Ok(())
}

/// Validate project code format (3-20 uppercase alphanumeric or `-`)
pub fn validate_project_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 || code.len() > 20 {
        return Err("Project code must be 3-20 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-') {
        return Err("Project code must be uppercase alphanumeric or '-'");
    }
    Ok(())
}
