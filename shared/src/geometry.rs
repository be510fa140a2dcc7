//! Shape-aware mass calculation for bar stock
//!
//! Dimensions come in millimetres and are converted to centimetres before any
//! volume is taken, so that `mass_kg = volume_cm3 × density_g_cm3 / 1000`.
//! Results are rounded to 2 decimal places only at the returned value;
//! intermediate volumes keep full precision.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};
use crate::models::{Dimensions, Shape};

const MM_PER_CM: f64 = 10.0;

/// Volume in cm³ of a bar of the given profile and length
pub fn volume_cm3(shape: Shape, dimensions: &Dimensions, length_mm: Decimal) -> DomainResult<f64> {
    let length_cm = non_negative("length_mm", length_mm)? / MM_PER_CM;
    let area_cm2 = section_area_cm2(shape, dimensions)?;
    finite("volume", area_cm2 * length_cm)
}

/// Mass in kg of a bar, rounded to 2 decimals
pub fn weight(
    shape: Shape,
    dimensions: &Dimensions,
    length_mm: Decimal,
    density: Decimal,
) -> DomainResult<Decimal> {
    let density = positive("density", density)?;
    let volume = volume_cm3(shape, dimensions, length_mm)?;
    let mass = finite("weight", volume * density / 1000.0)?;
    to_rounded_decimal("weight", mass)
}

/// Mass of one metre of the profile in kg/m
pub fn weight_per_meter(shape: Shape, dimensions: &Dimensions, density: Decimal) -> DomainResult<Decimal> {
    weight(shape, dimensions, Decimal::from(1000), density)
}

/// Length in mm of a round bar with the given mass, rounded to 2 decimals
pub fn length_for_weight(weight_kg: Decimal, diameter_mm: Decimal, density: Decimal) -> DomainResult<Decimal> {
    let mass_g = non_negative("weight_kg", weight_kg)? * 1000.0;
    let density = positive("density", density)?;
    let radius_cm = positive("diameter_mm", diameter_mm)? / MM_PER_CM / 2.0;

    let area_cm2 = std::f64::consts::PI * radius_cm * radius_cm;
    let length_cm = finite("length", mass_g / (density * area_cm2))?;
    to_rounded_decimal("length", length_cm * MM_PER_CM)
}

/// Inverse lookup restricted to round material
pub fn length_for_weight_of(
    shape: Shape,
    dimensions: &Dimensions,
    weight_kg: Decimal,
    density: Decimal,
) -> DomainResult<Decimal> {
    match shape {
        Shape::Round => {
            let diameter = required(shape, "diameter_mm", dimensions.diameter_mm)?;
            length_for_weight(weight_kg, diameter, density)
        }
        Shape::Hex | Shape::Tube | Shape::Plate => Err(DomainError::UnsupportedShape(format!(
            "length lookup is only defined for round bars, not {}",
            shape
        ))),
    }
}

fn section_area_cm2(shape: Shape, dimensions: &Dimensions) -> DomainResult<f64> {
    let area = match shape {
        Shape::Round => {
            let d = positive("diameter_mm", required(shape, "diameter_mm", dimensions.diameter_mm)?)? / MM_PER_CM;
            std::f64::consts::PI * (d / 2.0).powi(2)
        }
        Shape::Hex => {
            let flats = positive("diameter_mm", required(shape, "diameter_mm", dimensions.diameter_mm)?)? / MM_PER_CM;
            (3f64.sqrt() / 2.0) * flats.powi(2)
        }
        Shape::Tube => {
            let outer = positive("diameter_mm", required(shape, "diameter_mm", dimensions.diameter_mm)?)? / MM_PER_CM;
            let wall = positive(
                "wall_thickness_mm",
                required(shape, "wall_thickness_mm", dimensions.wall_thickness_mm)?,
            )? / MM_PER_CM;
            let outer_r = outer / 2.0;
            let inner_r = outer_r - wall;
            if inner_r < 0.0 {
                return Err(DomainError::InvalidDimension {
                    field: "wall_thickness_mm",
                    message: "wall is thicker than the tube radius".to_string(),
                });
            }
            std::f64::consts::PI * (outer_r.powi(2) - inner_r.powi(2))
        }
        Shape::Plate => {
            let w = positive("width_mm", required(shape, "width_mm", dimensions.width_mm)?)? / MM_PER_CM;
            let h = positive("height_mm", required(shape, "height_mm", dimensions.height_mm)?)? / MM_PER_CM;
            w * h
        }
    };
    finite("section area", area)
}

fn required(shape: Shape, field: &'static str, value: Option<Decimal>) -> DomainResult<Decimal> {
    value.ok_or(DomainError::MissingDimension { shape, field })
}

fn positive(field: &'static str, value: Decimal) -> DomainResult<f64> {
    let v = to_f64(field, value)?;
    if v <= 0.0 {
        return Err(DomainError::InvalidDimension {
            field,
            message: format!("must be greater than zero, got {}", value),
        });
    }
    Ok(v)
}

fn non_negative(field: &'static str, value: Decimal) -> DomainResult<f64> {
    let v = to_f64(field, value)?;
    if v < 0.0 {
        return Err(DomainError::InvalidDimension {
            field,
            message: format!("must not be negative, got {}", value),
        });
    }
    Ok(v)
}

fn to_f64(field: &'static str, value: Decimal) -> DomainResult<f64> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or(DomainError::NonFinite(field))
}

fn finite(what: &'static str, value: f64) -> DomainResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DomainError::NonFinite(what))
    }
}

fn to_rounded_decimal(what: &'static str, value: f64) -> DomainResult<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .ok_or(DomainError::NonFinite(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn round_bar_fifty_by_one_metre() {
        // π × 2.5² × 100 = 1963.5 cm³ → 1963.5 × 7.85 / 1000 = 15.41 kg
        let w = weight(Shape::Round, &Dimensions::round(dec("50")), dec("1000"), dec("7.85")).unwrap();
        assert_eq!(w, dec("15.41"));
    }

    #[test]
    fn round_bar_volume_keeps_precision() {
        let v = volume_cm3(Shape::Round, &Dimensions::round(dec("50")), dec("1000")).unwrap();
        assert!((v - 1963.495).abs() < 0.001);
    }

    #[test]
    fn hex_bar_uses_across_flats() {
        // (√3/2) × 3² × 100 = 779.42 cm³ → × 7.85 / 1000 = 6.12 kg
        let w = weight(Shape::Hex, &Dimensions::round(dec("30")), dec("1000"), dec("7.85")).unwrap();
        assert_eq!(w, dec("6.12"));
    }

    #[test]
    fn tube_subtracts_bore() {
        // π × (3² − 2.5²) × 100 = 863.94 cm³ → 6.78 kg
        let w = weight(Shape::Tube, &Dimensions::tube(dec("60"), dec("5")), dec("1000"), dec("7.85")).unwrap();
        assert_eq!(w, dec("6.78"));
    }

    #[test]
    fn plate_is_width_by_height() {
        // 10 × 1 × 100 = 1000 cm³ of aluminium → 2.70 kg
        let w = weight(Shape::Plate, &Dimensions::plate(dec("100"), dec("10")), dec("1000"), dec("2.7")).unwrap();
        assert_eq!(w, dec("2.70"));
    }

    #[test]
    fn zero_length_weighs_nothing() {
        let w = weight(Shape::Round, &Dimensions::round(dec("20")), Decimal::ZERO, dec("7.85")).unwrap();
        assert_eq!(w, Decimal::ZERO);
    }

    #[test]
    fn missing_dimension_is_reported() {
        let err = weight(Shape::Tube, &Dimensions::round(dec("60")), dec("1000"), dec("7.85")).unwrap_err();
        assert_eq!(
            err,
            DomainError::MissingDimension {
                shape: Shape::Tube,
                field: "wall_thickness_mm"
            }
        );
    }

    #[test]
    fn wall_thicker_than_radius_is_rejected() {
        let err = weight(Shape::Tube, &Dimensions::tube(dec("20"), dec("12")), dec("1000"), dec("7.85")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDimension { field: "wall_thickness_mm", .. }));
    }

    #[test]
    fn non_positive_density_is_rejected() {
        let err = weight(Shape::Round, &Dimensions::round(dec("20")), dec("1000"), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDimension { field: "density", .. }));
    }

    #[test]
    fn length_for_weight_inverts_round_bar() {
        let l = length_for_weight(dec("15.41"), dec("50"), dec("7.85")).unwrap();
        // 15.41 kg at 0.0154135 kg/mm is 999.77 mm
        assert!((l - dec("1000")).abs() < dec("0.5"));
    }

    #[test]
    fn length_lookup_rejects_non_round_profiles() {
        let err = length_for_weight_of(Shape::Plate, &Dimensions::plate(dec("50"), dec("5")), dec("10"), dec("7.85"))
            .unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedShape(_)));
    }

    #[test]
    fn weight_per_meter_matches_one_metre_bar() {
        let dims = Dimensions::round(dec("50"));
        assert_eq!(
            weight_per_meter(Shape::Round, &dims, dec("7.85")).unwrap(),
            weight(Shape::Round, &dims, dec("1000"), dec("7.85")).unwrap()
        );
    }
}
