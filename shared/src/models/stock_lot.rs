//! Physical stock lots: bars, offcuts and boxes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MaterialSpec, UnitOfMeasure};
use crate::error::{DomainError, DomainResult};
use crate::geometry;
use crate::validation;

const MM_PER_M: i64 = 1000;

fn too_heavy() -> DomainError {
    DomainError::InvalidQuantity("lot weight exceeds the per-lot limit".to_string())
}

/// Kind of physical lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LotKind {
    FullBar,
    /// Leftover piece shorter than standard stock length
    Offcut,
    /// Boxed or bulk stock
    Box,
}

impl LotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotKind::FullBar => "full_bar",
            LotKind::Offcut => "offcut",
            LotKind::Box => "box",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full_bar" => Some(LotKind::FullBar),
            "offcut" => Some(LotKind::Offcut),
            "box" => Some(LotKind::Box),
            _ => None,
        }
    }

    /// Allocation priority, lower is consumed first
    pub fn allocation_rank(&self) -> u8 {
        match self {
            LotKind::Offcut => 0,
            LotKind::FullBar | LotKind::Box => 1,
        }
    }
}

/// Lifecycle of a lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Available,
    Reserved,
    Consumed,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Available => "available",
            LotStatus::Reserved => "reserved",
            LotStatus::Consumed => "consumed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(LotStatus::Available),
            "reserved" => Some(LotStatus::Reserved),
            "consumed" => Some(LotStatus::Consumed),
            _ => None,
        }
    }
}

/// An independently trackable quantity of one material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLot {
    pub id: Uuid,
    pub material_id: Uuid,
    pub kind: LotKind,
    /// Number of identical pieces; fractional after proportional deduction
    pub count: Decimal,
    /// Length of each piece
    pub length_mm: Option<Decimal>,
    /// Total weight of the lot, never edited directly
    pub weight_kg: Decimal,
    pub status: LotStatus,
    /// Optimistic-lock token, bumped on every write
    pub version: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Weight of `count` pieces of `length_mm` at `weight_per_meter` kg/m
pub fn derive_weight(count: Decimal, length_mm: Decimal, weight_per_meter: Decimal) -> Decimal {
    count * length_mm * weight_per_meter / Decimal::from(MM_PER_M)
}

impl StockLot {
    /// Quantity held, expressed in the material's unit
    pub fn available_quantity(&self, unit: UnitOfMeasure) -> Decimal {
        if self.status == LotStatus::Consumed {
            return Decimal::ZERO;
        }
        match unit {
            UnitOfMeasure::Kg => self.weight_kg,
            UnitOfMeasure::M => self
                .length_mm
                .map(|l| self.count * l / Decimal::from(MM_PER_M))
                .unwrap_or(Decimal::ZERO),
            UnitOfMeasure::Pcs => self.count,
        }
    }

    /// Eligible for an allocation pass
    pub fn is_allocatable(&self, unit: UnitOfMeasure) -> bool {
        self.status == LotStatus::Available && self.available_quantity(unit) > Decimal::ZERO
    }

    /// Size used to order lots of the same kind: piece length when known
    pub fn size_key(&self, unit: UnitOfMeasure) -> Decimal {
        self.length_mm.unwrap_or_else(|| self.available_quantity(unit))
    }

    /// Remove up to `amount` (in `unit`) from the lot and return what was taken.
    ///
    /// Count and weight shrink by the same fraction; with a known kg/m and
    /// piece length the weight is re-derived from the new count instead.
    pub fn deduct(&mut self, amount: Decimal, unit: UnitOfMeasure, weight_per_meter: Option<Decimal>) -> Decimal {
        let available = self.available_quantity(unit);
        let taken = amount.min(available);
        if taken <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let fraction = taken / available;
        let previous_weight = self.weight_kg;
        self.count = match unit {
            UnitOfMeasure::Pcs => self.count - taken,
            UnitOfMeasure::Kg | UnitOfMeasure::M => self.count - self.count * fraction,
        };
        self.weight_kg = match unit {
            UnitOfMeasure::Kg => previous_weight - taken,
            UnitOfMeasure::M | UnitOfMeasure::Pcs => self
                .derived_weight(weight_per_meter)
                .unwrap_or(previous_weight - previous_weight * fraction),
        };

        self.settle(unit);
        taken
    }

    /// Add `amount` (in `unit`) back to an available lot, scaling pieces and
    /// weight proportionally
    pub fn add(&mut self, amount: Decimal, unit: UnitOfMeasure, weight_per_meter: Option<Decimal>) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!("cannot add {} to a lot", amount)));
        }
        let available = self.available_quantity(unit);
        if self.status != LotStatus::Available || available <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(
                "stock can only be added to an available lot".to_string(),
            ));
        }

        let fraction = amount / available;
        let previous_weight = self.weight_kg;
        self.count = match unit {
            UnitOfMeasure::Pcs => self.count + amount,
            UnitOfMeasure::Kg | UnitOfMeasure::M => self.count + self.count * fraction,
        };
        self.weight_kg = match unit {
            UnitOfMeasure::Kg => previous_weight + amount,
            UnitOfMeasure::M | UnitOfMeasure::Pcs => self
                .derived_weight(weight_per_meter)
                .unwrap_or(previous_weight + previous_weight * fraction),
        };
        self.version += 1;
        Ok(())
    }

    /// Set the piece count after a stock take and return the signed change in `unit`
    pub fn set_count(
        &mut self,
        new_count: Decimal,
        unit: UnitOfMeasure,
        weight_per_meter: Option<Decimal>,
    ) -> DomainResult<Decimal> {
        validation::validate_lot_count(new_count).map_err(|m| DomainError::InvalidQuantity(m.to_string()))?;
        if self.status == LotStatus::Consumed {
            return Err(DomainError::InvalidQuantity(
                "a consumed lot cannot be adjusted".to_string(),
            ));
        }
        if self.count <= Decimal::ZERO && self.derived_weight(weight_per_meter).is_none() {
            return Err(DomainError::InvalidQuantity(
                "lot has no per-piece weight to scale from".to_string(),
            ));
        }

        let before = self.available_quantity(unit);
        let per_piece = if self.count > Decimal::ZERO {
            self.weight_kg / self.count
        } else {
            Decimal::ZERO
        };
        self.count = new_count;
        self.weight_kg = self
            .derived_weight(weight_per_meter)
            .unwrap_or(per_piece * new_count);

        self.settle(unit);
        Ok(self.available_quantity(unit) - before)
    }

    /// Zero-or-less quantity moves the lot to consumed; every write bumps the version
    fn settle(&mut self, unit: UnitOfMeasure) {
        if self.available_quantity(unit) <= Decimal::ZERO {
            self.count = Decimal::ZERO;
            self.weight_kg = Decimal::ZERO;
            self.status = LotStatus::Consumed;
        }
        self.version += 1;
    }

    fn derived_weight(&self, weight_per_meter: Option<Decimal>) -> Option<Decimal> {
        match (self.length_mm, weight_per_meter) {
            (Some(length), Some(kgm)) => Some(derive_weight(self.count, length, kgm)),
            _ => None,
        }
    }
}

/// A lot about to be inserted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStockLot {
    pub material_id: Uuid,
    pub kind: LotKind,
    pub count: Decimal,
    pub length_mm: Option<Decimal>,
    pub weight_kg: Decimal,
    pub notes: Option<String>,
}

impl NewStockLot {
    /// Lot for a stock receipt.
    ///
    /// Weight comes from the catalog kg/m when set, then from the profile
    /// geometry, and only then from the supplied weight (boxed stock).
    pub fn receive(
        material: &MaterialSpec,
        kind: LotKind,
        count: Decimal,
        length_mm: Option<Decimal>,
        weight_kg: Option<Decimal>,
    ) -> DomainResult<Self> {
        if count <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity("count must be positive".to_string()));
        }
        validation::validate_lot_count(count).map_err(|m| DomainError::InvalidQuantity(m.to_string()))?;
        if let Some(length) = length_mm {
            validation::validate_bar_length(length).map_err(|m| DomainError::InvalidDimension {
                field: "length_mm",
                message: m.to_string(),
            })?;
        }
        if material.unit == UnitOfMeasure::M && length_mm.is_none() {
            return Err(DomainError::MissingDimension {
                shape: material.shape,
                field: "length_mm",
            });
        }

        let weight_kg = match (length_mm, material.weight_per_meter) {
            (Some(length), Some(kgm)) => count
                .checked_mul(length)
                .and_then(|v| v.checked_mul(kgm))
                .map(|v| v / Decimal::from(MM_PER_M))
                .ok_or_else(too_heavy)?,
            (Some(length), None) if !material.dimensions.is_empty() => {
                geometry::weight(material.shape, &material.dimensions, length, material.density)?
                    .checked_mul(count)
                    .ok_or_else(too_heavy)?
            }
            _ => weight_kg.ok_or(DomainError::InvalidQuantity(
                "weight_kg is required when it cannot be derived from length".to_string(),
            ))?,
        };
        validation::validate_lot_weight(weight_kg).map_err(|m| DomainError::InvalidQuantity(m.to_string()))?;
        if material.unit == UnitOfMeasure::Kg && weight_kg <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(
                "a mass-tracked lot needs a positive weight".to_string(),
            ));
        }

        Ok(Self {
            material_id: material.id,
            kind,
            count,
            length_mm,
            weight_kg,
            notes: None,
        })
    }

    /// Full-bar lot holding exactly `quantity` of the material's unit
    pub fn holding(material: &MaterialSpec, quantity: Decimal) -> DomainResult<Self> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!("cannot restore {}", quantity)));
        }
        let kgm = material.effective_weight_per_meter()?;

        let (count, length_mm, weight_kg) = match material.unit {
            UnitOfMeasure::Kg => {
                let length = match kgm {
                    Some(kgm) if kgm > Decimal::ZERO => {
                        Some((quantity * Decimal::from(MM_PER_M) / kgm).round_dp(2))
                    }
                    _ => geometry::length_for_weight_of(
                        material.shape,
                        &material.dimensions,
                        quantity,
                        material.density,
                    )
                    .ok(),
                };
                (Decimal::ONE, length, quantity)
            }
            UnitOfMeasure::M => {
                let length = quantity * Decimal::from(MM_PER_M);
                let weight = kgm
                    .map(|kgm| derive_weight(Decimal::ONE, length, kgm))
                    .unwrap_or(Decimal::ZERO);
                (Decimal::ONE, Some(length), weight)
            }
            UnitOfMeasure::Pcs => {
                let length = material.standard_length_mm;
                let weight = match (length, kgm) {
                    (Some(length), Some(kgm)) => derive_weight(quantity, length, kgm),
                    _ => Decimal::ZERO,
                };
                (quantity, length, weight)
            }
        };

        Ok(Self {
            material_id: material.id,
            kind: LotKind::FullBar,
            count,
            length_mm,
            weight_kg,
            notes: None,
        })
    }

    /// Quantity the new lot adds, in the material's unit
    pub fn quantity(&self, unit: UnitOfMeasure) -> Decimal {
        match unit {
            UnitOfMeasure::Kg => self.weight_kg,
            UnitOfMeasure::M => self
                .length_mm
                .map(|l| self.count * l / Decimal::from(MM_PER_M))
                .unwrap_or(Decimal::ZERO),
            UnitOfMeasure::Pcs => self.count,
        }
    }
}

/// Aggregate of all available lots for one material
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StockTotals {
    /// Total in the material's unit
    pub quantity: Decimal,
    pub weight_kg: Decimal,
    pub length_m: Decimal,
    pub lot_count: i64,
}

/// Sum the available lots; consumed and reserved lots are excluded
pub fn total_available(lots: &[StockLot], unit: UnitOfMeasure) -> StockTotals {
    lots.iter()
        .filter(|lot| lot.status == LotStatus::Available)
        .fold(StockTotals::default(), |mut totals, lot| {
            totals.quantity += lot.available_quantity(unit);
            totals.weight_kg += lot.weight_kg;
            totals.length_m += lot.available_quantity(UnitOfMeasure::M);
            totals.lot_count += 1;
            totals
        })
}
