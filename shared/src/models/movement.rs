//! Stock movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnitOfMeasure;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    In,
    Out,
    Cut,
    Adjust,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
            MovementKind::Cut => "CUT",
            MovementKind::Adjust => "ADJUST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(MovementKind::In),
            "OUT" => Some(MovementKind::Out),
            "CUT" => Some(MovementKind::Cut),
            "ADJUST" => Some(MovementKind::Adjust),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementRecord {
    pub id: Uuid,
    pub kind: MovementKind,
    pub material_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Signed change, negative for consumption
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub project_id: Option<Uuid>,
    pub reason: Option<String>,
    /// Cost per unit at the time of the movement
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

/// `|quantity| × unit_cost`, rounded half away from zero to 2 decimals
pub fn movement_total_cost(quantity: Decimal, unit_cost: Decimal) -> Decimal {
    (quantity.abs() * unit_cost).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Ledger totals for one movement kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementCostTotal {
    pub kind: MovementKind,
    pub movement_count: i64,
    pub net_quantity: Decimal,
    pub total_cost: Decimal,
}

/// Group movements by kind, ordered IN, OUT, CUT, ADJUST
pub fn summarize_costs(movements: &[MovementRecord]) -> Vec<MovementCostTotal> {
    let mut totals: std::collections::BTreeMap<MovementKind, MovementCostTotal> = std::collections::BTreeMap::new();
    for m in movements {
        let entry = totals.entry(m.kind).or_insert(MovementCostTotal {
            kind: m.kind,
            movement_count: 0,
            net_quantity: Decimal::ZERO,
            total_cost: Decimal::ZERO,
        });
        entry.movement_count += 1;
        entry.net_quantity += m.quantity;
        entry.total_cost += m.total_cost;
    }
    totals.into_values().collect()
}
