//! Stock allocation across heterogeneous lots
//!
//! Plans are computed against a snapshot of a material's lots and carry the
//! resulting lot states; nothing is written until the caller applies them.
//! Offcuts go first so full bars stay intact, and within a kind the smallest
//! piece goes first.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{derive_weight, LotKind, LotStatus, MaterialSpec, NewStockLot, StockLot, UnitOfMeasure};

/// Slack allowed over the available total before a request is refused
pub const DEFAULT_TOLERANCE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Result of a decrement as seen by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationOutcome {
    pub requested: Decimal,
    pub deducted: Decimal,
    pub satisfied: bool,
    pub shortfall: Decimal,
}

impl AllocationOutcome {
    /// Quantity the ledger and project usages record: what actually left the lots
    pub fn booked_quantity(&self) -> Decimal {
        self.deducted
    }
}

/// One lot touched by a plan, with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct LotChange {
    pub expected_version: i32,
    pub deducted: Decimal,
    pub lot: StockLot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub changes: Vec<LotChange>,
    pub outcome: AllocationOutcome,
}

/// How a returned quantity goes back into stock
#[derive(Debug, Clone, PartialEq)]
pub enum RestorePlan {
    Increment(LotChange),
    Create(NewStockLot),
}

/// A bar cut into a consumed piece plus an offcut
#[derive(Debug, Clone, PartialEq)]
pub struct CutPlan {
    pub source: LotChange,
    pub offcut: Option<NewStockLot>,
    /// Signed change of on-hand quantity in the material's unit
    pub quantity_delta: Decimal,
}

/// Allocatable lots in consumption order: offcuts first, then ascending size,
/// then creation time and id so repeated reads give the same order
pub fn allocation_order(lots: &[StockLot], unit: UnitOfMeasure) -> Vec<&StockLot> {
    let mut candidates: Vec<&StockLot> = lots.iter().filter(|lot| lot.is_allocatable(unit)).collect();
    candidates.sort_by(|a, b| {
        a.kind
            .allocation_rank()
            .cmp(&b.kind.allocation_rank())
            .then_with(|| a.size_key(unit).cmp(&b.size_key(unit)))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}

/// Refuse requests beyond `available × (1 + tolerance%)`
pub fn check_availability(requested: Decimal, available: Decimal, tolerance_percent: Decimal) -> DomainResult<()> {
    if requested <= Decimal::ZERO {
        return Err(DomainError::InvalidQuantity(format!(
            "requested quantity must be positive, got {}",
            requested
        )));
    }
    let ceiling = available * (Decimal::ONE + tolerance_percent / Decimal::ONE_HUNDRED);
    if requested > ceiling {
        return Err(DomainError::InsufficientStock { requested, available });
    }
    Ok(())
}

/// Plan the consumption of `requested` units of `material` from `lots`
pub fn plan_decrement(
    material: &MaterialSpec,
    lots: &[StockLot],
    requested: Decimal,
    tolerance_percent: Decimal,
) -> DomainResult<AllocationPlan> {
    let unit = material.unit;
    let ordered = allocation_order(lots, unit);
    let available: Decimal = ordered.iter().map(|lot| lot.available_quantity(unit)).sum();
    check_availability(requested, available, tolerance_percent)?;

    let kgm = material.effective_weight_per_meter()?;
    let mut remaining = requested;
    let mut changes = Vec::new();

    for lot in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let mut updated = lot.clone();
        let deducted = updated.deduct(remaining, unit, kgm);
        if deducted <= Decimal::ZERO {
            continue;
        }
        remaining -= deducted;
        changes.push(LotChange {
            expected_version: lot.version,
            deducted,
            lot: updated,
        });
    }

    let deducted = requested - remaining;
    Ok(AllocationPlan {
        changes,
        outcome: AllocationOutcome {
            requested,
            deducted,
            satisfied: remaining <= Decimal::ZERO,
            shortfall: remaining.max(Decimal::ZERO),
        },
    })
}

/// Plan returning `quantity` to stock: top up the oldest available full bar
/// or open a new full-bar lot
pub fn plan_restore(material: &MaterialSpec, lots: &[StockLot], quantity: Decimal) -> DomainResult<RestorePlan> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::InvalidQuantity(format!(
            "restored quantity must be positive, got {}",
            quantity
        )));
    }
    let unit = material.unit;

    let target = lots
        .iter()
        .filter(|lot| lot.kind == LotKind::FullBar && lot.is_allocatable(unit))
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    match target {
        Some(lot) => {
            let mut updated = lot.clone();
            updated.add(quantity, unit, material.effective_weight_per_meter()?)?;
            Ok(RestorePlan::Increment(LotChange {
                expected_version: lot.version,
                deducted: -quantity,
                lot: updated,
            }))
        }
        None => Ok(RestorePlan::Create(NewStockLot::holding(material, quantity)?)),
    }
}

/// Plan cutting `cut_length_mm` off one piece of `lot`.
///
/// The cut piece leaves stock; whatever is left of the piece becomes a new
/// offcut lot.
pub fn plan_cut(material: &MaterialSpec, lot: &StockLot, cut_length_mm: Decimal) -> DomainResult<CutPlan> {
    let unit = material.unit;
    if lot.status != LotStatus::Available {
        return Err(DomainError::InvalidQuantity("only available lots can be cut".to_string()));
    }
    let piece_length = lot.length_mm.ok_or(DomainError::MissingDimension {
        shape: material.shape,
        field: "length_mm",
    })?;
    if cut_length_mm <= Decimal::ZERO || cut_length_mm > piece_length {
        return Err(DomainError::InvalidDimension {
            field: "cut_length_mm",
            message: format!("must be between 0 and the piece length {}", piece_length),
        });
    }
    if lot.count < Decimal::ONE {
        return Err(DomainError::InvalidQuantity(
            "lot holds less than one whole piece".to_string(),
        ));
    }

    let kgm = material.effective_weight_per_meter()?;
    let piece_weight = lot.weight_kg / lot.count;
    let before = lot.available_quantity(unit);

    let mut source = lot.clone();
    source.set_count(lot.count - Decimal::ONE, unit, kgm)?;

    let remainder = piece_length - cut_length_mm;
    let offcut = (remainder > Decimal::ZERO).then(|| NewStockLot {
        material_id: material.id,
        kind: LotKind::Offcut,
        count: Decimal::ONE,
        length_mm: Some(remainder),
        weight_kg: kgm
            .map(|kgm| derive_weight(Decimal::ONE, remainder, kgm))
            .unwrap_or(piece_weight * remainder / piece_length),
        notes: Some(format!("Cut {} mm from lot {}", cut_length_mm, lot.id)),
    });

    let offcut_quantity = match (&offcut, unit) {
        (None, _) => Decimal::ZERO,
        (Some(o), UnitOfMeasure::Kg) => o.weight_kg,
        (Some(_), UnitOfMeasure::M) => remainder / Decimal::ONE_THOUSAND,
        (Some(_), UnitOfMeasure::Pcs) => Decimal::ONE,
    };
    let quantity_delta = source.available_quantity(unit) + offcut_quantity - before;

    Ok(CutPlan {
        source: LotChange {
            expected_version: lot.version,
            deducted: before - source.available_quantity(unit),
            lot: source,
        },
        offcut,
        quantity_delta,
    })
}

/// Ids of the lots a plan writes, in application order
pub fn touched_lots(plan: &AllocationPlan) -> Vec<Uuid> {
    plan.changes.iter().map(|c| c.lot.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dimensions, Shape};
    use chrono::{Duration, Utc};

    fn material(unit: UnitOfMeasure) -> MaterialSpec {
        MaterialSpec {
            id: Uuid::new_v4(),
            code: "RB-50".to_string(),
            name: "Round bar 50".to_string(),
            shape: Shape::Round,
            dimensions: Dimensions::default(),
            density: Decimal::new(785, 2),
            weight_per_meter: None,
            unit,
            standard_length_mm: Some(Decimal::from(6000)),
            min_stock: Decimal::ZERO,
            safety_stock: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            last_alerted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn lot(kind: LotKind, count: i64, length_mm: Option<i64>, weight_kg: i64, age_days: i64) -> StockLot {
        let created = Utc::now() - Duration::days(age_days);
        StockLot {
            id: Uuid::new_v4(),
            material_id: Uuid::nil(),
            kind,
            count: Decimal::from(count),
            length_mm: length_mm.map(Decimal::from),
            weight_kg: Decimal::from(weight_kg),
            status: LotStatus::Available,
            version: 3,
            notes: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn offcuts_before_full_bars_then_smallest_first() {
        let big_offcut = lot(LotKind::Offcut, 1, Some(2000), 8, 1);
        let small_offcut = lot(LotKind::Offcut, 1, Some(500), 2, 1);
        let bar = lot(LotKind::FullBar, 1, Some(300), 1, 1);
        let lots = vec![bar.clone(), big_offcut.clone(), small_offcut.clone()];

        let order: Vec<Uuid> = allocation_order(&lots, UnitOfMeasure::Kg).iter().map(|l| l.id).collect();
        assert_eq!(order, vec![small_offcut.id, big_offcut.id, bar.id]);
    }

    #[test]
    fn equal_lots_are_ordered_by_age() {
        let newer = lot(LotKind::FullBar, 1, Some(6000), 30, 1);
        let older = lot(LotKind::FullBar, 1, Some(6000), 30, 10);
        let lots = vec![newer.clone(), older.clone()];
        let order: Vec<Uuid> = allocation_order(&lots, UnitOfMeasure::Kg).iter().map(|l| l.id).collect();
        assert_eq!(order, vec![older.id, newer.id]);
    }

    #[test]
    fn tolerance_band_is_five_percent() {
        let available = Decimal::from(100);
        assert!(check_availability(Decimal::from(105), available, DEFAULT_TOLERANCE_PERCENT).is_ok());
        assert_eq!(
            check_availability(Decimal::new(10501, 2), available, DEFAULT_TOLERANCE_PERCENT),
            Err(DomainError::InsufficientStock {
                requested: Decimal::new(10501, 2),
                available,
            })
        );
    }

    #[test]
    fn non_positive_request_is_rejected() {
        let m = material(UnitOfMeasure::Kg);
        let lots = vec![lot(LotKind::FullBar, 1, Some(6000), 20, 1)];
        assert!(matches!(
            plan_decrement(&m, &lots, Decimal::ZERO, DEFAULT_TOLERANCE_PERCENT),
            Err(DomainError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn request_within_tolerance_reports_shortfall() {
        let m = material(UnitOfMeasure::Kg);
        let lots = vec![lot(LotKind::FullBar, 1, Some(6000), 100, 1)];
        let plan = plan_decrement(&m, &lots, Decimal::from(103), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert!(!plan.outcome.satisfied);
        assert_eq!(plan.outcome.deducted, Decimal::from(100));
        assert_eq!(plan.outcome.shortfall, Decimal::from(3));
        assert_eq!(plan.changes[0].lot.status, LotStatus::Consumed);
    }

    #[test]
    fn plan_carries_read_version() {
        let m = material(UnitOfMeasure::Kg);
        let lots = vec![lot(LotKind::FullBar, 1, Some(6000), 20, 1)];
        let plan = plan_decrement(&m, &lots, Decimal::from(5), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert_eq!(plan.changes[0].expected_version, 3);
        assert_eq!(plan.changes[0].lot.version, 4);
        assert_eq!(touched_lots(&plan), vec![lots[0].id]);
    }

    #[test]
    fn restore_tops_up_oldest_full_bar() {
        let m = material(UnitOfMeasure::Kg);
        let offcut = lot(LotKind::Offcut, 1, Some(500), 2, 5);
        let newer = lot(LotKind::FullBar, 1, Some(6000), 10, 1);
        let older = lot(LotKind::FullBar, 2, Some(6000), 20, 9);
        let lots = vec![offcut, newer, older.clone()];

        match plan_restore(&m, &lots, Decimal::from(5)).unwrap() {
            RestorePlan::Increment(change) => {
                assert_eq!(change.lot.id, older.id);
                assert_eq!(change.lot.weight_kg, Decimal::from(25));
                assert_eq!(change.lot.count, Decimal::new(25, 1));
            }
            RestorePlan::Create(_) => panic!("expected an increment"),
        }
    }

    #[test]
    fn restore_without_full_bar_opens_new_lot() {
        let m = material(UnitOfMeasure::Pcs);
        let lots = vec![lot(LotKind::Offcut, 1, Some(500), 2, 5)];
        match plan_restore(&m, &lots, Decimal::from(3)).unwrap() {
            RestorePlan::Create(new_lot) => {
                assert_eq!(new_lot.kind, LotKind::FullBar);
                assert_eq!(new_lot.count, Decimal::from(3));
                assert_eq!(new_lot.length_mm, Some(Decimal::from(6000)));
            }
            RestorePlan::Increment(_) => panic!("expected a new lot"),
        }
    }

    #[test]
    fn cut_leaves_offcut_of_remainder() {
        let m = material(UnitOfMeasure::M);
        let bar = lot(LotKind::FullBar, 2, Some(6000), 60, 1);
        let plan = plan_cut(&m, &bar, Decimal::from(1500)).unwrap();

        assert_eq!(plan.source.lot.count, Decimal::ONE);
        assert_eq!(plan.source.lot.weight_kg, Decimal::from(30));
        let offcut = plan.offcut.unwrap();
        assert_eq!(offcut.kind, LotKind::Offcut);
        assert_eq!(offcut.length_mm, Some(Decimal::from(4500)));
        assert_eq!(offcut.weight_kg, Decimal::new(225, 1));
        assert_eq!(plan.quantity_delta, Decimal::new(-15, 1));
    }

    #[test]
    fn cut_of_whole_piece_has_no_offcut() {
        let m = material(UnitOfMeasure::Pcs);
        let bar = lot(LotKind::FullBar, 1, Some(6000), 30, 1);
        let plan = plan_cut(&m, &bar, Decimal::from(6000)).unwrap();
        assert!(plan.offcut.is_none());
        assert_eq!(plan.source.lot.status, LotStatus::Consumed);
        assert_eq!(plan.quantity_delta, Decimal::from(-1));
    }

    #[test]
    fn cut_longer_than_piece_is_rejected() {
        let m = material(UnitOfMeasure::M);
        let bar = lot(LotKind::FullBar, 1, Some(1000), 10, 1);
        assert!(matches!(
            plan_cut(&m, &bar, Decimal::from(1200)),
            Err(DomainError::InvalidDimension { field: "cut_length_mm", .. })
        ));
    }
}
