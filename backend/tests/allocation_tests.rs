//! Allocation engine tests
//!
//! - Deductions never exceed what the lots held
//! - Offcuts are consumed before full bars, smallest first
//! - A lot becomes consumed exactly when its quantity reaches zero
//! - Refused requests leave every lot untouched
//! - Issuing and returning material leaves on-hand stock where it started

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use shared::{
    plan_cut, plan_decrement, plan_restore, total_available, Dimensions, DomainError, LotKind, LotStatus,
    MaterialSpec, NewStockLot, RestorePlan, Shape, StockLot, UnitOfMeasure, DEFAULT_TOLERANCE_PERCENT,
};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn material(unit: UnitOfMeasure, dimensions: Dimensions) -> MaterialSpec {
    MaterialSpec {
        id: Uuid::new_v4(),
        code: "S235-RB".to_string(),
        name: "S235 round bar".to_string(),
        shape: Shape::Round,
        dimensions,
        density: dec("7.85"),
        weight_per_meter: None,
        unit,
        standard_length_mm: Some(dec("6000")),
        min_stock: Decimal::ZERO,
        safety_stock: Decimal::ZERO,
        unit_price: dec("2.50"),
        average_cost: Decimal::ZERO,
        last_alerted_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn lot(material: &MaterialSpec, kind: LotKind, count: &str, length_mm: Option<&str>, weight_kg: &str) -> StockLot {
    let created = Utc::now() - Duration::days(3);
    StockLot {
        id: Uuid::new_v4(),
        material_id: material.id,
        kind,
        count: dec(count),
        length_mm: length_mm.map(dec),
        weight_kg: dec(weight_kg),
        status: LotStatus::Available,
        version: 0,
        notes: None,
        created_at: created,
        updated_at: created,
    }
}

/// Lots after applying a plan's writes
fn apply(lots: &[StockLot], changes: &[shared::LotChange]) -> Vec<StockLot> {
    lots.iter()
        .map(|l| {
            changes
                .iter()
                .find(|c| c.lot.id == l.id)
                .map(|c| c.lot.clone())
                .unwrap_or_else(|| l.clone())
        })
        .collect()
}

/// Stock lot as inserted for a planned new lot
fn open(new_lot: NewStockLot) -> StockLot {
    StockLot {
        id: Uuid::new_v4(),
        material_id: new_lot.material_id,
        kind: new_lot.kind,
        count: new_lot.count,
        length_mm: new_lot.length_mm,
        weight_kg: new_lot.weight_kg,
        status: LotStatus::Available,
        version: 0,
        notes: new_lot.notes,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Put `quantity` back the way a usage removal does
fn give_back(material: &MaterialSpec, lots: Vec<StockLot>, quantity: Decimal) -> Vec<StockLot> {
    match plan_restore(material, &lots, quantity).unwrap() {
        RestorePlan::Increment(change) => apply(&lots, &[change]),
        RestorePlan::Create(new_lot) => {
            let mut lots = lots;
            lots.push(open(new_lot));
            lots
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Sum of deductions never exceeds the initial available stock
    #[test]
    fn deductions_never_exceed_available(
        weights in prop::collection::vec(1u32..50_000, 1..8),
        offcut_mask in prop::collection::vec(any::<bool>(), 8),
        requested_grams in 1u32..400_000,
    ) {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let lots: Vec<StockLot> = weights
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let kind = if offcut_mask[i] { LotKind::Offcut } else { LotKind::FullBar };
                let mut l = lot(&m, kind, "1", None, "0");
                l.weight_kg = Decimal::new(*g as i64, 3);
                l
            })
            .collect();
        let available = total_available(&lots, UnitOfMeasure::Kg).quantity;
        let requested = Decimal::new(requested_grams as i64, 3);

        match plan_decrement(&m, &lots, requested, DEFAULT_TOLERANCE_PERCENT) {
            Ok(plan) => {
                let deducted: Decimal = plan.changes.iter().map(|c| c.deducted).sum();
                prop_assert!(deducted <= available);
                prop_assert_eq!(deducted, requested.min(available));
                prop_assert_eq!(plan.outcome.deducted, deducted);
                prop_assert_eq!(plan.outcome.satisfied, requested <= available);

                let after = apply(&lots, &plan.changes);
                let left = total_available(&after, UnitOfMeasure::Kg).quantity;
                prop_assert_eq!(left, available - deducted);
                for l in &after {
                    prop_assert!(l.weight_kg >= Decimal::ZERO);
                    prop_assert_eq!(l.status == LotStatus::Consumed, l.weight_kg <= Decimal::ZERO);
                }
            }
            Err(DomainError::InsufficientStock { available: reported, .. }) => {
                prop_assert_eq!(reported, available);
                prop_assert!(requested > available * dec("1.05"));
            }
            Err(e) => prop_assert!(false, "unexpected error {}", e),
        }
    }

    /// Issuing material (up to the tolerance band over what is on hand) and
    /// returning every booked quantity brings stock back to its opening level
    #[test]
    fn issue_and_return_keeps_stock_balanced(
        bar_grams in prop::collection::vec(1_000u32..60_000, 1..4),
        offcut_grams in 0u32..5_000,
        fractions in prop::collection::vec(200u32..=1050, 1..6),
    ) {
        let m = material(UnitOfMeasure::Kg, Dimensions::round(dec("50")));
        let mut lots: Vec<StockLot> = bar_grams
            .iter()
            .map(|g| {
                let mut l = lot(&m, LotKind::FullBar, "1", Some("6000"), "0");
                l.weight_kg = Decimal::new(*g as i64, 3);
                l
            })
            .collect();
        if offcut_grams > 0 {
            let mut l = lot(&m, LotKind::Offcut, "1", Some("400"), "0");
            l.weight_kg = Decimal::new(offcut_grams as i64, 3);
            lots.push(l);
        }
        let opening = total_available(&lots, m.unit).quantity;

        let mut booked = Vec::new();
        for permille in fractions {
            let available = total_available(&lots, m.unit).quantity;
            if available <= Decimal::ZERO {
                break;
            }
            let requested = (available * Decimal::new(permille as i64, 3))
                .round_dp_with_strategy(3, RoundingStrategy::ToZero);
            if requested <= Decimal::ZERO {
                break;
            }
            let plan = plan_decrement(&m, &lots, requested, DEFAULT_TOLERANCE_PERCENT).unwrap();
            let quantity = plan.outcome.booked_quantity();
            prop_assert!(quantity <= available);
            prop_assert_eq!(quantity + plan.outcome.shortfall, requested);
            lots = apply(&lots, &plan.changes);
            booked.push(quantity);
        }

        for quantity in booked.into_iter().rev() {
            if quantity > Decimal::ZERO {
                lots = give_back(&m, lots, quantity);
            }
        }
        let closing = total_available(&lots, m.unit).quantity;
        prop_assert!((closing - opening).abs() <= dec("0.000000001"), "opening {} closing {}", opening, closing);
    }

    /// Offcuts are always drained before any full bar is touched
    #[test]
    fn offcuts_drain_first(
        offcut_kg in 1u32..20,
        bar_kg in 40u32..100,
        requested in 1u32..40,
    ) {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let offcut = lot(&m, LotKind::Offcut, "1", Some("500"), &offcut_kg.to_string());
        let bar = lot(&m, LotKind::FullBar, "1", Some("6000"), &bar_kg.to_string());
        let plan = plan_decrement(&m, &[bar.clone(), offcut.clone()], Decimal::from(requested), DEFAULT_TOLERANCE_PERCENT).unwrap();

        prop_assert_eq!(plan.changes[0].lot.id, offcut.id);
        if requested <= offcut_kg {
            prop_assert_eq!(plan.changes.len(), 1);
        } else {
            prop_assert_eq!(plan.changes[0].lot.status, LotStatus::Consumed);
            prop_assert_eq!(plan.changes[1].lot.id, bar.id);
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_shortfall_inside_tolerance_returns_only_what_was_issued() {
        let m = material(UnitOfMeasure::Kg, Dimensions::round(dec("50")));
        let lots = vec![lot(&m, LotKind::FullBar, "1", Some("6000"), "100")];

        let plan = plan_decrement(&m, &lots, dec("103"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert!(!plan.outcome.satisfied);
        assert_eq!(plan.outcome.shortfall, dec("3"));
        assert_eq!(plan.outcome.booked_quantity(), dec("100"));

        let after = apply(&lots, &plan.changes);
        let restored = give_back(&m, after, plan.outcome.booked_quantity());
        assert_eq!(total_available(&restored, m.unit).quantity, dec("100"));
    }

    #[test]
    fn test_twelve_kg_from_offcut_and_bar() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let offcut = lot(&m, LotKind::Offcut, "1", Some("800"), "5");
        let bar = lot(&m, LotKind::FullBar, "1", Some("6000"), "20");
        let lots = vec![bar.clone(), offcut.clone()];

        let plan = plan_decrement(&m, &lots, dec("12"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert!(plan.outcome.satisfied);
        assert_eq!(plan.changes.len(), 2);

        let after = apply(&lots, &plan.changes);
        let offcut_after = after.iter().find(|l| l.id == offcut.id).unwrap();
        let bar_after = after.iter().find(|l| l.id == bar.id).unwrap();
        assert_eq!(offcut_after.status, LotStatus::Consumed);
        assert_eq!(bar_after.available_quantity(UnitOfMeasure::Kg), dec("13"));
        assert_eq!(bar_after.status, LotStatus::Available);
    }

    #[test]
    fn test_request_beyond_tolerance_is_refused() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let lots = vec![lot(&m, LotKind::FullBar, "1", Some("6000"), "10")];
        let before = lots.clone();

        let result = plan_decrement(&m, &lots, dec("20"), DEFAULT_TOLERANCE_PERCENT);
        assert_eq!(
            result.unwrap_err(),
            DomainError::InsufficientStock {
                requested: dec("20"),
                available: dec("10"),
            }
        );
        assert_eq!(lots, before);
    }

    #[test]
    fn test_small_request_only_touches_offcut() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let offcut = lot(&m, LotKind::Offcut, "1", Some("400"), "2");
        let bar = lot(&m, LotKind::FullBar, "1", Some("6000"), "10");

        let plan = plan_decrement(&m, &[bar, offcut.clone()], dec("2"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].lot.id, offcut.id);
        assert_eq!(plan.changes[0].lot.status, LotStatus::Consumed);
    }

    #[test]
    fn test_reserved_lots_are_skipped() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let mut reserved = lot(&m, LotKind::Offcut, "1", Some("400"), "50");
        reserved.status = LotStatus::Reserved;
        let bar = lot(&m, LotKind::FullBar, "1", Some("6000"), "10");

        let plan = plan_decrement(&m, &[reserved, bar.clone()], dec("4"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].lot.id, bar.id);
    }

    #[test]
    fn test_metre_deduction_keeps_count_and_weight_consistent() {
        let m = material(UnitOfMeasure::M, Dimensions::round(dec("50")));
        let kgm = m.effective_weight_per_meter().unwrap().unwrap();
        let bar = lot(&m, LotKind::FullBar, "2", Some("6000"), "0");

        // 3 m out of 12 m leaves 1.5 bars
        let plan = plan_decrement(&m, &[bar], dec("3"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        let after = &plan.changes[0].lot;
        assert_eq!(after.count, dec("1.5"));
        assert_eq!(after.available_quantity(UnitOfMeasure::M), dec("9"));
        assert_eq!(after.weight_kg, dec("1.5") * dec("6") * kgm);
    }

    #[test]
    fn test_piece_deduction_is_straight_subtraction() {
        let m = material(UnitOfMeasure::Pcs, Dimensions::round(dec("20")));
        let bolts = lot(&m, LotKind::Box, "100", None, "25");

        let plan = plan_decrement(&m, &[bolts], dec("40"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        let after = &plan.changes[0].lot;
        assert_eq!(after.count, dec("60"));
        assert_eq!(after.weight_kg, dec("15"));
    }

    #[test]
    fn test_plan_bumps_lot_version() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let mut bar = lot(&m, LotKind::FullBar, "1", Some("6000"), "10");
        bar.version = 7;

        let plan = plan_decrement(&m, &[bar], dec("1"), DEFAULT_TOLERANCE_PERCENT).unwrap();
        assert_eq!(plan.changes[0].expected_version, 7);
        assert_eq!(plan.changes[0].lot.version, 8);
    }

    #[test]
    fn test_restore_tops_up_oldest_full_bar() {
        let m = material(UnitOfMeasure::Kg, Dimensions::default());
        let mut older = lot(&m, LotKind::FullBar, "1", Some("6000"), "10");
        older.created_at = Utc::now() - Duration::days(30);
        let newer = lot(&m, LotKind::FullBar, "1", Some("6000"), "10");
        let offcut = lot(&m, LotKind::Offcut, "1", Some("400"), "2");

        match plan_restore(&m, &[newer, offcut, older.clone()], dec("4")).unwrap() {
            RestorePlan::Increment(change) => {
                assert_eq!(change.lot.id, older.id);
                assert_eq!(change.lot.weight_kg, dec("14"));
            }
            RestorePlan::Create(_) => panic!("expected an existing lot to be topped up"),
        }
    }

    #[test]
    fn test_restore_without_full_bar_creates_lot() {
        let m = material(UnitOfMeasure::M, Dimensions::round(dec("50")));
        let offcut = lot(&m, LotKind::Offcut, "1", Some("400"), "2");

        match plan_restore(&m, &[offcut], dec("0.7")).unwrap() {
            RestorePlan::Create(new_lot) => {
                assert_eq!(new_lot.kind, LotKind::FullBar);
                assert_eq!(new_lot.quantity(UnitOfMeasure::M), dec("0.7"));
            }
            RestorePlan::Increment(_) => panic!("offcuts are never topped up"),
        }
    }

    #[test]
    fn test_cut_leaves_offcut_of_remainder() {
        let m = material(UnitOfMeasure::M, Dimensions::round(dec("50")));
        let bar = lot(&m, LotKind::FullBar, "2", Some("6000"), "184.92");

        let plan = plan_cut(&m, &bar, dec("1000")).unwrap();
        assert_eq!(plan.source.lot.count, dec("1"));
        let offcut = plan.offcut.unwrap();
        assert_eq!(offcut.kind, LotKind::Offcut);
        assert_eq!(offcut.length_mm, Some(dec("5000")));
        assert_eq!(plan.quantity_delta, dec("-1"));
    }

    #[test]
    fn test_cut_longer_than_piece_is_rejected() {
        let m = material(UnitOfMeasure::M, Dimensions::round(dec("50")));
        let bar = lot(&m, LotKind::FullBar, "1", Some("6000"), "92.46");
        assert!(matches!(
            plan_cut(&m, &bar, dec("6001")),
            Err(DomainError::InvalidDimension { field: "cut_length_mm", .. })
        ));
    }
}
