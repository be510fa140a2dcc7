//! Project costing models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnitOfMeasure;
use crate::error::{DomainError, DomainResult};

/// Project lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
    OnHold,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProjectStatus::Draft),
            "active" => Some(ProjectStatus::Active),
            "completed" => Some(ProjectStatus::Completed),
            "on_hold" => Some(ProjectStatus::OnHold),
            "cancelled" => Some(ProjectStatus::Cancelled),
            _ => None,
        }
    }

    /// Staying in the same state is always allowed
    pub fn can_transition_to(&self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        *self == to
            || matches!(
                (self, to),
                (Draft, Active)
                    | (Draft, Cancelled)
                    | (Active, Completed)
                    | (Active, OnHold)
                    | (Active, Cancelled)
                    | (OnHold, Active)
                    | (OnHold, Cancelled)
            )
    }

    /// Material, labor and other costs can be added
    pub fn ensure_accepts_additions(&self) -> DomainResult<()> {
        match self {
            ProjectStatus::Completed | ProjectStatus::Cancelled => Err(DomainError::ProjectClosed(*self)),
            ProjectStatus::Draft | ProjectStatus::Active | ProjectStatus::OnHold => Ok(()),
        }
    }

    /// Cancelled projects may still be cleaned up
    pub fn ensure_accepts_removals(&self) -> DomainResult<()> {
        match self {
            ProjectStatus::Completed => Err(DomainError::ProjectClosed(*self)),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ProjectStatus,
    pub actual_end_date: Option<NaiveDate>,
}

/// Validate a transition; completion stamps the end date only once
pub fn apply_status_change(
    current: ProjectStatus,
    actual_end_date: Option<NaiveDate>,
    to: ProjectStatus,
    today: NaiveDate,
) -> DomainResult<StatusChange> {
    if !current.can_transition_to(to) {
        return Err(DomainError::InvalidTransition { from: current, to });
    }
    let actual_end_date = match to {
        ProjectStatus::Completed => actual_end_date.or(Some(today)),
        _ => actual_end_date,
    };
    Ok(StatusChange {
        status: to,
        actual_end_date,
    })
}

/// A construction project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub customer_name: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub costs: ProjectCosts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project's claim on stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialUsage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    /// OUT movement that consumed the stock
    pub movement_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaborEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub worker_name: String,
    pub description: Option<String>,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    pub total_cost: Decimal,
    pub work_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtherCostEntry {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Cost of one labor entry
pub fn labor_cost(hours: Decimal, hourly_rate: Decimal) -> DomainResult<Decimal> {
    if hours < Decimal::ZERO || hourly_rate < Decimal::ZERO {
        return Err(DomainError::InvalidQuantity(
            "hours and hourly rate cannot be negative".to_string(),
        ));
    }
    Ok((hours * hourly_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Project aggregate costs, always rebuilt from the child records
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectCosts {
    pub materials: Decimal,
    pub labor: Decimal,
    pub other: Decimal,
    pub total: Decimal,
}

impl ProjectCosts {
    pub fn recompute(usages: &[MaterialUsage], labor: &[LaborEntry], other: &[OtherCostEntry]) -> Self {
        let materials: Decimal = usages.iter().map(|u| u.total_cost).sum();
        let labor: Decimal = labor.iter().map(|l| l.total_cost).sum();
        let other: Decimal = other.iter().map(|o| o.amount).sum();
        Self {
            materials,
            labor,
            other,
            total: materials + labor + other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn valid_transitions() {
        use ProjectStatus::*;
        for (from, to) in [
            (Draft, Active),
            (Active, Completed),
            (Active, OnHold),
            (Active, Cancelled),
            (OnHold, Active),
            (Completed, Completed),
        ] {
            assert!(from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn invalid_transitions() {
        use ProjectStatus::*;
        for (from, to) in [(Draft, Completed), (Completed, Active), (Cancelled, Active), (Completed, Draft)] {
            assert!(!from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn completion_sets_end_date_once() {
        let first = apply_status_change(ProjectStatus::Active, None, ProjectStatus::Completed, date(2024, 3, 1)).unwrap();
        assert_eq!(first.actual_end_date, Some(date(2024, 3, 1)));

        let again = apply_status_change(first.status, first.actual_end_date, ProjectStatus::Completed, date(2024, 4, 1))
            .unwrap();
        assert_eq!(again.actual_end_date, Some(date(2024, 3, 1)));
    }

    #[test]
    fn closed_projects_reject_additions() {
        assert_eq!(
            ProjectStatus::Completed.ensure_accepts_additions(),
            Err(DomainError::ProjectClosed(ProjectStatus::Completed))
        );
        assert!(ProjectStatus::Cancelled.ensure_accepts_additions().is_err());
        assert!(ProjectStatus::OnHold.ensure_accepts_additions().is_ok());
    }

    #[test]
    fn cancelled_projects_allow_removals() {
        assert!(ProjectStatus::Cancelled.ensure_accepts_removals().is_ok());
        assert!(ProjectStatus::Completed.ensure_accepts_removals().is_err());
    }

    #[test]
    fn labor_cost_is_hours_times_rate() {
        assert_eq!(labor_cost(Decimal::new(75, 1), Decimal::from(350)).unwrap(), Decimal::from(2625));
        assert!(labor_cost(Decimal::from(-1), Decimal::from(350)).is_err());
    }
}
