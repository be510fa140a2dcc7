//! Domain errors raised by the stock engine
//!
//! Every variant is produced before any lot, ledger or aggregate is touched.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{ProjectStatus, Shape, UnitOfMeasure};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("Shape {shape} requires dimension {field}")]
    MissingDimension { shape: Shape, field: &'static str },

    #[error("Invalid dimension {field}: {message}")]
    InvalidDimension {
        field: &'static str,
        message: String,
    },

    #[error("Non-finite result while computing {0}")]
    NonFinite(&'static str),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unit mismatch: material is tracked in {expected}, got {actual}")]
    UnitMismatch {
        expected: UnitOfMeasure,
        actual: UnitOfMeasure,
    },

    #[error("Project is {0} and no longer accepts this change")]
    ProjectClosed(ProjectStatus),

    #[error("Invalid project transition from {from} to {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;
