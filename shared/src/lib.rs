//! Shared types and engine for the Metal Stock platform
//!
//! Geometry, allocation planning and cost reconciliation live here without
//! any I/O so the backend, the browser bindings and the tests share one
//! implementation.

pub mod allocation;
pub mod error;
pub mod geometry;
pub mod models;
pub mod types;
pub mod validation;

pub use allocation::*;
pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
