//! Domain models for the Metal Stock platform

mod material;
mod movement;
mod project;
mod stock_lot;

pub use material::*;
pub use movement::*;
pub use project::*;
pub use stock_lot::*;
