//! HTTP handlers for the Metal Stock API

mod health;
mod material;
mod movement;
mod project;
mod stock;

pub use health::*;
pub use material::*;
pub use movement::*;
pub use project::*;
pub use stock::*;
