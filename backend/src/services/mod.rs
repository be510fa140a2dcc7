//! Business logic services for the Metal Stock server

pub mod material;
pub mod movement;
pub mod project;
pub mod stock;

pub use material::MaterialService;
pub use movement::MovementService;
pub use project::ProjectService;
pub use stock::StockService;
