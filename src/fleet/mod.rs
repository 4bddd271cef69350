pub mod engine;
pub mod slots;
pub mod store;

pub use engine::FleetEngine;
pub use store::{FleetSnapshot, FleetStateStore, VehicleRecord, VehicleSeed};
