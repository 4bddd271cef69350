//! Fleet state engine for transit vehicles.
//!
//! Speed samples drive a per-vehicle delay accumulator that feeds ETA
//! estimates, occupancy counts are bucketed into crowd levels, and the
//! latest state of every vehicle lives in a concurrently readable store.

pub mod config;
pub mod crowd;
pub mod error;
pub mod eta;
pub mod fleet;
pub mod route;
pub mod telemetry;

pub use config::EngineConfig;
pub use error::{FleetError, Result};
pub use fleet::{FleetEngine, FleetSnapshot, FleetStateStore};
