pub mod classifier;

pub use classifier::{CrowdClassifier, CrowdLevel, CrowdObservation, CrowdResult, CrowdThresholds};
