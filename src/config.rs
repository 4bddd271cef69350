use crate::crowd::CrowdThresholds;
use crate::error::{FleetError, Result};
use crate::eta::{DelayPolicy, StatusPolicy};
use crate::fleet::VehicleSeed;
use crate::route::loader::{load_topology_csv, topology_from_entries, SegmentEntry};
use crate::route::RouteTopology;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// JSON linear model artifact. Absent or unreadable selects the fallback rule.
    pub model_path: Option<PathBuf>,
    /// IANA zone used to derive hour of day for the predictor.
    pub timezone: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

impl PredictorConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| FleetError::Timezone(format!("{}: {}", self.timezone, e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inline topology, stop id to nominal minutes (or a full segment).
    pub topology: BTreeMap<String, SegmentEntry>,
    /// CSV topology; takes precedence over `topology` when set.
    pub topology_file: Option<PathBuf>,
    pub delay: DelayPolicy,
    pub status: StatusPolicy,
    pub crowd: CrowdThresholds,
    pub predictor: PredictorConfig,
    pub vehicles: Vec<VehicleSeed>,
    /// Vehicle an ETA request is attributed to when it names none.
    pub default_vehicle_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topology: BTreeMap::new(),
            topology_file: None,
            delay: DelayPolicy::default(),
            status: StatusPolicy::default(),
            crowd: CrowdThresholds::default(),
            predictor: PredictorConfig::default(),
            vehicles: vec![VehicleSeed {
                id: "BUS-101".to_string(),
                route_id: Some("Route 1 (Red Line)".to_string()),
                lat: 28.7041,
                lng: 77.1025,
            }],
            default_vehicle_id: "BUS-101".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.delay.validate()?;
        self.crowd.validate()?;
        self.predictor.tz()?;

        if self.status.early_below_minutes > self.status.delayed_above_minutes {
            return Err(FleetError::InvalidConfig(format!(
                "status.early_below_minutes ({}) exceeds status.delayed_above_minutes ({})",
                self.status.early_below_minutes, self.status.delayed_above_minutes
            )));
        }
        if self.default_vehicle_id.trim().is_empty() {
            return Err(FleetError::InvalidConfig(
                "default_vehicle_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the route topology: CSV file, then inline table, then the
    /// built-in reference line.
    pub fn topology(&self) -> Result<RouteTopology> {
        if let Some(path) = &self.topology_file {
            return load_topology_csv(path);
        }
        if self.topology.is_empty() {
            info!("No topology configured, using reference line");
            return Ok(RouteTopology::reference());
        }
        topology_from_entries(&self.topology)
    }
}
