use crate::error::{FleetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered occupancy scale. `Unknown` sorts lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdLevel {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrowdLevel::Unknown => "unknown",
            CrowdLevel::Low => "low",
            CrowdLevel::Medium => "medium",
            CrowdLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Upper bounds (inclusive) of the low and medium bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdThresholds {
    pub low_max: u32,
    pub medium_max: u32,
}

impl Default for CrowdThresholds {
    fn default() -> Self {
        Self {
            low_max: 10,
            medium_max: 25,
        }
    }
}

impl CrowdThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.low_max == 0 || self.low_max >= self.medium_max {
            return Err(FleetError::InvalidConfig(format!(
                "crowd thresholds must satisfy 0 < low_max < medium_max, got {} and {}",
                self.low_max, self.medium_max
            )));
        }
        Ok(())
    }
}

/// What the occupancy collaborator could tell us.
#[derive(Debug, Clone, PartialEq)]
pub enum CrowdObservation {
    Count(u32),
    /// No usable count, e.g. the frame could not be decoded upstream.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdResult {
    pub count: u32,
    pub level: CrowdLevel,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Upper bounds (inclusive) of the camera gateway's colour bands. Fixed,
/// independent of [`CrowdThresholds`].
const LEGACY_GREEN_MAX: u32 = 2;
const LEGACY_ORANGE_MAX: u32 = 8;

impl CrowdResult {
    /// Colour band the camera gateway used to report, banded on the raw
    /// count rather than on `level`.
    pub fn legacy_label(&self) -> &'static str {
        if self.error.is_some() {
            "Error"
        } else if self.count <= LEGACY_GREEN_MAX {
            "GREEN (Empty)"
        } else if self.count <= LEGACY_ORANGE_MAX {
            "ORANGE (Standing)"
        } else {
            "RED (Crowded)"
        }
    }
}

impl Default for CrowdResult {
    fn default() -> Self {
        Self {
            count: 0,
            level: CrowdLevel::Unknown,
            confidence: 0.0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrowdClassifier {
    thresholds: CrowdThresholds,
}

impl CrowdClassifier {
    pub fn new(thresholds: CrowdThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, count: u32) -> (CrowdLevel, f64) {
        let t = &self.thresholds;
        let n = count as f64;

        if count == 0 {
            (CrowdLevel::Unknown, 0.0)
        } else if count <= t.low_max {
            (CrowdLevel::Low, (0.7 + n * 0.02).min(0.9))
        } else if count <= t.medium_max {
            (CrowdLevel::Medium, (0.75 + n * 0.01).min(0.95))
        } else {
            (CrowdLevel::High, 0.95)
        }
    }

    pub fn observe(&self, observation: &CrowdObservation) -> CrowdResult {
        match observation {
            CrowdObservation::Count(count) => {
                let (level, confidence) = self.classify(*count);
                CrowdResult {
                    count: *count,
                    level,
                    confidence,
                    error: None,
                }
            }
            CrowdObservation::Unavailable { reason } => CrowdResult {
                error: Some(reason.clone()),
                ..CrowdResult::default()
            },
        }
    }
}
