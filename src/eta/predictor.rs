use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Lowest speed the closed-form rule divides by, in m/s.
const MIN_SPEED_MPS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorSource {
    MlModel,
    RuleBasedFallback,
}

impl fmt::Display for PredictorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorSource::MlModel => write!(f, "ml_model"),
            PredictorSource::RuleBasedFallback => write!(f, "rule_based_fallback"),
        }
    }
}

/// Minutes-to-arrival from remaining distance, speed and hour of day.
pub trait Predictor: Send + Sync + fmt::Debug {
    fn predict(&self, distance_m: f64, speed_mps: f64, hour_of_day: u32) -> f64;

    fn source(&self) -> PredictorSource;
}

/// Travel time at current speed, with no traffic model.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedFallback;

impl Predictor for RuleBasedFallback {
    fn predict(&self, distance_m: f64, speed_mps: f64, _hour_of_day: u32) -> f64 {
        distance_m / speed_mps.max(MIN_SPEED_MPS) / 60.0
    }

    fn source(&self) -> PredictorSource {
        PredictorSource::RuleBasedFallback
    }
}

/// Coefficients of a linear regression over (distance m, speed m/s, hour).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coef_distance: f64,
    pub coef_speed: f64,
    pub coef_hour: f64,
}

impl LinearModel {
    fn is_finite(&self) -> bool {
        [self.intercept, self.coef_distance, self.coef_speed, self.coef_hour]
            .iter()
            .all(|c| c.is_finite())
    }
}

#[derive(Debug, Clone)]
pub struct LearnedPredictor {
    model: LinearModel,
}

impl LearnedPredictor {
    pub fn new(model: LinearModel) -> Self {
        Self { model }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let model: LinearModel = serde_json::from_reader(reader)?;
        Ok(Self::new(model))
    }
}

impl Predictor for LearnedPredictor {
    fn predict(&self, distance_m: f64, speed_mps: f64, hour_of_day: u32) -> f64 {
        let m = &self.model;
        let minutes = m.intercept
            + m.coef_distance * distance_m
            + m.coef_speed * speed_mps
            + m.coef_hour * hour_of_day as f64;
        minutes.max(0.0)
    }

    fn source(&self) -> PredictorSource {
        PredictorSource::MlModel
    }
}

/// Pick the predictor once at startup. Anything short of a usable artifact
/// selects the rule-based fallback.
pub fn load_predictor(model_path: Option<&Path>) -> Arc<dyn Predictor> {
    let Some(path) = model_path else {
        info!("No ETA model configured, using rule-based fallback");
        return Arc::new(RuleBasedFallback);
    };

    match LearnedPredictor::from_file(path) {
        Ok(predictor) if predictor.model.is_finite() => {
            info!(path = %path.display(), "Loaded ETA model");
            Arc::new(predictor)
        }
        Ok(_) => {
            warn!(path = %path.display(), "ETA model has non-finite coefficients, using rule-based fallback");
            Arc::new(RuleBasedFallback)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load ETA model, using rule-based fallback");
            Arc::new(RuleBasedFallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fallback_is_distance_over_speed() {
        let minutes = RuleBasedFallback.predict(5000.0, 15.0, 10);
        assert!((minutes - 5.5556).abs() < 1e-3);
    }

    #[test]
    fn fallback_guards_against_standstill() {
        let minutes = RuleBasedFallback.predict(60.0, 0.0, 8);
        assert!((minutes - 10.0).abs() < 1e-9);
    }

    #[test]
    fn learned_model_is_linear_and_non_negative() {
        let model = LinearModel {
            intercept: 1.0,
            coef_distance: 0.001,
            coef_speed: -0.1,
            coef_hour: 0.1,
        };
        let predictor = LearnedPredictor::new(model);

        assert!((predictor.predict(5000.0, 15.0, 10) - 5.5).abs() < 1e-9);
        assert!(predictor.predict(5000.0, 15.0, 18) > predictor.predict(5000.0, 15.0, 10));
        assert_eq!(predictor.predict(0.0, 100.0, 0), 0.0);
    }

    #[test]
    fn load_selects_model_when_artifact_is_valid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"intercept": 2.0, "coef_distance": 0.0, "coef_speed": 0.0, "coef_hour": 0.0}}"#
        )
        .unwrap();

        let predictor = load_predictor(Some(file.path()));
        assert_eq!(predictor.source(), PredictorSource::MlModel);
        assert_eq!(predictor.predict(1234.0, 3.0, 7), 2.0);
    }

    #[test]
    fn load_falls_back_on_missing_or_broken_artifact() {
        assert_eq!(load_predictor(None).source(), PredictorSource::RuleBasedFallback);
        assert_eq!(
            load_predictor(Some(Path::new("/nonexistent/eta_model.json"))).source(),
            PredictorSource::RuleBasedFallback
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_eq!(
            load_predictor(Some(file.path())).source(),
            PredictorSource::RuleBasedFallback
        );
    }

    #[test]
    fn source_names_match_wire_labels() {
        assert_eq!(PredictorSource::MlModel.to_string(), "ml_model");
        assert_eq!(
            serde_json::to_string(&PredictorSource::RuleBasedFallback).unwrap(),
            "\"rule_based_fallback\""
        );
    }
}
