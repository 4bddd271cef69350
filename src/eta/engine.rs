use crate::eta::delay::{DelayAccumulator, DelayPolicy};
use crate::eta::predictor::{Predictor, PredictorSource};
use crate::route::RouteTopology;
use crate::telemetry::{DistanceEtaRequest, EtaRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const UNKNOWN_ROUTE: &str = "Unknown Route";
pub const ON_TIME: &str = "On Time";
pub const EARLY: &str = "Early";

const KMH_PER_MPS: f64 = 3.6;

/// Delay bands that pick the status label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    pub delayed_above_minutes: f64,
    pub early_below_minutes: f64,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            delayed_above_minutes: 5.0,
            early_below_minutes: -2.0,
        }
    }
}

impl StatusPolicy {
    pub fn label(&self, delay_minutes: f64) -> String {
        if delay_minutes > self.delayed_above_minutes {
            format!("Delayed by {} mins", whole_minutes(delay_minutes))
        } else if delay_minutes < self.early_below_minutes {
            EARLY.to_string()
        } else {
            ON_TIME.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaResult {
    pub eta_minutes: f64,
    pub status: String,
    pub delay_minutes: i32,
}

impl EtaResult {
    pub fn unknown_route() -> Self {
        Self {
            eta_minutes: 0.0,
            status: UNKNOWN_ROUTE.to_string(),
            delay_minutes: 0,
        }
    }

    pub fn is_unknown_route(&self) -> bool {
        self.status == UNKNOWN_ROUTE
    }
}

/// The two input shapes an ETA can be computed from.
#[derive(Debug, Clone, PartialEq)]
pub enum EtaQuery {
    Segment(EtaRequest),
    Distance(DistanceEtaRequest),
}

/// Turns segment progress or remaining distance into an ETA. Segment
/// requests feed their speed sample through the vehicle's delay accumulator;
/// distance predictions only read it.
#[derive(Debug)]
pub struct EtaEngine {
    topology: Arc<RouteTopology>,
    delays: DelayAccumulator,
    status: StatusPolicy,
    predictor: Arc<dyn Predictor>,
}

impl EtaEngine {
    pub fn new(
        topology: Arc<RouteTopology>,
        delay_policy: DelayPolicy,
        status: StatusPolicy,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            topology,
            delays: DelayAccumulator::new(delay_policy),
            status,
            predictor,
        }
    }

    pub fn topology(&self) -> &RouteTopology {
        &self.topology
    }

    pub fn delays(&self) -> &DelayAccumulator {
        &self.delays
    }

    pub fn predictor_source(&self) -> PredictorSource {
        self.predictor.source()
    }

    pub fn estimate(&self, vehicle_id: &str, query: &EtaQuery) -> EtaResult {
        match query {
            EtaQuery::Segment(req) => self.calculate(vehicle_id, req),
            EtaQuery::Distance(req) => self.predict(vehicle_id, req),
        }
    }

    /// Topology path: remaining nominal time on the segment plus accumulated delay.
    pub fn calculate(&self, vehicle_id: &str, req: &EtaRequest) -> EtaResult {
        let speed = non_negative(vehicle_id, "current_speed_kmh", req.current_speed_kmh);
        let delay = self.delays.update(vehicle_id, speed);

        let Some(segment) = self.topology.segment(&req.current_stop_id) else {
            warn!(
                vehicle_id = %vehicle_id,
                stop_id = %req.current_stop_id,
                "ETA requested for stop outside topology"
            );
            return EtaResult::unknown_route();
        };

        if let Some(expected) = segment.next_stop_id.as_deref() {
            if expected != req.next_stop_id {
                warn!(
                    vehicle_id = %vehicle_id,
                    stop_id = %req.current_stop_id,
                    expected_next = %expected,
                    reported_next = %req.next_stop_id,
                    "Next stop disagrees with topology"
                );
            }
        }

        let progress = progress_fraction(vehicle_id, req.progress_fraction);
        let eta = round_tenth(segment.remaining_minutes(progress) + delay);

        debug!(
            vehicle_id = %vehicle_id,
            stop_id = %req.current_stop_id,
            progress,
            eta_minutes = eta,
            delay_minutes = delay,
            "ETA calculated"
        );

        EtaResult {
            eta_minutes: eta,
            status: self.status.label(delay),
            delay_minutes: whole_minutes(delay),
        }
    }

    /// Predictor path: the active predictor's unrounded estimate, labelled
    /// with the vehicle's current delay. Read-only; no delay sample is fed.
    pub fn predict(&self, vehicle_id: &str, req: &DistanceEtaRequest) -> EtaResult {
        let speed_kmh = non_negative(vehicle_id, "current_speed_kmh", req.current_speed_kmh);
        let distance = non_negative(vehicle_id, "distance_meters", req.distance_meters);
        let hour = req.hour_of_day % 24;
        let delay = self.delays.current(vehicle_id);

        let minutes = self
            .predictor
            .predict(distance, speed_kmh / KMH_PER_MPS, hour);

        debug!(
            vehicle_id = %vehicle_id,
            source = %self.predictor.source(),
            distance_m = distance,
            eta_minutes = minutes,
            "ETA predicted"
        );

        EtaResult {
            eta_minutes: minutes,
            status: self.status.label(delay),
            delay_minutes: whole_minutes(delay),
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn whole_minutes(delay: f64) -> i32 {
    delay.trunc() as i32
}

fn progress_fraction(vehicle_id: &str, raw: f64) -> f64 {
    let clamped = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
    if clamped != raw {
        warn!(vehicle_id = %vehicle_id, raw, clamped, "Clamped progress fraction");
    }
    clamped
}

fn non_negative(vehicle_id: &str, field: &str, raw: f64) -> f64 {
    if raw.is_finite() && raw >= 0.0 {
        return raw;
    }
    warn!(vehicle_id = %vehicle_id, field, raw, "Clamped input to 0");
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eta::predictor::{LearnedPredictor, LinearModel, RuleBasedFallback};

    fn engine() -> EtaEngine {
        EtaEngine::new(
            Arc::new(RouteTopology::reference()),
            DelayPolicy::default(),
            StatusPolicy::default(),
            Arc::new(RuleBasedFallback),
        )
    }

    fn segment(current: &str, next: &str, progress: f64, speed: f64) -> EtaRequest {
        EtaRequest {
            current_stop_id: current.to_string(),
            next_stop_id: next.to_string(),
            progress_fraction: progress,
            current_speed_kmh: speed,
        }
    }

    #[test]
    fn slow_first_sample_adds_half_minute() {
        let result = engine().calculate("BUS-101", &segment("STOP_B", "STOP_C", 0.2, 10.0));
        assert_eq!(result.eta_minutes, 12.5);
        assert_eq!(result.status, "On Time");
        assert_eq!(result.delay_minutes, 0);
    }

    #[test]
    fn unknown_stop_returns_sentinel() {
        let result = engine().calculate("BUS-101", &segment("STOP_UNKNOWN", "X", 0.5, 30.0));
        assert_eq!(result, EtaResult::unknown_route());
        assert!(result.is_unknown_route());
    }

    #[test]
    fn terminal_stop_eta_is_delay_only() {
        let engine = engine();
        for _ in 0..4 {
            engine.calculate("BUS-7", &segment("STOP_A", "STOP_B", 0.0, 5.0));
        }
        let result = engine.calculate("BUS-7", &segment("STOP_D", "STOP_D", 1.0, 60.0));

        // four slow samples then one recovery
        assert_eq!(result.eta_minutes, 1.5);
        assert_eq!(result.delay_minutes, 1);
    }

    #[test]
    fn long_delay_is_reported_in_whole_minutes() {
        let engine = engine();
        let mut result = EtaResult::unknown_route();
        for _ in 0..13 {
            result = engine.calculate("BUS-9", &segment("STOP_C", "STOP_D", 0.5, 0.0));
        }
        // 13 * 0.5 = 6.5 minutes of delay
        assert_eq!(result.delay_minutes, 6);
        assert_eq!(result.status, "Delayed by 6 mins");
        assert_eq!(result.eta_minutes, 10.5);
    }

    #[test]
    fn delay_at_threshold_is_on_time() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.label(5.0), "On Time");
        assert_eq!(policy.label(5.5), "Delayed by 5 mins");
        assert_eq!(policy.label(-2.0), "On Time");
        assert_eq!(policy.label(-2.5), "Early");
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let engine = engine();
        let past = engine.calculate("BUS-1", &segment("STOP_A", "STOP_B", 1.7, 30.0));
        assert_eq!(past.eta_minutes, 0.0);

        let before = engine.calculate("BUS-2", &segment("STOP_A", "STOP_B", -0.5, 30.0));
        assert_eq!(before.eta_minutes, 10.0);

        let nan = engine.calculate("BUS-3", &segment("STOP_A", "STOP_B", f64::NAN, 30.0));
        assert_eq!(nan.eta_minutes, 10.0);
    }

    #[test]
    fn negative_speed_counts_as_stopped() {
        let engine = engine();
        engine.calculate("BUS-1", &segment("STOP_A", "STOP_B", 0.0, -12.0));
        assert_eq!(engine.delays().current("BUS-1"), 0.5);
    }

    #[test]
    fn unknown_route_still_feeds_delay() {
        let engine = engine();
        engine.calculate("BUS-1", &segment("NOWHERE", "X", 0.0, 5.0));
        assert_eq!(engine.delays().current("BUS-1"), 0.5);
    }

    #[test]
    fn distance_path_uses_fallback_rule() {
        let engine = engine();
        let req = DistanceEtaRequest {
            distance_meters: 5000.0,
            current_speed_kmh: 54.0,
            hour_of_day: 10,
        };
        let result = engine.estimate("BUS-1", &EtaQuery::Distance(req));

        assert!((result.eta_minutes - 5000.0 / 15.0 / 60.0).abs() < 1e-9);
        assert_eq!(result.status, "On Time");
        assert_eq!(engine.predictor_source(), PredictorSource::RuleBasedFallback);
    }

    #[test]
    fn distance_path_uses_learned_model_when_present() {
        let model = LinearModel {
            intercept: 3.0,
            coef_distance: 0.0,
            coef_speed: 0.0,
            coef_hour: 0.5,
        };
        let engine = EtaEngine::new(
            Arc::new(RouteTopology::reference()),
            DelayPolicy::default(),
            StatusPolicy::default(),
            Arc::new(LearnedPredictor::new(model)),
        );
        let req = DistanceEtaRequest {
            distance_meters: 1000.0,
            current_speed_kmh: 30.0,
            hour_of_day: 26,
        };

        // hour wraps to 2
        assert!((engine.predict("BUS-1", &req).eta_minutes - 4.0).abs() < 1e-9);
        assert_eq!(engine.predictor_source(), PredictorSource::MlModel);
    }

    #[test]
    fn both_query_shapes_share_one_entry_point() {
        let engine = engine();
        let queries = [
            EtaQuery::Segment(segment("STOP_A", "STOP_B", 0.5, 10.0)),
            EtaQuery::Distance(DistanceEtaRequest {
                distance_meters: 600.0,
                current_speed_kmh: 10.0,
                hour_of_day: 9,
            }),
        ];
        for query in &queries {
            let result = engine.estimate("BUS-1", query);
            assert!(!result.is_unknown_route());
        }
        // only the segment query feeds the accumulator
        assert_eq!(engine.delays().current("BUS-1"), 0.5);
    }

    #[test]
    fn prediction_reads_delay_without_feeding_it() {
        let engine = engine();
        for _ in 0..12 {
            engine.calculate("BUS-4", &segment("STOP_A", "STOP_B", 0.0, 5.0));
        }
        let req = DistanceEtaRequest {
            distance_meters: 5000.0,
            current_speed_kmh: 10.0,
            hour_of_day: 17,
        };

        for _ in 0..12 {
            let result = engine.predict("BUS-4", &req);
            assert_eq!(result.status, "Delayed by 6 mins");
            assert_eq!(result.delay_minutes, 6);
        }
        assert_eq!(engine.delays().current("BUS-4"), 6.0);

        engine.predict("BUS-NEW", &req);
        assert_eq!(engine.delays().current("BUS-NEW"), 0.0);
        assert_eq!(engine.delays().tracked_vehicles(), 1);
    }

    #[test]
    fn prediction_is_not_rounded() {
        let req = DistanceEtaRequest {
            distance_meters: 5000.0,
            current_speed_kmh: 54.0,
            hour_of_day: 10,
        };
        let minutes = engine().predict("BUS-1", &req).eta_minutes;
        assert!((minutes - 5.5556).abs() < 1e-3);
        assert!((minutes * 60.0 - 333.33).abs() < 1e-2);
    }
}
