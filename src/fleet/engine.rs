use crate::config::EngineConfig;
use crate::crowd::{CrowdClassifier, CrowdObservation, CrowdResult};
use crate::error::Result;
use crate::eta::{load_predictor, EtaEngine, EtaQuery, EtaResult};
use crate::fleet::store::{FleetSnapshot, FleetStateStore};
use crate::telemetry::{DistanceEtaRequest, EtaRequest, PositionUpdate};
use std::sync::Arc;
use tracing::info;

/// Wires telemetry through the ETA engine and crowd classifier into the
/// fleet store. One instance per process, shared behind an `Arc`.
#[derive(Debug)]
pub struct FleetEngine {
    eta: EtaEngine,
    crowd: CrowdClassifier,
    store: FleetStateStore,
}

impl FleetEngine {
    pub fn new(eta: EtaEngine, crowd: CrowdClassifier, store: FleetStateStore) -> Self {
        Self { eta, crowd, store }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let topology = Arc::new(config.topology()?);
        let predictor = load_predictor(config.predictor.model_path.as_deref());
        let eta = EtaEngine::new(
            topology,
            config.delay.clone(),
            config.status.clone(),
            predictor,
        );

        let store = FleetStateStore::new();
        for seed in &config.vehicles {
            store.seed(seed);
        }

        info!(
            stops = eta.topology().len(),
            seeded = store.len(),
            predictor = %eta.predictor_source(),
            "Fleet engine ready"
        );

        Ok(Self::new(
            eta,
            CrowdClassifier::new(config.crowd.clone()),
            store,
        ))
    }

    pub fn eta_engine(&self) -> &EtaEngine {
        &self.eta
    }

    pub fn classifier(&self) -> &CrowdClassifier {
        &self.crowd
    }

    pub fn store(&self) -> &FleetStateStore {
        &self.store
    }

    /// Positions do not feed the delay accumulator; speed samples arrive
    /// with ETA requests.
    pub fn ingest_position(&self, ping: &PositionUpdate) {
        self.store.record_ping(ping);
    }

    pub fn request_eta(&self, vehicle_id: &str, req: &EtaRequest) -> EtaResult {
        self.estimate(vehicle_id, &EtaQuery::Segment(req.clone()))
    }

    pub fn request_predicted_eta(&self, vehicle_id: &str, req: &DistanceEtaRequest) -> EtaResult {
        self.estimate(vehicle_id, &EtaQuery::Distance(req.clone()))
    }

    /// Segment results are published to the store. Distance predictions are
    /// answers to a query and leave fleet state untouched.
    pub fn estimate(&self, vehicle_id: &str, query: &EtaQuery) -> EtaResult {
        let result = self.eta.estimate(vehicle_id, query);
        if let EtaQuery::Segment(req) = query {
            self.store
                .upsert_eta(vehicle_id, &result, Some(req.next_stop_id.as_str()));
        }
        result
    }

    pub fn observe_crowd(&self, vehicle_id: &str, observation: &CrowdObservation) -> CrowdResult {
        let result = self.crowd.observe(observation);
        self.store.upsert_crowd(vehicle_id, &result);
        result
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.store.snapshot()
    }
}
