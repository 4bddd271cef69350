pub mod delay;
pub mod engine;
pub mod predictor;

pub use delay::{DelayAccumulator, DelayPolicy, DelayState};
pub use engine::{EtaEngine, EtaQuery, EtaResult, StatusPolicy};
pub use predictor::{
    load_predictor, LearnedPredictor, LinearModel, Predictor, PredictorSource, RuleBasedFallback,
};
