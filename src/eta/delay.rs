use crate::error::{FleetError, Result};
use crate::fleet::slots::VehicleSlots;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Speed thresholds and step size driving the delay feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayPolicy {
    /// Below this speed (km/h) a sample adds one step of delay.
    pub low_speed_kmh: f64,
    /// Above this speed (km/h) a sample recovers one step, while delay is positive.
    pub high_speed_kmh: f64,
    pub step_minutes: f64,
    /// Recovery never takes delay below this value.
    pub floor_minutes: f64,
    /// Upper bound on accumulated delay. `None` leaves growth unbounded.
    pub ceiling_minutes: Option<f64>,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            low_speed_kmh: 20.0,
            high_speed_kmh: 50.0,
            step_minutes: 0.5,
            floor_minutes: 0.0,
            ceiling_minutes: None,
        }
    }
}

impl DelayPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(self.low_speed_kmh < self.high_speed_kmh) {
            return Err(FleetError::InvalidConfig(format!(
                "delay.low_speed_kmh ({}) must be below delay.high_speed_kmh ({})",
                self.low_speed_kmh, self.high_speed_kmh
            )));
        }
        if !(self.step_minutes > 0.0 && self.step_minutes.is_finite()) {
            return Err(FleetError::InvalidConfig(format!(
                "delay.step_minutes must be positive, got {}",
                self.step_minutes
            )));
        }
        if let Some(ceiling) = self.ceiling_minutes {
            if !(ceiling >= self.floor_minutes) {
                return Err(FleetError::InvalidConfig(format!(
                    "delay.ceiling_minutes ({}) is below delay.floor_minutes ({})",
                    ceiling, self.floor_minutes
                )));
            }
        }
        Ok(())
    }
}

/// Accumulated schedule drift of one vehicle, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayState {
    pub minutes: f64,
    pub samples: u64,
}

impl DelayState {
    /// Feed one speed sample through the policy and return the new delay.
    pub fn apply(&mut self, policy: &DelayPolicy, speed_kmh: f64) -> f64 {
        if speed_kmh < policy.low_speed_kmh {
            self.minutes += policy.step_minutes;
            if let Some(ceiling) = policy.ceiling_minutes {
                self.minutes = self.minutes.min(ceiling);
            }
        } else if speed_kmh > policy.high_speed_kmh && self.minutes > 0.0 {
            // the floor never lifts a delay that is already below it
            let floor = policy.floor_minutes.min(self.minutes);
            self.minutes = (self.minutes - policy.step_minutes).max(floor);
        }
        self.samples += 1;
        self.minutes
    }
}

/// Per-vehicle delay feedback. Each vehicle drifts independently.
#[derive(Debug, Default)]
pub struct DelayAccumulator {
    policy: DelayPolicy,
    states: VehicleSlots<DelayState>,
}

impl DelayAccumulator {
    pub fn new(policy: DelayPolicy) -> Self {
        Self {
            policy,
            states: VehicleSlots::new(),
        }
    }

    pub fn update(&self, vehicle_id: &str, speed_kmh: f64) -> f64 {
        let (slot, _) = self.states.get_or_insert_with(vehicle_id, DelayState::default);
        let mut state = slot.lock();
        let delay = state.apply(&self.policy, speed_kmh);

        debug!(
            vehicle_id = %vehicle_id,
            speed_kmh,
            delay_minutes = delay,
            samples = state.samples,
            "Delay updated"
        );
        delay
    }

    /// Current delay without feeding a sample. Unseen vehicles have none.
    pub fn current(&self, vehicle_id: &str) -> f64 {
        self.states
            .get(vehicle_id)
            .map(|slot| slot.lock().minutes)
            .unwrap_or(0.0)
    }

    pub fn tracked_vehicles(&self) -> usize {
        self.states.len()
    }
}
