//! Inbound records pushed into the engine by the transport layer.

use serde::{Deserialize, Serialize};

/// A GPS ping from a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(alias = "speed")]
    pub speed_kmh: f64,
    /// Epoch seconds as reported by the vehicle.
    pub timestamp: f64,
    pub route_id: String,
}

/// Position along a topology segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaRequest {
    pub current_stop_id: String,
    pub next_stop_id: String,
    /// 0.0 at `current_stop_id`, 1.0 at `next_stop_id`.
    #[serde(alias = "progress_percent")]
    pub progress_fraction: f64,
    #[serde(alias = "current_speed")]
    pub current_speed_kmh: f64,
}

/// Remaining distance for the predictor path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceEtaRequest {
    pub distance_meters: f64,
    pub current_speed_kmh: f64,
    /// Local hour, 0-23.
    pub hour_of_day: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_gateway_field_names() {
        let ping: PositionUpdate = serde_json::from_str(
            r#"{"vehicle_id":"BUS-101","latitude":28.70,"longitude":77.10,
                "speed":42.0,"timestamp":1700000000.0,"route_id":"R1"}"#,
        )
        .unwrap();
        assert_eq!(ping.speed_kmh, 42.0);

        let req: EtaRequest = serde_json::from_str(
            r#"{"current_stop_id":"STOP_A","next_stop_id":"STOP_B",
                "progress_percent":0.5,"current_speed":30.0}"#,
        )
        .unwrap();
        assert_eq!(req.progress_fraction, 0.5);
        assert_eq!(req.current_speed_kmh, 30.0);
    }
}
