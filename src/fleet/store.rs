use crate::crowd::{CrowdLevel, CrowdResult};
use crate::eta::EtaResult;
use crate::fleet::slots::VehicleSlots;
use crate::telemetry::PositionUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const WAITING: &str = "Waiting";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaView {
    pub minutes: f64,
    pub status: String,
    pub delay_minutes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_stop: Option<String>,
}

impl Default for EtaView {
    fn default() -> Self {
        Self {
            minutes: 0.0,
            status: WAITING.to_string(),
            delay_minutes: 0,
            next_stop: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrowdView {
    pub count: u32,
    pub level: CrowdLevel,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Latest known state of one vehicle, as handed to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub position: GeoPosition,
    pub speed_kmh: Option<f64>,
    pub eta: EtaView,
    pub crowd: CrowdView,
    /// Epoch seconds reported by the vehicle with its last position.
    pub reported_at: Option<f64>,
    /// Server time of the last write to this record. Staleness checks key off this.
    pub last_update: Option<DateTime<Utc>>,
}

impl VehicleRecord {
    pub fn new(vehicle_id: &str) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            route_id: None,
            position: GeoPosition::default(),
            speed_kmh: None,
            eta: EtaView::default(),
            crowd: CrowdView::default(),
            reported_at: None,
            last_update: None,
        }
    }
}

/// A vehicle known before any telemetry arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSeed {
    pub id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

/// Point-in-time copy of the fleet. Each record is internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    /// Write count read after the copy: every write visible in `vehicles`
    /// is counted, and writes that raced the copy may be counted too.
    pub version: u64,
    pub vehicles: BTreeMap<String, VehicleRecord>,
}

/// Authoritative per-vehicle state. Unseen vehicle ids are registered on
/// their first write.
#[derive(Debug, Default)]
pub struct FleetStateStore {
    vehicles: VehicleSlots<VehicleRecord>,
    version: AtomicU64,
}

impl FleetStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, seed: &VehicleSeed) {
        self.write(&seed.id, |record| {
            record.route_id = seed.route_id.clone();
            record.position = GeoPosition {
                lat: seed.lat,
                lng: seed.lng,
            };
        });
    }

    pub fn upsert_position(&self, vehicle_id: &str, lat: f64, lng: f64) {
        self.write(vehicle_id, |record| {
            record.position = GeoPosition { lat, lng };
        });
    }

    /// Position plus the rest of the ping: speed, route and vehicle clock.
    pub fn record_ping(&self, ping: &PositionUpdate) {
        self.write(&ping.vehicle_id, |record| {
            record.position = GeoPosition {
                lat: ping.latitude,
                lng: ping.longitude,
            };
            record.speed_kmh = Some(ping.speed_kmh);
            record.route_id = Some(ping.route_id.clone());
            record.reported_at = Some(ping.timestamp);
        });
    }

    pub fn upsert_eta(&self, vehicle_id: &str, eta: &EtaResult, next_stop: Option<&str>) {
        self.write(vehicle_id, |record| {
            record.eta = EtaView {
                minutes: eta.eta_minutes,
                status: eta.status.clone(),
                delay_minutes: eta.delay_minutes,
                next_stop: next_stop.map(str::to_string),
            };
        });
    }

    pub fn upsert_crowd(&self, vehicle_id: &str, crowd: &CrowdResult) {
        self.write(vehicle_id, |record| {
            record.crowd = CrowdView {
                count: crowd.count,
                level: crowd.level,
                confidence: crowd.confidence,
                error: crowd.error.clone(),
            };
        });
    }

    pub fn get(&self, vehicle_id: &str) -> Option<VehicleRecord> {
        self.vehicles
            .get(vehicle_id)
            .map(|slot| slot.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Copy every record, locking one vehicle at a time.
    pub fn snapshot(&self) -> FleetSnapshot {
        let vehicles = self
            .vehicles
            .entries()
            .into_iter()
            .map(|(id, slot)| {
                let record = slot.lock().clone();
                (id, record)
            })
            .collect();
        let version = self.version();

        FleetSnapshot { version, vehicles }
    }

    fn write(&self, vehicle_id: &str, apply: impl FnOnce(&mut VehicleRecord)) {
        let (slot, created) = self
            .vehicles
            .get_or_insert_with(vehicle_id, || VehicleRecord::new(vehicle_id));
        if created {
            info!(vehicle_id = %vehicle_id, "Registered vehicle");
        }

        // bumped under the slot lock so a reader that sees the write sees its count
        let version = {
            let mut record = slot.lock();
            apply(&mut record);
            record.last_update = Some(Utc::now());
            self.version.fetch_add(1, Ordering::AcqRel) + 1
        };
        debug!(vehicle_id = %vehicle_id, version, "Vehicle record updated");
    }
}
