//! Eventos de ciclo de vida publicados tras cada commit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trip::Trip;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripEventType {
    TripCreated,
    TripDispatched,
    TripCompleted,
    TripCancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripEvent {
    #[serde(rename = "type")]
    pub event_type: TripEventType,
    pub trip_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl TripEvent {
    pub fn for_trip(event_type: TripEventType, trip: &Trip) -> Self {
        Self {
            event_type,
            trip_id: trip.id,
            vehicle_id: trip.vehicle_id,
            driver_id: trip.driver_id,
            timestamp: Utc::now(),
        }
    }
}
