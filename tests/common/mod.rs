#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use fleet_dispatch::config::{EnvironmentConfig, StoreBackend};
use fleet_dispatch::metrics::DispatchMetrics;
use fleet_dispatch::models::{Driver, Vehicle};
use fleet_dispatch::repositories::InMemoryFleetStore;
use fleet_dispatch::services::{
    BroadcastSink, CreateTripCommand, FleetQueryService, NotificationSink, Notifier, ReservationGuard, RetryConfig,
    TripLifecycleService,
};
use fleet_dispatch::AppState;

pub struct Harness {
    pub store: InMemoryFleetStore,
    pub lifecycle: TripLifecycleService,
    pub queries: FleetQueryService,
    pub guard: ReservationGuard,
    pub events: BroadcastSink,
    pub metrics: DispatchMetrics,
}

impl Harness {
    pub fn new() -> Self {
        let events = BroadcastSink::new(256);
        Self::with_sink(Arc::new(events.clone()), events, RetryConfig::immediate(3))
    }

    pub fn with_retry(retry: RetryConfig) -> Self {
        let events = BroadcastSink::new(256);
        Self::with_sink(Arc::new(events.clone()), events, retry)
    }

    pub fn with_sink(sink: Arc<dyn NotificationSink>, events: BroadcastSink, retry: RetryConfig) -> Self {
        let store = InMemoryFleetStore::new();
        let guard = ReservationGuard::in_memory(Duration::from_secs(300));
        let metrics = DispatchMetrics::new().unwrap();
        let lifecycle = TripLifecycleService::new(
            Arc::new(store.clone()),
            guard.clone(),
            Notifier::new(sink, Duration::from_millis(50)),
            retry.clone(),
            metrics.clone(),
        );
        let queries = FleetQueryService::new(Arc::new(store.clone()), retry);

        Self {
            store,
            lifecycle,
            queries,
            guard,
            events,
            metrics,
        }
    }

    pub async fn vehicle(&self, plate: &str, capacity: i64) -> Vehicle {
        self.store
            .insert_vehicle(Vehicle::new(plate, plate, Decimal::new(capacity, 0), Decimal::new(900, 0)))
            .await
            .unwrap()
    }

    /// Conductor ON_DUTY cuya licencia vence `days` días después de hoy
    pub async fn driver(&self, license: &str, days: i64) -> Driver {
        self.store
            .insert_driver(Driver::new(license, license, "C", today() + chrono::Duration::days(days)))
            .await
            .unwrap()
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn command(vehicle: &Vehicle, driver: &Driver, weight: i64) -> CreateTripCommand {
    CreateTripCommand {
        vehicle_id: vehicle.id,
        driver_id: driver.id,
        cargo_weight: Decimal::new(weight, 0),
        origin: Some("Depot".to_string()),
        destination: Some("Port".to_string()),
        dispatcher_id: None::<Uuid>,
    }
}

/// Estado HTTP sobre el store en memoria
pub fn app_state(store: &InMemoryFleetStore) -> AppState {
    let config = EnvironmentConfig {
        store_backend: StoreBackend::Memory,
        ..EnvironmentConfig::default()
    };
    AppState::new(
        config,
        Arc::new(store.clone()),
        ReservationGuard::in_memory(Duration::from_secs(300)),
        Notifier::new(Arc::new(BroadcastSink::new(16)), Duration::from_millis(50)),
        DispatchMetrics::new().unwrap(),
        None,
    )
}
