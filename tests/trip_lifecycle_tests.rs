mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;

use common::{command, today, Harness};
use fleet_dispatch::models::{DriverStatus, TripEvent, TripEventType, TripStatus, VehicleStatus};
use fleet_dispatch::repositories::FleetStore;
use fleet_dispatch::services::{BroadcastSink, NotificationSink, RetryConfig};
use fleet_dispatch::utils::errors::AppError;

#[tokio::test]
async fn test_dispatch_scenario_end_to_end() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-500", 500).await;
    let driver = h.driver("DL-1", 365).await;

    let err = h.lifecycle.create_trip(command(&vehicle, &driver, 600)).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 450)).await.unwrap();
    assert_eq!(trip.status, TripStatus::Draft);

    let dispatched = h.lifecycle.dispatch_trip(trip.id).await.unwrap();
    assert_eq!(dispatched.status, TripStatus::Dispatched);
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::OnTrip);
    let d = h.store.find_driver(driver.id).await.unwrap().unwrap();
    assert_eq!(d.status, DriverStatus::OffDuty);

    let again = h.lifecycle.dispatch_trip(trip.id).await.unwrap_err();
    assert!(matches!(again, AppError::InvalidState(_)));

    let completed = h
        .lifecycle
        .complete_trip(trip.id, Decimal::new(1000, 0))
        .await
        .unwrap();
    assert_eq!(completed.status, TripStatus::Completed);
    assert_eq!(completed.final_odometer, Some(Decimal::new(1000, 0)));
    assert!(completed.completed_at.is_some());

    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::Available);
    assert_eq!(v.odometer, Decimal::new(1000, 0));
}

#[tokio::test]
async fn test_overweight_creates_no_trip() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    for weight in [501, 10_000] {
        let err = h.lifecycle.create_trip(command(&vehicle, &driver, weight)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
    for weight in [0, -5] {
        let err = h.lifecycle.create_trip(command(&vehicle, &driver, weight)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }
    assert!(h.queries.list_trips(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_assets_are_not_found() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let mut cmd = command(&vehicle, &driver, 10);
    cmd.vehicle_id = uuid::Uuid::new_v4();
    assert!(matches!(
        h.lifecycle.create_trip(cmd).await,
        Err(AppError::NotFound(_))
    ));

    let mut cmd = command(&vehicle, &driver, 10);
    cmd.driver_id = uuid::Uuid::new_v4();
    assert!(matches!(
        h.lifecycle.create_trip(cmd).await,
        Err(AppError::NotFound(_))
    ));

    assert!(matches!(
        h.lifecycle.dispatch_trip(uuid::Uuid::new_v4()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_expired_license_rejected_for_every_status() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;

    for (i, status) in DriverStatus::ALL.into_iter().enumerate() {
        let driver = h.driver(&format!("DL-EXP-{}", i), -1).await;
        h.store.set_driver_status(driver.id, status).await.unwrap();

        let err = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)), "status {:?}", status);
    }
    assert!(h.queries.list_trips(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_license_expiring_today_is_still_valid() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 0).await;

    assert!(h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.is_ok());
}

#[tokio::test]
async fn test_unavailable_assets_conflict_on_create() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    h.store.set_vehicle_status(vehicle.id, VehicleStatus::OutOfService).await.unwrap();
    assert!(matches!(
        h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await,
        Err(AppError::Conflict(_))
    ));

    h.store.set_vehicle_status(vehicle.id, VehicleStatus::Available).await.unwrap();
    h.store.set_driver_status(driver.id, DriverStatus::Suspended).await.unwrap();
    assert!(matches!(
        h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_terminal_trips_reject_every_transition() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let cancelled = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.cancel_trip(cancelled.id).await.unwrap();

    let completed = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.dispatch_trip(completed.id).await.unwrap();
    h.lifecycle
        .complete_trip(completed.id, Decimal::new(950, 0))
        .await
        .unwrap();

    for id in [cancelled.id, completed.id] {
        let before = h.queries.get_trip(id).await.unwrap();
        assert!(matches!(h.lifecycle.dispatch_trip(id).await, Err(AppError::InvalidState(_))));
        assert!(matches!(
            h.lifecycle.complete_trip(id, Decimal::new(2000, 0)).await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(h.lifecycle.cancel_trip(id).await, Err(AppError::InvalidState(_))));
        assert_eq!(h.queries.get_trip(id).await.unwrap(), before);
    }
}

#[tokio::test]
async fn test_round_trip_restores_asset_statuses() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 200)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();
    h.lifecycle.complete_trip(trip.id, Decimal::new(1500, 0)).await.unwrap();

    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    let d = h.store.find_driver(driver.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::Available);
    assert_eq!(d.status, DriverStatus::OnDuty);

    // Cancelar un viaje despachado también devuelve los activos
    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 200)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();
    h.lifecycle.cancel_trip(trip.id).await.unwrap();

    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    let d = h.store.find_driver(driver.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::Available);
    assert_eq!(d.status, DriverStatus::OnDuty);
}

#[tokio::test]
async fn test_regressive_odometer_rejected_without_side_effects() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 200)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();

    let err = h
        .lifecycle
        .complete_trip(trip.id, Decimal::new(899, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let stored = h.queries.get_trip(trip.id).await.unwrap();
    assert_eq!(stored.status, TripStatus::Dispatched);
    assert_eq!(stored.final_odometer, None);
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::OnTrip);
}

#[tokio::test]
async fn test_concurrent_dispatch_same_vehicle_single_winner() {
    let h = Arc::new(Harness::new());
    let vehicle = h.vehicle("VAN-1", 500).await;

    let mut trip_ids = Vec::new();
    for i in 0..8 {
        let driver = h.driver(&format!("DL-{}", i), 30).await;
        let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 100)).await.unwrap();
        trip_ids.push(trip.id);
    }

    let attempts = trip_ids.iter().map(|&id| {
        let h = h.clone();
        tokio::spawn(async move { h.lifecycle.dispatch_trip(id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(result, AppError::InvalidState(_) | AppError::Conflict(_)));
    }

    let dispatched = h.queries.list_trips(Some(TripStatus::Dispatched)).await.unwrap();
    assert_eq!(dispatched.len(), 1);
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(v.status, VehicleStatus::OnTrip);
}

#[tokio::test]
async fn test_concurrent_dispatch_same_trip_single_winner() {
    let h = Arc::new(Harness::new());
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;
    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 100)).await.unwrap();

    let attempts = (0..6).map(|_| {
        let h = h.clone();
        tokio::spawn(async move { h.lifecycle.dispatch_trip(trip.id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppError::InvalidState(_))));
}

#[tokio::test]
async fn test_reader_never_sees_completed_trip_with_vehicle_on_trip() {
    let h = Arc::new(Harness::new());
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;
    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 100)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();

    let reader = {
        let h = h.clone();
        tokio::spawn(async move {
            for _ in 0..500 {
                // viaje primero: si ya está COMPLETED el commit ya ocurrió
                let t = h.store.find_trip(trip.id).await.unwrap().unwrap();
                let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
                if t.status == TripStatus::Completed {
                    assert_eq!(v.status, VehicleStatus::Available);
                    return true;
                }
                tokio::task::yield_now().await;
            }
            false
        })
    };

    h.lifecycle.complete_trip(trip.id, Decimal::new(1000, 0)).await.unwrap();
    reader.await.unwrap();

    let t = h.store.find_trip(trip.id).await.unwrap().unwrap();
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(t.status, TripStatus::Completed);
    assert_eq!(v.status, VehicleStatus::Available);
}

#[tokio::test]
async fn test_transient_store_failures_surface_as_unavailable() {
    let h = Harness::with_retry(RetryConfig::immediate(2));
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    h.store.inject_transient_failures(3);
    let err = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
    assert!(h.queries.list_trips(None).await.unwrap().is_empty());
    assert_eq!(h.metrics.transition_count("create", "UNAVAILABLE"), 1);

    // El store se recupera
    assert!(h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.is_ok());
}

#[tokio::test]
async fn test_create_retried_after_lost_commit_inserts_once() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;
    let mut rx = h.events.subscribe();

    h.store.inject_lost_commits(1);
    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();

    let trips = h.queries.list_trips(None).await.unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].id, trip.id);
    assert_eq!(rx.try_recv().unwrap().trip_id, trip.id);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_quantities_beyond_schema_precision_are_rejected() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let mut cmd = command(&vehicle, &driver, 10);
    cmd.cargo_weight = Decimal::new(1, 3);
    let err = h.lifecycle.create_trip(cmd).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert!(h.queries.list_trips(None).await.unwrap().is_empty());

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();

    let err = h
        .lifecycle
        .complete_trip(trip.id, Decimal::new(900_004, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = h
        .lifecycle
        .complete_trip(trip.id, Decimal::new(10_000_000_000, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let t = h.store.find_trip(trip.id).await.unwrap().unwrap();
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(t.status, TripStatus::Dispatched);
    assert_eq!(t.final_odometer, None);
    assert_eq!(v.odometer, Decimal::new(900, 0));
}

#[tokio::test]
async fn test_completion_rate_follows_driver_trips() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;
    let rate = |h: &Harness| {
        let store = h.store.clone();
        let id = driver.id;
        async move { store.find_driver(id).await.unwrap().unwrap().trip_completion_rate }
    };
    assert_eq!(rate(&h).await, Decimal::ONE_HUNDRED);

    let first = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    assert_eq!(rate(&h).await, Decimal::ZERO);

    h.lifecycle.dispatch_trip(first.id).await.unwrap();
    h.lifecycle.complete_trip(first.id, Decimal::new(1000, 0)).await.unwrap();
    assert_eq!(rate(&h).await, Decimal::ONE_HUNDRED);

    let second = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.cancel_trip(second.id).await.unwrap();
    assert_eq!(rate(&h).await, Decimal::new(50, 0));

    h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    assert_eq!(rate(&h).await, Decimal::new(3333, 2));
}

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();
    h.lifecycle.complete_trip(trip.id, Decimal::new(1000, 0)).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.trip_id, trip.id);
        assert_eq!(event.vehicle_id, vehicle.id);
        assert_eq!(event.driver_id, driver.id);
        seen.push(event.event_type);
    }
    assert_eq!(
        seen,
        vec![
            TripEventType::TripCreated,
            TripEventType::TripDispatched,
            TripEventType::TripCompleted
        ]
    );
}

struct StuckSink;

#[async_trait]
impl NotificationSink for StuckSink {
    async fn publish(&self, _event: &TripEvent) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_stuck_sink_never_blocks_or_fails_transitions() {
    let h = Harness::with_sink(Arc::new(StuckSink), BroadcastSink::new(1), RetryConfig::immediate(1));
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 30).await;

    let started = Instant::now();
    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    let stored = h.queries.get_trip(trip.id).await.unwrap();
    assert_eq!(stored.status, TripStatus::Dispatched);
}

#[tokio::test]
async fn test_suspension_survives_trip_completion() {
    let h = Harness::new();
    let vehicle = h.vehicle("VAN-1", 500).await;
    let driver = h.driver("DL-1", 10).await;

    let trip = h.lifecycle.create_trip(command(&vehicle, &driver, 10)).await.unwrap();
    h.lifecycle.dispatch_trip(trip.id).await.unwrap();

    // Barrido ejecutado cuando la licencia ya venció
    let later = today() + chrono::Duration::days(30);
    let sync = h.queries.sync_expired_licenses_on(later).await.unwrap();
    assert_eq!(sync.driver_ids, vec![driver.id]);

    h.lifecycle.complete_trip(trip.id, Decimal::new(1000, 0)).await.unwrap();

    let d = h.store.find_driver(driver.id).await.unwrap().unwrap();
    let v = h.store.find_vehicle(vehicle.id).await.unwrap().unwrap();
    assert_eq!(d.status, DriverStatus::Suspended);
    assert_eq!(v.status, VehicleStatus::Available);
}

#[tokio::test]
async fn test_driver_busy_on_another_trip_blocks_dispatch() {
    let h = Harness::new();
    let van = h.vehicle("VAN-1", 500).await;
    let truck = h.vehicle("TRK-1", 5000).await;
    let driver = h.driver("DL-1", 30).await;

    let first = h.lifecycle.create_trip(command(&van, &driver, 10)).await.unwrap();
    let second = h.lifecycle.create_trip(command(&truck, &driver, 10)).await.unwrap();

    h.lifecycle.dispatch_trip(first.id).await.unwrap();
    assert!(matches!(
        h.lifecycle.dispatch_trip(second.id).await,
        Err(AppError::InvalidState(_))
    ));
    let t = h.store.find_vehicle(truck.id).await.unwrap().unwrap();
    assert_eq!(t.status, VehicleStatus::Available);
}
