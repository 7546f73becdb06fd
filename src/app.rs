//! Ensamblado de la aplicación
//!
//! Construye el estado compartido según la configuración (store, reservas,
//! sinks de eventos) y el router HTTP con sus capas.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cache::{CacheConfig, RedisClient};
use crate::config::{DatabaseConfig, EnvironmentConfig, StoreBackend};
use crate::database::DatabaseConnection;
use crate::metrics::DispatchMetrics;
use crate::middleware::cors_layer;
use crate::models::{Driver, Vehicle};
use crate::repositories::{FleetStore, InMemoryFleetStore, PgFleetStore};
use crate::routes::{driver_routes, system_routes, trip_routes, vehicle_routes};
use crate::services::{BroadcastSink, FanoutSink, NotificationSink, Notifier, RedisNotificationSink, ReservationGuard};
use crate::state::AppState;

/// Capacidad del canal de eventos en proceso
const EVENT_BUFFER: usize = 1024;

/// Router completo con CORS, trazas y límite de concurrencia.
///
/// `Router::layer` envuelve cada ruta por separado; el límite global
/// comparte un único semáforo entre todas ellas.
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let max_in_flight = state.config.max_concurrent_requests.max(1);

    Router::new()
        .merge(system_routes::create_system_router())
        .nest("/api/trips", trip_routes::create_trip_router())
        .nest("/api/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/api/drivers", driver_routes::create_driver_router())
        .layer(GlobalConcurrencyLimitLayer::new(max_in_flight))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Conectar backends y cablear servicios
pub async fn build_state(config: EnvironmentConfig) -> Result<(AppState, BroadcastSink)> {
    let store: Arc<dyn FleetStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .clone()
                .context("DATABASE_URL es obligatorio con STORE_BACKEND=postgres")?;
            let connection = DatabaseConnection::connect(&DatabaseConfig::new(url)).await?;
            Arc::new(PgFleetStore::new(connection.pool().clone()))
        }
        StoreBackend::Memory => {
            let store = InMemoryFleetStore::new();
            if config.is_development() {
                seed_demo_fleet(&store).await?;
            }
            Arc::new(store)
        }
    };
    info!("🗄️ Store de flota: {}", store.backend_name());

    let redis = match &config.redis_url {
        Some(url) => Some(RedisClient::new(CacheConfig::new(url.clone())).await?),
        None => {
            warn!("⚠️ REDIS_URL no definido: reservas en memoria y eventos sólo en proceso");
            None
        }
    };

    let broadcast = BroadcastSink::new(EVENT_BUFFER);
    let guard = match &redis {
        Some(client) => ReservationGuard::new(Arc::new(client.clone()), config.reservation_ttl),
        None => ReservationGuard::in_memory(config.reservation_ttl),
    };

    let sink: Arc<dyn NotificationSink> = match &redis {
        Some(client) => {
            let redis_sink: Arc<dyn NotificationSink> =
                Arc::new(RedisNotificationSink::new(client.clone(), config.notify_channel.clone()));
            let local_sink: Arc<dyn NotificationSink> = Arc::new(broadcast.clone());
            Arc::new(FanoutSink::new(vec![redis_sink, local_sink]))
        }
        None => Arc::new(broadcast.clone()),
    };

    let notifier = Notifier::new(sink, config.notify_timeout);
    let metrics = DispatchMetrics::new()?;

    let state = AppState::new(config, store, guard, notifier, metrics, redis);
    Ok((state, broadcast))
}

/// Flota mínima para correr en memoria sin registro externo
async fn seed_demo_fleet(store: &InMemoryFleetStore) -> Result<()> {
    let license_expiry = Utc::now().date_naive() + chrono::Duration::days(365);

    let vehicles = [
        Vehicle::new("Van 01", "VAN-001", Decimal::new(500, 0), Decimal::new(12_000, 0)),
        Vehicle::new("Truck 01", "TRK-001", Decimal::new(5_000, 0), Decimal::new(48_000, 0)),
    ];
    let drivers = [
        Driver::new("Camille Martin", "DL-1001", "B", license_expiry),
        Driver::new("Hugo Bernard", "DL-1002", "C", license_expiry),
    ];

    for vehicle in vehicles {
        let vehicle = store.insert_vehicle(vehicle).await?;
        info!(vehicle_id = %vehicle.id, plate = %vehicle.license_plate, "🚚 Vehículo demo");
    }
    for driver in drivers {
        let driver = store.insert_driver(driver).await?;
        info!(driver_id = %driver.id, name = %driver.name, "🧑‍✈️ Conductor demo");
    }
    Ok(())
}
