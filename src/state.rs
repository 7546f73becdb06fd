//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::cache::RedisClient;
use crate::config::environment::EnvironmentConfig;
use crate::metrics::DispatchMetrics;
use crate::repositories::FleetStore;
use crate::services::{FleetQueryService, Notifier, ReservationGuard, RetryConfig, TripLifecycleService};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub lifecycle: TripLifecycleService,
    pub queries: FleetQueryService,
    pub guard: ReservationGuard,
    pub metrics: DispatchMetrics,
    pub redis: Option<RedisClient>,
}

impl AppState {
    /// Cablear los servicios sobre un store ya abierto
    pub fn new(
        config: EnvironmentConfig,
        store: Arc<dyn FleetStore>,
        guard: ReservationGuard,
        notifier: Notifier,
        metrics: DispatchMetrics,
        redis: Option<RedisClient>,
    ) -> Self {
        let retry = RetryConfig::with_max_retries(config.store_max_retries);
        let lifecycle = TripLifecycleService::new(
            store.clone(),
            guard.clone(),
            notifier,
            retry.clone(),
            metrics.clone(),
        );
        let queries = FleetQueryService::new(store, retry);

        Self {
            config,
            lifecycle,
            queries,
            guard,
            metrics,
            redis,
        }
    }
}
