//! Métricas Prometheus del motor de viajes
//!
//! Registry propio (no el global) para que cada `AppState` de test tenga
//! contadores aislados.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{opts, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Registry, TextEncoder};

#[derive(Clone)]
pub struct DispatchMetrics {
    registry: Arc<Registry>,

    /// Labels: `transition` (create, dispatch, complete, cancel), `outcome` (ok o código de error)
    transitions: IntCounterVec,

    /// Labels: `transition`
    transition_duration: HistogramVec,

    /// Labels: `outcome` (acquired, conflict, released, not_held)
    reservations: IntCounterVec,
}

impl DispatchMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            opts!(
                "fleet_trip_transitions_total",
                "Trip lifecycle transitions by outcome"
            ),
            &["transition", "outcome"],
        )?;

        let transition_duration = HistogramVec::new(
            HistogramOpts::new(
                "fleet_trip_transition_duration_seconds",
                "Trip transition latency including store retries",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["transition"],
        )?;

        let reservations = IntCounterVec::new(
            opts!(
                "fleet_vehicle_reservations_total",
                "Advisory vehicle reservation requests by outcome"
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(transition_duration.clone()))?;
        registry.register(Box::new(reservations.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            transitions,
            transition_duration,
            reservations,
        })
    }

    pub fn record_transition(&self, transition: &str, outcome: &str, elapsed: Duration) {
        self.transitions.with_label_values(&[transition, outcome]).inc();
        self.transition_duration
            .with_label_values(&[transition])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_reservation(&self, outcome: &str) {
        self.reservations.with_label_values(&[outcome]).inc();
    }

    pub fn transition_count(&self, transition: &str, outcome: &str) -> u64 {
        self.transitions.with_label_values(&[transition, outcome]).get()
    }

    /// Formato de texto para el scrape de Prometheus
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
