//! Publicación de eventos de ciclo de vida
//!
//! Entrega de como máximo un intento: si el sink falla o no responde dentro
//! del timeout, el evento se descarta y sólo queda un warn en el log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::RedisClient;
use crate::models::TripEvent;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &TripEvent) -> anyhow::Result<()>;
}

/// PUBLISH del evento en JSON sobre un canal Redis
pub struct RedisNotificationSink {
    redis: RedisClient,
    channel: String,
}

impl RedisNotificationSink {
    pub fn new(redis: RedisClient, channel: impl Into<String>) -> Self {
        Self {
            redis,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for RedisNotificationSink {
    async fn publish(&self, event: &TripEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        let receivers = self.redis.publish(&self.channel, &payload).await?;
        debug!(channel = %self.channel, receivers, "📡 Evento publicado en Redis");
        Ok(())
    }
}

/// Difusión en proceso para suscriptores locales
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<TripEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn publish(&self, event: &TripEvent) -> anyhow::Result<()> {
        // Sin suscriptores no es un error
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

/// Publica en todos los sinks; devuelve el primer error tras intentarlos todos
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn publish(&self, event: &TripEvent) -> anyhow::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Intento único, acotado por el timeout; nunca falla
    pub async fn emit(&self, event: TripEvent) {
        match tokio::time::timeout(self.timeout, self.sink.publish(&event)).await {
            Ok(Ok(())) => {
                debug!(trip_id = %event.trip_id, event_type = ?event.event_type, "Evento emitido");
            }
            Ok(Err(e)) => {
                warn!(trip_id = %event.trip_id, event_type = ?event.event_type, error = %e, "⚠️ Evento descartado: error del sink");
            }
            Err(_) => {
                warn!(
                    trip_id = %event.trip_id,
                    event_type = ?event.event_type,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "⚠️ Evento descartado: timeout del sink"
                );
            }
        }
    }
}
