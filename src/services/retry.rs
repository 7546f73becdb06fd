//! Reintentos con backoff para fallos transitorios del store
//!
//! Sólo `AppError::Unavailable` se reintenta. Los errores de validación
//! vuelven al llamador en el primer intento.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::utils::errors::AppResult;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Sin espera entre intentos (tests)
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Espera para el intento `attempt` (desde 0)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let millis = if self.jitter {
            // hasta +25%
            capped * (1.0 + rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        };

        Duration::from_millis(millis as u64)
    }
}

/// Ejecutar `f` reintentando fallos transitorios.
///
/// Un fallo en `commit` no dice si el servidor aplicó la transacción, así
/// que `f` tiene que tolerar repetirse sobre su propio resultado: la
/// creación reusa el id del viaje y las transiciones vuelven a validar el
/// estado bloqueado (una repetición sobre un commit aplicado termina en
/// `InvalidState`, nunca en una doble escritura).
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempts = attempt + 1, "Operación completada tras reintento");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                let delay = config.delay_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fallo transitorio del store, reintentando"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(operation, attempts = attempt + 1, error = %e, "Reintentos agotados");
                }
                return Err(e);
            }
        }
    }
}
