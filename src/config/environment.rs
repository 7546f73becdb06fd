//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Las variables ausentes
//! toman valores por defecto; las mal formadas producen `ConfigError`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Backend de persistencia del motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub reservation_ttl: Duration,
    pub notify_timeout: Duration,
    pub notify_channel: String,
    pub store_max_retries: u32,
    pub max_concurrent_requests: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            store_backend: StoreBackend::Postgres,
            database_url: None,
            redis_url: None,
            reservation_ttl: Duration::from_secs(300),
            notify_timeout: Duration::from_millis(250),
            notify_channel: "fleet_updates".to_string(),
            store_max_retries: 3,
            max_concurrent_requests: 256,
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde el entorno del proceso
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store_backend = match var("STORE_BACKEND") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: "STORE_BACKEND",
                reason,
            })?,
            None => defaults.store_backend,
        };

        let database_url = var("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(&var, "PORT", defaults.port)?,
            cors_origins: var("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            store_backend,
            database_url,
            redis_url: var("REDIS_URL"),
            reservation_ttl: Duration::from_secs(parse_var(
                &var,
                "RESERVATION_TTL_SECS",
                defaults.reservation_ttl.as_secs(),
            )?),
            notify_timeout: Duration::from_millis(parse_var(
                &var,
                "NOTIFY_TIMEOUT_MS",
                defaults.notify_timeout.as_millis() as u64,
            )?),
            notify_channel: var("NOTIFY_CHANNEL").unwrap_or(defaults.notify_channel),
            store_max_retries: parse_var(&var, "STORE_MAX_RETRIES", defaults.store_max_retries)?,
            max_concurrent_requests: parse_var(
                &var,
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )?,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
