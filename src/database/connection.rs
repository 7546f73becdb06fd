//! Configuración de conexión a PostgreSQL
//!
//! Este módulo abre el pool y aplica las migraciones embebidas.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::config::database::{mask_database_url, DatabaseConfig};

/// Conexión a la base de datos con su pool
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar y aplicar migraciones
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("🔗 Conectando a PostgreSQL: {}", mask_database_url(&config.url));
        let pool = config.create_pool().await?;

        run_migrations(&pool).await?;
        info!("✅ PostgreSQL conectado y migrado");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Ejecutar migraciones de la base de datos
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
