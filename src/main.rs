use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fleet_dispatch::config::EnvironmentConfig;
use fleet_dispatch::{build_state, create_app};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging (RUST_LOG manda si está definido)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fleet_dispatch=debug")),
        )
        .init();

    info!("🚚 Fleet Dispatch - Motor de ciclo de vida de viajes");
    info!("===================================================");

    let config = EnvironmentConfig::from_env().map_err(|e| {
        error!("❌ Configuración inválida: {}", e);
        e
    })?;
    let addr: SocketAddr = config.server_url().parse()?;

    let (state, _events) = build_state(config).await.map_err(|e| {
        error!("❌ Error inicializando servicios: {:#}", e);
        e
    })?;
    let app = create_app(state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("   GET  /metrics - Métricas Prometheus");
    info!("🧾 Viajes:");
    info!("   POST /api/trips - Crear viaje (DRAFT)");
    info!("   GET  /api/trips?status= - Listar viajes");
    info!("   GET  /api/trips/:id - Obtener viaje");
    info!("   POST /api/trips/:id/dispatch - Despachar");
    info!("   POST /api/trips/:id/complete - Completar");
    info!("   POST /api/trips/:id/cancel - Cancelar");
    info!("🚗 Vehículos:");
    info!("   GET  /api/vehicles/available - Vehículos disponibles");
    info!("   POST /api/vehicles/:id/lock - Reservar vehículo");
    info!("   POST /api/vehicles/:id/unlock - Liberar reserva");
    info!("   GET  /api/vehicles/:id/lock - Estado de la reserva");
    info!("🧑 Conductores:");
    info!("   GET  /api/drivers/available - Conductores disponibles");
    info!("   POST /api/drivers/sync-expired-licenses - Suspender licencias vencidas");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
