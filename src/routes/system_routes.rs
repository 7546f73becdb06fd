use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::state::AppState;

pub fn create_system_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let redis = match &state.redis {
        Some(client) if client.is_connected().await => "connected",
        Some(_) => "disconnected",
        None => "disabled",
    };

    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "store": state.queries.backend_name(),
        "redis": redis,
        "timestamp": chrono::Utc::now(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            error!("❌ Error exportando métricas: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                String::new(),
            )
        }
    }
}
