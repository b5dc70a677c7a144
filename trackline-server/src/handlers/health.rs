use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "cache": {
                "tracked_packages": state.cache.len(),
            },
            "realtime": {
                "connections": state.router.connection_count(),
                "healthy_connections": state.router.healthy_connection_count(),
                "topics": state.router.topic_count(),
            }
        }
    }))
}
