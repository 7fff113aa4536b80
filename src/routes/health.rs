use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub services: ServicesHealth,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesHealth {
    pub object_store: &'static str,
    pub order_store: &'static str,
    pub notifier: &'static str,
}

fn describe(configured: bool) -> &'static str {
    if configured {
        "connected"
    } else {
        "not configured"
    }
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let services = [
        state.storage.is_some(),
        state.orders.is_some(),
        state.notifier.is_some(),
    ];
    let healthy = services.iter().all(|configured| *configured);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            timestamp: Utc::now().to_rfc3339(),
            services: ServicesHealth {
                object_store: describe(services[0]),
                order_store: describe(services[1]),
                notifier: describe(services[2]),
            },
        }),
    )
}
