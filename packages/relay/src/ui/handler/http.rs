//! HTTP API endpoint handlers.

use std::sync::Arc;

use atelier_shared::time::timestamp_to_rfc3339;
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    infrastructure::dto::http::{HealthDto, NamespaceStatsDto, StatsDto},
    ui::state::AppState,
};

/// Health check endpoint
///
/// インスタンス間配信が止まっていると 503 を返す。
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthDto>) {
    let connected = state.replication.as_ref().map(|health| health.is_connected());
    let (code, status) = match connected {
        Some(false) => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
        _ => (StatusCode::OK, "ok"),
    };
    let replication = connected.map(|connected| match connected {
        true => "connected".to_string(),
        false => "disconnected".to_string(),
    });

    (
        code,
        Json(HealthDto {
            status: status.to_string(),
            instance_id: state.context.config.instance_id.to_string(),
            replication,
        }),
    )
}

/// 名前空間ごとの Room 数と接続数
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsDto> {
    // Domain Model から DTO への変換
    let namespaces = state
        .registries()
        .into_iter()
        .map(|(namespace, registry)| NamespaceStatsDto {
            namespace: namespace.to_string(),
            rooms: registry.room_count(),
            connections: registry.member_count(),
        })
        .collect();

    Json(StatsDto {
        instance_id: state.context.config.instance_id.to_string(),
        namespaces,
        generated_at: timestamp_to_rfc3339(state.context.now().value()),
    })
}
