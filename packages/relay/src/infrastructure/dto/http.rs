//! HTTP API のレスポンス DTO

use serde::{Deserialize, Serialize};

/// `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    /// `ok` または `degraded`（インスタンス間配信が止まっている）
    pub status: String,
    pub instance_id: String,
    /// `connected` または `disconnected`（配信しない構成では省略）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<String>,
}

/// `GET /api/stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub instance_id: String,
    pub namespaces: Vec<NamespaceStatsDto>,
    /// RFC 3339 (UTC)
    pub generated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStatsDto {
    pub namespace: String,
    pub rooms: usize,
    pub connections: usize,
}
