use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::snapshots::{encode_feature_collection, resolve_snapshot, FeatureCollection};

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotParams {
    pub datetime: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/traffic-segments", get(traffic_segments))
        .route("/api/traffic-segments/", get(traffic_segments))
        .with_state(state)
}

async fn traffic_segments(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let resolved = resolve_snapshot(&state.db, params.datetime.as_deref()).await?;
    log::debug!(
        "serving {} segments for {}",
        resolved.rows.len(),
        resolved.actual
    );
    Ok(Json(encode_feature_collection(&resolved)))
}

pub async fn serve(state: AppState, listen_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    log::info!("Listening on {listen_addr}");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
