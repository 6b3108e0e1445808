//! Administrative HTTP API for segmented pricing configurations
//!
//! Reads come straight from the ratio store; every accepted mutation is
//! followed by a write of the full snapshot to the durable option store. A
//! failed persistence write is reported to the caller but the in-memory
//! state is not rolled back.

use crate::error::AppError;
use crate::options::{OptionStore, SEGMENTED_RATIO_OPTION_KEY};
use crate::rule::SegmentedRatioConfig;
use crate::store::RatioStore;
use crate::{engine, metrics, snapshot};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state for the segmented ratio API
#[derive(Clone)]
pub struct RatioApiState {
    pub store: Arc<RatioStore>,
    pub options: Arc<OptionStore>,
}

/// A full snapshot blob, as exported or submitted for import
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub model_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    /// Number of models in the store after the import
    pub models: usize,
}

/// Query parameters for the evaluation probe
#[derive(Debug, Deserialize)]
pub struct EvaluateParams {
    pub model_name: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Resolved multipliers for one evaluation
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub model_ratio: f64,
    pub completion_ratio: f64,
    pub matched: bool,
}

/// GET /api/segmented_ratio/model/{model_name} - single model configuration
pub async fn get_one(
    State(state): State<RatioApiState>,
    Path(model_name): Path<String>,
) -> Result<Json<SegmentedRatioConfig>, AppError> {
    state.store.get(&model_name).await.map(Json).ok_or_else(|| {
        AppError::NotFound(format!(
            "no segmented pricing configured for model '{}'",
            model_name
        ))
    })
}

/// GET /api/segmented_ratio - all configurations, keyed by model name
pub async fn list_all(
    State(state): State<RatioApiState>,
) -> Json<HashMap<String, SegmentedRatioConfig>> {
    Json(state.store.snapshot().await)
}

/// POST /api/segmented_ratio - create or update one model's configuration
///
/// The payload is validated before any mutation; a rejected payload leaves
/// both the store and durable state untouched. The response echoes the
/// stored form, rules sorted by priority.
pub async fn upsert(
    State(state): State<RatioApiState>,
    Json(mut config): Json<SegmentedRatioConfig>,
) -> Result<Json<SegmentedRatioConfig>, AppError> {
    config.validate()?;
    config.sort_rules();

    state
        .store
        .set(config.model_name.clone(), config.clone())
        .await;
    metrics::record_admin_write("upsert");

    persist(&state).await?;

    Ok(Json(config))
}

/// DELETE /api/segmented_ratio/model/{model_name}
///
/// Deleting a model that was never configured is a no-op success.
pub async fn delete(
    State(state): State<RatioApiState>,
    Path(model_name): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.store.delete(&model_name).await;
    metrics::record_admin_write("delete");

    persist(&state).await?;

    Ok(Json(DeleteResponse { model_name }))
}

/// GET /api/segmented_ratio/export - the full snapshot as one text blob
pub async fn export(State(state): State<RatioApiState>) -> Json<SnapshotPayload> {
    Json(SnapshotPayload {
        data: snapshot::export(&state.store).await,
    })
}

/// POST /api/segmented_ratio/import - whole-store replacement
///
/// On success the accepted blob is persisted verbatim, not a re-exported
/// canonical form. A parse failure leaves store and durable state unchanged.
pub async fn import(
    State(state): State<RatioApiState>,
    Json(payload): Json<SnapshotPayload>,
) -> Result<Json<ImportResponse>, AppError> {
    snapshot::import(&state.store, &payload.data).await?;
    metrics::record_admin_write("import");

    state
        .options
        .set(SEGMENTED_RATIO_OPTION_KEY, &payload.data)
        .await
        .map_err(|err| {
            AppError::Persistence(format!(
                "failed to persist segmented ratio snapshot: {}",
                err
            ))
        })?;

    Ok(Json(ImportResponse {
        models: state.store.model_count().await,
    }))
}

/// GET /api/segmented_ratio/evaluate - read-only billing-path probe
///
/// Unknown models, disabled configurations, and uncovered token counts all
/// answer `matched: false` with zero ratios; this endpoint never fails.
pub async fn evaluate(
    State(state): State<RatioApiState>,
    Query(params): Query<EvaluateParams>,
) -> Json<EvaluateResponse> {
    let resolved = engine::evaluate(
        &state.store,
        &params.model_name,
        params.input_tokens,
        params.output_tokens,
    )
    .await;
    metrics::record_evaluation(&params.model_name, resolved.is_some());

    match resolved {
        Some(ratio) => Json(EvaluateResponse {
            model_ratio: ratio.model_ratio,
            completion_ratio: ratio.completion_ratio,
            matched: true,
        }),
        None => Json(EvaluateResponse {
            model_ratio: 0.0,
            completion_ratio: 0.0,
            matched: false,
        }),
    }
}

/// Persist the full current snapshot under the fixed option key.
async fn persist(state: &RatioApiState) -> Result<(), AppError> {
    let json = snapshot::export(&state.store).await;
    state
        .options
        .set(SEGMENTED_RATIO_OPTION_KEY, &json)
        .await
        .map_err(|err| {
            AppError::Persistence(format!(
                "failed to persist segmented ratio snapshot: {}",
                err
            ))
        })
}
