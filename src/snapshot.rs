use crate::error::AppError;
use crate::rule::SegmentedRatioConfig;
use crate::store::RatioStore;
use std::collections::HashMap;

/// Serialize the full store contents, keyed by model name.
///
/// Never fails from the caller's perspective: a serialization error is
/// logged and the empty mapping is returned instead, so callers can always
/// persist whatever comes back.
pub async fn export(store: &RatioStore) -> String {
    let snapshot = store.snapshot().await;
    match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize segmented ratio snapshot");
            "{}".to_string()
        }
    }
}

/// Parse a snapshot and replace the entire store contents with it.
///
/// A parse failure rejects the whole import and leaves the store untouched.
/// On success, every configuration's rules are re-sorted by priority and the
/// map is swapped in atomically; concurrent readers see either the previous
/// state or the imported one.
pub async fn import(store: &RatioStore, json: &str) -> Result<(), AppError> {
    let configs: HashMap<String, SegmentedRatioConfig> = serde_json::from_str(json)
        .map_err(|err| AppError::Parse(format!("invalid segmented ratio snapshot: {}", err)))?;

    store.replace_all(configs).await;
    Ok(())
}
