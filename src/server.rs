use anyhow::Result;
use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

use crate::{
    auth,
    config::Config,
    handlers,
    metrics,
    options::{OptionStore, SEGMENTED_RATIO_OPTION_KEY},
    signals::setup_signal_handlers,
    snapshot,
    store::RatioStore,
};

/// Start the pricing engine server
///
/// This function:
/// 1. Initializes metrics
/// 2. Sets up signal handlers for graceful shutdown and config reload
/// 3. Opens the option store and restores the persisted snapshot
/// 4. Creates the Axum application
/// 5. Serves requests with graceful shutdown support
pub async fn start_server(config: Config) -> Result<()> {
    // Install the Prometheus recorder only when metrics are enabled; the
    // record helpers degrade to no-ops without it
    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()))
    } else {
        None
    };

    // Wrap config in ArcSwap for atomic reload support
    let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));

    // Setup signal handlers (SIGTERM, SIGINT for shutdown; SIGHUP for reload)
    let (shutdown_tx, signal_handle) = setup_signal_handlers(config_swap.clone());
    let mut shutdown_rx = shutdown_tx.subscribe();

    // Durable option storage and the in-memory rule store
    let option_store = Arc::new(OptionStore::new(&config.storage.database_url).await?);
    let store = Arc::new(RatioStore::new());
    restore_snapshot(&store, &option_store).await?;

    // Exposed-configuration cache collaborator: consume invalidations
    spawn_invalidation_listener(store.clone());

    let app_state = handlers::segmented_ratio::RatioApiState {
        store: store.clone(),
        options: option_store,
    };

    let app = create_router(config_swap.clone(), app_state, metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting pricing engine on {}", addr);
    info!(
        "Configuration: {} API keys, {} models restored",
        config.api_keys.len(),
        store.model_count().await
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: Arc<ArcSwap<Config>>,
    app_state: handlers::segmented_ratio::RatioApiState,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Router {
    // Administrative routes (bearer auth required). Model lookups live under
    // /model/ because the route trie rejects a static segment alongside a
    // path parameter at the same level.
    let admin_routes = Router::new()
        .route(
            "/api/segmented_ratio",
            get(handlers::segmented_ratio::list_all).post(handlers::segmented_ratio::upsert),
        )
        .route(
            "/api/segmented_ratio/export",
            get(handlers::segmented_ratio::export),
        )
        .route(
            "/api/segmented_ratio/import",
            post(handlers::segmented_ratio::import),
        )
        .route(
            "/api/segmented_ratio/evaluate",
            get(handlers::segmented_ratio::evaluate),
        )
        .route(
            "/api/segmented_ratio/model/:model_name",
            get(handlers::segmented_ratio::get_one).delete(handlers::segmented_ratio::delete),
        )
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth::auth_middleware,
        ))
        .with_state(app_state);

    // Public endpoints (no auth required)
    let mut public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    if let Some(handle) = metrics_handle {
        let endpoint = config.load().metrics.endpoint.clone();
        public_routes = public_routes.route(
            &endpoint,
            get(handlers::metrics_handler::metrics).with_state(handle),
        );
    }

    public_routes
        // Merge authenticated routes
        .merge(admin_routes)
        // Snapshots are small; reject oversized administrative payloads
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        // The settings UI is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Load the persisted snapshot, if any.
///
/// A corrupt persisted snapshot is logged and skipped so the service still
/// boots with an empty store; the administrative import path stays strict.
async fn restore_snapshot(store: &RatioStore, options: &OptionStore) -> Result<()> {
    store.reset().await;

    match options.get(SEGMENTED_RATIO_OPTION_KEY).await? {
        Some(json) => match snapshot::import(store, &json).await {
            Ok(()) => info!(
                "Restored segmented pricing for {} models",
                store.model_count().await
            ),
            Err(err) => warn!(
                error = %err,
                "persisted segmented ratio snapshot is unreadable, starting empty"
            ),
        },
        None => info!("No persisted segmented ratio snapshot found"),
    }

    metrics::update_model_count(store.model_count().await);
    Ok(())
}

/// Bridge store invalidations into metrics and logs. The store itself has
/// no idea what sits behind the notification channel.
fn spawn_invalidation_listener(store: Arc<RatioStore>) {
    let mut invalidations = store.subscribe_invalidations();

    tokio::spawn(async move {
        loop {
            match invalidations.recv().await {
                Ok(()) => {
                    metrics::record_invalidation();
                    metrics::update_model_count(store.model_count().await);
                    debug!("exposed pricing configuration cache invalidated");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "invalidation listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeyConfig, MetricsConfig, ServerConfig, StorageConfig};

    fn create_test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                log_level: "info".to_string(),
                log_format: "json".to_string(),
            },
            api_keys: vec![ApiKeyConfig {
                key: "pk-test".to_string(),
                name: "test".to_string(),
                enabled: true,
            }],
            storage: StorageConfig {
                database_url: "sqlite::memory:".to_string(),
            },
            metrics: MetricsConfig {
                enabled: true,
                endpoint: "/metrics".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_router() {
        let config = create_test_config();
        let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));

        let option_store = Arc::new(
            OptionStore::new(&config.storage.database_url)
                .await
                .unwrap(),
        );
        let store = Arc::new(RatioStore::new());

        let app_state = handlers::segmented_ratio::RatioApiState {
            store,
            options: option_store,
        };

        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let metrics_handle = Arc::new(recorder.handle());

        let _app = create_router(config_swap, app_state, Some(metrics_handle));
        // Router created successfully - no panic
    }

    #[tokio::test]
    async fn test_create_router_without_metrics() {
        let mut config = create_test_config();
        config.metrics.enabled = false;
        let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));

        let option_store = Arc::new(
            OptionStore::new(&config.storage.database_url)
                .await
                .unwrap(),
        );

        let app_state = handlers::segmented_ratio::RatioApiState {
            store: Arc::new(RatioStore::new()),
            options: option_store,
        };

        let _app = create_router(config_swap, app_state, None);
    }

    #[tokio::test]
    async fn test_restore_snapshot_tolerates_corrupt_data() {
        // a pooled :memory: database is per-connection, so use a real file
        let path = std::env::temp_dir().join("pricing-engine-restore-test.db");
        let _ = std::fs::remove_file(&path);
        let url = format!("sqlite:{}", path.display());

        let options = OptionStore::new(&url).await.unwrap();
        options
            .set(SEGMENTED_RATIO_OPTION_KEY, "not valid json")
            .await
            .unwrap();

        let store = RatioStore::new();
        restore_snapshot(&store, &options).await.unwrap();

        assert_eq!(store.model_count().await, 0);
    }
}
