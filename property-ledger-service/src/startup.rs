//! Application startup and lifecycle management.

use crate::config::{PropertyLedgerConfig, StoreBackend};
use crate::handlers;
use crate::middleware::{
    editor_auth_middleware, http_metrics_middleware, programmatic_write_middleware,
};
use crate::services::{
    init_metrics, BudgetService, Database, EntryWriter, IdempotencyCache, LedgerStore,
    MemoryStore, WriteMode,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{audit_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PropertyLedgerConfig,
    pub store: Arc<dyn LedgerStore>,
    pub idempotency: Arc<IdempotencyCache>,
    pub entries: EntryWriter,
    pub budgets: BudgetService,
}

impl AppState {
    pub fn new(config: PropertyLedgerConfig, store: Arc<dyn LedgerStore>) -> Self {
        let idempotency = Arc::new(IdempotencyCache::new(
            Duration::from_secs(config.idempotency.ttl_seconds),
            config.idempotency.max_entries,
        ));
        let mode = WriteMode::from_atomic_flag(config.writes.batch_atomic);

        Self {
            entries: EntryWriter::new(
                store.clone(),
                idempotency.clone(),
                mode,
                config.writes.validate_references,
            ),
            budgets: BudgetService::new(store.clone(), mode),
            config,
            store,
            idempotency,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let editor_routes = Router::new()
        .route("/imoveis", post(handlers::properties::create_property))
        .route(
            "/imoveis/:id",
            patch(handlers::properties::update_property)
                .delete(handlers::properties::delete_property),
        )
        .route("/categorias", post(handlers::categories::create_category))
        .route(
            "/categorias/:id",
            delete(handlers::categories::delete_category),
        )
        .route("/dashboard/lancamentos/lote", post(handlers::entries::create_batch))
        .route(
            "/dashboard/lancamentos/:id",
            patch(handlers::entries::update_entry).delete(handlers::entries::delete_entry),
        )
        .route("/orcamentos/:id_imovel", post(handlers::budgets::upsert_budgets))
        .route_layer(from_fn_with_state(state.clone(), editor_auth_middleware));

    let programmatic_routes = Router::new()
        .route("/gpt/lancamentos", post(handlers::programmatic::create_entry))
        .route_layer(from_fn_with_state(
            state.clone(),
            programmatic_write_middleware,
        ));

    Router::new()
        .route("/healthz", get(handlers::health::liveness))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_handler))
        .route("/imoveis", get(handlers::properties::list_properties))
        .route("/imoveis/search", get(handlers::search::search_properties))
        .route("/imoveis/:id", get(handlers::properties::get_property))
        .route("/categorias", get(handlers::categories::list_categories))
        .route("/categorias/search", get(handlers::search::search_categories))
        .route("/lancamentos", get(handlers::entries::list_entries))
        .route("/orcamentos/:id_imovel", get(handlers::budgets::list_budgets))
        .route(
            "/dashboard/ultimos-lancamentos",
            get(handlers::dashboard::recent_entries),
        )
        .route(
            "/dashboard/ultima-atualizacao",
            get(handlers::dashboard::last_update),
        )
        .merge(editor_routes)
        .merge(programmatic_routes)
        .route_layer(from_fn(http_metrics_middleware))
        .with_state(state)
        .layer(from_fn(audit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the datastore selected by configuration.
    pub async fn build(config: PropertyLedgerConfig) -> Result<Self, AppError> {
        let store: Arc<dyn LedgerStore> = match config.store.backend {
            StoreBackend::Postgres => {
                let db = Database::new(
                    &config.store.database_url,
                    config.store.max_connections,
                    config.store.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    AppError::from(e)
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    AppError::from(e)
                })?;

                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    /// Build the application on an existing datastore. Binds the listener.
    pub async fn build_with_store(
        config: PropertyLedgerConfig,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            read_only = config.access.read_only,
            programmatic_write = config.access.programmatic_write_enabled,
            batch_atomic = config.writes.batch_atomic,
            validate_references = config.writes.validate_references,
            "Property ledger listener bound"
        );

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "property-ledger-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
