mod api;
mod config;
mod database;
mod error;
mod health;
mod logging;
mod middleware;
mod money;
mod payments;
mod services;

use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use crate::api::AppState;
use crate::config::{AppConfig, StoreBackend};
use crate::database::memory::InMemoryStore;
use crate::database::pg::PgStore;
use crate::database::store::{DesignerLedger, SettlementStore};
use crate::health::{HealthChecker, HealthState, HealthStatus};
use crate::logging::init_tracing;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::money::Money;
use crate::payments::factory::ProviderRegistry;
use crate::services::catalog::{Catalog, DesignListing, InMemoryCatalog, PgCatalog};
use crate::services::ledger::LedgerService;
use crate::services::notification::LogEventSink;
use crate::services::orders::OrderService;
use crate::services::withdrawals::WithdrawalService;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        currency = %config.settlement.currency,
        "Starting Planmarket settlement backend"
    );

    // Storage backend: Postgres in production, in-memory for local runs.
    let (store, catalog, pool): (Arc<dyn SettlementStore>, Arc<dyn Catalog>, Option<sqlx::PgPool>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                info!("Initializing database connection pool");
                let pool = database::init_pool_from_config(&config.database).await?;

                info!("Running database migrations");
                sqlx::migrate!("./migrations").run(&pool).await?;

                (
                    Arc::new(PgStore::new(pool.clone())),
                    Arc::new(PgCatalog::new(pool.clone())),
                    Some(pool),
                )
            }
            StoreBackend::Memory => {
                info!("Using in-memory store (STORE_BACKEND=memory)");
                let store = Arc::new(InMemoryStore::new());
                let catalog = Arc::new(InMemoryCatalog::new());

                // Seed a demo designer and design so the API is usable
                // out of the box in development runs.
                let designer_id = uuid::Uuid::new_v4();
                let design_id = uuid::Uuid::new_v4();
                store
                    .upsert_ledger(DesignerLedger::new(
                        designer_id,
                        config.settlement.currency,
                    ))
                    .await;
                catalog.insert(DesignListing {
                    design_id,
                    designer_id,
                    title: "Demo Modern Farmhouse".to_string(),
                    price: Money::parse("100.00", config.settlement.currency)?,
                    commission_rate_percent: config.settlement.default_commission_percent,
                });
                info!(
                    designer_id = %designer_id,
                    design_id = %design_id,
                    "Seeded demo designer and design"
                );

                (store, catalog, None)
            }
        };

    let providers = Arc::new(ProviderRegistry::from_env().map_err(|e| {
        error!("Failed to initialize payment providers: {}", e);
        anyhow::anyhow!(e)
    })?);
    info!(
        methods = ?providers
            .enabled_methods()
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>(),
        "Payment providers initialized"
    );

    let events = Arc::new(LogEventSink);
    let health_checker = HealthChecker::new(pool);

    let state = AppState {
        orders: OrderService::new(
            store.clone(),
            catalog,
            providers,
            events.clone(),
            config.settlement.clone(),
        ),
        withdrawals: WithdrawalService::new(store.clone(), events, config.settlement.clone()),
        ledger: LedgerService::new(store),
        health: health_checker,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/api/orders", post(api::orders::create_order))
        .route("/api/orders/{id}", get(api::orders::get_order))
        .route("/api/orders/{id}/payment", post(api::orders::process_payment))
        .route(
            "/api/orders/{id}/payment/status",
            get(api::orders::check_payment_status),
        )
        .route("/api/orders/{id}/refund", post(api::orders::refund_order))
        .route(
            "/api/designers/{id}/ledger",
            get(api::withdrawals::get_designer_ledger),
        )
        .route("/api/withdrawals", post(api::withdrawals::request_withdrawal))
        .route("/api/withdrawals/{id}", get(api::withdrawals::get_withdrawal))
        .route(
            "/api/withdrawals/{id}/approve",
            post(api::withdrawals::approve_withdrawal),
        )
        .route(
            "/api/withdrawals/{id}/complete",
            post(api::withdrawals::complete_withdrawal),
        )
        .route(
            "/api/withdrawals/{id}/cancel",
            post(api::withdrawals::cancel_withdrawal),
        )
        .route(
            "/api/withdrawals/{id}/fail",
            post(api::withdrawals::fail_withdrawal),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Planmarket settlement API"
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let status = state.health.check_health().await;
    if matches!(status.status, HealthState::Unhealthy) {
        error!("Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(status))
    }
}

/// Readiness probe - checks dependencies.
async fn readiness(
    state: axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - basic check that the process responds.
async fn liveness() -> &'static str {
    "OK"
}
