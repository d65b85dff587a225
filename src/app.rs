//! Process wiring: tracing, adapters, background tasks and the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::adapters::http::{app_router, BillingAppState};
use crate::adapters::{
    BroadcastNotifier, InMemoryBillingStore, PostgresBillingStore, StripeBillingAdapter,
    StripeConfig,
};
use crate::application::{ReconciliationEngine, RedirectPolicy};
use crate::config::{AppConfig, ConfigError};
use crate::domain::billing::WebhookVerifier;
use crate::domain::foundation::DomainError;
use crate::ports::{BillingProvider, EntitlementStore, ReconciliationStore};

/// How often handled event ids older than the retention window are dropped.
const LEDGER_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] DomainError),

    #[error("Billing provider client: {0}")]
    Provider(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Installs the global subscriber: JSON lines in production, human-readable
/// output elsewhere.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| config.server.log_filter())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    // A subscriber may already be installed (tests); keep it.
    let _ = if config.is_production() {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
}

/// Everything the HTTP layer and the background tasks share.
pub struct Services {
    pub state: BillingAppState,
    pub notifier: Arc<BroadcastNotifier>,
}

/// Connects storage and builds the adapters named by `config`.
pub async fn build_services(config: &AppConfig) -> Result<Services, StartupError> {
    let (store, entitlement_store) = open_store(config).await?;

    let masks = config
        .entitlements
        .tier_masks()
        .map_err(|e| StartupError::Invalid(e.to_string()))?;
    let redirect_policy = RedirectPolicy::new(&config.billing.app_origin)
        .map_err(|e| StartupError::Invalid(e.to_string()))?;

    let billing = &config.billing;
    let verifier = WebhookVerifier::new(billing.webhook_secret.clone())
        .with_replay_window(billing.replay_window_secs)
        .with_max_clock_skew(billing.max_clock_skew_secs)
        .with_max_payload_bytes(billing.max_payload_bytes)
        .with_require_livemode(billing.require_livemode);

    let provider_config = StripeConfig::new(
        billing.api_key.clone(),
        billing.basic_price_id.clone(),
        billing.premium_price_id.clone(),
    )
    .with_base_url(billing.api_base_url.clone())
    .with_timeout(billing.provider_timeout());
    let provider: Arc<dyn BillingProvider> = Arc::new(
        StripeBillingAdapter::new(provider_config)
            .map_err(|e| StartupError::Provider(e.to_string()))?,
    );

    let notifier = Arc::new(BroadcastNotifier::with_default_capacity());
    let engine = Arc::new(ReconciliationEngine::new(store, notifier.clone(), masks));

    Ok(Services {
        state: BillingAppState {
            verifier: Arc::new(verifier),
            engine,
            entitlement_store,
            billing_provider: provider,
            redirect_policy,
            provider_timeout: billing.provider_timeout(),
        },
        notifier,
    })
}

async fn open_store(
    config: &AppConfig,
) -> Result<(Arc<dyn ReconciliationStore>, Arc<dyn EntitlementStore>), StartupError> {
    match &config.database {
        Some(database) => {
            let pool = crate::adapters::postgres::connect(database).await?;
            tracing::info!("Postgres connection has been established");
            if database.run_migrations {
                crate::adapters::postgres::run_migrations(&pool).await?;
                tracing::info!("Migrations applied");
            }
            let store = Arc::new(PostgresBillingStore::new(pool));
            Ok((store.clone(), store))
        }
        None => {
            tracing::warn!("No database configured; entitlements are kept in memory");
            let store = Arc::new(InMemoryBillingStore::new());
            Ok((store.clone(), store))
        }
    }
}

/// Periodically drops old ledger entries and idle notification rooms.
pub fn spawn_maintenance(
    engine: Arc<ReconciliationEngine>,
    notifier: Arc<BroadcastNotifier>,
    retention: chrono::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LEDGER_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = engine.prune_ledger(retention).await {
                tracing::warn!(error = %e, "Ledger pruning failed");
            }
            notifier.prune().await;
        }
    })
}

/// Loads configuration, wires the service and serves until ctrl-c.
pub async fn run() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate().map_err(ConfigError::from)?;
    tracing::info!(
        environment = ?config.server.environment,
        test_mode = config.billing.is_test_mode(),
        "Configuration has been loaded"
    );

    let services = build_services(&config).await?;
    let maintenance = spawn_maintenance(
        services.state.engine.clone(),
        services.notifier.clone(),
        config.billing.ledger_retention(),
    );

    let addr = config
        .server
        .socket_addr()
        .map_err(|e| StartupError::Invalid(e.to_string()))?;
    let app = app_router(services.state, config.server.request_timeout());
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Server is running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl+C signal"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}
