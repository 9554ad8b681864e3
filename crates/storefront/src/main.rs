//! QUQU Storefront - cart and checkout backend.
//!
//! This binary serves the storefront JSON API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API consumed by the storefront frontend
//! - Per-shopper carts in memory, persisted to disk with debounced writes
//! - PayPal Orders v2 for payment capture
//! - Remote order API for order records
//!
//! # Security
//!
//! This binary only has access to:
//! - PayPal REST API (client credentials)
//! - Order API (optional bearer token)
//! - Local cart storage directory

#![cfg_attr(not(test), forbid(unsafe_code))]

use ququ_storefront::config::StorefrontConfig;
use ququ_storefront::orders::AuthEvent;
use ququ_storefront::routes;
use ququ_storefront::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ququ_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    tracing::info!(
        region = %config.checkout.region,
        currency = config.checkout.currency.code(),
        storage = %config.cart.storage_dir.display(),
        "Configuration loaded"
    );

    let (state, order_client) =
        AppState::new(config.clone()).expect("Failed to initialize application state");

    // Token refresh is handled outside this service; rejected credentials are
    // only reported.
    let mut auth_events = order_client.subscribe_auth_events();
    tokio::spawn(async move {
        loop {
            match auth_events.recv().await {
                Ok(AuthEvent::SessionRejected { status }) => {
                    tracing::warn!(status, "Order API rejected credentials");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = routes::app(state.clone())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Pending debounced writes would be lost with the runtime.
    state.sessions().flush_all().await;
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
