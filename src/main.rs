//! payment-relay service entry point.
//!
//! Wires configuration, stores, broker, and HTTP server together, starts the
//! outbox relay in the background, and shuts both down gracefully on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use payment_relay::adapters::broker::{
    KafkaBrokerPublisher, OutboxRelay, OutboxRelayConfig, RetryPolicy, RetryingPublisher,
};
use payment_relay::adapters::http::{api_router, AppState};
use payment_relay::adapters::postgres::{
    PostgresIdempotencyStore, PostgresOutbox, PostgresPaymentStore,
};
use payment_relay::adapters::stripe::{StripeCheckoutAdapter, StripeConfig};
use payment_relay::config::AppConfig;
use payment_relay::domain::foundation::Timestamp;
use payment_relay::domain::webhook::WebhookVerifier;
use payment_relay::ports::{IdempotencyStore, OutboxWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    tracing::info!(
        environment = ?config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "starting payment-relay"
    );

    // Database
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database connected, migrations applied");

    // Broker
    let broker = Arc::new(
        KafkaBrokerPublisher::connect(
            config.broker.bootstrap_server_list(),
            config.broker.partitions,
        )
        .await?,
    );
    tracing::info!(
        servers = %config.broker.bootstrap_servers,
        topic = %config.broker.topic,
        "broker producer connected"
    );

    // Stores and pipeline components
    let idempotency: Arc<dyn IdempotencyStore> = Arc::new(PostgresIdempotencyStore::new(
        pool.clone(),
        config.payment.max_failed_attempts,
    ));
    let outbox: Arc<dyn OutboxWriter> = Arc::new(PostgresOutbox::new(pool.clone()));
    let payments = Arc::new(PostgresPaymentStore::new(pool.clone()));

    let retry_policy = RetryPolicy::new(
        config.broker.backoff_base(),
        config.broker.backoff_cap(),
        config.broker.publish_max_attempts,
    );
    let publisher = Arc::new(RetryingPublisher::new(
        broker.clone(),
        config.broker.topic.clone(),
        retry_policy.clone(),
        config.broker.publish_timeout(),
    ));

    let state = AppState {
        verifier: Arc::new(
            WebhookVerifier::new(config.payment.stripe_webhook_secret.clone())
                .with_tolerance_secs(config.payment.signature_tolerance_secs),
        ),
        idempotency: idempotency.clone(),
        payments,
        publisher,
        outbox: outbox.clone(),
        checkout: Arc::new(StripeCheckoutAdapter::new(StripeConfig::new(
            config.payment.stripe_api_key.clone(),
        ))),
    };

    // Background outbox relay
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = OutboxRelay::with_config(
        outbox,
        broker,
        config.broker.topic.clone(),
        OutboxRelayConfig::default()
            .with_poll_interval(config.broker.outbox_poll_interval())
            .with_batch_size(config.broker.outbox_batch_size)
            .with_max_attempts(config.broker.outbox_max_attempts)
            .with_retry_policy(retry_policy),
    );
    let relay_handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

    // Daily retention sweep for idempotency records
    let retention_days = config.payment.idempotency_retention_days as i64;
    let sweep_store = idempotency;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            let cutoff = Timestamp::now().minus_days(retention_days);
            match sweep_store.delete_before(cutoff).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(deleted, "idempotency retention sweep")
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "idempotency retention sweep failed"),
            }
        }
    });

    // HTTP server
    let app = api_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                ))),
        )
        .with_state(state);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    // Let the relay flush its current batch before exiting.
    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_handle.await? {
        tracing::error!(error = %e, "outbox relay exited with error");
    }

    tracing::info!("payment-relay stopped");
    Ok(())
}
