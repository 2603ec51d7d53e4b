//! Training enrollment service.
//!
//! Runs the background side of the enrollment engine against PostgreSQL:
//! the session sweeper, the hold reaper and the notification relay.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use training_enrollment::adapters::{
    HoldReaper, MockPaymentCapture, NotificationRelay, PostgresNotificationOutbox,
    PostgresQuoteSequence, PostgresRegistrationRepository, PostgresSessionStore,
    RecordingNotificationSink, ResendConfig, ResendNotificationSink, SessionSweeper,
    StripeCaptureAdapter, StripeConfig, TextDocumentRenderer,
};
use training_enrollment::application::{EnrollmentEngine, EnrollmentPorts};
use training_enrollment::config::{AppConfig, ServerConfig};
use training_enrollment::ports::{NotificationSink, PaymentCapture};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        environment = ?config.server.environment,
        hold_timeout_secs = config.enrollment.hold_timeout_secs,
        vat_rate = config.enrollment.vat_rate,
        "Configuration loaded"
    );

    // Persistence
    info!("Connecting to database...");
    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    let outbox = Arc::new(PostgresNotificationOutbox::new(pool.clone()));
    let ports = EnrollmentPorts {
        sessions: Arc::new(PostgresSessionStore::new(pool.clone())),
        registrations: Arc::new(PostgresRegistrationRepository::new(pool.clone())),
        quotes: Arc::new(PostgresQuoteSequence::new(pool.clone())),
        capture: payment_capture(&config)?,
        renderer: Arc::new(TextDocumentRenderer::new(
            config.enrollment.issuer_name.clone(),
        )),
    };
    let engine = EnrollmentEngine::new(ports, config.enrollment.settings()?);

    // Background workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    let sweeper = SessionSweeper::new(
        engine.sweep_sessions.clone(),
        config.enrollment.session_sweep_interval(),
    );
    let rx = shutdown_rx.clone();
    workers.push((
        "session sweeper",
        tokio::spawn(async move {
            if let Err(e) = sweeper.run(rx).await {
                error!(error = %e, "Session sweeper exited with error");
            }
        }),
    ));

    let reaper = HoldReaper::new(
        engine.expire_stale.clone(),
        config.enrollment.hold_sweep_interval(),
        config.enrollment.expiry_batch_size,
    );
    let rx = shutdown_rx.clone();
    workers.push((
        "hold reaper",
        tokio::spawn(async move {
            if let Err(e) = reaper.run(rx).await {
                error!(error = %e, "Hold reaper exited with error");
            }
        }),
    ));

    let relay = NotificationRelay::with_config(
        outbox,
        notification_sink(&config)?,
        config.enrollment.relay_config(),
    );
    let stats = relay.stats();
    let rx = shutdown_rx;
    workers.push((
        "notification relay",
        tokio::spawn(async move {
            if let Err(e) = relay.run(rx).await {
                error!(error = %e, "Notification relay exited with error");
            }
        }),
    ));

    info!(workers = workers.len(), "Enrollment service started");

    signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping workers...");
    shutdown_tx.send(true)?;

    let grace = config.server.shutdown_timeout();
    for (name, handle) in workers {
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => info!(worker = name, "Worker stopped"),
            Ok(Err(e)) => error!(worker = name, error = %e, "Worker panicked"),
            Err(_) => warn!(worker = name, "Worker did not stop in time"),
        }
    }

    info!(
        delivered = stats.delivered(),
        retried = stats.retried(),
        dead_lettered = stats.dead_lettered(),
        "Notification relay totals"
    );
    pool.close().await;
    info!("Enrollment service stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| server.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);
    if server.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn payment_capture(
    config: &AppConfig,
) -> Result<Arc<dyn PaymentCapture>, Box<dyn std::error::Error>> {
    if !config.payment.is_configured() {
        warn!("No Stripe key configured, card payments use the mock gateway");
        return Ok(Arc::new(MockPaymentCapture::new()));
    }
    let stripe = StripeConfig::new(
        config.payment.stripe_api_key.clone(),
        config.payment.request_timeout(),
    )
    .with_base_url(config.payment.stripe_api_base_url.clone());
    if config.payment.is_test_mode() {
        info!("Stripe running in test mode");
    }
    Ok(Arc::new(StripeCaptureAdapter::new(stripe)?))
}

fn notification_sink(
    config: &AppConfig,
) -> Result<Arc<dyn NotificationSink>, Box<dyn std::error::Error>> {
    if !config.email.is_configured() {
        warn!("No Resend key configured, notifications are kept in memory");
        return Ok(Arc::new(RecordingNotificationSink::new()));
    }
    let mut resend = ResendConfig::new(
        config.email.resend_api_key.clone(),
        config.email.from_header(),
    )
    .with_base_url(config.email.resend_api_base_url.clone());
    resend.request_timeout = config.email.request_timeout();
    Ok(Arc::new(ResendNotificationSink::new(resend)?))
}
