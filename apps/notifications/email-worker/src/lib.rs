//! Email Worker Service
//!
//! Background worker that delivers activation e-mails queued by the API.
//!
//! ## Architecture
//!
//! ```text
//! Redis Streams (general-email:{partition})
//!   ↓ (Consumer Group: email_workers)
//! StreamWorker<DeliveryJob, EmailProcessor>
//!   ↓ (renders templates)
//! TemplateEngine (Handlebars)
//!   ↓ (sends emails)
//! SmtpProvider (lettre)
//! ```
//!
//! Each job gets exactly one delivery attempt. Failures are logged and the
//! entry is acknowledged; nothing is retried.

pub mod config;

use core_config::{app_info, Environment, FromEnv};
use email::{DeliveryJob, EmailProcessor, EmailProvider, SmtpProvider, TemplateEngine};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{connect_with_retry, RedisStreamConsumer, StreamWorker};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub use config::{EmailWorkerConfig, PoolConfig};

/// Run the email worker
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Redis stays unreachable at startup
/// - The queue is lost for longer than the reconnect budget
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_info = app_info!();
    info!(
        name = %app_info.name,
        version = %app_info.version,
        environment = environment.as_str(),
        "Starting email worker service"
    );

    let config = EmailWorkerConfig::from_env().wrap_err("Failed to load worker configuration")?;
    let worker_config = config.worker_config();
    worker_config
        .validate()
        .wrap_err("Invalid worker configuration")?;
    info!(
        stream = %worker_config.stream_name,
        partitions = worker_config.partitions,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        max_concurrent_jobs = worker_config.max_concurrent_jobs,
        "Worker configuration loaded"
    );

    let templates = TemplateEngine::new().wrap_err("Failed to initialize template engine")?;
    let provider = SmtpProvider::new(config.smtp.clone()).wrap_err("Failed to create SMTP provider")?;
    info!(
        host = %config.smtp.host,
        port = config.smtp.port,
        tls = config.smtp.use_tls,
        "SMTP transport configured"
    );
    if let Err(e) = provider.health_check().await {
        warn!(error = %e, "SMTP server not reachable yet, deliveries will fail until it is");
    }

    info!("Connecting to Redis...");
    let redis = connect_with_retry(
        &config.redis.url,
        worker_config.max_reconnect_attempts.max(1),
        worker_config.backoff(),
    )
    .await
    .wrap_err("Failed to connect to Redis")?;

    let consumer = RedisStreamConsumer::new(redis, &worker_config);
    consumer
        .init_consumer_groups()
        .await
        .wrap_err("Failed to create consumer groups")?;

    let processor = EmailProcessor::new(provider, templates);
    let worker = StreamWorker::<DeliveryJob, _>::new(Arc::new(consumer), processor, worker_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "Error waiting for shutdown signal"),
        }
    });

    let report = worker
        .run(shutdown_rx)
        .await
        .wrap_err("Email worker stopped after losing the queue")?;

    info!(
        dispatched = report.dispatched,
        succeeded = report.succeeded,
        failed = report.failed,
        panicked = report.panicked,
        malformed = report.malformed,
        "Email worker service stopped"
    );
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.wrap_err("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
