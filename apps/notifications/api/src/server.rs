//! gRPC server initialization and lifecycle management
//!
//! This module handles all server setup:
//! - Tracing initialization
//! - Redis connection and queue producer
//! - gRPC server configuration and startup
//! - Health check service (grpc.health.v1.Health)
//! - Graceful shutdown, after which the producer is closed

use std::future::Future;
use std::sync::Arc;

use core_config::{app_info, Environment, FromEnv};
use email::NotificationService;
use eyre::{Result, WrapErr};
use protos::notifications::v1::e_mail_service_server::{EMailServiceServer, SERVICE_NAME};
use stream_worker::{connect_with_retry, Backoff, RedisStreamProducer};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::service::EMailServiceImpl;

const REDIS_CONNECT_ATTEMPTS: u32 = 5;

/// Run the ingress server
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Redis stays unreachable
/// - The listener cannot be bound
/// - The server fails at runtime
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_info = app_info!();
    info!(
        name = %app_info.name,
        version = %app_info.version,
        environment = environment.as_str(),
        "Starting notifications API"
    );

    let config = ApiConfig::from_env().wrap_err("Failed to load API configuration")?;
    info!(
        requests_per_second = config.limiter.requests_per_second,
        burst = config.limiter.burst,
        enabled = config.limiter.enabled,
        "Rate limiter configured (not enforced)"
    );

    info!("Connecting to Redis...");
    let redis = connect_with_retry(&config.redis.url, REDIS_CONNECT_ATTEMPTS, Backoff::default())
        .await
        .wrap_err("Failed to connect to Redis")?;

    let producer = RedisStreamProducer::new(redis, &config.queue.topic, config.queue.partitions);
    info!(
        topic = %producer.topic(),
        partitions = producer.partitions(),
        "Queue producer ready"
    );
    let notifications = NotificationService::new(Arc::new(producer));

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind gRPC listener to {}", addr))?;
    info!(%addr, "EMailService listening");

    let served = serve(listener, notifications.clone(), async {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
    })
    .await;

    if let Err(e) = notifications.close().await {
        warn!(error = %e, "Failed to close queue producer");
    }

    served?;
    info!("Notifications API stopped");
    Ok(())
}

/// Serve EMailService and the health service on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    notifications: NotificationService,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (health_reporter, health_service) = health_reporter();
    health_reporter
        .set_service_status(SERVICE_NAME, tonic_health::ServingStatus::Serving)
        .await;
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;

    Server::builder()
        .add_service(health_service)
        .add_service(
            EMailServiceServer::new(EMailServiceImpl::new(notifications))
                .accept_compressed(CompressionEncoding::Zstd)
                .send_compressed(CompressionEncoding::Zstd),
        )
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
        .wrap_err("gRPC server failed")?;

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
