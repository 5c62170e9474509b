//! Notifications API - Entry Point

use clap::Parser;
use core_config::tracing::install_color_eyre;
use eyre::Result;

/// gRPC ingress for activation e-mails
#[derive(Parser)]
#[command(name = "notifications_api", version, about)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    Cli::parse();
    install_color_eyre();

    notifications_api::run().await
}
