//! Email Worker Service - Entry Point

use clap::Parser;
use core_config::tracing::install_color_eyre;
use eyre::Result;

/// Delivers queued activation e-mails
#[derive(Parser)]
#[command(name = "notifications_email_worker", version, about)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    Cli::parse();
    install_color_eyre();

    notifications_email_worker::run().await
}
