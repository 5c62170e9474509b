//! Test client that sends one activation e-mail request to the API
//!
//! Run with: cargo run -p notifications_api --bin send_activation_email -- --recipient a@x.com

use clap::Parser;
use core_config::env_or_default;
use eyre::{Result, WrapErr};
use protos::notifications::v1::SendActivationEmailRequest;
use protos::notifications::v1::e_mail_service_client::EMailServiceClient;
use tonic::codec::CompressionEncoding;

#[derive(Parser)]
#[command(name = "send_activation_email", version, about = "Send a test activation e-mail request")]
struct Args {
    /// Recipient address
    #[arg(long, default_value = "test1@test1.com")]
    recipient: String,

    /// User ID used for partitioning
    #[arg(long, default_value = "1")]
    user_id: String,

    /// Activation token
    #[arg(long, default_value = "aaaa")]
    token: String,

    /// API address, defaults to NOTIFICATIONS_API_URL or http://localhost:8090
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let url = args
        .url
        .unwrap_or_else(|| env_or_default("NOTIFICATIONS_API_URL", "http://localhost:8090"));
    println!("Connecting to {}", url);

    let mut client = EMailServiceClient::connect(url.clone())
        .await
        .wrap_err_with(|| format!("Failed to connect to {}", url))?
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);

    println!("Sending activation email to: {}", args.recipient);

    let response = client
        .send_activation_email(SendActivationEmailRequest {
            recipient: args.recipient,
            user_id: args.user_id,
            token: args.token,
        })
        .await
        .wrap_err("SendActivationEmail failed")?
        .into_inner();

    println!("Email queued successfully!");
    println!("Message ID: {}", response.message_id);

    Ok(())
}
