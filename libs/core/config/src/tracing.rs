use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install color-eyre with the project-standard configuration.
///
/// Call this first in `main()`. Safe to call multiple times.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing with environment-aware output and error span capture.
///
/// - **Staging / Production**: flattened JSON events, no module targets, default level `info`
/// - **Development**: pretty output, default level `debug`
///
/// `RUST_LOG` overrides the default filter in every environment
/// (e.g. `RUST_LOG=stream_worker=trace,info`).
///
/// Calling this more than once is a no-op; the first subscriber wins.
pub fn init_tracing(environment: &Environment) {
    let json = environment.uses_json_logs();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if json {
            EnvFilter::new("info,h2=warn,tower=warn,lettre=warn")
        } else {
            EnvFilter::new("debug,h2=info,tower=info,lettre=info,redis=info")
        }
    });

    let result = if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => {
            info!(environment = environment.as_str(), "Tracing initialized");
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}
