use crate::{env_or_default, ConfigError, FromEnv};
use std::net::{Ipv4Addr, SocketAddr};

const DEFAULT_GRPC_PORT: u16 = 8090;

/// Listener configuration for the gRPC ingress
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the configured address into a bindable socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address()
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::ParseError {
                key: "GRPC_HOST".to_string(),
                details: format!("{} ({})", e, self.address()),
            })
    }
}

impl FromEnv for ServerConfig {
    /// - GRPC_HOST: defaults to 0.0.0.0
    /// - GRPC_PORT: defaults to 8090
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("GRPC_HOST", &Ipv4Addr::UNSPECIFIED.to_string());
        let port = env_or_default("GRPC_PORT", &DEFAULT_GRPC_PORT.to_string())
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "GRPC_PORT".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self { host, port })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: DEFAULT_GRPC_PORT,
        }
    }
}
