//! Gateway configuration.

use std::time::Duration;

use clap::Parser;
use warden_client::{ClientConfig, RetryPolicy};

/// Command line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "warden-gateway")]
#[command(about = "Warden gateway - HTTP service authenticated by the identity service")]
#[command(version)]
pub struct GatewayConfig {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8080", env = "WARDEN_BIND_ADDRESS")]
    pub bind: String,

    /// Identity service address (host:port, http(s)://host:port or dns:///host:port)
    #[arg(long, default_value = "localhost:50051", env = "WARDEN_IDENTITY_ADDR")]
    pub identity_addr: String,

    /// Authority override sent to the identity service
    #[arg(long, env = "WARDEN_IDENTITY_AUTHORITY")]
    pub identity_authority: Option<String>,

    /// Tenant used when a login request does not name one
    #[arg(long, env = "WARDEN_DEFAULT_TENANT")]
    pub default_tenant: Option<String>,

    /// How long startup waits for the identity service, in milliseconds
    #[arg(long, default_value = "2000", env = "WARDEN_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// Deadline for each identity call, in milliseconds
    #[arg(long, env = "WARDEN_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Attempts per identity call while the service is unavailable
    #[arg(long, default_value = "5", env = "WARDEN_RETRY_ATTEMPTS")]
    pub retry_attempts: u32,
}

impl GatewayConfig {
    /// Client settings derived from the gateway flags.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.identity_addr.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_retry(RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                ..RetryPolicy::default()
            });

        if let Some(authority) = &self.identity_authority {
            config = config.with_authority(authority.clone());
        }
        if let Some(tenant) = &self.default_tenant {
            config = config.with_default_tenant(tenant.clone());
        }
        if let Some(ms) = self.request_timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(ms));
        }
        config
    }
}
