//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;
use crate::retry::RetryPolicy;

/// Connection settings for [`IdentityClient`](crate::IdentityClient).
///
/// Deserializable so services can embed it in their own configuration
/// files; every field except `address` has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Service address: `host:port`, `http(s)://host:port` or
    /// `dns:///host:port`.
    pub address: String,

    /// Overrides the `:authority` sent to the server.
    #[serde(default)]
    pub authority: Option<String>,

    /// Tenant used when a call does not name one.
    #[serde(default)]
    pub default_tenant: Option<String>,

    /// How long construction waits for the first connection.
    #[serde(
        default = "default_connect_timeout",
        with = "duration_ms",
        rename = "connect_timeout_ms"
    )]
    pub connect_timeout: Duration,

    /// Deadline attached to every call.
    #[serde(default, with = "option_duration_ms", rename = "request_timeout_ms")]
    pub request_timeout: Option<Duration>,

    /// Interval between HTTP/2 keepalive pings.
    #[serde(
        default = "default_keepalive_interval",
        with = "duration_ms",
        rename = "keepalive_interval_ms"
    )]
    pub keepalive_interval: Duration,

    /// How long to wait for a keepalive ack before dropping the connection.
    #[serde(
        default = "default_keepalive_timeout",
        with = "duration_ms",
        rename = "keepalive_timeout_ms"
    )]
    pub keepalive_timeout: Duration,

    /// Retry policy for unary calls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_keepalive_timeout() -> Duration {
    Duration::from_secs(1)
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            authority: None,
            default_tenant: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: None,
            keepalive_interval: default_keepalive_interval(),
            keepalive_timeout: default_keepalive_timeout(),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the authority override.
    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    /// Sets the default tenant slug.
    #[must_use]
    pub fn with_default_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.default_tenant = Some(tenant.into());
        self
    }

    /// Sets the eager connection wait.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Normalizes `address` into an `http://` or `https://` URI.
    pub fn endpoint_uri(&self) -> Result<String, ClientError> {
        let invalid = |reason: &str| ClientError::InvalidAddress {
            address: self.address.clone(),
            reason: reason.to_string(),
        };

        let address = self.address.trim();
        if address.is_empty() {
            return Err(invalid("address is empty"));
        }

        let target = if let Some(rest) = address.strip_prefix("dns:///") {
            rest
        } else if let Some(rest) = address.strip_prefix("dns:") {
            // dns://resolver/host:port names a resolver we do not use.
            rest.rsplit('/').next().unwrap_or(rest)
        } else {
            address
        };

        let uri = match target.split_once("://") {
            Some(("http" | "https", _)) => target.to_string(),
            Some((scheme, _)) => return Err(invalid(&format!("unsupported scheme {scheme:?}"))),
            None => format!("http://{target}"),
        };

        let parsed: http::Uri = uri.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        match parsed.host() {
            Some(host) if !host.is_empty() => Ok(uri),
            _ => Err(invalid("missing host")),
        }
    }

    /// Authority override expressed as an origin URI, if configured.
    pub fn origin_uri(&self) -> Result<Option<http::Uri>, ClientError> {
        let Some(authority) = self.authority.as_deref() else {
            return Ok(None);
        };

        let scheme = if self.endpoint_uri()?.starts_with("https://") {
            "https"
        } else {
            "http"
        };
        let origin = if authority.contains("://") {
            authority.to_string()
        } else {
            format!("{scheme}://{authority}")
        };

        origin
            .parse()
            .map(Some)
            .map_err(|e: http::uri::InvalidUri| ClientError::InvalidAddress {
                address: authority.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Serde helpers for durations expressed in milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

pub(crate) mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
