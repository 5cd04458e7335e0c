//! Transport client for the identity service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Request;
use tracing::{debug, info, instrument, warn};

use crate::pb::identity_service_client::IdentityServiceClient;
use crate::{pb, ClientConfig, ClientError, Credentials, RetryPolicy, Session, User};

/// Client for the identity service.
///
/// Cheap to clone; all clones share one channel. The channel multiplexes
/// concurrent calls, so a single client can serve every in-flight request.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    /// `None` once [`IdentityClient::close`] has run.
    channel: Arc<RwLock<Option<Channel>>>,
    address: Arc<str>,
    default_tenant: Option<Arc<str>>,
    request_timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl IdentityClient {
    /// Connects to `address` with default settings.
    pub async fn new(address: impl Into<String>) -> Result<Self, ClientError> {
        Self::connect(ClientConfig::new(address)).await
    }

    /// Builds the channel and starts connecting.
    ///
    /// Waits up to `connect_timeout` for the first connection. If the
    /// service is not reachable in that window the client is still
    /// returned and keeps connecting in the background. Only an address
    /// that cannot be turned into an endpoint is an error.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let uri = config.endpoint_uri()?;
        let origin = config.origin_uri()?;

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ClientError::InvalidAddress {
                address: config.address.clone(),
                reason: e.to_string(),
            })?
            .connect_timeout(config.connect_timeout)
            .http2_keep_alive_interval(config.keepalive_interval)
            .keep_alive_timeout(config.keepalive_timeout)
            .keep_alive_while_idle(true);

        if let Some(timeout) = config.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if uri.starts_with("https://") {
            let mut tls = ClientTlsConfig::new().with_native_roots();
            if let Some(host) = origin.as_ref().and_then(|o| o.host()) {
                tls = tls.domain_name(host);
            }
            endpoint = endpoint.tls_config(tls)?;
        }
        if let Some(origin) = origin {
            endpoint = endpoint.origin(origin);
        }

        info!(address = %config.address, "Connecting to identity service");

        let channel = match tokio::time::timeout(config.connect_timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => {
                info!("Identity service connection established");
                channel
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Identity service not ready yet, proceeding in background");
                endpoint.connect_lazy()
            },
            Err(_) => {
                warn!(
                    timeout_ms = config.connect_timeout.as_millis() as u64,
                    "Identity service not ready yet, proceeding in background"
                );
                endpoint.connect_lazy()
            },
        };

        Ok(Self {
            channel: Arc::new(RwLock::new(Some(channel))),
            address: config.address.into(),
            default_tenant: config
                .default_tenant
                .filter(|t| !t.is_empty())
                .map(Into::into),
            request_timeout: config.request_timeout,
            retry: config.retry,
        })
    }

    /// Address the client was built with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Tenant used when a call passes an empty tenant slug.
    pub fn default_tenant(&self) -> Option<&str> {
        self.default_tenant.as_deref()
    }

    /// Authenticates with a token issued by an external identity provider.
    ///
    /// This is what a frontend calls after completing the provider's
    /// login flow.
    pub async fn authenticate_with_provider_token(
        &self,
        tenant: &str,
        provider_token: &str,
    ) -> Result<Session, ClientError> {
        self.authenticate(tenant, Credentials::ProviderToken(provider_token.to_string()))
            .await
    }

    /// Authenticates with an email and password.
    pub async fn authenticate_with_credentials(
        &self,
        tenant: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        self.authenticate(
            tenant,
            Credentials::Password {
                email: email.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    /// Calls `Authenticate` for `tenant`.
    ///
    /// An empty `tenant` falls back to the configured default tenant.
    #[instrument(level = "debug", skip(self, credentials), fields(method = credentials.kind()))]
    pub async fn authenticate(
        &self,
        tenant: &str,
        credentials: Credentials,
    ) -> Result<Session, ClientError> {
        let tenant_slug = self.resolve_tenant(tenant)?;
        let stub = self.stub().await?;
        let message = pb::AuthenticateRequest {
            tenant_slug,
            credentials: Some(credentials.into()),
        };

        let response = self
            .retry
            .run("authenticate", || {
                let mut stub = stub.clone();
                let request = self.request(message.clone());
                async move { stub.authenticate(request).await }
            })
            .await?;

        debug!("Authentication succeeded");
        Ok(Session::from(response.into_inner()))
    }

    /// Resolves a session token to its user.
    ///
    /// Fails with [`ClientError::InvalidSession`] when the service answers
    /// but does not vouch for the token.
    #[instrument(level = "debug", skip_all)]
    pub async fn validate_session(&self, token: &str) -> Result<User, ClientError> {
        if token.is_empty() {
            return Err(ClientError::MissingToken);
        }

        let stub = self.stub().await?;
        let message = pb::ValidateSessionRequest {
            token: token.to_string(),
        };

        let response = self
            .retry
            .run("validate_session", || {
                let mut stub = stub.clone();
                let request = self.request(message.clone());
                async move { stub.validate_session(request).await }
            })
            .await?
            .into_inner();

        if !response.valid {
            debug!("Session rejected by identity service");
            return Err(ClientError::InvalidSession);
        }

        let user = response.user.ok_or(ClientError::InvalidSession)?;
        debug!(user_id = %user.id, tenant_id = %user.tenant_id, "Session validated");
        Ok(User::from(user))
    }

    /// Releases the channel.
    ///
    /// Safe to call more than once. Calls made afterwards fail with
    /// [`ClientError::Closed`]; calls already in flight finish normally.
    pub async fn close(&self) {
        if self.channel.write().await.take().is_some() {
            info!(address = %self.address, "Identity client closed");
        }
    }

    /// Whether [`IdentityClient::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.channel.read().await.is_none()
    }

    async fn stub(&self) -> Result<IdentityServiceClient<Channel>, ClientError> {
        self.channel
            .read()
            .await
            .clone()
            .map(IdentityServiceClient::new)
            .ok_or(ClientError::Closed)
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(timeout) = self.request_timeout {
            request.set_timeout(timeout);
        }
        request
    }

    fn resolve_tenant(&self, tenant: &str) -> Result<String, ClientError> {
        if !tenant.is_empty() {
            return Ok(tenant.to_string());
        }
        self.default_tenant
            .as_deref()
            .map(str::to_string)
            .ok_or(ClientError::MissingTenant)
    }
}
