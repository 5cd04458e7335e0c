//! Integration tests for the identity SDK and gateway.
//!
//! Every test runs against an in-process identity service bound to an
//! ephemeral port, so nothing has to be built or started beforehand.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Code, Request, Status};
use tonic_types::{ErrorDetails, FieldViolation, StatusExt};
use warden_client::pb::identity_service_server::{IdentityService, IdentityServiceServer};
use warden_client::pb::{self, authenticate_request::Credentials as PbCredentials};
use warden_client::{ClientConfig, IdentityClient, RetryPolicy};

// ============================================================================
// Fixtures
// ============================================================================

/// Tenant the mock service knows about.
pub const TENANT: &str = "acme";

/// Provider token the mock service accepts.
pub const PROVIDER_TOKEN: &str = "provider-ok";

/// Password the mock service accepts for every known email.
pub const PASSWORD: &str = "correct horse";

/// Session token that resolves to Alice.
pub const ALICE_TOKEN: &str = "session-alice";

/// Session token the service answers with `valid = false`.
pub const EXPIRED_TOKEN: &str = "session-expired";

/// Session token the service calls valid without naming a user.
pub const ORPHAN_TOKEN: &str = "session-orphan";

/// Session token that makes the service fail internally.
pub const BROKEN_TOKEN: &str = "session-broken";

/// Provider token whose rejection embeds a JSON object in the message.
pub const CONFLICT_PROVIDER_TOKEN: &str = "provider-conflict";

/// The user behind [`ALICE_TOKEN`].
pub fn alice() -> pb::User {
    user("user-alice", "alice@example.com")
}

fn user(id: &str, email: &str) -> pb::User {
    pb::User {
        id: id.to_string(),
        email: email.to_string(),
        tenant_id: TENANT.to_string(),
        display_name: id.trim_start_matches("user-").to_string(),
        metadata: BTreeMap::from([("plan".to_string(), "pro".to_string())]),
        created_at: Some(prost_timestamp(1_700_000_000)),
        updated_at: None,
    }
}

fn prost_timestamp(seconds: i64) -> prost_types::Timestamp {
    prost_types::Timestamp { seconds, nanos: 0 }
}

// ============================================================================
// Mock Identity Service
// ============================================================================

/// Scripted identity service.
///
/// Tokens of the form `token-<n>` resolve to user `user-<n>`, which lets
/// concurrency tests tell callers apart.
#[derive(Debug, Default)]
pub struct MockIdentity {
    /// Calls answered so far, failures included.
    pub calls: AtomicUsize,
    /// Calls left to fail with `Unavailable` before answering normally.
    pub outages: AtomicU32,
    /// Tenant slug of the most recent `Authenticate` call.
    pub last_tenant: Mutex<Option<String>>,
}

impl MockIdentity {
    /// A service that fails the next `outages` calls with `Unavailable`.
    pub fn flaky(outages: u32) -> Self {
        Self {
            outages: AtomicU32::new(outages),
            ..Self::default()
        }
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tenant slug of the most recent `Authenticate` call.
    pub fn last_tenant(&self) -> Option<String> {
        self.last_tenant.lock().unwrap().clone()
    }

    fn admit(&self) -> Result<(), Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(Status::unavailable("identity backend is restarting"));
        }
        Ok(())
    }

    fn session(user: pb::User) -> pb::AuthenticateResponse {
        pb::AuthenticateResponse {
            access_token: format!("access-{}", user.id),
            refresh_token: format!("refresh-{}", user.id),
            expires_at: Some(prost_timestamp(1_900_000_000)),
            user: Some(user),
        }
    }
}

#[tonic::async_trait]
impl IdentityService for MockIdentity {
    async fn authenticate(
        &self,
        request: Request<pb::AuthenticateRequest>,
    ) -> Result<tonic::Response<pb::AuthenticateResponse>, Status> {
        self.admit()?;
        let req = request.into_inner();
        *self.last_tenant.lock().unwrap() = Some(req.tenant_slug.clone());

        if req.tenant_slug != TENANT {
            return Err(Status::not_found(format!("tenant {} not found", req.tenant_slug)));
        }

        match req.credentials {
            Some(PbCredentials::ProviderToken(token)) if token == PROVIDER_TOKEN => {
                Ok(tonic::Response::new(Self::session(alice())))
            },
            Some(PbCredentials::ProviderToken(token)) if token == CONFLICT_PROVIDER_TOKEN => {
                Err(Status::already_exists(
                    r#"account already linked: {"email":"alice@example.com"}"#,
                ))
            },
            Some(PbCredentials::ProviderToken(_)) => {
                Err(Status::unauthenticated("provider token rejected"))
            },
            Some(PbCredentials::Credential(credential)) if credential.email.is_empty() => {
                Err(Status::with_error_details(
                    Code::InvalidArgument,
                    "invalid credentials",
                    ErrorDetails::with_bad_request(vec![FieldViolation::new(
                        "email",
                        "must not be empty",
                    )]),
                ))
            },
            Some(PbCredentials::Credential(credential)) if credential.password == PASSWORD => {
                let id = format!("user-{}", credential.email.split('@').next().unwrap_or("x"));
                Ok(tonic::Response::new(Self::session(user(&id, &credential.email))))
            },
            Some(PbCredentials::Credential(_)) => {
                Err(Status::unauthenticated("invalid email or password"))
            },
            None => Err(Status::invalid_argument("credentials are required")),
        }
    }

    async fn validate_session(
        &self,
        request: Request<pb::ValidateSessionRequest>,
    ) -> Result<tonic::Response<pb::ValidateSessionResponse>, Status> {
        self.admit()?;
        let token = request.into_inner().token;

        let (valid, user) = match token.as_str() {
            ALICE_TOKEN => (true, Some(alice())),
            EXPIRED_TOKEN => (false, None),
            ORPHAN_TOKEN => (true, None),
            BROKEN_TOKEN => return Err(Status::internal("session store offline")),
            other => match other.strip_prefix("token-") {
                Some(n) => (true, Some(user(&format!("user-{n}"), &format!("{n}@example.com")))),
                None => return Err(Status::unauthenticated("session not found")),
            },
        };

        Ok(tonic::Response::new(pb::ValidateSessionResponse { valid, user }))
    }
}

/// Mock identity service running on an ephemeral port.
pub struct TestIdentityService {
    /// Address the service listens on.
    pub addr: SocketAddr,
    /// Scripted behavior, shared with the running server.
    pub mock: Arc<MockIdentity>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl TestIdentityService {
    /// Starts a service with default behavior.
    pub async fn start() -> Result<Self> {
        Self::start_with(MockIdentity::default()).await
    }

    /// Starts a service with the given behavior.
    pub async fn start_with(mock: MockIdentity) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind identity service")?;
        let addr = listener.local_addr()?;
        let mock = Arc::new(mock);
        let (tx, rx) = oneshot::channel();

        let service = IdentityServiceServer::from_arc(mock.clone());
        let handle = tokio::spawn(
            Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    let _ = rx.await;
                }),
        );

        Ok(Self {
            addr,
            mock,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Client settings pointing at this service, without retries.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.to_string()).with_retry(RetryPolicy::disabled())
    }

    /// Connected client with default tenant [`TENANT`] and no retries.
    pub async fn client(&self) -> Result<IdentityClient> {
        let client = IdentityClient::connect(self.config().with_default_tenant(TENANT)).await?;
        Ok(client)
    }

    /// Stops the service and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for TestIdentityService {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Address nothing listens on.
pub async fn unused_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?)
}

// ============================================================================
// Test Gateway
// ============================================================================

/// Gateway running in-process against a [`TestIdentityService`].
pub struct TestGateway {
    /// Base URL of the gateway.
    pub base_url: String,
    client: Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    /// Starts a gateway in front of `identity`.
    pub async fn start(identity: IdentityClient) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind gateway")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(warden_gateway::run(listener, identity, async move {
            let _ = rx.await;
        }));

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url,
            client,
            shutdown: Some(tx),
            handle,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET path`, with an optional raw Authorization header.
    pub async fn get(&self, path: &str, authorization: Option<&str>) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(value) = authorization {
            req = req.header(reqwest::header::AUTHORIZATION, value);
        }
        Ok(req.send().await?)
    }

    /// `POST path` with a JSON body.
    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// `POST path` with a raw JSON-typed body.
    pub async fn post_raw(&self, path: &str, body: &'static str) -> Result<Response> {
        Ok(self
            .client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?)
    }

    /// Shuts the gateway down; the identity client is closed on the way out.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await??;
        Ok(())
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
