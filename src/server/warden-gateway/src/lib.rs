//! # Warden Gateway
//!
//! Reference HTTP service built on the identity SDK.
//!
//! ## Endpoints
//!
//! - `GET /healthz` - Liveness probe
//! - `POST /v1/auth/provider` - Exchange an external provider token for a session
//! - `POST /v1/auth/login` - Exchange email and password for a session
//! - `GET /v1/me` - Authenticated user (bearer token required)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod routes;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;
use warden_client::IdentityClient;

pub use config::GatewayConfig;
pub use routes::router;

/// Serves the gateway on `listener` until `shutdown` resolves, then closes
/// the identity client.
pub async fn run(
    listener: TcpListener,
    client: IdentityClient,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(client.clone());

    info!(address = %listener.local_addr()?, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    client.close().await;
    Ok(())
}
