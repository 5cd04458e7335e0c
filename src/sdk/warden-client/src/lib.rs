//! # Warden Client
//!
//! gRPC SDK for the centralized identity service.
//!
//! ## Operations
//!
//! - Provider-token authentication (token issued by an external provider)
//! - Credential authentication (email and password)
//! - Session validation (bearer token to [`User`])
//!
//! ## Connection model
//!
//! An [`IdentityClient`] owns a single HTTP/2 channel for its whole lifetime.
//! Clones share that channel, so one client can be handed to every request
//! handler in a service. Calls that fail with `Unavailable` are retried by
//! the client's [`RetryPolicy`] before the error is returned.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;

/// Generated protobuf messages and service stubs.
#[allow(missing_docs, clippy::all)]
pub mod pb {
    tonic::include_proto!("warden.identity.v1");
}

pub use client::IdentityClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use retry::RetryPolicy;
pub use types::{Credentials, Session, User};
