//! Client error types.

use thiserror::Error;
use tonic::{Code, Status};

/// Errors returned by [`IdentityClient`](crate::IdentityClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service address could not be parsed into an endpoint.
    #[error("invalid identity service address {address:?}: {reason}")]
    InvalidAddress {
        /// Address as supplied by the caller.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Channel level failure (dial, TLS, HTTP/2).
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The remote call completed with a non-OK status.
    #[error("identity service returned {:?}: {}", .0.code(), .0.message())]
    Rpc(Box<Status>),

    /// The call succeeded but the service reported the session as invalid.
    #[error("invalid session")]
    InvalidSession,

    /// No session token was supplied.
    #[error("missing session token")]
    MissingToken,

    /// No tenant was supplied and no default tenant is configured.
    #[error("missing tenant slug")]
    MissingTenant,

    /// The client was closed.
    #[error("identity client is closed")]
    Closed,
}

impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        Self::Rpc(Box::new(status))
    }
}

impl ClientError {
    /// gRPC code that best describes this failure.
    pub fn code(&self) -> Code {
        match self {
            Self::Rpc(status) => status.code(),
            Self::InvalidSession | Self::MissingToken => Code::Unauthenticated,
            Self::Transport(_) | Self::Closed => Code::Unavailable,
            Self::InvalidAddress { .. } | Self::MissingTenant => Code::InvalidArgument,
        }
    }

    /// Whether the failure is caused by the service being unreachable or slow
    /// rather than by the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self.code(), Code::Unavailable | Code::DeadlineExceeded)
    }

    /// Returns the remote status, or synthesizes one for local failures.
    pub fn to_status(&self) -> Status {
        match self {
            Self::Rpc(status) => status.as_ref().clone(),
            other => Status::new(other.code(), other.to_string()),
        }
    }
}
