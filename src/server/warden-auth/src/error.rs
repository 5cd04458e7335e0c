//! Authentication error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tonic::Code;
use warden_client::ClientError;

use crate::problem::Problem;
use crate::translate::{problem_type, RequestInfo};

/// Title of problems for rejected requests.
pub const NOT_AUTHORIZED_TITLE: &str = "Identity Not Authorized";

/// Title of problems raised when the identity service cannot answer.
pub const UNAVAILABLE_TITLE: &str = "Identity Service Unavailable";

/// Seconds clients should wait before retrying after an outage.
const RETRY_AFTER_SECS: &str = "1";

/// Errors that stop a request at the authentication gate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer` header was sent.
    #[error("missing authentication token")]
    MissingCredentials,

    /// The identity service rejected the token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The identity service could not be reached or did not answer in time.
    #[error("identity service unavailable: {message}")]
    ServiceUnavailable {
        /// `Unavailable` or `DeadlineExceeded`.
        code: Code,
        /// Failure description.
        message: String,
    },
}

impl AuthError {
    /// Classifies a validation failure.
    ///
    /// Outages are kept apart from rejections so clients know whether
    /// retrying with the same token can help.
    pub fn from_client_error(error: &ClientError) -> Self {
        if error.is_transient() {
            Self::ServiceUnavailable {
                code: error.code(),
                message: error.to_string(),
            }
        } else {
            Self::InvalidToken(error.to_string())
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable {
                code: Code::DeadlineExceeded,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Renders the problem body for `request`.
    pub fn to_problem(&self, request: &RequestInfo) -> Problem {
        let problem = Problem::new(self.status()).with_instance(request.instance());
        match self {
            Self::MissingCredentials => problem
                .with_title(NOT_AUTHORIZED_TITLE)
                .with_detail("Missing auth header")
                .with_type(problem_type(Code::Unauthenticated, request))
                .with_extension("error", "Provide the authorization header"),
            Self::InvalidToken(message) => problem
                .with_title(NOT_AUTHORIZED_TITLE)
                .with_detail("Invalid Token")
                .with_type(problem_type(Code::Unauthenticated, request))
                .with_extension("error", message.as_str()),
            Self::ServiceUnavailable { code, message } => problem
                .with_title(UNAVAILABLE_TITLE)
                .with_detail("The identity service could not validate the session")
                .with_type(problem_type(*code, request))
                .with_extension("error", message.as_str()),
        }
    }

    /// Renders the full response for `request`.
    pub fn into_response_for(self, request: &RequestInfo) -> Response {
        let mut response = self.to_problem(request).into_response();
        if matches!(self, Self::ServiceUnavailable { .. }) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
