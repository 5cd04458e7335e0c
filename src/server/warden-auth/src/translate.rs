//! Translation of identity service failures into HTTP problems.
//!
//! The status mapping is a fixed table. Enrichment from the status payload
//! is best effort: anything that does not parse cleanly is left as the raw
//! message.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap, Request, StatusCode, Uri};
use serde_json::{Map, Value};
use tonic::{Code, Status};
use tonic_types::StatusExt;
use warden_client::ClientError;

use crate::problem::Problem;

/// Detail used when an embedded JSON payload is the whole message.
const DEFAULT_UPSTREAM_DETAIL: &str = "The identity provider returned an error";

/// Header set by proxies that terminate TLS.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request attributes needed to build problem URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// `http` or `https`.
    pub scheme: String,
    /// Host (and port) the client addressed.
    pub host: String,
    /// Path and query of the request.
    pub path_and_query: String,
}

impl RequestInfo {
    /// Extracts request attributes from a URI and its headers.
    pub fn new(uri: &Uri, headers: &HeaderMap) -> Self {
        let scheme = headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_ascii_lowercase())
            .filter(|v| v == "http" || v == "https")
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Self {
            scheme,
            host,
            path_and_query,
        }
    }

    /// Extracts request attributes from request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(&parts.uri, &parts.headers)
    }

    /// Extracts request attributes from a full request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(request.uri(), request.headers())
    }

    /// Absolute URI of the request, used as the problem instance.
    pub fn instance(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path_and_query)
    }
}

impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Maps a gRPC status code to its HTTP status.
pub fn code_to_http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::FailedPrecondition => StatusCode::UNPROCESSABLE_ENTITY,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Problem type URI for a gRPC status code.
pub fn problem_type(code: Code, request: &RequestInfo) -> String {
    let slug = match code {
        Code::Unauthenticated => "invalid-session",
        Code::InvalidArgument => "validation-failed",
        Code::DeadlineExceeded => "gateway-timeout",
        Code::Unavailable => "service-unavailable",
        Code::FailedPrecondition => "service-error",
        _ => "internal-error",
    };
    format!("{}://{}/errors/{}", request.scheme, request.host, slug)
}

/// Canonical name of a gRPC status code, used as problem title.
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "Canceled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

/// Builds a problem from a failed remote call.
///
/// Besides the status mapping this folds two kinds of upstream payload
/// into extensions:
///
/// - a JSON object embedded in the message (`"prefix: {...}"`), whose
///   members become extensions while the prefix becomes the detail;
/// - `google.rpc.BadRequest` details, where every field violation becomes
///   a `field -> description` extension.
pub fn to_problem(request: &RequestInfo, status: &Status) -> Problem {
    let code = status.code();
    let message = status.message();

    let mut problem = Problem::new(code_to_http_status(code))
        .with_title(code_name(code))
        .with_detail(message)
        .with_type(problem_type(code, request))
        .with_instance(request.instance());

    if let Some((detail, members)) = split_embedded_json(message) {
        problem.detail = detail;
        for (name, value) in members {
            problem = problem.with_extension(name, value);
        }
    }

    if let Some(bad_request) = status.get_details_bad_request() {
        problem.problem_type = problem_type(Code::InvalidArgument, request);
        for violation in bad_request.field_violations {
            problem = problem.with_extension(violation.field, violation.description);
        }
    }

    problem
}

/// Builds a problem from any client failure.
pub fn client_error_problem(request: &RequestInfo, error: &ClientError) -> Problem {
    to_problem(request, &error.to_status())
}

/// Splits `"prefix: {json}"` into the trimmed prefix and the JSON members.
///
/// Returns `None` unless everything from the first `{` parses as a JSON
/// object.
fn split_embedded_json(message: &str) -> Option<(String, Map<String, Value>)> {
    let start = message.find('{')?;
    let members: Map<String, Value> = serde_json::from_str(&message[start..]).ok()?;

    let prefix = message[..start].trim_matches(|c: char| c == ':' || c.is_whitespace());
    let detail = if prefix.is_empty() {
        DEFAULT_UPSTREAM_DETAIL.to_string()
    } else {
        prefix.to_string()
    };
    Some((detail, members))
}
