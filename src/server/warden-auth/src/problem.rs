//! RFC 7807 problem details.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Media type of a serialized [`Problem`].
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Members defined by RFC 7807; extensions may not shadow them.
const RESERVED_MEMBERS: [&str; 5] = ["type", "title", "status", "detail", "instance"];

/// Machine-readable error body.
///
/// Extensions are serialized as top-level members next to the standard ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// URI identifying the problem type.
    #[serde(rename = "type", default = "about_blank")]
    pub problem_type: String,

    /// Short summary of the problem type.
    #[serde(default)]
    pub title: String,

    /// HTTP status code.
    pub status: u16,

    /// Explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,

    /// URI of the request that produced the problem.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,

    /// Additional named members.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

fn about_blank() -> String {
    "about:blank".to_string()
}

impl Problem {
    /// Creates a problem for `status`, titled with its canonical reason.
    pub fn new(status: StatusCode) -> Self {
        Self {
            problem_type: about_blank(),
            title: status.canonical_reason().unwrap_or("Unknown Error").to_string(),
            status: status.as_u16(),
            detail: String::new(),
            instance: String::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Sets the type URI.
    #[must_use]
    pub fn with_type(mut self, problem_type: impl Into<String>) -> Self {
        self.problem_type = problem_type.into();
        self
    }

    /// Sets the instance URI.
    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    /// Adds an extension member. Names of standard members are ignored.
    #[must_use]
    pub fn with_extension(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if RESERVED_MEMBERS.contains(&name.as_str()) {
            debug!(member = %name, "Ignoring extension that shadows a standard member");
            return self;
        }
        self.extensions.insert(name, value.into());
        self
    }

    /// Returns an extension member by name.
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    /// HTTP status as a [`StatusCode`]; out of range values become 500.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match serde_json::to_vec(&self) {
            Ok(body) => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON))],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize problem");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            },
        }
    }
}
