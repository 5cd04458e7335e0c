//! Domain types returned by the identity service.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pb;

/// Authenticated end user.
///
/// Owned by the identity service. Services should only keep it for the
/// lifetime of the request that resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: String,

    /// Email address.
    pub email: String,

    /// Tenant the user belongs to.
    pub tenant_id: String,

    /// Human readable name.
    pub display_name: String,

    /// Free-form attributes attached by the identity service.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Creation timestamp (Unix seconds).
    pub created_at: Option<i64>,

    /// Last update timestamp (Unix seconds).
    pub updated_at: Option<i64>,
}

impl From<pb::User> for User {
    fn from(user: pb::User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            tenant_id: user.tenant_id,
            display_name: user.display_name,
            metadata: user.metadata,
            created_at: user.created_at.map(|ts| ts.seconds),
            updated_at: user.updated_at.map(|ts| ts.seconds),
        }
    }
}

impl From<User> for pb::User {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            tenant_id: user.tenant_id,
            display_name: user.display_name,
            metadata: user.metadata,
            created_at: user.created_at.map(timestamp),
            updated_at: user.updated_at.map(timestamp),
        }
    }
}

fn timestamp(seconds: i64) -> prost_types::Timestamp {
    prost_types::Timestamp { seconds, nanos: 0 }
}

/// Credentials presented to `Authenticate`.
///
/// The two variants are mutually exclusive on the wire.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Token obtained from an external identity provider.
    ProviderToken(String),
    /// Email and password pair.
    Password {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },
}

impl Credentials {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderToken(_) => "provider_token",
            Self::Password { .. } => "password",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderToken(_) => f.debug_tuple("ProviderToken").field(&"<redacted>").finish(),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl From<Credentials> for pb::authenticate_request::Credentials {
    fn from(credentials: Credentials) -> Self {
        match credentials {
            Credentials::ProviderToken(token) => Self::ProviderToken(token),
            Credentials::Password { email, password } => {
                Self::Credential(pb::UserCredentials { email, password })
            },
        }
    }
}

/// Result of a successful authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token to present on subsequent requests.
    pub access_token: String,

    /// Token used to obtain a fresh access token, if issued.
    pub refresh_token: Option<String>,

    /// Access token expiry (Unix seconds).
    pub expires_at: Option<i64>,

    /// The authenticated user, when the service includes it.
    pub user: Option<User>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

impl From<pb::AuthenticateResponse> for Session {
    fn from(response: pb::AuthenticateResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: Some(response.refresh_token).filter(|t| !t.is_empty()),
            expires_at: response.expires_at.map(|ts| ts.seconds),
            user: response.user.map(User::from),
        }
    }
}
