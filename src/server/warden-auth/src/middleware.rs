//! Bearer token authentication middleware.
//!
//! Every request goes through two gates:
//!
//! 1. an `Authorization: Bearer <token>` header must be present;
//! 2. the identity service must vouch for the token.
//!
//! Failing either gate answers with a problem response and the inner
//! handler never runs. On success the user is attached to the request as
//! [`CurrentUser`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::backend::SessionValidator;
use crate::context::CurrentUser;
use crate::error::AuthError;
use crate::translate::RequestInfo;

/// Shared state for [`require_identity`].
///
/// # Example
///
/// ```ignore
/// let auth = IdentityAuth::new(client);
/// let app = Router::new()
///     .route("/v1/me", get(me))
///     .layer(axum::middleware::from_fn_with_state(auth, require_identity));
/// ```
#[derive(Clone)]
pub struct IdentityAuth {
    validator: Arc<dyn SessionValidator>,
}

impl IdentityAuth {
    /// Creates the middleware state around a validator.
    pub fn new(validator: impl SessionValidator + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }

    /// Creates the middleware state around a shared validator.
    pub fn from_shared(validator: Arc<dyn SessionValidator>) -> Self {
        Self { validator }
    }
}

impl std::fmt::Debug for IdentityAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityAuth")
            .field("validator", &self.validator.name())
            .finish()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticates the request against the identity service.
///
/// Use with [`axum::middleware::from_fn_with_state`].
pub async fn require_identity(
    State(auth): State<IdentityAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    let info = RequestInfo::from_request(&request);

    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        debug!(path = %info.path_and_query, "Request without bearer token");
        return AuthError::MissingCredentials.into_response_for(&info);
    };

    match auth.validator.validate_session(&token).await {
        Ok(user) => {
            debug!(user_id = %user.id, tenant_id = %user.tenant_id, "Request authenticated");
            request.extensions_mut().insert(CurrentUser(Arc::new(user)));
            next.run(request).await
        },
        Err(e) => {
            let error = AuthError::from_client_error(&e);
            if matches!(error, AuthError::ServiceUnavailable { .. }) {
                warn!(backend = auth.validator.name(), error = %e, "Session validation unavailable");
            } else {
                debug!(backend = auth.validator.name(), error = %e, "Session rejected");
            }
            error.into_response_for(&info)
        },
    }
}
