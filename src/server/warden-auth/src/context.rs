//! Request-scoped access to the authenticated user.

use std::convert::Infallible;
use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{request::Parts, Extensions};
use warden_client::User;

use crate::error::AuthError;
use crate::problem::Problem;
use crate::translate::RequestInfo;

/// The user resolved by the authentication middleware.
///
/// Stored in the request extensions, so it lives exactly as long as the
/// request. Handlers take it as an extractor:
///
/// ```ignore
/// async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
///     Json(user.as_ref().clone())
/// }
/// ```
///
/// Extracting `CurrentUser` on a route without the middleware rejects with
/// a 401 problem; use `Option<CurrentUser>` for routes where
/// authentication is optional.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<User>);

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Returns the authenticated user attached to a request, if any.
pub fn current_user(extensions: &Extensions) -> Option<&User> {
    extensions.get::<CurrentUser>().map(|current| current.0.as_ref())
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingCredentials.to_problem(&RequestInfo::from_parts(parts)))
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}
