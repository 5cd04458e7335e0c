//! # Warden Auth
//!
//! HTTP side of the identity SDK.
//!
//! ## Components
//!
//! - [`require_identity`]: axum middleware that validates the bearer token
//!   with the identity service and attaches the user to the request
//! - [`CurrentUser`]: request-scoped accessor for the authenticated user
//! - [`to_problem`]: translation of gRPC failures into RFC 7807 problems
//!
//! ## Example
//!
//! ```ignore
//! use axum::{middleware, routing::get, Router};
//! use warden_auth::{require_identity, CurrentUser, IdentityAuth};
//!
//! async fn me(CurrentUser(user): CurrentUser) -> String {
//!     user.display_name.clone()
//! }
//!
//! let client = warden_client::IdentityClient::new("localhost:50051").await?;
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(middleware::from_fn_with_state(IdentityAuth::new(client), require_identity));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod context;
pub mod error;
pub mod middleware;
pub mod problem;
pub mod translate;

pub use backend::SessionValidator;
pub use context::{current_user, CurrentUser};
pub use error::AuthError;
pub use middleware::{bearer_token, require_identity, IdentityAuth};
pub use problem::Problem;
pub use translate::{
    client_error_problem, code_to_http_status, problem_type, to_problem, RequestInfo,
};
