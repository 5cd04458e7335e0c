//! HTTP routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tonic::Code;
use tower_http::trace::TraceLayer;
use tracing::debug;
use warden_auth::{
    client_error_problem, problem_type, require_identity, CurrentUser, IdentityAuth, Problem,
    RequestInfo,
};
use warden_client::{ClientError, Credentials, IdentityClient, Session, User};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    client: IdentityClient,
}

/// Body of `POST /v1/auth/provider`.
#[derive(Deserialize)]
pub struct ProviderLogin {
    /// Tenant slug; empty falls back to the configured default.
    #[serde(default)]
    pub tenant: String,
    /// Token issued by the external identity provider.
    pub provider_token: String,
}

/// Body of `POST /v1/auth/login`.
#[derive(Deserialize)]
pub struct PasswordLogin {
    /// Tenant slug; empty falls back to the configured default.
    #[serde(default)]
    pub tenant: String,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Builds the gateway router.
///
/// `/v1/me` sits behind [`require_identity`]; the login routes and the
/// health probe are public.
pub fn router(client: IdentityClient) -> Router {
    let auth = IdentityAuth::new(client.clone());

    let protected = Router::new()
        .route("/v1/me", get(me))
        .route_layer(from_fn_with_state(auth, require_identity));

    Router::new()
        .route("/healthz", get(health))
        .route("/v1/auth/provider", post(provider_login))
        .route("/v1/auth/login", post(password_login))
        .merge(protected)
        .with_state(AppState { client })
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn provider_login(
    State(state): State<AppState>,
    info: RequestInfo,
    body: Result<Json<ProviderLogin>, JsonRejection>,
) -> Result<Json<Session>, Problem> {
    let Json(body) = body.map_err(|e| malformed_body(&info, &e))?;
    let credentials = Credentials::ProviderToken(body.provider_token);
    authenticate(&state, &info, &body.tenant, credentials).await
}

async fn password_login(
    State(state): State<AppState>,
    info: RequestInfo,
    body: Result<Json<PasswordLogin>, JsonRejection>,
) -> Result<Json<Session>, Problem> {
    let Json(body) = body.map_err(|e| malformed_body(&info, &e))?;
    let credentials = Credentials::Password {
        email: body.email,
        password: body.password,
    };
    authenticate(&state, &info, &body.tenant, credentials).await
}

async fn authenticate(
    state: &AppState,
    info: &RequestInfo,
    tenant: &str,
    credentials: Credentials,
) -> Result<Json<Session>, Problem> {
    state
        .client
        .authenticate(tenant, credentials)
        .await
        .map(Json)
        .map_err(|e| reject(info, &e))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(User::clone(&user))
}

fn reject(info: &RequestInfo, error: &ClientError) -> Problem {
    debug!(error = %error, "Authentication rejected");
    client_error_problem(info, error)
}

fn malformed_body(info: &RequestInfo, rejection: &JsonRejection) -> Problem {
    let status = rejection.status();
    Problem::new(status)
        .with_title(status.canonical_reason().unwrap_or("Bad Request"))
        .with_detail(rejection.body_text())
        .with_type(problem_type(Code::InvalidArgument, info))
        .with_instance(info.instance())
}
