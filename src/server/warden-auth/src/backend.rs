//! Session validation backend trait.

use async_trait::async_trait;
use warden_client::{ClientError, IdentityClient, User};

/// Resolves bearer tokens to users.
///
/// The middleware only depends on this trait, so services can put a cache
/// or a test double in front of the identity service.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validates `token` and returns the user it belongs to.
    ///
    /// # Returns
    ///
    /// * `Ok(User)` - If the session is valid
    /// * `Err(ClientError)` - If the session is invalid or the service failed
    async fn validate_session(&self, token: &str) -> Result<User, ClientError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl SessionValidator for IdentityClient {
    async fn validate_session(&self, token: &str) -> Result<User, ClientError> {
        IdentityClient::validate_session(self, token).await
    }

    fn name(&self) -> &'static str {
        "identity-service"
    }
}
