//! Caller identity supplied by an upstream authentication layer.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use boxoffice_admission::RateIdentity;
use boxoffice_core::types::UserId;

/// Request extension inserted by whatever authenticates the caller.
///
/// BoxOffice does not issue or verify credentials itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// The authenticated user, if any.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl MaybeUser {
    /// Rate-limit identity: the user when known, otherwise the address.
    pub fn rate_identity(&self, client_addr: &str) -> RateIdentity {
        match &self.0 {
            Some(user) => RateIdentity::User(user.user_id),
            None => RateIdentity::Address(client_addr.to_string()),
        }
    }

    /// Claimant recorded with a fingerprint claim.
    pub fn claimant(&self) -> Option<String> {
        self.0.as_ref().map(|user| user.user_id.to_string())
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthenticatedUser>().cloned()))
    }
}
