//! Authentication user types.

use crate::jwt::UserClaim;

/// Authenticated user information extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User claim carried by the access token
    pub claims: UserClaim,
}

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.claims.id
    }
}
