//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with two independent secrets, so a
//! leaked access secret cannot be used to mint refresh tokens (and vice versa).
//! Both carry the same sanitized user claim.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::User;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, replayed as a bearer credential
    Access,
    /// Long-lived refresh token, transported only in the refresh cookie
    Refresh,
}

/// Sanitized user data embedded in every token and returned to clients.
///
/// Never contains the password hash or the activation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserClaim {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_activated: bool,
}

impl From<&User> for UserClaim {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            is_activated: user.is_activated,
        }
    }
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Sanitized user claim
    pub user: UserClaim,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Unique token id, keeps two tokens minted in the same second distinct
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Default refresh token duration: 30 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Signing and verification keys derived from a single secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// An access/refresh pair issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Sign `claim` as a token of the given type that expires `ttl_secs` from now.
pub fn sign(
    claim: &UserClaim,
    token_type: TokenType,
    keys: &TokenKeys,
    ttl_secs: u64,
) -> Result<SignedToken, TokenError> {
    let now = now_secs()?;
    let exp = now + ttl_secs;

    let claims = TokenClaims {
        user: claim.clone(),
        token_type,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp,
    };

    let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding_key)
        .map_err(TokenError::Encoding)?;

    Ok(SignedToken {
        token,
        expires_at: exp,
        duration: ttl_secs,
    })
}

/// Verify signature and expiry of `token`, and check that it has the expected type.
pub fn verify(
    token: &str,
    token_type: TokenType,
    keys: &TokenKeys,
) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = jsonwebtoken::decode::<TokenClaims>(token, &keys.decoding_key, &validation)
        .map_err(TokenError::from_decode)?;

    if token_data.claims.token_type != token_type {
        return Err(TokenError::WrongTokenType);
    }

    Ok(token_data.claims)
}

fn now_secs() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::Time)?
        .as_secs())
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    access: TokenKeys,
    refresh: TokenKeys,
    access_ttl: u64,
    refresh_ttl: u64,
}

impl JwtConfig {
    /// Create a JWT configuration with the default token lifetimes.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_ttls(
            access_secret,
            refresh_secret,
            ACCESS_TOKEN_DURATION_SECS,
            REFRESH_TOKEN_DURATION_SECS,
        )
    }

    pub fn with_ttls(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: u64,
        refresh_ttl: u64,
    ) -> Self {
        Self {
            access: TokenKeys::new(access_secret),
            refresh: TokenKeys::new(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Generate a short-lived access token.
    pub fn generate_access_token(&self, claim: &UserClaim) -> Result<SignedToken, TokenError> {
        sign(claim, TokenType::Access, &self.access, self.access_ttl)
    }

    /// Generate a long-lived refresh token.
    pub fn generate_refresh_token(&self, claim: &UserClaim) -> Result<SignedToken, TokenError> {
        sign(claim, TokenType::Refresh, &self.refresh, self.refresh_ttl)
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(token, TokenType::Access, &self.access)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        verify(token, TokenType::Refresh, &self.refresh)
    }

    /// Issue a fresh access/refresh pair for a user. No I/O.
    pub fn issue_pair(&self, claim: &UserClaim) -> Result<TokenPair, TokenError> {
        let access = self.generate_access_token(claim)?;
        let refresh = self.generate_refresh_token(claim)?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is malformed: {0}")]
    Malformed(String),
    /// e.g. a refresh token presented as an access token
    #[error("wrong token type")]
    WrongTokenType,
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Time,
}

impl TokenError {
    fn from_decode(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}
