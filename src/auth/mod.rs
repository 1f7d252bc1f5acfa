//! Bearer-token authentication and the refresh cookie.
//!
//! Dual-token system: short-lived access tokens (15 min, stateless, sent as
//! `Authorization: Bearer`) and long-lived refresh tokens (30 days, HTTP-only
//! `refreshToken` cookie). Clients call the refresh endpoint when the access
//! token expires; nothing is refreshed implicitly.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{CookieConfig, REFRESH_COOKIE_NAME, SameSite, get_cookie};
pub use errors::{ApiAuthError, AuthErrorKind, NOT_AUTHENTICATED};
pub use extractors::{Auth, OwnedTask, bearer_token};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
