//! Refresh cookie building and cookie header parsing.

use axum::http::header;

use crate::jwt::REFRESH_TOKEN_DURATION_SECS;

/// Cookie name for the refresh token (long-lived, HTTP-only).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// `SameSite` attribute of the refresh cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the refresh cookie. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age_secs: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: SameSite::Strict,
            path: "/".to_string(),
            max_age_secs: REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

impl CookieConfig {
    /// Cookie config for a deployment: secure when served over https,
    /// and living as long as the refresh token does.
    pub fn new(secure: bool, max_age_secs: u64) -> Self {
        Self {
            secure,
            max_age_secs,
            ..Self::default()
        }
    }

    /// `Set-Cookie` value carrying a refresh token.
    pub fn refresh_cookie(&self, token: &str) -> String {
        self.build(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that removes the refresh cookie.
    pub fn clear_refresh_cookie(&self) -> String {
        self.build("", 0)
    }

    fn build(&self, value: &str, max_age: u64) -> String {
        // Browsers reject SameSite=None without Secure
        let secure = if self.secure || self.same_site == SameSite::None {
            "; Secure"
        } else {
            ""
        };
        format!(
            "{}={}; HttpOnly; SameSite={}; Path={}; Max-Age={}{}",
            REFRESH_COOKIE_NAME,
            value,
            self.same_site.as_str(),
            self.path,
            max_age,
            secure
        )
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}
