//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::CookieConfig;
use crate::db::Database;
use crate::jwt::{ACCESS_TOKEN_DURATION_SECS, REFRESH_TOKEN_DURATION_SECS};
use crate::mail::{DEFAULT_FROM_NAME, LogMailer, Mailer, SmtpConfig, SmtpMailer};
use crate::password::DEFAULT_BCRYPT_COST;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

pub const ACCESS_SECRET_ENV: &str = "SECRET_ACCESS_TOKEN";
pub const REFRESH_SECRET_ENV: &str = "SECRET_REFRESH_TOKEN";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskgate",
    about = "Task API with email-activated accounts and JWT sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "4000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE", default_value = "taskgate.db")]
    pub database: String,

    /// Client origin, used in activation links. https enables Secure cookies
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:5173")]
    pub client_url: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = ACCESS_TOKEN_DURATION_SECS)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = REFRESH_TOKEN_DURATION_SECS)]
    pub refresh_token_ttl: u64,

    /// Directory for uploaded avatars (created if missing)
    #[arg(long, env = "UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Path to file containing the access token secret. Prefer SECRET_ACCESS_TOKEN
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer SECRET_REFRESH_TOKEN
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// SMTP relay host. Without it, activation links are only logged
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP relay port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    /// SMTP user, also used as the sender address
    #[arg(long, env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Display name of the sender
    #[arg(long, env = "SMTP_FROM_NAME", default_value = DEFAULT_FROM_NAME)]
    pub smtp_from_name: String,

    /// bcrypt work factor for password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_BCRYPT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Disable per-IP rate limits on sign-in and sign-up
    #[arg(long, env = "NO_RATE_LIMIT")]
    pub no_rate_limit: bool,

    /// Key rate limits on X-Forwarded-For (only behind a trusted reverse proxy)
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Log output format
    #[arg(short, long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
/// Must run before any other thread is started, since it edits the environment.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: `main` calls this before building the tokio runtime, so no
        // other thread exists yet to read or write the environment.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use the matching --*-secret-file option",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. They must differ, otherwise a token of one
/// kind would verify as the other.
pub fn load_secrets(
    access_secret_file: Option<&str>,
    refresh_secret_file: Option<&str>,
) -> Option<(String, String)> {
    let access = load_secret(ACCESS_SECRET_ENV, access_secret_file)?;
    let refresh = load_secret(REFRESH_SECRET_ENV, refresh_secret_file)?;

    if access == refresh {
        error!(
            "{} and {} must be different",
            ACCESS_SECRET_ENV, REFRESH_SECRET_ENV
        );
        return None;
    }

    Some((access, refresh))
}

/// Parse and validate the client URL.
/// Returns None and logs an error if validation fails.
pub fn validate_client_url(client_url: &str) -> Option<Url> {
    let url = match Url::parse(client_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %client_url, error = %e, "Invalid client URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %client_url, "Client URL must use http or https");
        return None;
    }

    if url.scheme() == "http" && url.host_str() != Some("localhost") {
        warn!(url = %client_url, "Client URL is not https; refresh cookies will not be Secure");
    }

    Some(url)
}

/// Create the uploads directory if needed.
pub fn ensure_uploads_dir(path: &Path) -> Option<PathBuf> {
    match std::fs::create_dir_all(path) {
        Ok(()) => {
            info!(path = %path.display(), "Uploads directory ready");
            Some(path.to_path_buf())
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to create uploads directory");
            None
        }
    }
}

/// Build the mailer: SMTP when fully configured, otherwise log-only.
/// Returns None and logs an error if the SMTP settings are invalid.
pub fn build_mailer(args: &Args) -> Option<Arc<dyn Mailer>> {
    match (&args.smtp_host, &args.smtp_user, &args.smtp_password) {
        (Some(host), Some(user), Some(password)) => {
            let config = SmtpConfig {
                host: host.clone(),
                port: args.smtp_port,
                user: user.clone(),
                password: password.clone(),
                from_name: args.smtp_from_name.clone(),
            };
            match SmtpMailer::new(&config) {
                Ok(mailer) => {
                    info!(host = %host, port = args.smtp_port, "SMTP mailer configured");
                    Some(Arc::new(mailer))
                }
                Err(e) => {
                    error!(error = %e, "Invalid SMTP configuration");
                    None
                }
            }
        }
        (None, None, None) => {
            warn!("SMTP not configured; activation links will only be logged");
            Some(Arc::new(LogMailer))
        }
        _ => {
            error!("SMTP_HOST, SMTP_USER and SMTP_PASSWORD must be set together");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    client_url: Url,
    secrets: (String, String),
    mailer: Arc<dyn Mailer>,
    uploads_dir: PathBuf,
) -> ServerConfig {
    let secure_cookies = client_url.scheme() == "https";
    let (access_secret, refresh_secret) = secrets;

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_ttl: args.access_token_ttl,
        refresh_ttl: args.refresh_token_ttl,
        cookie: CookieConfig::new(secure_cookies, args.refresh_token_ttl),
        client_url: client_url.as_str().trim_end_matches('/').to_string(),
        mailer,
        uploads_dir,
        bcrypt_cost: args.bcrypt_cost,
        rate_limit: (!args.no_rate_limit).then(|| RateLimitConfig::new(args.trust_proxy)),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["taskgate"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_validate_client_url() {
        assert!(validate_client_url("http://localhost:5173").is_some());
        assert!(validate_client_url("https://app.example.com").is_some());
        assert!(validate_client_url("ftp://example.com").is_none());
        assert!(validate_client_url("not a url").is_none());
    }

    #[test]
    fn test_load_secret_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  {}  ", "s".repeat(40)).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let secret = load_secret("TASKGATE_TEST_SECRET_NOT_SET", Some(&path)).unwrap();
        assert_eq!(secret, "s".repeat(40));
    }

    #[test]
    fn test_load_secret_rejects_short_secret() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "too-short").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        assert!(load_secret("TASKGATE_TEST_SECRET_NOT_SET", Some(&path)).is_none());
    }

    #[test]
    fn test_load_secret_missing() {
        assert!(load_secret("TASKGATE_TEST_SECRET_NOT_SET", None).is_none());
        assert!(load_secret("TASKGATE_TEST_SECRET_NOT_SET", Some("/nonexistent/secret")).is_none());
    }

    #[test]
    fn test_args_defaults() {
        let args = args(&[]);
        assert_eq!(args.port, 4000);
        assert_eq!(args.client_url, "http://localhost:5173");
        assert_eq!(args.access_token_ttl, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(args.refresh_token_ttl, REFRESH_TOKEN_DURATION_SECS);
        assert_eq!(args.bcrypt_cost, DEFAULT_BCRYPT_COST);
    }

    #[test]
    fn test_bcrypt_cost_range() {
        let mut argv = vec!["taskgate", "--bcrypt-cost", "2"];
        assert!(Args::try_parse_from(&argv).is_err());
        argv[2] = "12";
        assert_eq!(Args::try_parse_from(&argv).unwrap().bcrypt_cost, 12);
    }

    #[tokio::test]
    async fn test_build_config_secure_cookies_follow_https() {
        let db = Database::open(":memory:").await.unwrap();
        let args = args(&["--no-rate-limit", "--refresh-token-ttl", "600"]);
        let secrets = ("a".repeat(32), "b".repeat(32));

        let config = build_config(
            &args,
            db.clone(),
            Url::parse("https://app.example.com/").unwrap(),
            secrets.clone(),
            Arc::new(LogMailer),
            PathBuf::from("uploads"),
        );
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.max_age_secs, 600);
        assert_eq!(config.client_url, "https://app.example.com");
        assert!(config.rate_limit.is_none());

        let config = build_config(
            &args,
            db,
            Url::parse("http://localhost:5173").unwrap(),
            secrets,
            Arc::new(LogMailer),
            PathBuf::from("uploads"),
        );
        assert!(!config.cookie.secure);
    }

    #[tokio::test]
    async fn test_build_mailer_requires_complete_smtp_settings() {
        assert!(build_mailer(&args(&[])).is_some());
        assert!(build_mailer(&args(&["--smtp-host", "smtp.example.com"])).is_none());
    }
}
