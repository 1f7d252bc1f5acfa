//! Activation mail delivery.
//!
//! `SmtpMailer` sends through an SMTP relay with STARTTLS. `LogMailer` only
//! logs the activation link, for local development without an SMTP account.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

pub const DEFAULT_FROM_NAME: &str = "Taskgate";
const ACTIVATION_SUBJECT: &str = "Account Activation - Taskgate";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// An activation mail ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationMail {
    pub to: String,
    pub name: String,
    pub link: String,
}

impl ActivationMail {
    pub fn new(to: &str, name: &str, client_url: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            name: name.to_string(),
            link: activation_link(client_url, token),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError>;
}

/// Build the client-side activation URL for a token.
pub fn activation_link(client_url: &str, token: &str) -> String {
    format!("{}/activate/{}", client_url.trim_end_matches('/'), token)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the HTML body of the activation mail.
pub fn activation_email_html(name: &str, link: &str) -> String {
    let name = escape_html(name);
    let link = escape_html(link);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Account Activation</title>
</head>
<body style="font-family: Arial, sans-serif; color: #333;">
    <h1>Welcome!</h1>
    <p>Hello, {name}!</p>
    <p>Thank you for registering with <strong>Taskgate</strong>.
    To start using the application, activate your account:</p>
    <p><a href="{link}">Activate Account</a></p>
    <p>Link not working? Copy and paste this link into your browser:</p>
    <p>{link}</p>
    <p style="color: #92400e;">If you didn't register, please ignore this email.</p>
</body>
</html>
"#
    )
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_name: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Must be called from within a Tokio runtime (the connection pool spawns a task).
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = Mailbox::new(Some(config.from_name.clone()), config.user.parse()?);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse()?)
            .subject(ACTIVATION_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(activation_email_html(&mail.name, &mail.link))?;

        self.transport.send(message).await?;
        info!(to = %mail.to, "Activation email sent");
        Ok(())
    }
}

/// Logs activation links instead of sending mail.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, mail: &ActivationMail) -> Result<(), MailError> {
        info!(to = %mail.to, link = %mail.link, "Activation email (not sent, SMTP not configured)");
        Ok(())
    }
}
