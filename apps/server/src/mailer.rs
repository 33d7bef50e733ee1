//! # Outgoing Mail
//!
//! ```text
//! auth handler ──► templates::verification(..) ──► Mailer::send(Email)
//!                                                     │
//!                          ┌──────────────────────────┴────────────┐
//!                          ▼                                       ▼
//!                   LogMailer (dev)                 HttpMailer (MAIL_RELAY_URL)
//!                   tracing (body: dev only)        POST {from,to,subject,text}
//! ```

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay answered {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes mail to the log. Used when no relay is configured.
///
/// Bodies hold live verification and reset links, so they are only logged
/// (at `debug`) when `log_bodies` is set.
#[derive(Debug, Default)]
pub struct LogMailer {
    log_bodies: bool,
}

impl LogMailer {
    pub fn new(log_bodies: bool) -> Self {
        LogMailer { log_bodies }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Mail (not sent, no relay configured)");
        if self.log_bodies {
            debug!(to = %email.to, body = %email.text, "Mail body");
        }
        Ok(())
    }
}

/// Hands mail to an HTTP relay as JSON.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>) -> Self {
        HttpMailer {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayMessage {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        info!(to = %email.to, subject = %email.subject, "Mail sent");
        Ok(())
    }
}

pub mod templates {
    use super::Email;

    pub fn verification(base_url: &str, to: &str, name: &str, token: &str, ttl_hours: i64) -> Email {
        let link = format!("{base_url}/verify-email?token={token}");
        Email {
            to: to.to_string(),
            subject: "Verify your email".to_string(),
            text: format!(
                "Hi {name},\n\n\
                 Welcome to Tally POS. Confirm your email address by opening the link below:\n\n\
                 {link}\n\n\
                 The link is valid for {ttl_hours} hours.\n"
            ),
        }
    }

    pub fn password_reset(base_url: &str, to: &str, name: &str, token: &str, ttl_minutes: i64) -> Email {
        let link = format!("{base_url}/reset-password?token={token}");
        Email {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            text: format!(
                "Hi {name},\n\n\
                 Someone asked to reset the password for your Tally POS account.\n\
                 If it was you, open the link below:\n\n\
                 {link}\n\n\
                 The link is valid for {ttl_minutes} minutes. If you did not ask for this, \
                 ignore this message.\n"
            ),
        }
    }
}
