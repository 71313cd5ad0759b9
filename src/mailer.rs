// src/mailer.rs
use crate::config::Config;
use crate::models::User;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Address(#[from] lettre::address::AddressError),
    #[error(transparent)]
    Build(#[from] lettre::error::Error),
    #[error(transparent)]
    Send(#[from] lettre::transport::smtp::Error),
}

/// Outgoing mail. Built once at startup and shared via app data; when SMTP
/// is not configured every send becomes a logged no-op, which is what dev
/// and test environments run with.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    site_name: String,
    site_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let transport = match (&config.smtp_host, &config.smtp_username, &config.smtp_password) {
            (Some(host), Some(username), Some(password)) => {
                match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
                    Ok(builder) => Some(
                        builder
                            .credentials(Credentials::new(username.clone(), password.clone()))
                            .build(),
                    ),
                    Err(err) => {
                        tracing::warn!(error = %err, "invalid SMTP relay host, mail disabled");
                        None
                    }
                }
            }
            _ => None,
        };
        let from = config
            .from_email
            .as_deref()
            .and_then(|address| address.parse::<Mailbox>().ok());
        if transport.is_none() {
            tracing::info!("SMTP not configured, outgoing mail will be logged and dropped");
        }
        Self {
            transport,
            from,
            site_name: config.site_name.clone(),
            site_url: config.site_url.clone(),
        }
    }

    async fn deliver(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            tracing::info!(to, subject, "mail transport disabled, dropping message");
            return Ok(());
        };
        let message = Message::builder()
            .from(from.clone())
            .to(to.parse()?)
            .subject(subject)
            .body(body)?;
        transport.send(message).await?;
        tracing::debug!(to, subject, "email sent");
        Ok(())
    }

    /// Greets a new account. Skipped when the user has notifications off.
    pub async fn send_welcome(&self, user: &User) {
        if !user.email_notifications {
            return;
        }
        let subject = format!("Welcome to {}!", self.site_name);
        let body = format!(
            "Hi {},\n\nWelcome to {}! Your account is ready.\n\n\
             Browse the latest headlines at {} and subscribe for full access \
             to every article.\n\nThe {} team",
            user.username, self.site_name, self.site_url, self.site_name
        );
        if let Err(err) = self.deliver(&user.email, &subject, body).await {
            tracing::warn!(user_id = %user.id, error = %err, "failed to send welcome email");
        }
    }

    pub async fn send_subscription_activated(
        &self,
        user: &User,
        plan_name: &str,
        end_date: DateTime<Utc>,
    ) {
        if !user.email_notifications {
            return;
        }
        let subject = format!("Your {plan_name} Subscription is Active!");
        let body = format!(
            "Hi {},\n\nYour {} subscription is now active and runs until {}.\n\n\
             You have full access to every article on {}.\n\nThe {} team",
            user.username,
            plan_name,
            end_date.format("%B %d, %Y"),
            self.site_url,
            self.site_name
        );
        if let Err(err) = self.deliver(&user.email, &subject, body).await {
            tracing::warn!(user_id = %user.id, error = %err, "failed to send subscription email");
        }
    }
}
