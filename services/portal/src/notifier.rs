//! Outbound email notifier
//!
//! Email is best-effort: a delivery failure is logged and swallowed, never
//! rolled into the outcome of the operation that triggered it. Delivery
//! goes through an HTTP mail relay; when no relay is configured the
//! notifier logs the message it would have sent and reports success, which
//! keeps local development working without SMTP credentials.

use serde::Serialize;
use tracing::{error, info};

/// Notifier configuration
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// HTTP endpoint of the mail relay; None disables delivery
    pub relay_url: Option<String>,
    /// Bearer credential for the relay, if it requires one
    pub relay_api_key: Option<String>,
    /// Sender address
    pub from: String,
}

impl NotifierConfig {
    /// Create a new NotifierConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MAIL_RELAY_URL`: HTTP mail relay endpoint (optional)
    /// - `MAIL_RELAY_API_KEY`: Bearer credential for the relay (optional)
    /// - `MAIL_FROM`: Sender address (default: "noreply@volunteer-portal.org")
    pub fn from_env() -> Self {
        NotifierConfig {
            relay_url: std::env::var("MAIL_RELAY_URL").ok(),
            relay_api_key: std::env::var("MAIL_RELAY_API_KEY").ok(),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "noreply@volunteer-portal.org".to_string()),
        }
    }
}

/// An email ready for delivery
#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Fire-and-forget email notifier
#[derive(Clone)]
pub struct Notifier {
    config: NotifierConfig,
    client: reqwest::Client,
}

impl Notifier {
    /// Create a new notifier
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the approval email carrying a verification code
    pub fn verification_email(&self, name: &str, to: &str, code: &str) -> MailMessage {
        let html = format!(
            "<h2>Your Volunteer Application Has Been Approved!</h2>\
             <p>Dear {name},</p>\
             <p>We're pleased to inform you that your application to volunteer \
             with us has been approved.</p>\
             <p>To complete your registration, please use the following \
             verification code when creating your account:</p>\
             <p><strong>{code}</strong></p>\
             <p>This code will expire in 7 days.</p>\
             <p>Best regards,<br>The Volunteer Team</p>"
        );

        MailMessage {
            from: self.config.from.clone(),
            to: to.to_string(),
            subject: "Your Volunteer Application Has Been Approved".to_string(),
            html,
        }
    }

    /// Build the password reset email
    pub fn password_reset_email(&self, to: &str, reset_url: &str) -> MailMessage {
        let html = format!(
            "<h1>Password Reset Request</h1>\
             <p>You requested a password reset. Click the link below to reset \
             your password:</p>\
             <a href=\"{reset_url}\">Reset Password</a>\
             <p>If you didn't request this, please ignore this email.</p>\
             <p>This link will expire in 1 hour.</p>"
        );

        MailMessage {
            from: self.config.from.clone(),
            to: to.to_string(),
            subject: "Password Reset Request".to_string(),
            html,
        }
    }

    /// Deliver a message through the relay
    pub async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        let Some(relay_url) = &self.config.relay_url else {
            info!(
                "mail relay not configured; skipping email to {} ({})",
                message.to, message.subject
            );
            return Ok(());
        };

        let mut request = self.client.post(relay_url).json(&message);
        if let Some(api_key) = &self.config.relay_api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        response.error_for_status()?;

        info!("email sent to {} ({})", message.to, message.subject);
        Ok(())
    }

    /// Deliver a message in the background
    ///
    /// The triggering operation has already committed; a failure here is
    /// logged and goes nowhere else.
    pub fn send_detached(&self, message: MailMessage) {
        let notifier = self.clone();
        tokio::spawn(async move {
            let to = message.to.clone();
            if let Err(e) = notifier.send(message).await {
                error!("failed to send email to {}: {}", to, e);
            }
        });
    }
}
