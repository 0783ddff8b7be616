// src/services/mail.rs
//! Outbound OTP delivery

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::Client as SesClient;
use thiserror::Error;
use tracing::{error, info};

use super::email::{otp_email_html, otp_email_subject};
use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Failed to build email: {0}")]
    BuildFailed(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

/// Delivery abstraction for one-time codes. The orchestrator maps a
/// failure here to EMAIL_ERROR and leaves the pending account in place
/// so the user can retry.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp_email(&self, to: &str, name: &str, code: &str) -> Result<(), MailError>;
}

/// Local dev mailer that logs the code instead of sending real email.
/// The only place a raw code is allowed to reach a log line.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp_email(&self, to: &str, name: &str, code: &str) -> Result<(), MailError> {
        info!("📧 OTP for {}: {}", to, code);
        info!("👤 Name: {}", name);
        Ok(())
    }
}

/// Production mailer over AWS SESv2 with the default credential chain.
pub struct SesMailer {
    client: SesClient,
    from_email: String,
    otp_ttl_minutes: i64,
}

impl SesMailer {
    pub async fn new(from_email: String, otp_ttl_minutes: i64) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let client = SesClient::new(&aws_config);

        Self {
            client,
            from_email,
            otp_ttl_minutes,
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_otp_email(&self, to: &str, name: &str, code: &str) -> Result<(), MailError> {
        use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};

        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(otp_email_subject())
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::BuildFailed(format!("Failed to build subject: {}", e)))?;

        let body_content = Content::builder()
            .data(otp_email_html(name, code, self.otp_ttl_minutes))
            .charset("UTF-8")
            .build()
            .map_err(|e| MailError::BuildFailed(format!("Failed to build body: {}", e)))?;

        let ses_body = SesBody::builder().html(body_content).build();

        let message = Message::builder()
            .subject(subject_content)
            .body(ses_body)
            .build();

        let email_content = EmailContent::builder().simple(message).build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from_email)
            .destination(destination)
            .content(email_content)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(to), "Failed to send email via SES");
                MailError::SendFailed(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(to),
            message_id = ?result.message_id(),
            "OTP email sent successfully via SES"
        );

        Ok(())
    }
}
