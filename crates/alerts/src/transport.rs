// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert delivery transports

use async_trait::async_trait;
use chrono::Utc;
use pk_core::Severity;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("webhook delivery failed: {0}")]
    Webhook(String),

    #[error("email delivery failed: {0}")]
    Email(String),

    #[error("invalid email address: {0}")]
    BadAddress(String),
}

/// A way to get an alert in front of a human
#[async_trait]
pub trait AlertTransport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        alert_type: &str,
        severity: Severity,
        message: &str,
    ) -> Result<(), AlertError>;
}

/// POSTs `{text, timestamp}` to a webhook URL
pub struct WebhookTransport {
    url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, AlertError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::Webhook(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl AlertTransport for WebhookTransport {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(
        &self,
        alert_type: &str,
        _severity: Severity,
        message: &str,
    ) -> Result<(), AlertError> {
        let payload = serde_json::json!({
            "text": message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AlertError::Webhook(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::Webhook(format!(
                "status {}",
                response.status().as_u16()
            )));
        }
        debug!(alert_type, "webhook alert sent");
        Ok(())
    }
}

/// SMTP configuration from the `[alerts]` config section
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

/// Sends a plain-text message over SMTP with STARTTLS.
///
/// lettre's SMTP transport is blocking, so delivery runs on the blocking
/// thread pool.
pub struct EmailTransport {
    config: EmailConfig,
}

impl EmailTransport {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AlertTransport for EmailTransport {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(
        &self,
        alert_type: &str,
        severity: Severity,
        message: &str,
    ) -> Result<(), AlertError> {
        let config = self.config.clone();
        let subject = format!("Protekt Alert: {alert_type} ({severity})");
        let body = message.to_string();

        tokio::task::spawn_blocking(move || send_smtp(&config, &subject, &body))
            .await
            .map_err(|e| AlertError::Email(e.to_string()))?
    }
}

fn send_smtp(config: &EmailConfig, subject: &str, body: &str) -> Result<(), AlertError> {
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    let from: Mailbox = config
        .username
        .parse()
        .map_err(|_| AlertError::BadAddress(config.username.clone()))?;
    let to: Mailbox = config
        .recipient
        .parse()
        .map_err(|_| AlertError::BadAddress(config.recipient.clone()))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| AlertError::Email(e.to_string()))?;

    let transport = SmtpTransport::starttls_relay(&config.smtp_server)
        .map_err(|e| AlertError::Email(e.to_string()))?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .build();

    transport
        .send(&message)
        .map_err(|e| AlertError::Email(e.to_string()))?;
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded alert
    #[derive(Debug, Clone)]
    pub struct SentAlert {
        pub alert_type: String,
        pub severity: Severity,
        pub message: String,
    }

    /// Recording transport for tests
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        sent: Arc<Mutex<Vec<SentAlert>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        pub fn sent(&self) -> Vec<SentAlert> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl AlertTransport for FakeTransport {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn send(
            &self,
            alert_type: &str,
            severity: Severity,
            message: &str,
        ) -> Result<(), AlertError> {
            if *self.fail.lock() {
                return Err(AlertError::Webhook("scripted failure".to_string()));
            }
            self.sent.lock().push(SentAlert {
                alert_type: alert_type.to_string(),
                severity,
                message: message.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTransport, SentAlert};

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
