//! Notification e-mail — tells the site owner about new leads and messages.
//!
//! Outbound only, SMTP via lettre. Delivery is best-effort: callers log
//! failures and carry on.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::NotifyError;

/// SMTP settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    /// Inbox that receives notifications.
    pub to_address: String,
}

impl NotifyConfig {
    /// Returns `None` if `SMTP_HOST` is not set (notifications disabled).
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let smtp_host = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty())?;

        let smtp_port: u16 = lookup("SMTP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = lookup("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(lookup("SMTP_PASSWORD").unwrap_or_default());
        let from_address = lookup("NOTIFY_FROM").unwrap_or_else(|| username.clone());
        let to_address = lookup("NOTIFY_TO").unwrap_or_else(|| from_address.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            to_address,
        })
    }
}

/// Something that can deliver a short notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Used when SMTP is not configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
        debug!(subject, "Notifications disabled; skipping email");
        Ok(())
    }
}

/// Sends notifications over SMTP.
pub struct SmtpNotifier {
    config: NotifyConfig,
}

impl SmtpNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    /// Build the e-mail without sending it.
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| NotifyError::InvalidAddress {
                address: self.config.from_address.clone(),
                reason: format!("{e}"),
            })?;
        let to = self
            .config
            .to_address
            .parse()
            .map_err(|e| NotifyError::InvalidAddress {
                address: self.config.to_address.clone(),
                reason: format!("{e}"),
            })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.build_message(subject, body)?;
        let config = self.config.clone();

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            );
            let transport = SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?
                .port(config.smtp_port)
                .credentials(creds)
                .build();
            transport
                .send(&email)
                .map_err(|e| NotifyError::Send(e.to_string()))?;
            Ok::<(), NotifyError>(())
        })
        .await
        .map_err(|e| NotifyError::Send(format!("SMTP task failed: {e}")))??;

        info!(to = %self.config.to_address, subject, "Notification email sent");
        Ok(())
    }
}

/// Pick the notifier for the given config.
pub fn notifier_from_config(config: Option<NotifyConfig>) -> Arc<dyn Notifier> {
    match config {
        Some(config) => Arc::new(SmtpNotifier::new(config)),
        None => Arc::new(DisabledNotifier),
    }
}

/// Fire a notification without waiting for it. Failures are only logged.
pub fn notify_in_background(notifier: Arc<dyn Notifier>, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&subject, &body).await {
            warn!(error = %e, subject = %subject, "Notification email failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_none_without_host() {
        assert!(NotifyConfig::from_lookup(lookup(&[])).is_none());
        assert!(NotifyConfig::from_lookup(lookup(&[("SMTP_HOST", " ")])).is_none());
    }

    #[test]
    fn config_defaults_addresses_to_username() {
        let config = NotifyConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.folio.dev"),
            ("SMTP_USERNAME", "bot@folio.dev"),
        ]))
        .unwrap();
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.from_address, "bot@folio.dev");
        assert_eq!(config.to_address, "bot@folio.dev");
    }

    fn notifier(from: &str, to: &str) -> SmtpNotifier {
        SmtpNotifier::new(NotifyConfig {
            smtp_host: "smtp.folio.dev".into(),
            smtp_port: 587,
            username: "bot".into(),
            password: SecretString::from("pw".to_string()),
            from_address: from.into(),
            to_address: to.into(),
        })
    }

    #[test]
    fn builds_message_with_headers() {
        let msg = notifier("bot@folio.dev", "owner@folio.dev")
            .build_message("New lead: Alex", "Alex wants a website")
            .unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: New lead: Alex"));
        assert!(raw.contains("To: owner@folio.dev"));
    }

    #[test]
    fn rejects_invalid_address() {
        let err = notifier("not an address", "owner@folio.dev")
            .build_message("s", "b")
            .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn disabled_notifier_is_a_noop() {
        DisabledNotifier.notify("subject", "body").await.unwrap();
    }
}
