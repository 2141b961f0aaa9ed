//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default fallback contact address shown when a lead cannot be saved.
pub const DEFAULT_FALLBACK_EMAIL: &str = "hello@example.com";

/// Site server configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Bearer token for admin routes. Admin routes are disabled when unset.
    pub admin_token: Option<SecretString>,
    /// Origins allowed by CORS. Empty installs no CORS layer, so only
    /// same-origin browser requests work.
    pub cors_origins: Vec<String>,
    /// Directory for rolling log files. Logs only go to stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub chat: ChatConfig,
}

/// Chat widget configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Address offered to visitors when the hand-off fails.
    pub fallback_email: String,
    /// Remote lead endpoint. Leads are written to the local store when unset.
    pub lead_endpoint: Option<String>,
    /// Fixed part of the simulated typing pause.
    pub typing_base: Duration,
    /// Upper bound of the random part of the typing pause.
    pub typing_jitter: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            fallback_email: DEFAULT_FALLBACK_EMAIL.to_string(),
            lead_endpoint: None,
            typing_base: Duration::from_millis(600),
            typing_jitter: Duration::from_millis(600),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/site.db"),
            admin_token: None,
            cors_origins: Vec::new(),
            log_dir: None,
            chat: ChatConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Build config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("SITE_PORT") {
            Some(v) => parse_value("SITE_PORT", &v)?,
            None => defaults.port,
        };

        let db_path = non_empty("SITE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let admin_token = non_empty("ADMIN_TOKEN").map(SecretString::from);

        let cors_origins = non_empty("CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let log_dir = non_empty("LOG_DIR").map(PathBuf::from);

        let chat = ChatConfig {
            fallback_email: non_empty("CONTACT_FALLBACK_EMAIL")
                .unwrap_or(defaults.chat.fallback_email),
            lead_endpoint: non_empty("LEAD_ENDPOINT"),
            typing_base: match non_empty("CHAT_TYPING_BASE_MS") {
                Some(v) => Duration::from_millis(parse_value("CHAT_TYPING_BASE_MS", &v)?),
                None => defaults.chat.typing_base,
            },
            typing_jitter: match non_empty("CHAT_TYPING_JITTER_MS") {
                Some(v) => Duration::from_millis(parse_value("CHAT_TYPING_JITTER_MS", &v)?),
                None => defaults.chat.typing_jitter,
            },
        };

        Ok(Self {
            port,
            db_path,
            admin_token,
            cors_origins,
            log_dir,
            chat,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = SiteConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("./data/site.db"));
        assert!(config.admin_token.is_none());
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.chat.fallback_email, DEFAULT_FALLBACK_EMAIL);
        assert!(config.chat.lead_endpoint.is_none());
        assert_eq!(config.chat.typing_base, Duration::from_millis(600));
    }

    #[test]
    fn reads_overrides() {
        let config = SiteConfig::from_lookup(lookup(&[
            ("SITE_PORT", "9000"),
            ("ADMIN_TOKEN", "s3cret"),
            ("CORS_ALLOWED_ORIGINS", "https://a.dev, https://b.dev,"),
            ("CONTACT_FALLBACK_EMAIL", "studio@folio.dev"),
            ("LEAD_ENDPOINT", "https://api.folio.dev/leads"),
            ("CHAT_TYPING_BASE_MS", "0"),
            ("CHAT_TYPING_JITTER_MS", "25"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.admin_token.unwrap().expose_secret(), "s3cret");
        assert_eq!(config.cors_origins, vec!["https://a.dev", "https://b.dev"]);
        assert_eq!(config.chat.fallback_email, "studio@folio.dev");
        assert_eq!(
            config.chat.lead_endpoint.as_deref(),
            Some("https://api.folio.dev/leads")
        );
        assert_eq!(config.chat.typing_base, Duration::ZERO);
        assert_eq!(config.chat.typing_jitter, Duration::from_millis(25));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = SiteConfig::from_lookup(lookup(&[("ADMIN_TOKEN", "  "), ("SITE_PORT", "")]))
            .unwrap();
        assert!(config.admin_token.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = SiteConfig::from_lookup(lookup(&[("SITE_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("SITE_PORT"));
    }
}
