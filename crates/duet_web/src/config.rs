//! Environment-driven server configuration.
//!
//! # Invariants
//! - Loaded once at startup; handlers only see the resulting typed values.
//! - Secrets are never logged. Optional settings record the default they fall back to;
//!   `log_defaults` reports them once logging is up.

use log::info;
use std::cell::RefCell;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub session_ttl: Duration,
    pub public_url: String,
    pub oauth: OAuthConfig,
    pub image: ImageApiConfig,
    /// Keys that were unset, with the default used instead.
    pub defaulted: Vec<(&'static str, String)>,
}

#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ImageApiConfig {
    pub api_url: String,
    /// `None` disables invitation generation; the page reports it inline.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl std::fmt::Debug for ImageApiConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageApiConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, details: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "required environment variable {key} is not set"),
            Self::Invalid { key, details } => write!(f, "invalid {key}: {details}"),
        }
    }
}

impl Error for ConfigError {}

impl Config {
    /// Reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `load` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source = Source {
            lookup: &lookup,
            defaulted: RefCell::new(Vec::new()),
        };

        let log_dir = match source.optional("DUET_LOG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let dir = env::current_dir()
                    .map_err(|err| ConfigError::Invalid {
                        key: "DUET_LOG_DIR",
                        details: format!("cannot resolve working directory: {err}"),
                    })?
                    .join("logs");
                source.record_default("DUET_LOG_DIR", &dir.display().to_string());
                dir
            }
        };

        let mut config = Self {
            bind: source.parsed("DUET_BIND", "127.0.0.1:5000")?,
            db_path: PathBuf::from(source.or_default("DUET_DB_PATH", "duet.sqlite3")),
            upload_dir: PathBuf::from(source.or_default("DUET_UPLOAD_DIR", "uploads")),
            log_dir,
            log_level: source.or_default("DUET_LOG_LEVEL", duet_core::default_log_level()),
            session_ttl: Duration::from_secs(source.parsed("DUET_SESSION_TTL_SECS", "604800")?),
            public_url: source
                .or_default("DUET_PUBLIC_URL", "http://127.0.0.1:5000")
                .trim_end_matches('/')
                .to_string(),
            oauth: OAuthConfig {
                client_id: source.required("OAUTH_CLIENT_ID")?,
                client_secret: source.required("OAUTH_CLIENT_SECRET")?,
                authorize_url: source.or_default("OAUTH_AUTHORIZE_URL", GOOGLE_AUTHORIZE_URL),
                token_url: source.or_default("OAUTH_TOKEN_URL", GOOGLE_TOKEN_URL),
                userinfo_url: source.or_default("OAUTH_USERINFO_URL", GOOGLE_USERINFO_URL),
                timeout: Duration::from_secs(source.parsed("DUET_HTTP_TIMEOUT_SECS", "10")?),
            },
            image: ImageApiConfig {
                api_url: source.or_default("IMAGE_API_URL", OPENAI_IMAGES_URL),
                api_key: source.optional("IMAGE_API_KEY"),
                timeout: Duration::from_secs(source.parsed("DUET_IMAGE_TIMEOUT_SECS", "60")?),
            },
            defaulted: Vec::new(),
        };
        config.defaulted = source.defaulted.into_inner();
        Ok(config)
    }

    /// Logs every default fallback; call after logging is initialized.
    pub fn log_defaults(&self) {
        for (key, value) in &self.defaulted {
            info!("event=config_default module=config key={key} value={value}");
        }
    }

    /// Where the provider sends the browser back after consent.
    pub fn oauth_redirect_url(&self) -> String {
        format!("{}/login/callback", self.public_url)
    }

    /// Session cookies get `Secure` when the site is served over https.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }
}

struct Source<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    defaulted: RefCell<Vec<(&'static str, String)>>,
}

impl Source<'_> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn record_default(&self, key: &'static str, value: &str) {
        self.defaulted.borrow_mut().push((key, value.to_string()));
    }

    fn or_default(&self, key: &'static str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| {
            self.record_default(key, default);
            default.to_string()
        })
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let raw = self.or_default(key, default);
        raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            details: format!("`{raw}`: {err}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn oauth_credentials_are_required() {
        let err = Config::from_lookup(lookup(&[("OAUTH_CLIENT_ID", "id")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("OAUTH_CLIENT_SECRET"));
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("OAUTH_CLIENT_ID", "id"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("DUET_LOG_DIR", "/var/log/duet"),
        ]))
        .unwrap();

        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.session_ttl, Duration::from_secs(604_800));
        assert!(config.image.api_key.is_none());
        assert_eq!(
            config.oauth_redirect_url(),
            "http://127.0.0.1:5000/login/callback"
        );
        assert!(!config.secure_cookies());
        assert!(!format!("{:?}", config.oauth).contains("\"secret\""));
    }

    #[test]
    fn fallbacks_are_recorded_for_later_logging() {
        let config = Config::from_lookup(lookup(&[
            ("OAUTH_CLIENT_ID", "id"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("DUET_BIND", "0.0.0.0:8080"),
        ]))
        .unwrap();

        let keys: Vec<&str> = config.defaulted.iter().map(|(key, _)| *key).collect();
        assert!(keys.contains(&"DUET_LOG_DIR"));
        assert!(keys.contains(&"DUET_SESSION_TTL_SECS"));
        assert!(!keys.contains(&"DUET_BIND"));
        assert!(!keys.contains(&"OAUTH_CLIENT_SECRET"));
        assert!(config
            .defaulted
            .contains(&("DUET_DB_PATH", "duet.sqlite3".to_string())));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("OAUTH_CLIENT_ID", "id"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("DUET_LOG_DIR", "/tmp/duet-logs"),
            ("DUET_SESSION_TTL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DUET_SESSION_TTL_SECS",
                ..
            }
        ));
    }
}
