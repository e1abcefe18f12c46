use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const VOTES_SECRET_KEY: &str = "VOTES_ENCRYPTION_SECRET";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set to a non-empty value")]
    MissingSecret(&'static str),
    #[error("Invalid {key} value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub votes_secret: String,
    pub storage_timeout: Duration,
    pub vote_rate_limit: u32,
    pub vote_rate_window_minutes: i64,
    pub tally_audit_interval: Duration,
    pub allowed_origin: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("votes_secret", &"<redacted>")
            .field("storage_timeout", &self.storage_timeout)
            .field("vote_rate_limit", &self.vote_rate_limit)
            .field("vote_rate_window_minutes", &self.vote_rate_window_minutes)
            .field("tally_audit_interval", &self.tally_audit_interval)
            .field("allowed_origin", &self.allowed_origin)
            .finish()
    }
}

impl AppConfig {
    /// Builds the configuration from a key lookup such as the Shuttle
    /// secret store. Only the vote secret is mandatory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let votes_secret = lookup(VOTES_SECRET_KEY)
            .map(|secret| secret.trim().to_string())
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingSecret(VOTES_SECRET_KEY))?;

        Ok(Self {
            votes_secret,
            storage_timeout: Duration::from_millis(try_load(&lookup, "STORAGE_TIMEOUT_MS", 5_000)?),
            vote_rate_limit: try_load(&lookup, "VOTE_RATE_LIMIT", 10)?,
            vote_rate_window_minutes: try_load(&lookup, "VOTE_RATE_WINDOW_MINUTES", 1)?,
            tally_audit_interval: Duration::from_secs(try_load(&lookup, "TALLY_AUDIT_INTERVAL_SECS", 300)?),
            allowed_origin: try_load(&lookup, "ALLOWED_ORIGIN", "http://localhost".to_string())?,
        })
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::InvalidValue {
                key,
                value,
                reason: e.to_string(),
            })
        }
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
