// Runtime configuration, read from the environment (and `.env` via dotenv).
//
// Only deployment details live here. The ban threshold and the widget name are
// constants in the core.

use crate::infra::reddit::RedditCredentials;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Which ScoreStore implementation to run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Json(PathBuf),
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub credentials: RedditCredentials,
    pub subreddits: Vec<String>,
    pub poll_interval: Duration,
    pub store: StoreBackend,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests don't touch the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let username = required("REDDIT_USERNAME")?;
        let user_agent = lookup("REDDIT_USER_AGENT").unwrap_or_else(|| {
            format!(
                "rust:luckybot:v{} (by /u/{})",
                env!("CARGO_PKG_VERSION"),
                username
            )
        });

        let credentials = RedditCredentials {
            client_id: required("REDDIT_CLIENT_ID")?,
            client_secret: required("REDDIT_CLIENT_SECRET")?,
            password: required("REDDIT_PASSWORD")?,
            username,
            user_agent,
        };

        let subreddits: Vec<String> = required("LUCKYBOT_SUBREDDITS")?
            .split(',')
            .map(|s| s.trim().trim_start_matches("r/").to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if subreddits.is_empty() {
            return Err(ConfigError::Missing("LUCKYBOT_SUBREDDITS"));
        }

        let poll_secs = match lookup("LUCKYBOT_POLL_SECS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "LUCKYBOT_POLL_SECS",
                    value,
                })?,
            None => DEFAULT_POLL_SECS,
        };

        let data_dir = PathBuf::from(
            lookup("LUCKYBOT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let store = match lookup("LUCKYBOT_STORE").as_deref().map(str::to_ascii_lowercase) {
            None => StoreBackend::Sqlite(data_dir.join("scores.db")),
            Some(kind) => match kind.as_str() {
                "sqlite" => StoreBackend::Sqlite(data_dir.join("scores.db")),
                "json" => StoreBackend::Json(data_dir.join("scores.json")),
                "memory" => StoreBackend::Memory,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "LUCKYBOT_STORE",
                        value: kind.clone(),
                    })
                }
            },
        };

        Ok(Self {
            credentials,
            subreddits,
            poll_interval: Duration::from_secs(poll_secs),
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = [
            ("REDDIT_CLIENT_ID", "id"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "luckybot"),
            ("REDDIT_PASSWORD", "hunter2"),
            ("LUCKYBOT_SUBREDDITS", "lucky"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    fn load(vars: HashMap<String, String>) -> Result<BotConfig, ConfigError> {
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(env(&[])).unwrap();

        assert_eq!(config.subreddits, vec!["lucky".to_string()]);
        assert_eq!(config.poll_interval, Duration::from_secs(DEFAULT_POLL_SECS));
        assert_eq!(
            config.store,
            StoreBackend::Sqlite(PathBuf::from("data").join("scores.db"))
        );
        assert!(config.credentials.user_agent.contains("/u/luckybot"));
    }

    #[test]
    fn subreddit_list_is_trimmed() {
        let config = load(env(&[("LUCKYBOT_SUBREDDITS", " r/one, two ,,")])).unwrap();
        assert_eq!(config.subreddits, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut vars = env(&[]);
        vars.remove("REDDIT_PASSWORD");
        assert!(matches!(load(vars), Err(ConfigError::Missing("REDDIT_PASSWORD"))));
    }

    #[test]
    fn store_backend_is_selectable() {
        let config = load(env(&[
            ("LUCKYBOT_STORE", "JSON"),
            ("LUCKYBOT_DATA_DIR", "/tmp/lb"),
        ]))
        .unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Json(PathBuf::from("/tmp/lb/scores.json"))
        );

        let config = load(env(&[("LUCKYBOT_STORE", "memory")])).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);

        assert!(matches!(
            load(env(&[("LUCKYBOT_STORE", "redis")])),
            Err(ConfigError::Invalid { key: "LUCKYBOT_STORE", .. })
        ));
    }

    #[test]
    fn poll_interval_must_be_positive() {
        assert!(load(env(&[("LUCKYBOT_POLL_SECS", "0")])).is_err());
        assert!(load(env(&[("LUCKYBOT_POLL_SECS", "soon")])).is_err());
        let config = load(env(&[("LUCKYBOT_POLL_SECS", "5")])).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
