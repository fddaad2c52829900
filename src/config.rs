// ⚙️ Configuration
// Values come from the environment (after an optional .env file) and can be
// overridden by CLI flags. The database location is required; without it no
// stage may run.

use crate::error::ConfigError;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing::debug;

pub const ENV_DATABASE: &str = "TRAVEL_LOG_DB";
pub const ENV_ERROR_LOG: &str = "TRAVEL_LOG_ERROR_LOG";
pub const ENV_MEDIA_BASE: &str = "TRAVEL_LOG_MEDIA_BASE";

pub const DEFAULT_ERROR_LOG: &str = "migration_errors.jsonl";
pub const DEFAULT_MEDIA_BASE: &str = "/media";

/// Errors shown per stage in the run summary
pub const SUMMARY_ERROR_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub database: PathBuf,

    /// JSON-lines artifact receiving every per-record error
    pub error_log: PathBuf,

    /// URL prefix used when localizing media references
    pub media_base: String,
}

/// CLI-level overrides; `None` falls back to the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub error_log: Option<PathBuf>,
    pub media_base: Option<String>,
}

static DOTENV: OnceCell<()> = OnceCell::new();

/// Load `.env` into the process environment, at most once per process
pub fn load_dotenv() {
    DOTENV.get_or_init(|| {
        if dotenvy::dotenv().is_err() {
            debug!(".env file not found, using process environment");
        }
    });
}

impl Config {
    /// Load `.env` (if present) and resolve configuration
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        load_dotenv();
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve from overrides and a variable lookup
    pub fn resolve<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database = overrides
            .database
            .or_else(|| non_empty(ENV_DATABASE).map(PathBuf::from))
            .ok_or(ConfigError::Missing(ENV_DATABASE))?;

        if database.as_os_str().is_empty() {
            return Err(ConfigError::Missing(ENV_DATABASE));
        }

        let error_log = overrides
            .error_log
            .or_else(|| non_empty(ENV_ERROR_LOG).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ERROR_LOG));

        let media_base = resolve_media_base(overrides.media_base, &lookup)?;

        Ok(Config {
            database,
            error_log,
            media_base,
        })
    }
}

/// Media URL prefix on its own; media commands need no database
pub fn load_media_base(media_base: Option<String>) -> Result<String, ConfigError> {
    load_dotenv();
    resolve_media_base(media_base, |key| std::env::var(key).ok())
}

fn resolve_media_base<F>(media_base: Option<String>, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let media_base = media_base
        .or_else(|| lookup(ENV_MEDIA_BASE).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
        .unwrap_or_else(|| DEFAULT_MEDIA_BASE.to_string());

    if !media_base.starts_with('/') {
        return Err(ConfigError::Invalid {
            key: ENV_MEDIA_BASE,
            message: format!("'{}' must start with '/'", media_base),
        });
    }

    Ok(media_base.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_database_is_fatal() {
        let result = Config::resolve(ConfigOverrides::default(), env(&[]));
        assert!(matches!(result, Err(ConfigError::Missing(ENV_DATABASE))));

        let result = Config::resolve(ConfigOverrides::default(), env(&[(ENV_DATABASE, "  ")]));
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            Config::resolve(ConfigOverrides::default(), env(&[(ENV_DATABASE, "blog.db")])).unwrap();

        assert_eq!(config.database, PathBuf::from("blog.db"));
        assert_eq!(config.error_log, PathBuf::from(DEFAULT_ERROR_LOG));
        assert_eq!(config.media_base, "/media");
    }

    #[test]
    fn test_overrides_win_over_environment() {
        let overrides = ConfigOverrides {
            database: Some(PathBuf::from("cli.db")),
            error_log: None,
            media_base: Some("/static/media/".to_string()),
        };
        let config = Config::resolve(
            overrides,
            env(&[(ENV_DATABASE, "env.db"), (ENV_ERROR_LOG, "errs.jsonl")]),
        )
        .unwrap();

        assert_eq!(config.database, PathBuf::from("cli.db"));
        assert_eq!(config.error_log, PathBuf::from("errs.jsonl"));
        assert_eq!(config.media_base, "/static/media");
    }

    #[test]
    fn test_relative_media_base_rejected() {
        let result = Config::resolve(
            ConfigOverrides::default(),
            env(&[(ENV_DATABASE, "blog.db"), (ENV_MEDIA_BASE, "media")]),
        );
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_dotenv_loaded_once() {
        load_dotenv();
        assert!(DOTENV.get().is_some());
        // second call is a no-op
        load_dotenv();
        assert!(DOTENV.get().is_some());
    }
}
