//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schedule::TimeParser;

const ENV_HISTORY_LIMIT: &str = "WALLET_INTENT_HISTORY_LIMIT";
const ENV_MAX_SUGGESTIONS: &str = "WALLET_INTENT_MAX_SUGGESTIONS";
const ENV_UTC_OFFSET: &str = "WALLET_INTENT_UTC_OFFSET_MINUTES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each of the undo and redo stacks.
    pub history_limit: usize,
    pub max_suggestions: usize,
    /// Offset of the user's wall clock from UTC.
    pub utc_offset_minutes: i32,
    /// Hour used when an expression names a date but no time.
    pub default_hour: u32,
    /// MEV usage ratio at which protection is suggested.
    pub mev_ratio_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            max_suggestions: 3,
            utc_offset_minutes: 0,
            default_hour: 9,
            mev_ratio_threshold: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `WALLET_INTENT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_HISTORY_LIMIT) {
            config.history_limit = parse_var(ENV_HISTORY_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_SUGGESTIONS) {
            config.max_suggestions = parse_var(ENV_MAX_SUGGESTIONS, &value)?;
        }
        if let Some(value) = lookup(ENV_UTC_OFFSET) {
            config.utc_offset_minutes = parse_var(ENV_UTC_OFFSET, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(Error::Config("history_limit must be at least 1".to_string()));
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(Error::Config(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            )));
        }
        if self.default_hour > 23 {
            return Err(Error::Config(format!(
                "default_hour {} is not an hour of the day",
                self.default_hour
            )));
        }
        if !(0.0..=1.0).contains(&self.mev_ratio_threshold) {
            return Err(Error::Config(
                "mev_ratio_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    pub fn time_parser(&self) -> TimeParser {
        TimeParser::new(self.utc_offset_minutes, self.default_hour)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "history_limit": 5, "utc_offset_minutes": -300 }"#).unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.utc_offset_minutes, -300);
        assert_eq!(config.max_suggestions, 3);
        assert_eq!(config.default_hour, 9);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_HISTORY_LIMIT, "50"), (ENV_MAX_SUGGESTIONS, "5")]
            .into_iter()
            .collect();
        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.max_suggestions, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_lookup(|key| {
            (key == ENV_HISTORY_LIMIT).then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = EngineConfig {
            default_hour: 24,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
