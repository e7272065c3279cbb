use std::path::PathBuf;

use thiserror::Error;

const BUCKET_VAR: &str = "BERTH_BUCKET";
const PREFIX_VAR: &str = "BERTH_PREFIX";
const NETWORK_VAR: &str = "BERTH_NETWORK";
const HOME_VAR: &str = "BERTH_HOME";

const DEFAULT_PREFIX: &str = "berth";
const DEFAULT_NETWORK: &str = "berth";

/// Bootstrap failures are fatal and surface before any lock is taken.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is not set")]
    MissingVariable(&'static str),
    #[error("cannot determine a home directory for local state (set {HOME_VAR})")]
    NoHomeDirectory,
}

/// Constructed once at startup and passed by reference into store and
/// adapter constructors; core logic performs no ambient environment lookups.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub bucket: String,
    pub prefix: String,
    pub network: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bucket = non_empty(lookup(BUCKET_VAR))
            .ok_or(ConfigError::MissingVariable(BUCKET_VAR))?;
        let prefix =
            non_empty(lookup(PREFIX_VAR)).unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let network =
            non_empty(lookup(NETWORK_VAR)).unwrap_or_else(|| DEFAULT_NETWORK.to_string());

        let data_dir = match non_empty(lookup(HOME_VAR)) {
            Some(dir) => PathBuf::from(dir),
            None => non_empty(lookup("HOME"))
                .map(|home| PathBuf::from(home).join(".berth"))
                .ok_or(ConfigError::NoHomeDirectory)?,
        };

        Ok(Self {
            bucket,
            prefix,
            network,
            data_dir,
        })
    }

    pub fn state_key(&self) -> String {
        format!("{}/state.json", self.prefix)
    }

    pub fn local_state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("state.lock")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Config, ConfigError};

    #[test]
    fn missing_bucket_is_a_configuration_error() {
        let error = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(error, ConfigError::MissingVariable("BERTH_BUCKET"));
    }

    #[test]
    fn defaults_apply_when_only_bucket_is_set() {
        let config = Config::from_lookup(|key| match key {
            "BERTH_BUCKET" => Some("deploy-state".to_string()),
            "HOME" => Some("/home/agent".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.bucket, "deploy-state");
        assert_eq!(config.network, "berth");
        assert_eq!(config.state_key(), "berth/state.json");
        assert_eq!(
            config.local_state_path(),
            PathBuf::from("/home/agent/.berth/state.json")
        );
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/home/agent/.berth/state.lock")
        );
    }

    #[test]
    fn explicit_home_overrides_derived_data_dir() {
        let config = Config::from_lookup(|key| match key {
            "BERTH_BUCKET" => Some("deploy-state".to_string()),
            "BERTH_HOME" => Some("/var/lib/berth".to_string()),
            "BERTH_PREFIX" => Some("staging".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/berth"));
        assert_eq!(config.state_key(), "staging/state.json");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let error = Config::from_lookup(|key| match key {
            "BERTH_BUCKET" => Some("  ".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert_eq!(error, ConfigError::MissingVariable("BERTH_BUCKET"));
    }
}
