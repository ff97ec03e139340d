//! Runtime configuration, loaded from `~/.ferry/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ferry_exec::{DispatcherSettings, RUN_COMMAND_PERMISSION};
use ferry_pty::profile::{TERMUX_HOME, TERMUX_PREFIX};
use ferry_pty::SessionProfile;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "FERRY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    /// Install prefix of the remote environment.
    pub prefix: PathBuf,
    pub home: PathBuf,
    /// Defaults to `<prefix>/bin/bash`.
    pub default_shell: Option<String>,
    pub scrollback_lines: usize,
    pub command_timeout_secs: u64,
    pub run_command_permission: String,
    pub granted_permissions: Vec<String>,
    /// Capacity of the session event and outbound channels.
    pub event_buffer: usize,
    /// Program and arguments that bring the remote app to the foreground.
    pub launcher: Option<Vec<String>>,
    pub extra_env: BTreeMap<String, String>,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            prefix: PathBuf::from(TERMUX_PREFIX),
            home: PathBuf::from(TERMUX_HOME),
            default_shell: None,
            scrollback_lines: 2000,
            command_timeout_secs: 15,
            run_command_permission: RUN_COMMAND_PERMISSION.to_string(),
            granted_permissions: vec![RUN_COMMAND_PERMISSION.to_string()],
            event_buffer: 256,
            launcher: None,
            extra_env: BTreeMap::new(),
        }
    }
}

impl FerryConfig {
    /// Load from `$FERRY_CONFIG`, else `~/.ferry/config.toml`.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        log::info!("loading config from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FerryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".to_string()));
        }
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }
        if matches!(&self.launcher, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::Invalid("launcher must name a program".to_string()));
        }
        Ok(())
    }

    pub fn session_profile(&self) -> SessionProfile {
        let mut profile = SessionProfile::with_prefix(&self.prefix, &self.home);
        if let Some(shell) = &self.default_shell {
            profile.default_shell = shell.clone();
        }
        profile.scrollback = self.scrollback_lines;
        profile.extra_env = self
            .extra_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        profile
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            timeout: Duration::from_secs(self.command_timeout_secs),
            permission: self.run_command_permission.clone(),
            ..DispatcherSettings::with_prefix(&self.prefix)
        }
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    home_dir().map(|home| home.join(".ferry").join("config.toml"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = FerryConfig::from_toml("").unwrap();
        assert_eq!(config, FerryConfig::default());
        assert_eq!(config.command_timeout_secs, 15);
        assert_eq!(config.scrollback_lines, 2000);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_partial_config() {
        let config = FerryConfig::from_toml(
            r#"
            prefix = "/opt/remote"
            command_timeout_secs = 30
            launcher = ["am", "start", "-n", "com.termux/.HomeActivity"]

            [extra_env]
            EDITOR = "vi"
            "#,
        )
        .unwrap();

        assert_eq!(config.prefix, PathBuf::from("/opt/remote"));
        assert_eq!(config.home, PathBuf::from(TERMUX_HOME));
        assert_eq!(config.launcher.as_ref().map(Vec::len), Some(4));

        let settings = config.dispatcher_settings();
        assert_eq!(settings.shell_path, "/opt/remote/bin/sh");
        assert_eq!(settings.timeout, Duration::from_secs(30));

        let profile = config.session_profile();
        assert_eq!(profile.default_shell, "/opt/remote/bin/bash");
        assert_eq!(profile.extra_env, vec![("EDITOR".to_string(), "vi".to_string())]);
    }

    #[test]
    fn test_default_shell_override() {
        let config = FerryConfig::from_toml(r#"default_shell = "/bin/zsh""#).unwrap();
        assert_eq!(config.session_profile().default_shell, "/bin/zsh");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FerryConfig::from_toml("event_buffer = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FerryConfig::from_toml("command_timeout_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FerryConfig::from_toml("launcher = []"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            FerryConfig::from_toml("scrollback_lines = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert_eq!(FerryConfig::load_from(&path).unwrap(), FerryConfig::default());

        std::fs::write(&path, "granted_permissions = []\n").unwrap();
        let config = FerryConfig::load_from(&path).unwrap();
        assert!(config.granted_permissions.is_empty());
    }
}
