//! Layered configuration: built-in defaults, the user config file, an
//! explicit `--config` file, then `TC_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding the event log and intervals.
    pub database_path: PathBuf,

    /// Category used by `tc start` when `--category` is not given.
    #[serde(default)]
    pub default_category: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tracker.db"),
            default_category: None,
        }
    }
}

impl Config {
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("TC_"));

        figment.extract()
    }

    /// Creates the directory that will hold the database file.
    pub fn ensure_database_dir(&self) -> anyhow::Result<()> {
        match self.database_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display())),
            _ => Ok(()),
        }
    }

    /// Category for a new session: the flag wins over the configured default.
    pub fn category_for<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.default_category.as_deref())
    }
}

fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("timeclock"))
}

/// On Linux: `~/.local/share/timeclock`
fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("timeclock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_database_lives_in_data_dir() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(data_dir.file_name().unwrap(), "timeclock");
        assert_eq!(config.database_path, data_dir.join("tracker.db"));
        assert_eq!(config.default_category, None);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config_file = temp.path().join("custom.toml");
        std::fs::write(
            &config_file,
            "database_path = \"/tmp/custom.db\"\ndefault_category = \"Training\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&config_file)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.default_category.as_deref(), Some("Training"));
    }

    #[test]
    fn category_flag_beats_default() {
        let config = Config {
            database_path: PathBuf::from("tracker.db"),
            default_category: Some("Task".to_string()),
        };
        assert_eq!(config.category_for(Some("Project")), Some("Project"));
        assert_eq!(config.category_for(None), Some("Task"));
    }

    #[test]
    fn ensure_database_dir_creates_parents() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("a/b/tracker.db"),
            default_category: None,
        };
        config.ensure_database_dir().unwrap();
        assert!(temp.path().join("a/b").is_dir());
    }
}
