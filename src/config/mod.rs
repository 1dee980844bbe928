#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use directories::{BaseDirs, ProjectDirs};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TodoError;
use crate::task::storage::{DEFAULT_KEY, validate_key};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub reminders: ReminderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Unset means the platform data directory.
    #[serde(alias = "data_dir", skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(alias = "prefs_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            key: DEFAULT_KEY.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReminderConfig {
    pub backend: ReminderBackend,
    pub label: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            backend: ReminderBackend::Timer,
            label: "Reminder".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderBackend {
    Timer,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

/// Where the config file is read from and where the task list lives unless
/// `storage.dir` says otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Self-contained layout under one directory, for portable installs.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            config_file: root.join("config.toml"),
            data_dir: root.join("data"),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        self.config_file.parent().unwrap_or_else(|| Path::new("."))
    }
}

pub fn default_paths() -> anyhow::Result<AppPaths> {
    let dirs = ProjectDirs::from("com", "simpletodo", "simpletodo")
        .context("failed to determine a home directory for config and data")?;
    Ok(AppPaths {
        config_file: dirs.config_dir().join("config.toml"),
        data_dir: dirs.data_dir().to_path_buf(),
    })
}

pub fn load() -> anyhow::Result<(Config, AppPaths)> {
    let paths = default_paths()?;
    let cfg = load_from(&paths)?;
    Ok((cfg, paths))
}

/// Reads and validates `paths.config_file`. A missing file means defaults.
pub fn load_from(paths: &AppPaths) -> anyhow::Result<Config> {
    let path = &paths.config_file;
    let cfg = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Config>(&raw)
            .with_context(|| format!("failed to deserialize TOML in {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<(), TodoError> {
        if self.storage.dir.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(TodoError::Config(
                "storage.dir must not be empty when set".to_owned(),
            ));
        }
        validate_key(&self.storage.key)
            .map_err(|e| TodoError::Config(format!("storage.key: {e}")))?;
        if self.reminders.label.trim().is_empty() {
            return Err(TodoError::Config(
                "reminders.label must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Directory the task list is stored in. `~` and `$VAR` are expanded in
    /// `storage.dir`; a relative value is taken from the config file's
    /// directory.
    #[must_use]
    pub fn storage_dir(&self, paths: &AppPaths) -> PathBuf {
        let Some(dir) = self.storage.dir.as_deref() else {
            return paths.data_dir.clone();
        };
        let expanded = PathBuf::from(expand_env_vars(&expand_tilde(dir)));
        if expanded.is_absolute() {
            expanded
        } else {
            paths.config_dir().join(expanded)
        }
    }
}

#[must_use]
pub fn expand_tilde(input: &str) -> String {
    let rest = match input.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
        _ => return input.to_owned(),
    };
    match BaseDirs::new() {
        Some(base) => base.home_dir().join(rest).to_string_lossy().to_string(),
        None => input.to_owned(),
    }
}

static ENV_VAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").ok());

/// Expands `$VAR` and `${VAR}`; unknown variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let Some(re) = ENV_VAR.as_ref() else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_owned())
    })
    .to_string()
}
