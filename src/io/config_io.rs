use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::config::{FireTime, Settings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("invalid settings file: {0}")]
    ParseError(#[from] toml_edit::TomlError),
    #[error("unknown setting '{0}' (expected markdown_path, notification_time, features.notifications or features.recurring)")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: &'static str,
    },
    #[error("no settings location: set XDG_CONFIG_HOME or HOME, or pass --config")]
    NoConfigDir,
}

/// Keys accepted by [`set_setting`].
pub const SETTING_KEYS: &[&str] = &[
    "markdown_path",
    "notification_time",
    "features.notifications",
    "features.recurring",
];

/// Default settings file: `$XDG_CONFIG_HOME/zuri/settings.toml`, falling back
/// to `~/.config/zuri/settings.toml`.
pub fn settings_path() -> Result<PathBuf, ConfigError> {
    let config_dir = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME")
        && !home.is_empty()
    {
        PathBuf::from(home).join(".config")
    } else {
        return Err(ConfigError::NoConfigDir);
    };
    Ok(config_dir.join("zuri").join("settings.toml"))
}

/// Load settings. A missing file gives defaults; so does a file that does not
/// parse, after a warning.
pub fn load_settings(path: &Path) -> Settings {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read settings, using defaults");
            return Settings::default();
        }
    };
    match toml::from_str(&text) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
            Settings::default()
        }
    }
}

/// Set a single key in the settings file, keeping the rest of the file as it
/// was. Returns the settings as they read after the edit.
pub fn set_setting(path: &Path, key: &str, value: &str) -> Result<Settings, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let mut doc: toml_edit::DocumentMut = text.parse()?;
    apply_setting(&mut doc, key, value)?;

    let write = |e: io::Error| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(write)?;
    }
    atomic_write(path, doc.to_string().as_bytes()).map_err(write)?;
    tracing::info!(path = %path.display(), key, value, "setting updated");
    Ok(load_settings(path))
}

fn apply_setting(doc: &mut toml_edit::DocumentMut, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };
    match key {
        "markdown_path" => {
            if value.trim().is_empty() {
                return Err(invalid("expected a file path"));
            }
            doc["markdown_path"] = toml_edit::value(value);
        }
        "notification_time" => {
            let time = FireTime::parse(value).ok_or_else(|| invalid("expected HH:MM"))?;
            doc["notification_time"] = toml_edit::value(time.to_string());
        }
        "features.notifications" | "features.recurring" => {
            let flag = match value {
                "true" => true,
                "false" => false,
                _ => return Err(invalid("expected true or false")),
            };
            if !doc.contains_key("features") {
                doc["features"] = toml_edit::Item::Table(toml_edit::Table::new());
            }
            let name = key.trim_start_matches("features.");
            doc["features"][name] = toml_edit::value(flag);
        }
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}
