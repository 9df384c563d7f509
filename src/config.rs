//! Extension configuration.
//!
//! Settings come from `$XDG_CONFIG_HOME/texclip/config.toml` when present.
//! The launcher's own preferences are layered on top at runtime.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::math::RenderOptions;

/// Preference id for the clipboard command.
pub const COPY_COMMAND_PREFERENCE: &str = "copy_command";

const DEFAULT_ICON: &str = "images/icon.png";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Icon shown next to result items.
    pub icon: PathBuf,
    /// Shell command that reads a PNG on stdin and puts it on the clipboard.
    /// Unset means the native clipboard is used.
    pub copy_command: Option<String>,
    pub render: RenderOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            icon: PathBuf::from(DEFAULT_ICON),
            copy_command: None,
            render: RenderOptions::default(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("texclip").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is None.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Self::from_toml(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply a single launcher preference. Unknown ids are ignored.
    ///
    /// Returns true if the preference was recognised.
    pub fn apply_preference(&mut self, id: &str, value: Option<&str>) -> bool {
        match id {
            COPY_COMMAND_PREFERENCE => {
                self.copy_command = value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_render_table() {
        let config = Config::from_toml(
            r#"
            copy_command = "wl-copy --type image/png"

            [render]
            font_size = 25.0
            "#,
        )
        .unwrap();

        assert_eq!(config.copy_command.as_deref(), Some("wl-copy --type image/png"));
        assert_eq!(config.render.font_size, 25.0);
        assert_eq!(
            config.render.canvas_width,
            RenderOptions::default().canvas_width
        );
        assert_eq!(config.icon, PathBuf::from(DEFAULT_ICON));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Config::from_toml("render = 3").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("texclip-does-not-exist/config.toml");
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());
    }

    #[test]
    fn test_apply_preference() {
        let mut config = Config::default();
        assert!(config.apply_preference(COPY_COMMAND_PREFERENCE, Some(" xclip -t image/png ")));
        assert_eq!(config.copy_command.as_deref(), Some("xclip -t image/png"));

        assert!(config.apply_preference(COPY_COMMAND_PREFERENCE, Some("")));
        assert_eq!(config.copy_command, None);

        assert!(!config.apply_preference("keyword", Some("tex")));
    }
}
