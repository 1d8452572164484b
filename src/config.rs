//! Configuration loading - `~/.config/kino/config.toml`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of decoded frames buffered ahead of presentation
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Default number of preloaded image previews kept in memory
pub const DEFAULT_PRELOAD_CAPACITY: usize = 16;

/// User configuration
///
/// Every field has a default, so an absent config file is not an error.
/// A file that exists but fails to parse is reported at startup instead of
/// being silently ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Graphics backend override: "kitty", "sixel", or "blocks"
    pub backend: Option<String>,
    /// Maximum decoded frames buffered ahead of presentation
    pub queue_capacity: usize,
    /// Maximum preloaded images kept in the preview cache
    pub preload_capacity: usize,
    /// Show dotfiles in the browser
    pub show_hidden: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            preload_capacity: DEFAULT_PRELOAD_CAPACITY,
            show_hidden: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns defaults when no config file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Default config file path (`~/.config/kino/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kino").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.backend.is_none());
        assert!(!config.show_hidden);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "backend = \"blocks\"").unwrap();
        writeln!(file, "queue_capacity = 4").unwrap();
        writeln!(file, "show_hidden = true").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.as_deref(), Some("blocks"));
        assert_eq!(config.queue_capacity, 4);
        assert!(config.show_hidden);
        // Unspecified fields fall back to defaults
        assert_eq!(config.preload_capacity, DEFAULT_PRELOAD_CAPACITY);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "queue_capacity = \"not a number\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
