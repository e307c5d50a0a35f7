//! Platform-specific state directory management

use crate::error::CoreResult;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where the state directories are rooted
#[derive(Debug, Clone)]
enum Root {
    /// Per-user platform directories
    Platform(ProjectDirs),
    /// `config`, `data` and `cache` below one directory
    Override(PathBuf),
    /// Same layout below the working directory
    Fallback,
}

/// Manages platform-specific application directories
#[derive(Debug, Clone)]
pub struct StateDir {
    root: Root,
}

impl StateDir {
    /// Use the platform directories for the current user
    #[must_use]
    pub fn new() -> Self {
        let root = ProjectDirs::from("online", "wiccagirl", "Katara").map_or_else(
            || {
                warn!("Failed to determine platform-specific directories, will use fallback");
                Root::Fallback
            },
            Root::Platform,
        );
        Self { root }
    }

    /// Keep all state below `path`
    #[must_use]
    pub fn with_override(path: impl Into<PathBuf>) -> Self {
        Self {
            root: Root::Override(path.into()),
        }
    }

    fn resolve(&self, leaf: &str, platform: fn(&ProjectDirs) -> &Path) -> PathBuf {
        match &self.root {
            Root::Platform(dirs) => platform(dirs).to_path_buf(),
            Root::Override(base) => base.join(leaf),
            Root::Fallback => Path::new(".").join(leaf),
        }
    }

    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.resolve("config", ProjectDirs::config_dir)
    }

    /// Session and logs
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.resolve("data", ProjectDirs::data_dir)
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve("cache", ProjectDirs::cache_dir)
    }

    /// User settings written by `config set-*`
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir().join("settings.json")
    }

    /// Persisted credential pair
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir().join("session.json")
    }

    /// Address to coordinate cache
    #[must_use]
    pub fn geocode_cache_path(&self) -> PathBuf {
        self.cache_dir().join("geocode.json")
    }

    /// Log file for a component
    #[must_use]
    pub fn log_path(&self, component: &str) -> PathBuf {
        self.data_dir().join(format!("{component}.log"))
    }

    /// Create all required directories
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub async fn create_directories(&self) -> CoreResult<()> {
        for dir in [self.config_dir(), self.data_dir(), self.cache_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
            debug!("Ensured directory exists: {}", dir.display());
        }
        Ok(())
    }
}

impl Default for StateDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_directory() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());

        assert_eq!(state_dir.config_dir(), temp_dir.path().join("config"));
        assert_eq!(state_dir.data_dir(), temp_dir.path().join("data"));
        assert_eq!(state_dir.cache_dir(), temp_dir.path().join("cache"));
        assert_eq!(
            state_dir.session_path(),
            temp_dir.path().join("data").join("session.json")
        );
        assert_eq!(
            state_dir.log_path("cli"),
            temp_dir.path().join("data").join("cli.log")
        );
    }

    #[test]
    fn test_fallback_is_relative() {
        let state_dir = StateDir {
            root: Root::Fallback,
        };
        assert_eq!(state_dir.config_dir(), Path::new("./config"));
        assert_eq!(state_dir.settings_path(), Path::new("./config/settings.json"));
        assert_eq!(state_dir.geocode_cache_path(), Path::new("./cache/geocode.json"));
    }

    #[tokio::test]
    async fn test_create_directories() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = StateDir::with_override(temp_dir.path());

        state_dir.create_directories().await.unwrap();

        assert!(state_dir.config_dir().exists());
        assert!(state_dir.data_dir().exists());
        assert!(state_dir.cache_dir().exists());
    }
}
