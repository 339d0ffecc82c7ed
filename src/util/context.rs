//! Global context for keel operations.
//!
//! Provides centralized access to configuration, paths, and output settings.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::manifest::DESCRIPTOR_NAME;
use crate::util::config::{self, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global keel data (~/.keel/)
    home: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,

    /// Merged global and project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_home(cwd, config::global_config_dir()))
    }

    /// Create a GlobalContext with explicit working and home directories.
    pub fn with_home(cwd: PathBuf, home: Option<PathBuf>) -> Self {
        let global = home.as_ref().map(|h| h.join("config.toml"));
        let config = config::load_config(global.as_deref(), &config::project_config_path(&cwd));
        let color = config.output.color.unwrap_or(true);

        GlobalContext {
            cwd,
            home,
            verbose: false,
            color,
            config,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the keel home directory (~/.keel/), if a home directory exists.
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|h| h.join("config.toml"))
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        config::project_config_path(&self.cwd)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Resolve a descriptor path given on the command line, relative to cwd.
    ///
    /// A directory means the `keel.toml` inside it.
    pub fn descriptor_path(&self, path: &Path) -> Result<PathBuf> {
        let path = self.cwd.join(path);
        let path = if path.is_dir() {
            path.join(DESCRIPTOR_NAME)
        } else {
            path
        };
        if !path.is_file() {
            bail!("descriptor not found: {}", path.display());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_home(tmp.path().to_path_buf(), Some(tmp.path().join("home")));
        assert_eq!(ctx.cwd(), tmp.path());
        assert_eq!(ctx.config_path(), Some(tmp.path().join("home").join("config.toml")));
        assert_eq!(ctx.project_config_path(), tmp.path().join(".keel").join("config.toml"));
        assert!(ctx.color());
    }

    #[test]
    fn test_descriptor_path() {
        let tmp = TempDir::new().unwrap();
        let descriptor = tmp.path().join(DESCRIPTOR_NAME);
        std::fs::write(&descriptor, "[package]\nname = \"zlib\"\n").unwrap();

        let ctx = GlobalContext::with_home(tmp.path().to_path_buf(), None);
        assert_eq!(ctx.descriptor_path(Path::new(".")).unwrap(), descriptor);
        assert_eq!(ctx.descriptor_path(Path::new(DESCRIPTOR_NAME)).unwrap(), descriptor);
        assert!(ctx.descriptor_path(Path::new("missing.toml")).is_err());
    }

    #[test]
    fn test_project_config_loaded() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".keel");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[output]\ncolor = false\n").unwrap();

        let ctx = GlobalContext::with_home(tmp.path().to_path_buf(), None);
        assert!(!ctx.color());
    }
}
