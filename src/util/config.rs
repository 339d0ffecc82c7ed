//! Configuration file support for keel.
//!
//! keel reads two configuration files:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, field by field.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::facts::{CompilerId, Facts};

/// keel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platform fact overrides
    pub platform: PlatformConfig,

    /// Active compiler
    pub compiler: CompilerConfig,

    /// Install prefixes by package name
    pub prefixes: BTreeMap<String, PathBuf>,

    /// Install tree used for prefixes not listed above
    pub store: StoreConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Overrides of the host platform facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Platform family (linux, darwin, windows, ...)
    pub platform: Option<String>,

    /// Operating system name
    pub os: Option<String>,

    /// CPU architecture
    pub arch: Option<String>,
}

/// The compiler packages are configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Compiler name (gcc, clang, ...)
    pub name: Option<String>,

    /// Compiler version
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the install tree; `<root>/<name>` is a package's default prefix
    pub root: Option<PathBuf>,
}

/// Output format for commands that print resolutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,

    /// Colored diagnostics
    pub color: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.platform.platform.is_some() {
            self.platform.platform = other.platform.platform;
        }
        if other.platform.os.is_some() {
            self.platform.os = other.platform.os;
        }
        if other.platform.arch.is_some() {
            self.platform.arch = other.platform.arch;
        }

        // A compiler is one identity; never mix a global name with a project version
        if other.compiler.name.is_some() {
            self.compiler = other.compiler;
        }

        self.prefixes.extend(other.prefixes);

        if other.store.root.is_some() {
            self.store.root = other.store.root;
        }

        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
        if other.output.color.is_some() {
            self.output.color = other.output.color;
        }
    }

    /// Host facts with the configured overrides applied.
    pub fn facts(&self) -> Facts {
        let mut facts = Facts::host();
        if let Some(platform) = &self.platform.platform {
            facts.platform = platform.clone();
        }
        if let Some(os) = &self.platform.os {
            facts.os = os.clone();
        }
        if let Some(arch) = &self.platform.arch {
            facts.arch = arch.clone();
        }
        if let Some(name) = &self.compiler.name {
            facts.compiler = Some(CompilerId::new(name, self.compiler.version.as_deref()));
        }
        facts
    }

    /// Install prefix of one package: an explicit entry, else `<store>/<name>`.
    pub fn prefix(&self, name: &str) -> Option<PathBuf> {
        self.prefixes
            .get(name)
            .cloned()
            .or_else(|| self.store.root.as_ref().map(|root| root.join(name)))
    }

    /// Prefixes for a set of package names. Names with no known prefix are left out.
    pub fn prefixes_for<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, PathBuf> {
        names
            .into_iter()
            .filter_map(|name| self.prefix(name).map(|p| (name.to_string(), p)))
            .collect()
    }

    pub fn format(&self) -> OutputFormat {
        self.output.format.unwrap_or_default()
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keel"))
}

/// Get the global config path (~/.keel/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.keel/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".keel").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.prefixes.is_empty());
        assert!(config.store.root.is_none());
        assert_eq!(config.format(), OutputFormat::Text);
        assert_eq!(config.facts(), Facts::host());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[platform]
platform = "linux"
arch = "aarch64"

[compiler]
name = "gcc"
version = "12.2"

[prefixes]
python = "/usr"

[store]
root = "/opt/keel"

[output]
format = "json"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        let facts = config.facts();
        assert_eq!(facts.platform, "linux");
        assert_eq!(facts.arch, "aarch64");
        assert_eq!(facts.compiler.unwrap().to_string(), "gcc@12.2");
        assert_eq!(config.prefix("python"), Some(PathBuf::from("/usr")));
        assert_eq!(config.prefix("vistle"), Some(PathBuf::from("/opt/keel/vistle")));
        assert_eq!(config.format(), OutputFormat::Json);
    }

    #[test]
    fn test_config_load_or_default_on_bad_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[store\nroot = 1").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
        assert_eq!(
            Config::load_or_default(&tmp.path().join("missing.toml")),
            Config::default()
        );
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.store.root = Some(PathBuf::from("/global"));
        base.prefixes.insert("python".into(), PathBuf::from("/usr"));
        base.compiler.name = Some("gcc".into());
        base.compiler.version = Some("12".into());

        let mut project = Config::default();
        project.prefixes.insert("vtk".into(), PathBuf::from("/opt/vtk"));
        project.compiler.name = Some("clang".into());

        base.merge(project);

        assert_eq!(base.store.root, Some(PathBuf::from("/global"))); // Not overridden
        assert_eq!(base.prefixes.len(), 2);
        assert_eq!(base.compiler.name.as_deref(), Some("clang"));
        assert!(base.compiler.version.is_none());
    }

    #[test]
    fn test_load_config_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = project_config_path(tmp.path());
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();
        std::fs::write(&global, "[output]\nformat = \"json\"\ncolor = false\n").unwrap();
        std::fs::write(&project, "[output]\nformat = \"text\"\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.format(), OutputFormat::Text);
        assert_eq!(config.output.color, Some(false));
    }

    #[test]
    fn test_prefixes_for() {
        let mut config = Config::default();
        config.prefixes.insert("hip".into(), PathBuf::from("/opt/rocm"));
        let prefixes = config.prefixes_for(["hip", "kokkos"]);
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes["hip"], PathBuf::from("/opt/rocm"));
    }
}
