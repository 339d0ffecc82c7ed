//! Static facts that conditions may test besides the selection itself.
//!
//! Facts describe where a resolution happens: the platform, the active compiler and
//! the package version being configured. They are fixed for one resolution request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::version::PackageVersion;

/// Identity of the compiler a package is configured with (`%gcc@12.2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerId {
    pub name: String,
    pub version: Option<PackageVersion>,
}

impl CompilerId {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        CompilerId {
            name: name.into(),
            version: version.map(PackageVersion::new),
        }
    }
}

impl fmt::Display for CompilerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Facts about the resolution environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    /// Platform family: "linux", "darwin", "windows", ...
    pub platform: String,

    /// Operating system name
    pub os: String,

    /// CPU architecture: "x86_64", "aarch64"
    pub arch: String,

    /// Active compiler, if known
    pub compiler: Option<CompilerId>,

    /// Version of the package being resolved
    pub version: Option<PackageVersion>,
}

impl Facts {
    /// Facts for the host this process runs on. No compiler is assumed.
    pub fn host() -> Self {
        let os = std::env::consts::OS;
        let platform = match os {
            "macos" => "darwin",
            other => other,
        };

        Facts {
            platform: platform.to_string(),
            os: os.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            compiler: None,
            version: None,
        }
    }

    /// Set the platform family.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the compiler identity.
    pub fn with_compiler(mut self, compiler: CompilerId) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Set the package version under resolution.
    pub fn with_version(mut self, version: PackageVersion) -> Self {
        self.version = Some(version);
        self
    }
}
