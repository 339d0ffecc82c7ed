//! Loading package descriptors from disk.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::descriptor::{DescriptorError, PackageDescriptor};
use crate::core::manifest::parse_descriptor;
use crate::util::diagnostic::DescriptorSyntaxError;

/// Read and parse a descriptor file.
///
/// TOML syntax errors come back as [`DescriptorSyntaxError`] so the caller can show
/// the offending line; everything else carries the file path as context.
pub fn load_descriptor(path: &Path) -> Result<PackageDescriptor> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read descriptor: {}", path.display()))?;

    match parse_descriptor(&contents) {
        Ok(descriptor) => {
            tracing::debug!(
                package = %descriptor.name,
                variants = descriptor.variants.len(),
                dependencies = descriptor.dependencies.len(),
                "loaded descriptor"
            );
            Ok(descriptor)
        }
        Err(DescriptorError::Toml(e)) => {
            let message = e.message().to_string();
            let span = e.span();
            Err(DescriptorSyntaxError::new(path.display().to_string(), contents, message, span).into())
        }
        Err(e) => Err(anyhow::Error::new(e))
            .with_context(|| format!("invalid descriptor: {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_descriptor() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keel.toml");
        std::fs::write(
            &path,
            "[package]\nname = \"zlib\"\n\n[variants.shared]\ndefault = true\n",
        )
        .unwrap();

        let d = load_descriptor(&path).unwrap();
        assert_eq!(d.name, "zlib");
        assert!(d.variants.contains("shared"));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_descriptor(&tmp.path().join("keel.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read descriptor"));
    }

    #[test]
    fn test_syntax_error_keeps_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keel.toml");
        std::fs::write(&path, "[package\nname = \"zlib\"\n").unwrap();

        let err = load_descriptor(&path).unwrap_err();
        let syntax = err.downcast_ref::<DescriptorSyntaxError>().unwrap();
        assert!(syntax.span.is_some());
    }

    #[test]
    fn test_invalid_descriptor_has_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keel.toml");
        std::fs::write(
            &path,
            "[package]\nname = \"zlib\"\n\n[[conflicts]]\na = \"+(\"\n",
        )
        .unwrap();

        let err = load_descriptor(&path).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("invalid descriptor"));
        assert!(msg.contains("conflicts[0]"));
    }
}
