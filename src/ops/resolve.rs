//! Resolution operations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::core::descriptor::PackageDescriptor;
use crate::core::selection::parse_spec;
use crate::resolver::{Resolution, ResolveError, ResolveRequest, Resolver};
use crate::util::config::Config;

/// Inputs for resolving one or more selections of a package.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Selection strings; an empty list resolves the defaults
    pub specs: Vec<String>,

    /// Version requested outside the spec string
    pub version: Option<String>,

    /// Install prefixes given on the command line, overriding config
    pub prefixes: BTreeMap<String, PathBuf>,
}

/// Every package name the descriptor could need an install prefix for.
fn prefix_names(descriptor: &PackageDescriptor) -> Vec<&str> {
    let mut names = vec![descriptor.name.as_str()];
    names.extend(descriptor.dependencies.iter().map(|d| d.target.as_str()));
    names.extend(descriptor.toolchains.iter().map(|t| t.dependency.as_str()));
    names.sort_unstable();
    names.dedup();
    names
}

/// Turn a spec string into a request, filling facts and prefixes from config.
pub fn build_request(
    descriptor: &PackageDescriptor,
    config: &Config,
    spec: &str,
    opts: &ResolveOptions,
) -> Result<ResolveRequest> {
    let parsed = parse_spec(spec)
        .with_context(|| format!("invalid selection `{}`", spec))?;

    let version = match (parsed.version, opts.version.clone()) {
        (Some(a), Some(b)) if a != b => {
            bail!("selection `{}` asks for @{} but --version is {}", spec, a, b)
        }
        (a, b) => a.or(b),
    };

    let mut facts = config.facts();
    if let Some(compiler) = parsed.compiler {
        facts = facts.with_compiler(compiler);
    }

    let mut request = ResolveRequest::new(parsed.selection).with_facts(facts);
    request.prefixes = config.prefixes_for(prefix_names(descriptor));
    request.prefixes.extend(opts.prefixes.clone());
    if let Some(version) = version {
        request = request.with_version(version);
    }

    Ok(request)
}

/// Build one request per spec, or a single default request when none is given.
pub fn build_requests(
    descriptor: &PackageDescriptor,
    config: &Config,
    opts: &ResolveOptions,
) -> Result<Vec<ResolveRequest>> {
    if opts.specs.is_empty() {
        return Ok(vec![build_request(descriptor, config, "", opts)?]);
    }
    opts.specs
        .iter()
        .map(|spec| build_request(descriptor, config, spec, opts))
        .collect()
}

/// Resolve a single request.
pub fn resolve_spec(
    descriptor: &PackageDescriptor,
    request: &ResolveRequest,
) -> Result<Resolution, ResolveError> {
    Resolver::new(descriptor).resolve(request)
}

/// Resolve independent requests in parallel. Results keep the order of `requests`.
pub fn resolve_many(
    descriptor: &PackageDescriptor,
    requests: &[ResolveRequest],
) -> Vec<Result<Resolution, ResolveError>> {
    let resolver = Resolver::new(descriptor);
    tracing::debug!(count = requests.len(), "resolving in parallel");
    requests.par_iter().map(|r| resolver.resolve(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::parse_descriptor;

    const DESCRIPTOR: &str = r#"
[package]
name = "vistle"

[[version]]
id = "2024.2"

[[version]]
id = "2025.1"

[variants.python]
default = true

[variants.tui]
default = true

[[depends]]
spec = "python@2.7:"
when = "+python"

[[conflicts]]
a = "+tui"
b = "~python"
msg = "Python is required to interpret user input"

[[env.run]]
set = "VISTLE_ROOT"
value = "{prefix}"
"#;

    fn descriptor() -> PackageDescriptor {
        parse_descriptor(DESCRIPTOR).unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.store.root = Some(PathBuf::from("/opt/keel"));
        config
    }

    #[test]
    fn test_build_request() {
        let d = descriptor();
        let req = build_request(&d, &config(), "@2024.2 %gcc@12 ~tui", &ResolveOptions::default()).unwrap();
        assert_eq!(req.version.as_deref(), Some("2024.2"));
        assert_eq!(req.facts.compiler.as_ref().unwrap().name, "gcc");
        assert_eq!(req.prefixes["vistle"], PathBuf::from("/opt/keel/vistle"));
        assert_eq!(req.prefixes["python"], PathBuf::from("/opt/keel/python"));
    }

    #[test]
    fn test_cli_prefix_overrides_config() {
        let d = descriptor();
        let mut opts = ResolveOptions::default();
        opts.prefixes.insert("vistle".into(), PathBuf::from("/tmp/vistle"));
        let req = build_request(&d, &config(), "", &opts).unwrap();
        assert_eq!(req.prefixes["vistle"], PathBuf::from("/tmp/vistle"));
    }

    #[test]
    fn test_version_mismatch() {
        let d = descriptor();
        let opts = ResolveOptions {
            version: Some("2025.1".into()),
            ..Default::default()
        };
        assert!(build_request(&d, &config(), "@2024.2", &opts).is_err());
        assert!(build_request(&d, &config(), "@2025.1", &opts).is_ok());
    }

    #[test]
    fn test_bad_spec() {
        let d = descriptor();
        let err = build_request(&d, &config(), "^python", &ResolveOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid selection"));
    }

    #[test]
    fn test_resolve_many_keeps_order() {
        let d = descriptor();
        let opts = ResolveOptions {
            specs: vec!["+python+tui".into(), "~python+tui".into(), "~python~tui".into()],
            ..Default::default()
        };
        let requests = build_requests(&d, &config(), &opts).unwrap();
        let results = resolve_many(&d, &requests);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ResolveError::Conflict { .. })));
        let last = results[2].as_ref().unwrap();
        assert!(!last.dependencies.contains("python"));

        let single = resolve_spec(&d, &requests[0]).unwrap();
        assert_eq!(&single, results[0].as_ref().unwrap());
    }
}
