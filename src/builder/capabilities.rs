//! Reusable capability modules a descriptor can opt into.
//!
//! A capability contributes variants, dependencies and arguments through the same
//! builder a package uses, so composing several of them is plain concatenation.

use glob::Pattern;

use crate::core::argument::{ArgumentExpr, ArgumentRule, Fold};
use crate::core::condition::Condition;
use crate::core::dependency::{DependencyDeclaration, Linkage};
use crate::core::descriptor::{DescriptorBuilder, DescriptorError};
use crate::core::variant::{Variant, NONE_VALUE};
use crate::core::version::VersionRange;

/// Names accepted in a descriptor's `capabilities` list.
pub const KNOWN_CAPABILITIES: &[&str] = &["cmake", "cuda", "rocm"];

/// Something that contributes declarations to a package.
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;

    fn contribute(&self, builder: &mut DescriptorBuilder) -> Result<(), DescriptorError>;
}

/// Look up a capability by name.
pub fn lookup(name: &str) -> Option<&'static dyn Capability> {
    match name {
        "cmake" => Some(&CMake),
        "cuda" => Some(&Cuda),
        "rocm" => Some(&Rocm),
        _ => None,
    }
}

fn pattern(location: &str, glob: &str) -> Result<Pattern, DescriptorError> {
    Pattern::new(glob).map_err(|e| DescriptorError::invalid(location, e.to_string()))
}

/// Packages configured with CMake.
#[derive(Debug, Clone, Copy)]
pub struct CMake;

impl Capability for CMake {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn contribute(&self, b: &mut DescriptorBuilder) -> Result<(), DescriptorError> {
        b.variant(
            Variant::single(
                "build_type",
                ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"],
                "Release",
            )
            .with_description("CMake build type"),
        )?;
        b.depends(DependencyDeclaration::new("cmake").with_linkage([Linkage::Build]));
        b.argument(ArgumentRule::from_variant("CMAKE_BUILD_TYPE", "build_type"));
        Ok(())
    }
}

/// NVIDIA CUDA support.
#[derive(Debug, Clone, Copy)]
pub struct Cuda;

const CUDA_ARCHS: &[&str] = &[NONE_VALUE, "50", "52", "60", "61", "70", "75", "80", "86", "89", "90"];

impl Capability for Cuda {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn contribute(&self, b: &mut DescriptorBuilder) -> Result<(), DescriptorError> {
        b.variant(Variant::boolean("cuda", false).with_description("Build with CUDA"))?;
        b.when(Condition::enabled("cuda"), |b| {
            b.variant(
                Variant::multi("cuda_arch", CUDA_ARCHS.iter().copied(), &[NONE_VALUE])
                    .with_description("CUDA architecture"),
            )?;
            b.depends(DependencyDeclaration::new("cuda"));
            b.argument(ArgumentRule::new(
                "CMAKE_CUDA_ARCHITECTURES",
                ArgumentExpr::Fold(Fold::new(["cuda_arch"], pattern("cuda_arch", "[0-9]*")?)),
            ));
            Ok(())
        })?;
        Ok(())
    }
}

/// AMD ROCm/HIP support.
#[derive(Debug, Clone, Copy)]
pub struct Rocm;

const AMDGPU_TARGETS: &[&str] = &[
    NONE_VALUE, "gfx900", "gfx906", "gfx908", "gfx90a", "gfx940", "gfx942", "gfx1030", "gfx1100",
];

impl Capability for Rocm {
    fn name(&self) -> &'static str {
        "rocm"
    }

    fn contribute(&self, b: &mut DescriptorBuilder) -> Result<(), DescriptorError> {
        b.variant(Variant::boolean("rocm", false).with_description("Enable ROCm support"))?;
        b.when(Condition::enabled("rocm"), |b| {
            b.variant(
                Variant::multi("amdgpu_target", AMDGPU_TARGETS.iter().copied(), &[NONE_VALUE])
                    .with_description("AMD GPU architecture"),
            )?;
            let hip_version: VersionRange = "3.7:"
                .parse()
                .map_err(|e| DescriptorError::condition("rocm", e))?;
            let mut hip = DependencyDeclaration::new("hip");
            hip.version = Some(hip_version);
            b.depends(hip);
            b.argument(ArgumentRule::new(
                "CMAKE_HIP_ARCHITECTURES",
                ArgumentExpr::Fold(Fold::new(["amdgpu_target"], pattern("amdgpu_target", "gfx*")?)),
            ));
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        for name in KNOWN_CAPABILITIES {
            assert_eq!(lookup(name).unwrap().name(), *name);
        }
        assert!(lookup("autotools").is_none());
    }

    #[test]
    fn test_rocm_contributions() {
        let mut b = DescriptorBuilder::new("vistle").unwrap();
        b.variant(Variant::boolean("vtkm", true)).unwrap();
        b.when("~vtkm".parse().unwrap(), |b| {
            b.capability(&Rocm)?;
            Ok(())
        })
        .unwrap();
        let d = b.build().unwrap();

        assert_eq!(d.capabilities, vec!["rocm".to_string()]);
        assert_eq!(d.variants.get("rocm").unwrap().condition.to_string(), "~vtkm");
        assert_eq!(
            d.variants.get("amdgpu_target").unwrap().condition.to_string(),
            "~vtkm +rocm"
        );
        assert_eq!(d.dependencies[0].target, "hip");
        assert_eq!(d.dependencies[0].condition.to_string(), "~vtkm +rocm");
        assert_eq!(d.arguments[0].key, "CMAKE_HIP_ARCHITECTURES");
    }

    #[test]
    fn test_cmake_and_cuda_compose() {
        let mut b = DescriptorBuilder::new("vistle").unwrap();
        b.capability(&CMake).unwrap();
        b.capability(&Cuda).unwrap();
        let d = b.build().unwrap();
        let keys: Vec<&str> = d.arguments.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["CMAKE_BUILD_TYPE", "CMAKE_CUDA_ARCHITECTURES"]);
        assert_eq!(d.capabilities, vec!["cmake".to_string(), "cuda".to_string()]);
        assert!(d.variants.contains("cuda_arch"));
    }
}
