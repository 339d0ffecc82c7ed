//! Text rendering of descriptors and resolutions for the command line.

use std::fmt::Write;

use crate::core::descriptor::PackageDescriptor;
use crate::resolver::{DependencyEdge, DependencyGraph, Resolution};

/// Dependencies as `target  [linkage]` lines, sorted by target.
pub fn format_dependencies(graph: &DependencyGraph) -> String {
    let edges: Vec<&DependencyEdge> = graph.iter().collect();
    format_edges(&edges)
}

/// Like [`format_dependencies`], for a subset of the edges.
pub fn format_edges(edges: &[&DependencyEdge]) -> String {
    let width = edges.iter().map(|e| e.spec().len()).max().unwrap_or(0);
    let mut out = String::new();
    for edge in edges {
        let _ = writeln!(out, "{:<width$}  [{}]", edge.spec(), edge.linkage_label(), width = width);
    }
    out
}

/// Full summary of one resolution.
pub fn format_resolution(resolution: &Resolution, fingerprint: &str) -> String {
    let mut out = String::new();

    let _ = write!(out, "{}", resolution.package);
    if let Some(version) = &resolution.version {
        let _ = write!(out, "@{}", version);
    }
    if !resolution.selection.is_empty() {
        let _ = write!(out, " {}", resolution.selection);
    }
    out.push('\n');
    let _ = writeln!(out, "toolchain: {}", resolution.toolchain);

    if !resolution.dependencies.is_empty() {
        out.push_str("\ndependencies:\n");
        for line in format_dependencies(&resolution.dependencies).lines() {
            let _ = writeln!(out, "  {}", line);
        }
    }

    if !resolution.arguments.is_empty() {
        out.push_str("\narguments:\n");
        for arg in resolution.cmake_args() {
            let _ = writeln!(out, "  {}", arg);
        }
    }

    for (label, env) in [("build environment", &resolution.build_env), ("run environment", &resolution.run_env)] {
        if env.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}:", label);
        for mutation in env.iter() {
            let _ = writeln!(out, "  {}", mutation);
        }
    }

    let _ = writeln!(out, "\nfingerprint: {}", fingerprint);
    out
}

/// Variant table: name, kind, default, legal values and declaration condition.
pub fn format_variants(descriptor: &PackageDescriptor) -> String {
    let rows: Vec<[String; 5]> = descriptor
        .variants
        .iter()
        .map(|v| {
            [
                v.name.clone(),
                v.kind.to_string(),
                v.default.to_string(),
                v.values.join(","),
                if v.condition.is_always() {
                    String::new()
                } else {
                    v.condition.to_string()
                },
            ]
        })
        .collect();

    let header = ["NAME", "KIND", "DEFAULT", "VALUES", "WHEN"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: [&str; 5]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = w))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };

    push_row(header);
    for row in &rows {
        push_row([&row[0], &row[1], &row[2], &row[3], &row[4]]);
    }
    for v in descriptor.variants.iter().filter(|v| !v.description.is_empty()) {
        let _ = writeln!(out, "\n  {}: {}", v.name, v.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::parse_descriptor;
    use crate::core::selection::Selection;
    use crate::resolver::{ResolveRequest, Resolver};

    const DESCRIPTOR: &str = r#"
[package]
name = "vistle"

[[version]]
id = "2025.1"

[variants.vtkm]
default = false
description = "Use VTK-m"

[variants.kokkos]
default = false
when = "~vtkm"

[variants.build_type]
values = ["Debug", "Release"]
default = "Release"

[[depends]]
spec = "python@2.7:"
type = ["build", "run"]

[[args]]
define = "VISTLE_USE_VTKM"
variant = "vtkm"

[[env.build]]
unset = "EXTERNLIBS"
"#;

    #[test]
    fn test_format_variants() {
        let d = parse_descriptor(DESCRIPTOR).unwrap();
        let table = format_variants(&d);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("NAME"));
        assert!(table.contains("kokkos"));
        assert!(table.contains("~vtkm"));
        assert!(table.contains("Debug,Release"));
        assert!(table.contains("vtkm: Use VTK-m"));
    }

    #[test]
    fn test_format_resolution() {
        let d = parse_descriptor(DESCRIPTOR).unwrap();
        let res = Resolver::new(&d)
            .resolve(&ResolveRequest::new(Selection::new()))
            .unwrap();
        let out = format_resolution(&res, "abc123");
        assert!(out.starts_with("vistle@2025.1"));
        assert!(out.contains("toolchain: host"));
        assert!(out.contains("python@2.7:  [build,run]"));
        assert!(out.contains("-DVISTLE_USE_VTKM:BOOL=OFF"));
        assert!(out.contains("unset EXTERNLIBS"));
        assert!(out.ends_with("fingerprint: abc123\n"));
    }
}
