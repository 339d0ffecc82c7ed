//! Dependency graph construction.
//!
//! Active declarations are merged per target by set union, so the graph does not
//! depend on the order declarations were written in.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use serde::Serialize;

use crate::core::condition::{DependencyLookup, EvalContext};
use crate::core::dependency::{DependencyDeclaration, Linkage};
use crate::core::selection::Selection;
use crate::resolver::errors::ResolveError;

/// One merged dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub target: String,
    pub linkage: BTreeSet<Linkage>,
    /// Version ranges from every contributing declaration
    pub versions: BTreeSet<String>,
    /// `(variant, value)` pairs requested of the target
    pub propagated: BTreeSet<(String, String)>,
}

impl DependencyEdge {
    fn new(target: &str) -> Self {
        DependencyEdge {
            target: target.to_string(),
            linkage: BTreeSet::new(),
            versions: BTreeSet::new(),
            propagated: BTreeSet::new(),
        }
    }

    /// The edge in spec form, e.g. `kokkos@4: +rocm amdgpu_target=gfx90a`.
    pub fn spec(&self) -> String {
        let mut out = self.target.clone();
        for version in &self.versions {
            out.push('@');
            out.push_str(version);
        }
        for (name, value) in &self.propagated {
            match value.as_str() {
                "true" => out.push_str(&format!(" +{}", name)),
                "false" => out.push_str(&format!(" ~{}", name)),
                _ => out.push_str(&format!(" {}={}", name, value)),
            }
        }
        out
    }

    /// Linkage kinds joined by `,`, e.g. `build,link`.
    pub fn linkage_label(&self) -> String {
        let kinds: Vec<&str> = self.linkage.iter().map(Linkage::as_str).collect();
        kinds.join(",")
    }
}

/// The dependency set of one resolution, keyed by target name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    package: String,
    edges: BTreeMap<String, DependencyEdge>,
}

impl DependencyGraph {
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn get(&self, target: &str) -> Option<&DependencyEdge> {
        self.edges.get(target)
    }

    pub fn contains(&self, target: &str) -> bool {
        self.edges.contains_key(target)
    }

    /// Edges sorted by target name.
    pub fn iter(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.values()
    }

    /// Targets needed in a phase.
    pub fn with_linkage(&self, linkage: Linkage) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.values().filter(move |e| e.linkage.contains(&linkage))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Render as Graphviz, edges labelled with their linkage kinds.
    pub fn to_dot(&self) -> String {
        let mut graph: DiGraph<String, String> = DiGraph::new();
        let root = graph.add_node(self.package.clone());
        for edge in self.edges.values() {
            let node = graph.add_node(edge.spec());
            graph.add_edge(root, node, edge.linkage_label());
        }
        format!("{}", Dot::new(&graph))
    }
}

impl DependencyLookup for DependencyGraph {
    fn has_dependency(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Declarations whose effective condition holds, in declaration order.
pub fn active_declarations<'d>(
    ctx: &EvalContext<'_>,
    declarations: &'d [DependencyDeclaration],
) -> Vec<&'d DependencyDeclaration> {
    declarations
        .iter()
        .filter(|decl| {
            let active = decl.condition.evaluate_in(ctx);
            tracing::debug!(dependency = %decl.target, when = %decl.condition, active, "dependency condition");
            active
        })
        .collect()
}

/// Builds the dependency graph for one package.
pub struct DependencyGraphBuilder<'a> {
    package: &'a str,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(package: &'a str) -> Self {
        DependencyGraphBuilder { package }
    }

    /// Evaluate every declaration and merge the active ones.
    pub fn build(
        &self,
        ctx: &EvalContext<'_>,
        declarations: &[DependencyDeclaration],
    ) -> Result<DependencyGraph, ResolveError> {
        self.merge(ctx.selection, active_declarations(ctx, declarations))
    }

    /// Merge already-evaluated declarations.
    pub fn merge<'d>(
        &self,
        selection: &Selection,
        active: impl IntoIterator<Item = &'d DependencyDeclaration>,
    ) -> Result<DependencyGraph, ResolveError> {
        let mut edges: BTreeMap<String, DependencyEdge> = BTreeMap::new();

        for decl in active {
            if decl.target == self.package {
                return Err(ResolveError::SelfDependency {
                    package: self.package.to_string(),
                    condition: decl.condition.to_string(),
                });
            }

            let edge = edges
                .entry(decl.target.clone())
                .or_insert_with(|| DependencyEdge::new(&decl.target));
            edge.linkage.extend(decl.linkage.iter().copied());
            if let Some(version) = &decl.version {
                edge.versions.insert(version.to_string());
            }
            for (name, value) in &decl.propagated {
                for v in value.expand(selection) {
                    edge.propagated.insert((name.clone(), v));
                }
            }
        }

        for edge in edges.values() {
            warn_contradictions(edge);
        }

        tracing::info!(package = self.package, dependencies = edges.len(), "built dependency graph");
        Ok(DependencyGraph {
            package: self.package.to_string(),
            edges,
        })
    }
}

/// Both `+x` and `~x` requested of the same target. Kept as a union; the
/// orchestrator building the target decides.
fn warn_contradictions(edge: &DependencyEdge) {
    for (name, value) in &edge.propagated {
        if value == "true" && edge.propagated.contains(&(name.clone(), "false".to_string())) {
            tracing::warn!(
                dependency = %edge.target,
                variant = %name,
                "dependency is requested both with and without this variant"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::core::facts::Facts;
    use crate::core::variant::VariantValue;

    fn decl(spec: &str, linkage: &[Linkage], when: &str) -> DependencyDeclaration {
        DependencyDeclaration::parse(spec)
            .unwrap()
            .with_linkage(linkage.iter().copied())
            .when(when.parse().unwrap())
    }

    fn build(selection: &Selection, decls: &[DependencyDeclaration]) -> Result<DependencyGraph, ResolveError> {
        let facts = Facts::host();
        let ctx = EvalContext::new(selection, &facts);
        DependencyGraphBuilder::new("vistle").build(&ctx, decls)
    }

    #[test]
    fn test_additive_merge() {
        let decls = vec![
            decl("kokkos", &[Linkage::Run], "+kokkos+rocm"),
            decl("kokkos", &[Linkage::Build], "+rocm"),
        ];
        let selection = Selection::new().with("kokkos", true).with("rocm", true);
        let graph = build(&selection, &decls).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.get("kokkos").unwrap().linkage,
            BTreeSet::from([Linkage::Build, Linkage::Run])
        );
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut decls = vec![
            decl("kokkos@4:", &[Linkage::Build, Linkage::Link], "+kokkos"),
            decl("kokkos +openmp", &[Linkage::Run], ""),
            decl("python@2.7:", &[Linkage::Build, Linkage::Run], "+python"),
            decl("kokkos +rocm amdgpu_target={amdgpu_target}", &[Linkage::Build], "+rocm"),
        ];
        let selection = Selection::new()
            .with("kokkos", true)
            .with("python", true)
            .with("rocm", true)
            .with("amdgpu_target", VariantValue::from(vec!["gfx90a", "gfx1030"]));

        let forward = build(&selection, &decls).unwrap();
        decls.reverse();
        let backward = build(&selection, &decls).unwrap();
        assert_eq!(forward, backward);

        let kokkos = forward.get("kokkos").unwrap();
        assert_eq!(kokkos.spec(), "kokkos@4: amdgpu_target=gfx1030 amdgpu_target=gfx90a +openmp +rocm");
        assert_eq!(kokkos.linkage.len(), 3);
    }

    #[test]
    fn test_inactive_declarations_skipped() {
        let decls = vec![decl("python", &[Linkage::Run], "+python")];
        let graph = build(&Selection::new().with("python", false), &decls).unwrap();
        assert!(graph.is_empty());
        assert!(!graph.has_dependency("python"));
    }

    #[test]
    fn test_self_dependency() {
        let decls = vec![decl("vistle", &[Linkage::Run], "")];
        let err = build(&Selection::new(), &decls).unwrap_err();
        assert!(matches!(err, ResolveError::SelfDependency { .. }));

        // An inactive self reference is harmless
        let decls = vec![decl("vistle", &[Linkage::Run], "+never")];
        assert!(build(&Selection::new(), &decls).is_ok());
    }

    #[test]
    fn test_to_dot() {
        let decls = vec![decl("python", &[Linkage::Build, Linkage::Run], "")];
        let graph = build(&Selection::new(), &decls).unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("\"vistle\""));
        assert!(dot.contains("\"python\""));
        assert!(dot.contains("build,run"));
    }
}
