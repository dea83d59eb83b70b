//! Structural invariants of relational graphs with cuts.
//!
//! Each invariant is a small checker that reports every violation it finds rather
//! than stopping at the first, so the background validator can present a full
//! diagnosis of a malformed value. Checkers never panic and never loop: parent
//! walks are bounded by the number of cuts.
//!
//! The sheet's rootedness is not checked at runtime. [`ContextId::Sheet`] has no
//! [`crate::core::ElementId`] form, so it cannot appear inside any area.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.1 (2003)

use crate::core::{ContextId, CutId, ElementId, RelationalGraphWithCuts};
use crate::context::membership;
use crate::error::{EngineError, InvariantViolation, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A structural invariant that can be checked against a graph value.
pub trait Invariant {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Appends every violation found in `graph` to `out`.
    fn check(&self, graph: &RelationalGraphWithCuts, out: &mut Vec<InvariantViolation>);
}

/// Every element is listed in exactly one area, and areas list only existing
/// elements under existing contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AreaPartition;

impl Invariant for AreaPartition {
    fn name(&self) -> &'static str {
        "area-partition"
    }

    fn check(&self, graph: &RelationalGraphWithCuts, out: &mut Vec<InvariantViolation>) {
        let mut listed: BTreeMap<ElementId, Vec<ContextId>> = BTreeMap::new();
        for (ctx, members) in graph.area_entries() {
            if let ContextId::Cut(cut) = ctx {
                if !graph.contains_cut(cut) {
                    out.push(InvariantViolation::UnknownAreaKey(cut));
                }
            }
            for &member in members {
                if graph.contains(member) {
                    listed.entry(member).or_default().push(ctx);
                } else {
                    out.push(InvariantViolation::UnknownMember { context: ctx, element: member });
                }
            }
        }
        for element in graph.elements() {
            match listed.remove(&element) {
                None => out.push(InvariantViolation::OrphanElement(element)),
                Some(contexts) if contexts.len() > 1 => {
                    out.push(InvariantViolation::DuplicateMembership { element, contexts })
                }
                Some(_) => {}
            }
        }
    }
}

/// Cut containment forms a forest rooted on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutForest;

impl Invariant for CutForest {
    fn name(&self) -> &'static str {
        "cut-forest"
    }

    fn check(&self, graph: &RelationalGraphWithCuts, out: &mut Vec<InvariantViolation>) {
        let index = membership(graph);
        let mut cycles = BTreeSet::new();
        for cut in graph.cuts() {
            match walk_to_sheet(graph, &index, cut) {
                Walk::Rooted | Walk::Orphan => {}
                Walk::Unrooted => out.push(InvariantViolation::UnrootedCut { cut }),
                Walk::Cycle(member) => {
                    cycles.insert(member);
                }
            }
        }
        out.extend(cycles.into_iter().map(|cut| InvariantViolation::CutCycle { cut }));
    }
}

/// Every edge argument exists and is visible from the edge's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgumentsInScope;

impl Invariant for ArgumentsInScope {
    fn name(&self) -> &'static str {
        "arguments-in-scope"
    }

    fn check(&self, graph: &RelationalGraphWithCuts, out: &mut Vec<InvariantViolation>) {
        let index = membership(graph);
        for edge in graph.edges() {
            let Some(args) = graph.arguments(edge) else {
                continue;
            };
            let edge_ctx = index.get(&ElementId::Edge(edge)).copied();
            for &vertex in args {
                if !graph.contains_vertex(vertex) {
                    out.push(InvariantViolation::DanglingArgument { edge, vertex });
                    continue;
                }
                let (Some(edge_ctx), Some(&vertex_ctx)) =
                    (edge_ctx, index.get(&ElementId::Vertex(vertex)))
                else {
                    // Orphans are reported by `AreaPartition`.
                    continue;
                };
                if !chain_contains(graph, &index, edge_ctx, vertex_ctx) {
                    out.push(InvariantViolation::ArgumentOutOfScope { edge, vertex });
                }
            }
        }
    }
}

/// `rel` and `nu` are defined for exactly the edges of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeMappings;

impl Invariant for EdgeMappings {
    fn name(&self) -> &'static str {
        "edge-mappings"
    }

    fn check(&self, graph: &RelationalGraphWithCuts, out: &mut Vec<InvariantViolation>) {
        for edge in graph.edges() {
            if graph.relation(edge).is_none() {
                out.push(InvariantViolation::MissingRelation(edge));
            }
            if graph.arguments(edge).is_none() {
                out.push(InvariantViolation::MissingArguments(edge));
            }
        }
        for (edge, _) in graph.rel_entries() {
            if !graph.contains_edge(edge) {
                out.push(InvariantViolation::StrayRelation(edge));
            }
        }
        for (edge, _) in graph.nu_entries() {
            if !graph.contains_edge(edge) {
                out.push(InvariantViolation::StrayArguments(edge));
            }
        }
    }
}

/// The standard invariant set, in reporting order.
pub const STANDARD_INVARIANTS: &[&dyn Invariant] =
    &[&AreaPartition, &CutForest, &ArgumentsInScope, &EdgeMappings];

/// Runs every standard invariant and returns all violations found.
pub fn check_invariants(graph: &RelationalGraphWithCuts) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for invariant in STANDARD_INVARIANTS {
        invariant.check(graph, &mut out);
    }
    out
}

/// Checks whether the graph satisfies every structural invariant.
pub fn is_well_formed(graph: &RelationalGraphWithCuts) -> bool {
    check_invariants(graph).is_empty()
}

/// Fails with the first violation found, if any.
pub fn ensure_well_formed(graph: &RelationalGraphWithCuts) -> Result<()> {
    match check_invariants(graph).into_iter().next() {
        Some(violation) => Err(EngineError::Invariant(violation)),
        None => Ok(()),
    }
}

enum Walk {
    Rooted,
    /// The start cut itself is listed nowhere.
    Orphan,
    /// Some ancestor is listed nowhere or is not a cut.
    Unrooted,
    /// The walk entered a cycle; carries the smallest cut on it.
    Cycle(CutId),
}

fn walk_to_sheet(
    graph: &RelationalGraphWithCuts,
    index: &BTreeMap<ElementId, ContextId>,
    start: CutId,
) -> Walk {
    let mut path = vec![start];
    let mut current = start;
    loop {
        match index.get(&ElementId::Cut(current)) {
            None if current == start => return Walk::Orphan,
            None => return Walk::Unrooted,
            Some(ContextId::Sheet) => return Walk::Rooted,
            Some(&ContextId::Cut(parent)) => {
                if !graph.contains_cut(parent) {
                    return Walk::Unrooted;
                }
                if let Some(pos) = path.iter().position(|&c| c == parent) {
                    let smallest = path[pos..].iter().copied().min().unwrap_or(parent);
                    return Walk::Cycle(smallest);
                }
                path.push(parent);
                current = parent;
            }
        }
    }
}

/// Whether `outer` is `inner` or one of its ancestors, following first listings.
fn chain_contains(
    graph: &RelationalGraphWithCuts,
    index: &BTreeMap<ElementId, ContextId>,
    inner: ContextId,
    outer: ContextId,
) -> bool {
    let mut current = inner;
    for _ in 0..=graph.cut_count() {
        if current == outer {
            return true;
        }
        match current {
            ContextId::Sheet => return false,
            ContextId::Cut(cut) => match index.get(&ElementId::Cut(cut)) {
                Some(&parent) => current = parent,
                None => return false,
            },
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EdgeId, GraphParts, Vertex, VertexId};
    use crate::operations::GraphBuilder;

    fn v(raw: u64) -> VertexId {
        VertexId::new(raw)
    }

    #[test]
    fn constructed_graph_passes_all_invariants() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(cut.into(), "P", &[x]).unwrap();
        assert!(check_invariants(builder.graph()).is_empty());
        assert!(ensure_well_formed(builder.graph()).is_ok());
    }

    /// Test that orphaned and doubly listed elements are both reported.
    #[test]
    fn partition_violations_are_reported() {
        let graph = RelationalGraphWithCuts::from_parts(GraphParts {
            vertices: vec![Vertex::new(v(0), None, true), Vertex::new(v(1), None, true)],
            cuts: vec![CutId::new(2)],
            area: vec![
                (ContextId::Sheet, vec![ElementId::Vertex(v(1)), ElementId::Cut(CutId::new(2))]),
                (ContextId::Cut(CutId::new(2)), vec![ElementId::Vertex(v(1))]),
            ],
            ..GraphParts::default()
        });
        let violations = check_invariants(&graph);
        assert!(violations.contains(&InvariantViolation::OrphanElement(ElementId::Vertex(v(0)))));
        assert!(violations.iter().any(|violation| matches!(
            violation,
            InvariantViolation::DuplicateMembership { element: ElementId::Vertex(id), .. } if *id == v(1)
        )));
    }

    #[test]
    fn dangling_and_stray_edge_data_are_reported() {
        let edge = EdgeId::new(5);
        let stray = EdgeId::new(6);
        let graph = RelationalGraphWithCuts::from_parts(GraphParts {
            edges: vec![edge],
            area: vec![(ContextId::Sheet, vec![ElementId::Edge(edge)])],
            rel: vec![(edge, "P".into()), (stray, "Q".into())],
            nu: vec![(edge, vec![v(9)])],
            ..GraphParts::default()
        });
        let violations = check_invariants(&graph);
        assert!(violations.contains(&InvariantViolation::DanglingArgument { edge, vertex: v(9) }));
        assert!(violations.contains(&InvariantViolation::StrayRelation(stray)));
    }

    #[test]
    fn argument_below_edge_is_out_of_scope() {
        let cut = CutId::new(1);
        let edge = EdgeId::new(2);
        let graph = RelationalGraphWithCuts::from_parts(GraphParts {
            vertices: vec![Vertex::new(v(0), None, true)],
            edges: vec![edge],
            cuts: vec![cut],
            area: vec![
                (ContextId::Sheet, vec![ElementId::Cut(cut), ElementId::Edge(edge)]),
                (ContextId::Cut(cut), vec![ElementId::Vertex(v(0))]),
            ],
            rel: vec![(edge, "P".into())],
            nu: vec![(edge, vec![v(0)])],
            ..GraphParts::default()
        });
        assert_eq!(
            check_invariants(&graph),
            vec![InvariantViolation::ArgumentOutOfScope { edge, vertex: v(0) }]
        );
    }

    /// Test that a two-cut cycle is reported once, by its smallest member.
    #[test]
    fn cut_cycle_is_reported_once() {
        let a = CutId::new(0);
        let b = CutId::new(1);
        let graph = RelationalGraphWithCuts::from_parts(GraphParts {
            cuts: vec![a, b],
            area: vec![
                (ContextId::Cut(a), vec![ElementId::Cut(b)]),
                (ContextId::Cut(b), vec![ElementId::Cut(a)]),
            ],
            ..GraphParts::default()
        });
        let mut out = Vec::new();
        CutForest.check(&graph, &mut out);
        assert_eq!(out, vec![InvariantViolation::CutCycle { cut: a }]);
    }
}
