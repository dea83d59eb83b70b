//! Subgraph selections that respect context boundaries.
//!
//! A [`Subgraph`] is a frozen record of a selection in one graph value: its home
//! context, the selected elements (every selected cut with its whole area
//! closure) and the boundary vertices its edges use from outside. It is only
//! meaningful for the graph it was identified in; transformations re-check it
//! with [`Subgraph::ensure_current`] before use.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.6 (subgraphs) (2003)

use crate::context::{ancestors, area_closure, context_of};
use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::error::{EngineError, Result, SelectionError};
use crate::pattern::{find_matches, Fragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A validated selection.
///
/// # Invariants
/// - Every top-level element lies directly in `home`.
/// - A selected cut brings its entire area closure.
/// - Every argument of a selected edge is selected or a boundary vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    home: ContextId,
    vertices: BTreeSet<VertexId>,
    edges: BTreeSet<EdgeId>,
    cuts: BTreeSet<CutId>,
    top_level: BTreeSet<ElementId>,
    boundary: BTreeSet<VertexId>,
}

impl Subgraph {
    /// The context every top-level element lies in.
    #[inline]
    pub fn home(&self) -> ContextId {
        self.home
    }

    /// Selected vertices.
    #[inline]
    pub fn vertices(&self) -> &BTreeSet<VertexId> {
        &self.vertices
    }

    /// Selected edges.
    #[inline]
    pub fn edges(&self) -> &BTreeSet<EdgeId> {
        &self.edges
    }

    /// Selected cuts.
    #[inline]
    pub fn cuts(&self) -> &BTreeSet<CutId> {
        &self.cuts
    }

    /// Selected elements lying directly in the home context.
    #[inline]
    pub fn top_level(&self) -> &BTreeSet<ElementId> {
        &self.top_level
    }

    /// Unselected vertices used by selected edges.
    #[inline]
    pub fn boundary(&self) -> &BTreeSet<VertexId> {
        &self.boundary
    }

    /// Every selected element: vertices, then edges, then cuts.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.vertices
            .iter()
            .map(|&v| ElementId::Vertex(v))
            .chain(self.edges.iter().map(|&e| ElementId::Edge(e)))
            .chain(self.cuts.iter().map(|&c| ElementId::Cut(c)))
    }

    /// Checks whether an element is selected.
    pub fn contains(&self, element: ElementId) -> bool {
        match element {
            ElementId::Vertex(v) => self.vertices.contains(&v),
            ElementId::Edge(e) => self.edges.contains(&e),
            ElementId::Cut(c) => self.cuts.contains(&c),
        }
    }

    /// Number of selected elements.
    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len() + self.cuts.len()
    }

    /// Always `false` for an identified subgraph.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether two selections share no element.
    pub fn is_disjoint(&self, other: &Subgraph) -> bool {
        self.vertices.is_disjoint(&other.vertices)
            && self.edges.is_disjoint(&other.edges)
            && self.cuts.is_disjoint(&other.cuts)
    }

    /// Fails with `StaleSelection` unless this selection still describes `graph`.
    pub fn ensure_current(&self, graph: &RelationalGraphWithCuts) -> Result<()> {
        if let Some(element) = self.elements().find(|&e| !graph.contains(e)) {
            return Err(SelectionError::StaleSelection { element }.into());
        }
        let first = self.elements().next();
        let stale = |element: Option<ElementId>| -> EngineError {
            match element {
                Some(element) => SelectionError::StaleSelection { element }.into(),
                None => SelectionError::EmptySelection.into(),
            }
        };
        let fresh = identify_subgraph_exact(graph, self.elements()).map_err(|err| match err {
            EngineError::Selection(SelectionError::PartialCutSelection { missing, .. }) => {
                stale(missing.first().copied().or(first))
            }
            _ => stale(first),
        })?;
        if fresh != *self {
            let differing = fresh
                .top_level
                .symmetric_difference(&self.top_level)
                .next()
                .copied()
                .or(first);
            return Err(stale(differing));
        }
        Ok(())
    }
}

/// Builds a subgraph from explicit ids, closing every selected cut over its area.
///
/// # Examples
///
/// ```
/// use peirce::operations::GraphBuilder;
/// use peirce::subgraph::identify_subgraph;
/// use peirce::core::{ContextId, ElementId};
///
/// let mut builder = GraphBuilder::new();
/// let cut = builder.cut(ContextId::Sheet).unwrap();
/// let x = builder.variable(cut.into()).unwrap();
/// let graph = builder.build();
/// let selection = identify_subgraph(&graph, [ElementId::Cut(cut)]).unwrap();
/// assert!(selection.vertices().contains(&x));
/// ```
pub fn identify_subgraph(
    graph: &RelationalGraphWithCuts,
    ids: impl IntoIterator<Item = ElementId>,
) -> Result<Subgraph> {
    identify(graph, ids.into_iter().collect(), false)
}

/// Builds a subgraph from explicit ids, rejecting any selected cut whose area
/// closure is not entirely selected.
pub fn identify_subgraph_exact(
    graph: &RelationalGraphWithCuts,
    ids: impl IntoIterator<Item = ElementId>,
) -> Result<Subgraph> {
    identify(graph, ids.into_iter().collect(), true)
}

/// Builds a subgraph from the unique structural match of a probe.
///
/// Considers at most `limit` matches; zero is `NoStructuralMatch`, more than one
/// is `AmbiguousMatch`.
pub fn identify_by_probe(
    graph: &RelationalGraphWithCuts,
    probe: &Fragment,
    limit: usize,
) -> Result<Subgraph> {
    let matches = find_matches(graph, probe, limit.max(2))?;
    match matches.as_slice() {
        [] => Err(SelectionError::NoStructuralMatch.into()),
        [only] => identify_subgraph_exact(graph, only.image()),
        _ => Err(SelectionError::AmbiguousMatch { count: matches.len() }.into()),
    }
}

fn identify(graph: &RelationalGraphWithCuts, candidates: BTreeSet<ElementId>, exact: bool) -> Result<Subgraph> {
    if candidates.is_empty() {
        return Err(SelectionError::EmptySelection.into());
    }
    if let Some(&unknown) = candidates.iter().find(|&&e| !graph.contains(e)) {
        return Err(EngineError::UnknownElement(unknown));
    }

    let selected_cuts: BTreeSet<ContextId> = candidates
        .iter()
        .filter_map(ElementId::as_cut)
        .map(ContextId::Cut)
        .collect();

    let mut top_level = BTreeSet::new();
    let mut homes = BTreeSet::new();
    for &element in &candidates {
        let ctx = context_of(graph, element)?;
        let enclosed = selected_cuts.contains(&ctx)
            || ancestors(graph, ctx)?.iter().any(|a| selected_cuts.contains(a));
        if !enclosed {
            top_level.insert(element);
            homes.insert(ctx);
        }
    }
    let home = match homes.len() {
        1 => homes.into_iter().next().unwrap_or(ContextId::Sheet),
        _ => {
            return Err(SelectionError::MultipleContexts { contexts: homes.into_iter().collect() }.into())
        }
    };

    let mut selected: BTreeSet<ElementId> = top_level.clone();
    for cut in top_level.iter().filter_map(ElementId::as_cut) {
        let closure = area_closure(graph, ContextId::Cut(cut));
        if exact {
            let missing: Vec<ElementId> = closure.difference(&candidates).copied().collect();
            if !missing.is_empty() {
                return Err(SelectionError::PartialCutSelection { cut, missing }.into());
            }
        }
        selected.extend(closure);
    }

    let vertices: BTreeSet<VertexId> = selected.iter().filter_map(ElementId::as_vertex).collect();
    let edges: BTreeSet<EdgeId> = selected.iter().filter_map(ElementId::as_edge).collect();
    let cuts: BTreeSet<CutId> = selected.iter().filter_map(ElementId::as_cut).collect();
    let boundary = edges
        .iter()
        .flat_map(|&e| graph.arguments(e).unwrap_or_default().iter().copied())
        .filter(|v| !vertices.contains(v))
        .collect();

    Ok(Subgraph { home, vertices, edges, cuts, top_level, boundary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::GraphBuilder;

    struct Fixture {
        graph: RelationalGraphWithCuts,
        x: VertexId,
        outer: CutId,
        inner: CutId,
        p: EdgeId,
        q: EdgeId,
    }

    /// `x` on the sheet, `¬[P(x) ¬[Q(x)]]`.
    fn fixture() -> Fixture {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let outer = builder.cut(ContextId::Sheet).unwrap();
        let p = builder.edge(outer.into(), "P", &[x]).unwrap();
        let inner = builder.cut(outer.into()).unwrap();
        let q = builder.edge(inner.into(), "Q", &[x]).unwrap();
        Fixture { graph: builder.build(), x, outer, inner, p, q }
    }

    #[test]
    fn empty_selection_is_rejected() {
        let f = fixture();
        let err = identify_subgraph(&f.graph, Vec::new()).unwrap_err();
        assert_eq!(err, EngineError::Selection(SelectionError::EmptySelection));
    }

    /// Test that selecting a cut pulls in its whole closure and records the
    /// outside vertex as boundary.
    #[test]
    fn cut_selection_is_closed() {
        let f = fixture();
        let sub = identify_subgraph(&f.graph, [ElementId::Cut(f.outer)]).unwrap();
        assert_eq!(sub.home(), ContextId::Sheet);
        assert_eq!(sub.cuts(), &BTreeSet::from([f.outer, f.inner]));
        assert_eq!(sub.edges(), &BTreeSet::from([f.p, f.q]));
        assert_eq!(sub.boundary(), &BTreeSet::from([f.x]));
        assert_eq!(sub.top_level(), &BTreeSet::from([ElementId::Cut(f.outer)]));
    }

    #[test]
    fn exact_identification_rejects_partial_cut() {
        let f = fixture();
        let err = identify_subgraph_exact(&f.graph, [ElementId::Cut(f.inner)]).unwrap_err();
        assert_eq!(
            err,
            EngineError::Selection(SelectionError::PartialCutSelection {
                cut: f.inner,
                missing: vec![ElementId::Edge(f.q)],
            })
        );
    }

    #[test]
    fn top_level_elements_must_share_a_context() {
        let f = fixture();
        let err = identify_subgraph(&f.graph, [ElementId::Vertex(f.x), ElementId::Edge(f.p)]).unwrap_err();
        assert!(matches!(err, EngineError::Selection(SelectionError::MultipleContexts { .. })));
    }

    #[test]
    fn nested_candidates_collapse_into_their_cut() {
        let f = fixture();
        let sub = identify_subgraph(&f.graph, [ElementId::Cut(f.outer), ElementId::Edge(f.q)]).unwrap();
        assert_eq!(sub.top_level().len(), 1);
        assert_eq!(sub.len(), 4);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let f = fixture();
        let ghost = ElementId::Edge(EdgeId::new(77));
        assert_eq!(identify_subgraph(&f.graph, [ghost]), Err(EngineError::UnknownElement(ghost)));
    }

    #[test]
    fn probe_with_two_matches_is_ambiguous() {
        let mut builder = GraphBuilder::new();
        let a = builder.variable(ContextId::Sheet).unwrap();
        let b = builder.variable(ContextId::Sheet).unwrap();
        builder.edge(ContextId::Sheet, "P", &[a]).unwrap();
        builder.edge(ContextId::Sheet, "P", &[b]).unwrap();
        let graph = builder.build();
        let mut probe = Fragment::new();
        let v = probe.vertex(ContextId::Sheet, None, true).unwrap();
        probe.edge(ContextId::Sheet, "P", &[v]).unwrap();
        let err = identify_by_probe(&graph, &probe, 64).unwrap_err();
        assert_eq!(err, EngineError::Selection(SelectionError::AmbiguousMatch { count: 2 }));
    }

    /// `¬[P(_)]`
    fn cut_probe() -> Fragment {
        let mut probe = Fragment::new();
        let c = probe.cut(ContextId::Sheet).unwrap();
        let b = probe.boundary_vertex(None, true).unwrap();
        probe.edge(c.into(), "P", &[b]).unwrap();
        probe
    }

    /// Test that a cut probe ignores cuts holding more than it describes:
    /// `¬[P(a)] ¬[P(a) Q(a)]` has exactly one full match.
    #[test]
    fn cut_probe_skips_larger_cuts() {
        let mut builder = GraphBuilder::new();
        let a = builder.constant(ContextId::Sheet, "a").unwrap();
        let exact = builder.cut(ContextId::Sheet).unwrap();
        let p = builder.edge(exact.into(), "P", &[a]).unwrap();
        let larger = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(larger.into(), "P", &[a]).unwrap();
        builder.edge(larger.into(), "Q", &[a]).unwrap();
        let graph = builder.build();

        let sub = identify_by_probe(&graph, &cut_probe(), 64).unwrap();
        assert_eq!(sub.home(), ContextId::Sheet);
        assert_eq!(sub.cuts(), &BTreeSet::from([exact]));
        assert_eq!(sub.edges(), &BTreeSet::from([p]));
        assert_eq!(sub.boundary(), &BTreeSet::from([a]));
    }

    /// Test that a cut holding extra members is no match at all.
    #[test]
    fn partial_cut_is_not_a_match() {
        let mut builder = GraphBuilder::new();
        let a = builder.constant(ContextId::Sheet, "a").unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(cut.into(), "P", &[a]).unwrap();
        builder.edge(cut.into(), "Q", &[a]).unwrap();
        let graph = builder.build();

        let err = identify_by_probe(&graph, &cut_probe(), 64).unwrap_err();
        assert_eq!(err, EngineError::Selection(SelectionError::NoStructuralMatch));
    }

    #[test]
    fn probe_for_absent_relation_finds_nothing() {
        let f = fixture();
        let mut probe = Fragment::new();
        let b = probe.boundary_vertex(None, true).unwrap();
        probe.edge(ContextId::Sheet, "Mortal", &[b]).unwrap();
        let err = identify_by_probe(&f.graph, &probe, 64).unwrap_err();
        assert_eq!(err, EngineError::Selection(SelectionError::NoStructuralMatch));
        assert_eq!(err.kind(), crate::error::ErrorKind::SelectionError);
    }

    #[test]
    fn unique_probe_match_becomes_selection() {
        let f = fixture();
        let mut probe = Fragment::new();
        let b = probe.boundary_vertex(None, true).unwrap();
        probe.edge(ContextId::Sheet, "P", &[b]).unwrap();
        let sub = identify_by_probe(&f.graph, &probe, 64).unwrap();
        assert_eq!(sub.home(), ContextId::Cut(f.outer));
        assert_eq!(sub.edges(), &BTreeSet::from([f.p]));
        assert_eq!(sub.boundary(), &BTreeSet::from([f.x]));
    }

    #[test]
    fn selection_goes_stale_when_graph_changes() {
        let f = fixture();
        let sub = identify_subgraph(&f.graph, [ElementId::Cut(f.inner)]).unwrap();
        assert!(sub.ensure_current(&f.graph).is_ok());
        let other = GraphBuilder::new().build();
        let err = sub.ensure_current(&other).unwrap_err();
        assert!(matches!(err, EngineError::Selection(SelectionError::StaleSelection { .. })));
    }
}
