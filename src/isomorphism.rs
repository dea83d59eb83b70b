//! Exact structural identity of two selections.
//!
//! Deiteration may only remove a part of the graph that is an exact copy of
//! another part. "Exact copy" means a bijection between the two selections'
//! own elements that preserves element kind, relation names, arities, argument
//! positions, vertex attributes and cut nesting. Vertices the duplicate shares
//! with the outside (its boundary) are not renamed: each must be used by the
//! original too, either as a boundary vertex or as one of its own vertices.
//!
//! A [`selection_shape`] comparison rejects most non-copies before the
//! backtracking search runs.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1 (iteration/deiteration) (2003)
//! - Subgraph isomorphism: Cordella et al., "A (sub)graph isomorphism algorithm for matching large graphs" (2004)

use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::error::{EngineError, PreconditionFailure, Result};
use crate::fingerprint::selection_shape;
use crate::subgraph::Subgraph;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// A structure-preserving bijection from a duplicate onto an original.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Isomorphism {
    vertices: BTreeMap<VertexId, VertexId>,
    edges: BTreeMap<EdgeId, EdgeId>,
    cuts: BTreeMap<CutId, CutId>,
}

impl Isomorphism {
    /// Image of a duplicate vertex (boundary vertices map to themselves).
    pub fn vertex(&self, v: VertexId) -> Option<VertexId> {
        self.vertices.get(&v).copied()
    }

    /// Image of a duplicate edge.
    pub fn edge(&self, e: EdgeId) -> Option<EdgeId> {
        self.edges.get(&e).copied()
    }

    /// Image of a duplicate cut.
    pub fn cut(&self, c: CutId) -> Option<CutId> {
        self.cuts.get(&c).copied()
    }
}

/// Finds an isomorphism from `duplicate` onto `original`.
///
/// Fails with `NotStructurallyIdentical` naming the first check that failed.
pub fn find_isomorphism(
    graph: &RelationalGraphWithCuts,
    duplicate: &Subgraph,
    original: &Subgraph,
) -> Result<Isomorphism> {
    let reject = |reason: String| -> EngineError { PreconditionFailure::NotStructurallyIdentical { reason }.into() };

    if duplicate.edges().len() != original.edges().len() {
        return Err(reject(format!(
            "edge counts differ ({} vs {})",
            duplicate.edges().len(),
            original.edges().len()
        )));
    }
    if duplicate.cuts().len() != original.cuts().len() {
        return Err(reject(format!(
            "cut counts differ ({} vs {})",
            duplicate.cuts().len(),
            original.cuts().len()
        )));
    }
    if let Some(v) = duplicate
        .boundary()
        .iter()
        .find(|v| !original.vertices().contains(v) && !original.boundary().contains(v))
    {
        return Err(reject(format!("shared vertex {} is not used by the original", v)));
    }
    let shared_inside = duplicate.boundary().intersection(original.vertices()).count();
    if duplicate.vertices().len() + shared_inside != original.vertices().len() {
        return Err(reject(format!(
            "vertex counts differ ({} vs {})",
            duplicate.vertices().len() + shared_inside,
            original.vertices().len()
        )));
    }
    if selection_shape(graph, duplicate) != selection_shape(graph, original) {
        return Err(reject("shapes differ".to_string()));
    }

    let mut search = Search::new(graph, duplicate, original);
    if search.extend(0) {
        trace!(edges = search.iso.edges.len(), "selections are isomorphic");
        Ok(search.iso)
    } else {
        Err(reject("no structure-preserving bijection exists".to_string()))
    }
}

/// Returns `true` if `duplicate` is an exact copy of `original`.
pub fn structurally_identical(graph: &RelationalGraphWithCuts, duplicate: &Subgraph, original: &Subgraph) -> bool {
    find_isomorphism(graph, duplicate, original).is_ok()
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Edge(EdgeId, ContextId),
    Vertex(VertexId, ContextId),
    Cut(CutId, ContextId),
}

struct Search<'a> {
    graph: &'a RelationalGraphWithCuts,
    duplicate: &'a Subgraph,
    original: &'a Subgraph,
    steps: Vec<Step>,
    /// Context of each duplicate vertex.
    vertex_home: BTreeMap<VertexId, ContextId>,
    iso: Isomorphism,
    used: BTreeSet<ElementId>,
}

impl<'a> Search<'a> {
    fn new(graph: &'a RelationalGraphWithCuts, duplicate: &'a Subgraph, original: &'a Subgraph) -> Self {
        let mut steps = Vec::new();
        let mut vertex_home = BTreeMap::new();
        let mut queue = vec![duplicate.home()];
        while !queue.is_empty() {
            let mut next = Vec::new();
            for ctx in queue {
                let members = members_of(graph, duplicate, ctx);
                steps.extend(members.iter().filter_map(ElementId::as_edge).map(|e| Step::Edge(e, ctx)));
                for v in members.iter().filter_map(ElementId::as_vertex) {
                    vertex_home.insert(v, ctx);
                    steps.push(Step::Vertex(v, ctx));
                }
                for c in members.iter().filter_map(ElementId::as_cut) {
                    steps.push(Step::Cut(c, ctx));
                    next.push(ContextId::Cut(c));
                }
            }
            queue = next;
        }

        let mut iso = Isomorphism::default();
        let mut used = BTreeSet::new();
        for &shared in duplicate.boundary() {
            iso.vertices.insert(shared, shared);
            used.insert(ElementId::Vertex(shared));
        }
        Self { graph, duplicate, original, steps, vertex_home, iso, used }
    }

    fn image_of(&self, ctx: ContextId) -> Option<ContextId> {
        if ctx == self.duplicate.home() {
            Some(self.original.home())
        } else {
            ctx.as_cut().and_then(|c| self.iso.cuts.get(&c)).map(|&c| ContextId::Cut(c))
        }
    }

    fn attributes_match(&self, dup: VertexId, orig: VertexId) -> bool {
        match (self.graph.vertex(dup), self.graph.vertex(orig)) {
            (Some(a), Some(b)) => a.label == b.label && a.generic == b.generic,
            _ => false,
        }
    }

    /// Whether an original vertex may be the image of a duplicate vertex living in `ctx`.
    fn vertex_fits(&self, dup: VertexId, orig: VertexId, orig_ctx: ContextId) -> bool {
        self.original.vertices().contains(&orig)
            && !self.used.contains(&ElementId::Vertex(orig))
            && is_member(self.graph, self.original, orig_ctx, ElementId::Vertex(orig))
            && self.attributes_match(dup, orig)
    }

    fn extend(&mut self, at: usize) -> bool {
        let Some(&step) = self.steps.get(at) else {
            return true;
        };
        match step {
            Step::Vertex(v, _) if self.iso.vertices.contains_key(&v) => self.extend(at + 1),
            Step::Vertex(v, ctx) => {
                let Some(orig_ctx) = self.image_of(ctx) else { return false };
                let candidates: Vec<VertexId> = members_of(self.graph, self.original, orig_ctx)
                    .iter()
                    .filter_map(ElementId::as_vertex)
                    .collect();
                for orig in candidates {
                    if !self.vertex_fits(v, orig, orig_ctx) {
                        continue;
                    }
                    self.bind_vertex(v, orig);
                    if self.extend(at + 1) {
                        return true;
                    }
                    self.unbind_vertex(v);
                }
                false
            }
            Step::Cut(c, ctx) => {
                let Some(orig_ctx) = self.image_of(ctx) else { return false };
                let wanted = member_counts(self.graph.area(ContextId::Cut(c)));
                let candidates: Vec<CutId> = members_of(self.graph, self.original, orig_ctx)
                    .iter()
                    .filter_map(ElementId::as_cut)
                    .filter(|&o| member_counts(self.graph.area(ContextId::Cut(o))) == wanted)
                    .collect();
                for orig in candidates {
                    if !self.used.insert(ElementId::Cut(orig)) {
                        continue;
                    }
                    self.iso.cuts.insert(c, orig);
                    if self.extend(at + 1) {
                        return true;
                    }
                    self.iso.cuts.remove(&c);
                    self.used.remove(&ElementId::Cut(orig));
                }
                false
            }
            Step::Edge(e, ctx) => {
                let Some(orig_ctx) = self.image_of(ctx) else { return false };
                let relation = self.graph.relation(e);
                let dup_args = self.graph.arguments(e).unwrap_or_default().to_vec();
                let candidates: Vec<EdgeId> = members_of(self.graph, self.original, orig_ctx)
                    .iter()
                    .filter_map(ElementId::as_edge)
                    .filter(|&o| {
                        self.graph.relation(o) == relation
                            && self.graph.arguments(o).map(<[VertexId]>::len) == Some(dup_args.len())
                    })
                    .collect();
                for orig in candidates {
                    if self.used.contains(&ElementId::Edge(orig)) {
                        continue;
                    }
                    let orig_args = self.graph.arguments(orig).unwrap_or_default().to_vec();
                    let mut bound = Vec::new();
                    let consistent = self.bind_arguments(&dup_args, &orig_args, &mut bound);
                    if consistent {
                        self.used.insert(ElementId::Edge(orig));
                        self.iso.edges.insert(e, orig);
                        if self.extend(at + 1) {
                            return true;
                        }
                        self.iso.edges.remove(&e);
                        self.used.remove(&ElementId::Edge(orig));
                    }
                    for v in bound {
                        self.unbind_vertex(v);
                    }
                }
                false
            }
        }
    }

    fn bind_arguments(&mut self, dup_args: &[VertexId], orig_args: &[VertexId], bound: &mut Vec<VertexId>) -> bool {
        for (&d, &o) in dup_args.iter().zip(orig_args) {
            if let Some(&image) = self.iso.vertices.get(&d) {
                if image != o {
                    return false;
                }
                continue;
            }
            let Some(orig_ctx) = self.vertex_home.get(&d).and_then(|&ctx| self.image_of(ctx)) else {
                return false;
            };
            if !self.vertex_fits(d, o, orig_ctx) {
                return false;
            }
            self.bind_vertex(d, o);
            bound.push(d);
        }
        true
    }

    fn bind_vertex(&mut self, dup: VertexId, orig: VertexId) {
        self.iso.vertices.insert(dup, orig);
        self.used.insert(ElementId::Vertex(orig));
    }

    fn unbind_vertex(&mut self, dup: VertexId) {
        if let Some(orig) = self.iso.vertices.remove(&dup) {
            self.used.remove(&ElementId::Vertex(orig));
        }
    }
}

/// Members of a selected context: the top level for the home, the full area for
/// a selected cut.
fn members_of(graph: &RelationalGraphWithCuts, selection: &Subgraph, ctx: ContextId) -> BTreeSet<ElementId> {
    if ctx == selection.home() {
        selection.top_level().clone()
    } else {
        graph.area(ctx).clone()
    }
}

fn is_member(graph: &RelationalGraphWithCuts, selection: &Subgraph, ctx: ContextId, element: ElementId) -> bool {
    if ctx == selection.home() {
        selection.top_level().contains(&element)
    } else {
        graph.area(ctx).contains(&element)
    }
}

pub(crate) fn member_counts(area: &BTreeSet<ElementId>) -> (usize, usize, usize) {
    area.iter().fold((0, 0, 0), |(v, e, c), member| match member {
        ElementId::Vertex(_) => (v + 1, e, c),
        ElementId::Edge(_) => (v, e + 1, c),
        ElementId::Cut(_) => (v, e, c + 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::GraphBuilder;
    use crate::subgraph::identify_subgraph;

    fn select(graph: &RelationalGraphWithCuts, ids: &[ElementId]) -> Subgraph {
        identify_subgraph(graph, ids.iter().copied()).unwrap()
    }

    /// Test that `P(x) ¬[P(x)]` has the cut's edge as an exact copy of the
    /// outer edge.
    #[test]
    fn shared_argument_copy_is_identical() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let outer = builder.edge(ContextId::Sheet, "P", &[x]).unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let inner = builder.edge(cut.into(), "P", &[x]).unwrap();
        let graph = builder.build();

        let original = select(&graph, &[ElementId::Edge(outer)]);
        let duplicate = select(&graph, &[ElementId::Edge(inner)]);
        let iso = find_isomorphism(&graph, &duplicate, &original).unwrap();
        assert_eq!(iso.edge(inner), Some(outer));
        assert_eq!(iso.vertex(x), Some(x));
    }

    /// Test that a duplicate reusing the original's own vertex is accepted.
    #[test]
    fn duplicate_may_share_original_vertex() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let p = builder.edge(ContextId::Sheet, "P", &[x]).unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let copy = builder.edge(cut.into(), "P", &[x]).unwrap();
        let graph = builder.build();

        let original = select(&graph, &[ElementId::Vertex(x), ElementId::Edge(p)]);
        let duplicate = select(&graph, &[ElementId::Edge(copy)]);
        assert!(structurally_identical(&graph, &duplicate, &original));
    }

    #[test]
    fn different_argument_order_is_rejected() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let y = builder.variable(ContextId::Sheet).unwrap();
        let a = builder.edge(ContextId::Sheet, "R", &[x, y]).unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let b = builder.edge(cut.into(), "R", &[y, x]).unwrap();
        let graph = builder.build();

        let original = select(&graph, &[ElementId::Edge(a)]);
        let duplicate = select(&graph, &[ElementId::Edge(b)]);
        let err = find_isomorphism(&graph, &duplicate, &original).unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::Precondition(PreconditionFailure::NotStructurallyIdentical { .. })
        ));
    }

    /// Test that nested cuts with their own vertices are matched as a whole.
    #[test]
    fn nested_structure_with_internal_vertices() {
        let mut builder = GraphBuilder::new();
        let copy = |builder: &mut GraphBuilder| {
            let c = builder.cut(ContextId::Sheet).unwrap();
            let y = builder.variable(c.into()).unwrap();
            let inner = builder.cut(c.into()).unwrap();
            builder.edge(inner.into(), "Loves", &[y, y]).unwrap();
            c
        };
        let first = copy(&mut builder);
        let second = copy(&mut builder);
        let graph = builder.build();

        let original = select(&graph, &[ElementId::Cut(first)]);
        let duplicate = select(&graph, &[ElementId::Cut(second)]);
        let iso = find_isomorphism(&graph, &duplicate, &original).unwrap();
        assert_eq!(iso.cut(second), Some(first));
    }

    #[test]
    fn label_renaming_is_not_identity() {
        let mut builder = GraphBuilder::new();
        let a = builder.constant(ContextId::Sheet, "a").unwrap();
        let b = builder.constant(ContextId::Sheet, "b").unwrap();
        let c1 = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(c1.into(), "P", &[a]).unwrap();
        let c2 = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(c2.into(), "P", &[b]).unwrap();
        let graph = builder.build();

        let original = select(&graph, &[ElementId::Cut(c1)]);
        let duplicate = select(&graph, &[ElementId::Cut(c2)]);
        assert!(!structurally_identical(&graph, &duplicate, &original));
    }
}
