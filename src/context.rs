//! Context queries: nesting depth, polarity and containment.
//!
//! Containment is never stored as parent pointers; every query walks the `area`
//! partition. Walks are bounded by the number of cuts, so a malformed graph with a
//! containment cycle produces [`InvariantViolation::CutCycle`] instead of looping.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.1 (area, depth) (2003)
//! - Peirce, Collected Papers 4.414 (evenly and oddly enclosed areas) (1903)

use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::error::{EngineError, InvariantViolation, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Polarity of a context: positive at even depth, negative at odd depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarity {
    /// Evenly enclosed (the sheet is positive).
    Positive,
    /// Oddly enclosed.
    Negative,
}

impl Polarity {
    /// Returns the polarity for a nesting depth.
    #[inline]
    pub fn from_depth(depth: usize) -> Self {
        if depth % 2 == 0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }

    /// Returns the opposite polarity.
    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }

    /// Returns `true` for [`Polarity::Positive`].
    #[inline]
    pub fn is_positive(self) -> bool {
        self == Polarity::Positive
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

/// Returns the context whose area contains `cut`.
///
/// Fails with `UnknownContext` if the cut does not exist or no area lists it.
pub fn parent_of(graph: &RelationalGraphWithCuts, cut: CutId) -> Result<ContextId> {
    let element = ElementId::Cut(cut);
    if !graph.contains_cut(cut) {
        return Err(EngineError::UnknownContext(ContextId::Cut(cut)));
    }
    graph
        .area_entries()
        .find(|(_, members)| members.contains(&element))
        .map(|(ctx, _)| ctx)
        .ok_or(EngineError::UnknownContext(ContextId::Cut(cut)))
}

/// Returns the contexts enclosing `ctx`, innermost first, ending with the sheet.
///
/// The sheet has no ancestors; `ctx` itself is not included.
pub fn ancestors(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<Vec<ContextId>> {
    let mut chain = Vec::new();
    let mut current = ctx;
    while let ContextId::Cut(cut) = current {
        if chain.len() > graph.cut_count() {
            return Err(InvariantViolation::CutCycle { cut }.into());
        }
        current = parent_of(graph, cut)?;
        chain.push(current);
    }
    Ok(chain)
}

/// Returns the nesting depth of a context: 0 for the sheet, one more than the
/// parent for a cut.
///
/// # Examples
///
/// ```
/// use peirce::operations::{create_empty, with_cut};
/// use peirce::context::depth;
/// use peirce::core::ContextId;
///
/// let graph = create_empty();
/// let (graph, outer) = with_cut(&graph, ContextId::Sheet).unwrap();
/// let (graph, inner) = with_cut(&graph, outer.into()).unwrap();
/// assert_eq!(depth(&graph, inner.into()).unwrap(), 2);
/// ```
pub fn depth(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<usize> {
    ancestors(graph, ctx).map(|chain| chain.len())
}

/// Returns the polarity of a context.
pub fn polarity(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<Polarity> {
    depth(graph, ctx).map(Polarity::from_depth)
}

/// Returns the context whose area contains `element`.
///
/// Fails with `UnknownElement` for an id the graph does not define, and with an
/// `OrphanElement` invariant violation for an element no area lists.
pub fn context_of(graph: &RelationalGraphWithCuts, element: ElementId) -> Result<ContextId> {
    if !graph.contains(element) {
        return Err(EngineError::UnknownElement(element));
    }
    graph
        .area_entries()
        .find(|(_, members)| members.contains(&element))
        .map(|(ctx, _)| ctx)
        .ok_or_else(|| InvariantViolation::OrphanElement(element).into())
}

/// Returns `true` if `outer` is `inner` or one of its ancestors.
pub fn encloses(graph: &RelationalGraphWithCuts, outer: ContextId, inner: ContextId) -> Result<bool> {
    if outer == inner {
        return Ok(true);
    }
    Ok(ancestors(graph, inner)?.contains(&outer))
}

/// Returns every context of the graph: the sheet, then cuts in id order.
pub fn contexts(graph: &RelationalGraphWithCuts) -> Vec<ContextId> {
    std::iter::once(ContextId::Sheet)
        .chain(graph.cuts().map(ContextId::Cut))
        .collect()
}

/// Returns `ctx` and every cut nested inside it, breadth first.
pub fn nested_contexts(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<Vec<ContextId>> {
    if !graph.contains_context(ctx) {
        return Err(EngineError::UnknownContext(ctx));
    }
    let mut seen = BTreeSet::from([ctx]);
    let mut order = vec![ctx];
    let mut queue = VecDeque::from([ctx]);
    while let Some(current) = queue.pop_front() {
        for cut in graph.area(current).iter().filter_map(ElementId::as_cut) {
            let child = ContextId::Cut(cut);
            if seen.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    Ok(order)
}

/// Returns every element transitively inside a cut (its area closure).
///
/// The cut itself is not included.
pub fn get_full_context(graph: &RelationalGraphWithCuts, cut: CutId) -> Result<BTreeSet<ElementId>> {
    let ctx = ContextId::Cut(cut);
    if !graph.contains_context(ctx) {
        return Err(EngineError::UnknownContext(ctx));
    }
    Ok(area_closure(graph, ctx))
}

/// Transitive members of a context; a visited set guards malformed input.
pub(crate) fn area_closure(graph: &RelationalGraphWithCuts, ctx: ContextId) -> BTreeSet<ElementId> {
    let mut closure = BTreeSet::new();
    let mut visited = BTreeSet::from([ctx]);
    let mut stack = vec![ctx];
    while let Some(current) = stack.pop() {
        for &member in graph.area(current) {
            closure.insert(member);
            if let ElementId::Cut(cut) = member {
                let child = ContextId::Cut(cut);
                if visited.insert(child) {
                    stack.push(child);
                }
            }
        }
    }
    closure
}

/// Returns the ordered argument vertices of an edge.
pub fn get_incident_vertices(graph: &RelationalGraphWithCuts, edge: EdgeId) -> Result<Vec<VertexId>> {
    graph
        .arguments(edge)
        .filter(|_| graph.contains_edge(edge))
        .map(<[VertexId]>::to_vec)
        .ok_or(EngineError::UnknownElement(ElementId::Edge(edge)))
}

/// Returns the edges whose argument tuple contains `vertex`, in id order.
pub fn incident_edges(graph: &RelationalGraphWithCuts, vertex: VertexId) -> Vec<EdgeId> {
    graph
        .edges()
        .filter(|&e| graph.arguments(e).is_some_and(|args| args.contains(&vertex)))
        .collect()
}

/// Returns `true` if `vertex` may be used as an edge argument in `ctx`: its own
/// context is `ctx` or encloses it.
pub fn vertex_in_scope(graph: &RelationalGraphWithCuts, vertex: VertexId, ctx: ContextId) -> Result<bool> {
    let home = context_of(graph, ElementId::Vertex(vertex))?;
    encloses(graph, home, ctx)
}

/// Maps every listed element to the first context listing it.
///
/// Bulk callers use this instead of repeated [`context_of`] scans.
pub(crate) fn membership(graph: &RelationalGraphWithCuts) -> BTreeMap<ElementId, ContextId> {
    let mut index = BTreeMap::new();
    for (ctx, members) in graph.area_entries() {
        for &member in members {
            index.entry(member).or_insert(ctx);
        }
    }
    index
}
