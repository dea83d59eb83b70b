//! Construction API for relational graphs with cuts.
//!
//! Every operation borrows the current value and returns a fresh one; the input
//! is never modified. Each operation validates its references before building, so
//! values produced here always satisfy the structural invariants.
//!
//! # Citations
//! - Persistent data structures: Okasaki, "Purely Functional Data Structures", Chapter 2 (1999)
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.1 (2003)

use crate::context::vertex_in_scope;
use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, Vertex, VertexId};
use crate::error::{EngineError, InvariantViolation, Result};
use crate::invariants;

/// Creates the empty graph: just the sheet of assertion.
pub fn create_empty() -> RelationalGraphWithCuts {
    RelationalGraphWithCuts::new()
}

/// Returns a copy of `graph` with a fresh vertex in `ctx`.
///
/// A vertex with a label and `generic == false` is a named constant; an
/// unlabelled generic vertex is an existentially bound variable.
///
/// # Citations
/// - Lines of identity: Roberts, "The Existential Graphs of Charles S. Peirce", §4.3 (1973)
pub fn with_vertex(
    graph: &RelationalGraphWithCuts,
    ctx: ContextId,
    label: Option<&str>,
    generic: bool,
) -> Result<(RelationalGraphWithCuts, VertexId)> {
    ensure_context(graph, ctx)?;
    let mut next = graph.clone();
    let id = VertexId::new(next.fresh_raw());
    next.insert_vertex_raw(Vertex::new(id, label.map(str::to_owned), generic), ctx);
    Ok((next, id))
}

/// Returns a copy of `graph` with a fresh edge in `ctx`.
///
/// Every argument must exist and be visible from `ctx`, i.e. lie in `ctx` or a
/// context enclosing it. Arity is the length of `args`; repeated arguments are
/// allowed.
pub fn with_edge(
    graph: &RelationalGraphWithCuts,
    ctx: ContextId,
    relation: &str,
    args: &[VertexId],
) -> Result<(RelationalGraphWithCuts, EdgeId)> {
    ensure_context(graph, ctx)?;
    let mut next = graph.clone();
    let id = EdgeId::new(next.fresh_raw());
    for &vertex in args {
        if !graph.contains_vertex(vertex) {
            return Err(EngineError::UnknownElement(ElementId::Vertex(vertex)));
        }
        if !vertex_in_scope(graph, vertex, ctx)? {
            return Err(InvariantViolation::ArgumentOutOfScope { edge: id, vertex }.into());
        }
    }
    next.insert_edge_raw(id, relation.to_owned(), args.to_vec(), ctx);
    Ok((next, id))
}

/// Returns a copy of `graph` with a fresh, empty cut in `ctx`.
pub fn with_cut(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<(RelationalGraphWithCuts, CutId)> {
    ensure_context(graph, ctx)?;
    let mut next = graph.clone();
    let id = CutId::new(next.fresh_raw());
    next.insert_cut_raw(id, ctx);
    Ok((next, id))
}

/// Checks whether the graph satisfies every structural invariant.
pub fn is_well_formed(graph: &RelationalGraphWithCuts) -> bool {
    invariants::is_well_formed(graph)
}

fn ensure_context(graph: &RelationalGraphWithCuts, ctx: ContextId) -> Result<()> {
    if graph.contains_context(ctx) {
        Ok(())
    } else {
        Err(EngineError::UnknownContext(ctx))
    }
}

/// Threads a graph value through a sequence of construction steps.
///
/// Convenience for tests and loaders; each step still goes through the checked
/// operations above.
///
/// ```
/// use peirce::operations::GraphBuilder;
/// use peirce::core::ContextId;
///
/// let mut builder = GraphBuilder::new();
/// let socrates = builder.constant(ContextId::Sheet, "socrates").unwrap();
/// let cut = builder.cut(ContextId::Sheet).unwrap();
/// builder.edge(cut.into(), "Mortal", &[socrates]).unwrap();
/// let graph = builder.build();
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    graph: RelationalGraphWithCuts,
}

impl GraphBuilder {
    /// Starts from the empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing value.
    pub fn from_graph(graph: RelationalGraphWithCuts) -> Self {
        Self { graph }
    }

    /// Adds an unlabelled generic vertex.
    pub fn variable(&mut self, ctx: ContextId) -> Result<VertexId> {
        self.vertex(ctx, None, true)
    }

    /// Adds a labelled constant vertex.
    pub fn constant(&mut self, ctx: ContextId, label: &str) -> Result<VertexId> {
        self.vertex(ctx, Some(label), false)
    }

    /// Adds a vertex.
    pub fn vertex(&mut self, ctx: ContextId, label: Option<&str>, generic: bool) -> Result<VertexId> {
        let (graph, id) = with_vertex(&self.graph, ctx, label, generic)?;
        self.graph = graph;
        Ok(id)
    }

    /// Adds an edge.
    pub fn edge(&mut self, ctx: ContextId, relation: &str, args: &[VertexId]) -> Result<EdgeId> {
        let (graph, id) = with_edge(&self.graph, ctx, relation, args)?;
        self.graph = graph;
        Ok(id)
    }

    /// Adds a cut.
    pub fn cut(&mut self, ctx: ContextId) -> Result<CutId> {
        let (graph, id) = with_cut(&self.graph, ctx)?;
        self.graph = graph;
        Ok(id)
    }

    /// Returns the current value without consuming the builder.
    pub fn graph(&self) -> &RelationalGraphWithCuts {
        &self.graph
    }

    /// Finishes and returns the value.
    pub fn build(self) -> RelationalGraphWithCuts {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Test that construction never modifies its input value.
    #[test]
    fn construction_is_pure() {
        let empty = create_empty();
        let (one, v) = with_vertex(&empty, ContextId::Sheet, None, true).unwrap();
        assert!(empty.is_empty());
        assert!(one.contains_vertex(v));
        assert!(one.area(ContextId::Sheet).contains(&ElementId::Vertex(v)));
    }

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut builder = GraphBuilder::new();
        let v = builder.variable(ContextId::Sheet).unwrap();
        let c = builder.cut(ContextId::Sheet).unwrap();
        let e = builder.edge(c.into(), "P", &[v]).unwrap();
        let raws = [v.as_u64(), c.as_u64(), e.as_u64()];
        assert_eq!(raws, [0, 1, 2]);
    }

    /// Test that a builder resumed from a value keeps allocating fresh ids.
    #[test]
    fn builder_resumes_from_existing_graph() {
        let mut builder = GraphBuilder::new();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let x = builder.variable(cut.into()).unwrap();
        let first = builder.build();

        let mut resumed = GraphBuilder::from_graph(first.clone());
        let e = resumed.edge(cut.into(), "P", &[x]).unwrap();
        let second = resumed.build();
        assert!(e.as_u64() > x.as_u64());
        assert_eq!(second.edge_count(), 1);
        assert_eq!(second.arguments(e), Some(&[x][..]));
        assert_eq!(first.edge_count(), 0);
        assert!(is_well_formed(&second));
    }

    #[test]
    fn edge_rejects_missing_argument() {
        let graph = create_empty();
        let err = with_edge(&graph, ContextId::Sheet, "P", &[VertexId::new(7)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownElement);
    }

    /// Test that an edge cannot reach into a cut for its arguments.
    #[test]
    fn edge_rejects_argument_out_of_scope() {
        let mut builder = GraphBuilder::new();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let inner = builder.variable(cut.into()).unwrap();
        let err = builder.edge(ContextId::Sheet, "P", &[inner]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
    }

    #[test]
    fn unknown_context_is_rejected() {
        let graph = create_empty();
        let err = with_cut(&graph, ContextId::Cut(CutId::new(3))).unwrap_err();
        assert_eq!(err, EngineError::UnknownContext(ContextId::Cut(CutId::new(3))));
    }

    #[test]
    fn built_graphs_are_well_formed() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let outer = builder.cut(ContextId::Sheet).unwrap();
        let inner = builder.cut(outer.into()).unwrap();
        builder.edge(inner.into(), "Loves", &[x, x]).unwrap();
        assert!(is_well_formed(builder.graph()));
    }
}
