//! Graph fragments and structural matching.
//!
//! A [`Fragment`] is a small relational graph with cuts whose sheet stands for
//! some context of a host graph, plus a set of *boundary* vertices on that sheet
//! standing for host vertices the fragment refers to but does not own. Fragments
//! play two roles: probes, matched against a host graph to select a subgraph by
//! shape, and payloads, grafted into a host graph by insertion and iteration.
//!
//! Matching is anchored backtracking over a fixed plan: boundary vertices first,
//! then each fragment context outermost first (its edges, its remaining vertices,
//! then its cuts). A fragment cut only matches a host cut whose area has the
//! same member counts, so every match image is a closed selection. Edges bind their argument vertices as they match, so free
//! vertex choices only arise for isolated fragment vertices.
//!
//! # Citations
//! - Graph pattern matching: Ullmann, "An algorithm for subgraph isomorphism" (1976)
//! - Subgraph isomorphism: Cordella et al., "A (sub)graph isomorphism algorithm for matching large graphs" (2004)
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.6 (subgraphs) (2003)

use crate::context::{ancestors, contexts, membership, nested_contexts};
use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, Vertex, VertexId};
use crate::error::{PreconditionFailure, Result, SelectionError};
use crate::invariants::check_invariants;
use crate::isomorphism::member_counts;
use crate::operations::{with_cut, with_edge, with_vertex};
use crate::subgraph::Subgraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// A relational graph with cuts standing for part of a host graph.
///
/// # Invariants
/// - Boundary vertices lie on the fragment's sheet.
/// - A fragment accepted by [`Fragment::check`] has at least one non-boundary
///   element and satisfies every structural invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    graph: RelationalGraphWithCuts,
    boundary: BTreeSet<VertexId>,
}

impl Fragment {
    /// Creates an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a fragment without checking it.
    pub fn from_parts(graph: RelationalGraphWithCuts, boundary: BTreeSet<VertexId>) -> Self {
        Self { graph, boundary }
    }

    /// Adds a vertex owned by the fragment.
    pub fn vertex(&mut self, ctx: ContextId, label: Option<&str>, generic: bool) -> Result<VertexId> {
        let (graph, id) = with_vertex(&self.graph, ctx, label, generic)?;
        self.graph = graph;
        Ok(id)
    }

    /// Adds a boundary vertex on the fragment's sheet.
    ///
    /// A label constrains which host vertex it can match; it is never copied on
    /// insertion, where the vertex is bound to an existing host vertex instead.
    pub fn boundary_vertex(&mut self, label: Option<&str>, generic: bool) -> Result<VertexId> {
        let id = self.vertex(ContextId::Sheet, label, generic)?;
        self.boundary.insert(id);
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

    /// Returns the fragment's graph.
    #[inline]
    pub fn graph(&self) -> &RelationalGraphWithCuts {
        &self.graph
    }

    /// Returns the boundary vertices.
    #[inline]
    pub fn boundary(&self) -> &BTreeSet<VertexId> {
        &self.boundary
    }

    /// Checks whether a fragment vertex is a boundary vertex.
    #[inline]
    pub fn is_boundary(&self, vertex: VertexId) -> bool {
        self.boundary.contains(&vertex)
    }

    /// Returns the elements the fragment owns (everything but boundary vertices).
    pub fn internal_elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.graph
            .elements()
            .filter(|e| !matches!(e, ElementId::Vertex(v) if self.boundary.contains(v)))
    }

    /// Fails with `MalformedProbe` unless the fragment is usable as a probe or payload.
    pub fn check(&self) -> Result<()> {
        if let Some(violation) = check_invariants(&self.graph).into_iter().next() {
            return Err(malformed(violation.to_string()));
        }
        for &vertex in &self.boundary {
            if !self.graph.area(ContextId::Sheet).contains(&ElementId::Vertex(vertex)) {
                return Err(malformed(format!("boundary vertex {} is not on the fragment sheet", vertex)));
            }
        }
        if self.internal_elements().next().is_none() {
            return Err(malformed("the fragment is empty".to_string()));
        }
        Ok(())
    }

    /// Extracts the selected structure of `graph` as a fragment.
    ///
    /// The selection's home becomes the fragment sheet and its boundary vertices
    /// become fragment boundary vertices. Returns the fragment and the binding of
    /// each fragment boundary vertex to the host vertex it stands for.
    pub fn from_subgraph(
        graph: &RelationalGraphWithCuts,
        selection: &Subgraph,
    ) -> Result<(Fragment, BTreeMap<VertexId, VertexId>)> {
        let mut fragment = Fragment::new();
        let mut vertex_map: BTreeMap<VertexId, VertexId> = BTreeMap::new();
        let mut bindings = BTreeMap::new();

        for &host in selection.boundary() {
            let (label, generic) = vertex_attributes(graph, host);
            let id = fragment.boundary_vertex(label.as_deref(), generic)?;
            vertex_map.insert(host, id);
            bindings.insert(id, host);
        }

        // Outermost contexts first, so edge arguments always exist already.
        let mut context_map = BTreeMap::from([(selection.home(), ContextId::Sheet)]);
        let mut queue = vec![(selection.home(), selection.top_level().iter().copied().collect::<Vec<_>>())];
        let mut pending_edges = Vec::new();
        while !queue.is_empty() {
            let mut next = Vec::new();
            for (host_ctx, members) in queue {
                let frag_ctx = context_map[&host_ctx];
                for member in members {
                    match member {
                        ElementId::Vertex(v) => {
                            let (label, generic) = vertex_attributes(graph, v);
                            let id = fragment.vertex(frag_ctx, label.as_deref(), generic)?;
                            vertex_map.insert(v, id);
                        }
                        ElementId::Cut(c) => {
                            let id = fragment.cut(frag_ctx)?;
                            context_map.insert(ContextId::Cut(c), ContextId::Cut(id));
                            let inner = graph.area(ContextId::Cut(c)).iter().copied().collect();
                            next.push((ContextId::Cut(c), inner));
                        }
                        ElementId::Edge(e) => pending_edges.push((e, frag_ctx)),
                    }
                }
            }
            queue = next;
        }

        for (edge, frag_ctx) in pending_edges {
            let relation = graph.relation(edge).unwrap_or_default();
            let args = graph
                .arguments(edge)
                .unwrap_or_default()
                .iter()
                .map(|v| {
                    vertex_map
                        .get(v)
                        .copied()
                        .ok_or(SelectionError::StaleSelection { element: ElementId::Vertex(*v) })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            fragment.edge(frag_ctx, relation, &args)?;
        }
        Ok((fragment, bindings))
    }
}

fn malformed(reason: String) -> crate::error::EngineError {
    SelectionError::MalformedProbe { reason }.into()
}

fn vertex_attributes(graph: &RelationalGraphWithCuts, vertex: VertexId) -> (Option<String>, bool) {
    graph
        .vertex(vertex)
        .map(|v| (v.label.clone(), v.generic))
        .unwrap_or((None, true))
}

/// One occurrence of a fragment in a host graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentMatch {
    home: ContextId,
    vertices: BTreeMap<VertexId, VertexId>,
    boundary: BTreeMap<VertexId, VertexId>,
    edges: BTreeMap<EdgeId, EdgeId>,
    cuts: BTreeMap<CutId, CutId>,
}

impl FragmentMatch {
    /// Host context the fragment sheet is mapped to.
    #[inline]
    pub fn home(&self) -> ContextId {
        self.home
    }

    /// Host vertex matched by a fragment vertex (internal or boundary).
    pub fn vertex(&self, fragment_vertex: VertexId) -> Option<VertexId> {
        self.vertices
            .get(&fragment_vertex)
            .or_else(|| self.boundary.get(&fragment_vertex))
            .copied()
    }

    /// Host edge matched by a fragment edge.
    pub fn edge(&self, fragment_edge: EdgeId) -> Option<EdgeId> {
        self.edges.get(&fragment_edge).copied()
    }

    /// Host cut matched by a fragment cut.
    pub fn cut(&self, fragment_cut: CutId) -> Option<CutId> {
        self.cuts.get(&fragment_cut).copied()
    }

    /// Host vertices matched by the fragment's boundary vertices.
    pub fn boundary(&self) -> &BTreeMap<VertexId, VertexId> {
        &self.boundary
    }

    /// Host elements matched by the fragment's own elements.
    pub fn image(&self) -> BTreeSet<ElementId> {
        self.vertices
            .values()
            .map(|&v| ElementId::Vertex(v))
            .chain(self.edges.values().map(|&e| ElementId::Edge(e)))
            .chain(self.cuts.values().map(|&c| ElementId::Cut(c)))
            .collect()
    }
}

/// Finds up to `limit` distinct occurrences of `fragment` anywhere in `graph`.
///
/// Matches with the same home and image are reported once.
pub fn find_matches(
    graph: &RelationalGraphWithCuts,
    fragment: &Fragment,
    limit: usize,
) -> Result<Vec<FragmentMatch>> {
    fragment.check()?;
    let mut search = Search::new(graph, fragment, limit);
    for home in contexts(graph) {
        if search.full() {
            break;
        }
        search.run_at(home)?;
    }
    Ok(search.results)
}

/// Finds up to `limit` occurrences of `fragment` with its sheet anchored at `ctx`.
pub fn match_in(
    graph: &RelationalGraphWithCuts,
    fragment: &Fragment,
    ctx: ContextId,
    limit: usize,
) -> Result<Vec<FragmentMatch>> {
    fragment.check()?;
    if !graph.contains_context(ctx) {
        return Err(crate::error::EngineError::UnknownContext(ctx));
    }
    let mut search = Search::new(graph, fragment, limit);
    search.run_at(ctx)?;
    Ok(search.results)
}

/// Copies a fragment into `target` with fresh ids.
///
/// Boundary vertices are not copied: each is replaced by its bound host vertex.
/// Returns the new graph and the introduced element ids.
pub(crate) fn graft(
    graph: &RelationalGraphWithCuts,
    fragment: &Fragment,
    target: ContextId,
    bindings: &BTreeMap<VertexId, VertexId>,
) -> Result<(RelationalGraphWithCuts, Vec<ElementId>)> {
    let source = fragment.graph();
    let mut next = graph.clone();
    let mut introduced = Vec::new();
    let mut vertex_map = BTreeMap::new();
    let mut context_map = BTreeMap::from([(ContextId::Sheet, target)]);
    let mut edges = Vec::new();

    for frag_ctx in nested_contexts(source, ContextId::Sheet)? {
        let host_ctx = context_map[&frag_ctx];
        for &member in source.area(frag_ctx) {
            match member {
                ElementId::Vertex(v) if fragment.is_boundary(v) => {}
                ElementId::Vertex(v) => {
                    let (label, generic) = vertex_attributes(source, v);
                    let id = VertexId::new(next.fresh_raw());
                    next.insert_vertex_raw(Vertex::new(id, label, generic), host_ctx);
                    vertex_map.insert(v, id);
                    introduced.push(ElementId::Vertex(id));
                }
                ElementId::Cut(c) => {
                    let id = CutId::new(next.fresh_raw());
                    next.insert_cut_raw(id, host_ctx);
                    context_map.insert(ContextId::Cut(c), ContextId::Cut(id));
                    introduced.push(ElementId::Cut(id));
                }
                ElementId::Edge(e) => edges.push((e, host_ctx)),
            }
        }
    }

    for (edge, host_ctx) in edges {
        let mut args = Vec::new();
        for &v in source.arguments(edge).unwrap_or_default() {
            let host = vertex_map
                .get(&v)
                .or_else(|| bindings.get(&v))
                .copied()
                .ok_or(PreconditionFailure::UnboundFragmentVertex { vertex: v })?;
            args.push(host);
        }
        let id = EdgeId::new(next.fresh_raw());
        next.insert_edge_raw(id, source.relation(edge).unwrap_or_default().to_owned(), args, host_ctx);
        introduced.push(ElementId::Edge(id));
    }
    Ok((next, introduced))
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Boundary(VertexId),
    Edge(EdgeId, ContextId),
    Vertex(VertexId, ContextId),
    Cut(CutId, ContextId),
}

struct Search<'a> {
    graph: &'a RelationalGraphWithCuts,
    fragment: &'a Fragment,
    steps: Vec<Step>,
    index: BTreeMap<ElementId, ContextId>,
    limit: usize,
    home: ContextId,
    visible: BTreeSet<ContextId>,
    vertices: BTreeMap<VertexId, VertexId>,
    edges: BTreeMap<EdgeId, EdgeId>,
    cuts: BTreeMap<CutId, CutId>,
    used: BTreeSet<ElementId>,
    seen: BTreeSet<(ContextId, BTreeSet<ElementId>)>,
    results: Vec<FragmentMatch>,
}

impl<'a> Search<'a> {
    fn new(graph: &'a RelationalGraphWithCuts, fragment: &'a Fragment, limit: usize) -> Self {
        Self {
            graph,
            fragment,
            steps: plan(fragment),
            index: membership(graph),
            limit: limit.max(1),
            home: ContextId::Sheet,
            visible: BTreeSet::new(),
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            cuts: BTreeMap::new(),
            used: BTreeSet::new(),
            seen: BTreeSet::new(),
            results: Vec::new(),
        }
    }

    fn full(&self) -> bool {
        self.results.len() >= self.limit
    }

    fn run_at(&mut self, home: ContextId) -> Result<()> {
        trace!(home = %home, steps = self.steps.len(), "matching fragment");
        self.home = home;
        self.visible = ancestors(self.graph, home)?.into_iter().collect();
        self.visible.insert(home);
        self.vertices.clear();
        self.edges.clear();
        self.cuts.clear();
        self.used.clear();
        self.extend(0);
        Ok(())
    }

    fn image_of(&self, frag_ctx: ContextId) -> Option<ContextId> {
        match frag_ctx {
            ContextId::Sheet => Some(self.home),
            ContextId::Cut(c) => self.cuts.get(&c).map(|&h| ContextId::Cut(h)),
        }
    }

    fn label_fits(&self, frag_vertex: VertexId, host_vertex: VertexId) -> bool {
        let wanted = self.fragment.graph().vertex(frag_vertex).and_then(Vertex::label);
        match wanted {
            None => true,
            Some(label) => self.graph.vertex(host_vertex).and_then(Vertex::label) == Some(label),
        }
    }

    fn extend(&mut self, at: usize) {
        if self.full() {
            return;
        }
        let Some(&step) = self.steps.get(at) else {
            self.record();
            return;
        };
        match step {
            Step::Boundary(v) => {
                let candidates: Vec<VertexId> = self
                    .graph
                    .vertices()
                    .map(|h| h.id)
                    .filter(|&h| {
                        self.index
                            .get(&ElementId::Vertex(h))
                            .is_some_and(|ctx| self.visible.contains(ctx))
                    })
                    .collect();
                for host in candidates {
                    self.try_vertex(v, host, at);
                }
            }
            Step::Vertex(v, _) if self.vertices.contains_key(&v) => self.extend(at + 1),
            Step::Vertex(v, frag_ctx) => {
                let Some(host_ctx) = self.image_of(frag_ctx) else { return };
                let candidates: Vec<VertexId> =
                    self.graph.area(host_ctx).iter().filter_map(ElementId::as_vertex).collect();
                for host in candidates {
                    self.try_vertex(v, host, at);
                }
            }
            Step::Cut(c, frag_ctx) => {
                let Some(host_ctx) = self.image_of(frag_ctx) else { return };
                // Fragment cuts match whole host cuts only.
                let wanted = member_counts(self.fragment.graph().area(ContextId::Cut(c)));
                let candidates: Vec<CutId> = self
                    .graph
                    .area(host_ctx)
                    .iter()
                    .filter_map(ElementId::as_cut)
                    .filter(|&h| member_counts(self.graph.area(ContextId::Cut(h))) == wanted)
                    .collect();
                for host in candidates {
                    if self.used.insert(ElementId::Cut(host)) {
                        self.cuts.insert(c, host);
                        self.extend(at + 1);
                        self.cuts.remove(&c);
                        self.used.remove(&ElementId::Cut(host));
                    }
                }
            }
            Step::Edge(e, frag_ctx) => {
                let Some(host_ctx) = self.image_of(frag_ctx) else { return };
                let source = self.fragment.graph();
                let relation = source.relation(e).unwrap_or_default();
                let frag_args = source.arguments(e).unwrap_or_default().to_vec();
                let candidates: Vec<EdgeId> = self
                    .graph
                    .area(host_ctx)
                    .iter()
                    .filter_map(ElementId::as_edge)
                    .filter(|&h| {
                        self.graph.relation(h) == Some(relation)
                            && self.graph.arguments(h).map(<[VertexId]>::len) == Some(frag_args.len())
                    })
                    .collect();
                for host in candidates {
                    if self.used.contains(&ElementId::Edge(host)) {
                        continue;
                    }
                    let host_args = self.graph.arguments(host).unwrap_or_default().to_vec();
                    let mut bound = Vec::new();
                    if self.bind_arguments(&frag_args, &host_args, &mut bound) {
                        self.used.insert(ElementId::Edge(host));
                        self.edges.insert(e, host);
                        self.extend(at + 1);
                        self.edges.remove(&e);
                        self.used.remove(&ElementId::Edge(host));
                    }
                    for v in bound {
                        if let Some(h) = self.vertices.remove(&v) {
                            self.used.remove(&ElementId::Vertex(h));
                        }
                    }
                }
            }
        }
    }

    /// Binds a fragment vertex and recurses; undoes the binding afterwards.
    fn try_vertex(&mut self, v: VertexId, host: VertexId, at: usize) {
        if self.used.contains(&ElementId::Vertex(host)) || !self.label_fits(v, host) {
            return;
        }
        self.used.insert(ElementId::Vertex(host));
        self.vertices.insert(v, host);
        self.extend(at + 1);
        self.vertices.remove(&v);
        self.used.remove(&ElementId::Vertex(host));
    }

    /// Extends the vertex binding positionally; records new bindings in `bound`.
    fn bind_arguments(&mut self, frag_args: &[VertexId], host_args: &[VertexId], bound: &mut Vec<VertexId>) -> bool {
        for (&f, &h) in frag_args.iter().zip(host_args) {
            if let Some(&existing) = self.vertices.get(&f) {
                if existing != h {
                    return false;
                }
                continue;
            }
            // Unbound arguments are internal vertices of this or an enclosing
            // fragment context; their host must sit directly in its image.
            let frag_home = self.fragment_context(f);
            let host_home = self.index.get(&ElementId::Vertex(h)).copied();
            if frag_home.and_then(|ctx| self.image_of(ctx)) != host_home
                || host_home.is_none()
                || self.used.contains(&ElementId::Vertex(h))
                || !self.label_fits(f, h)
            {
                return false;
            }
            self.used.insert(ElementId::Vertex(h));
            self.vertices.insert(f, h);
            bound.push(f);
        }
        true
    }

    fn fragment_context(&self, v: VertexId) -> Option<ContextId> {
        self.fragment
            .graph()
            .area_entries()
            .find(|(_, members)| members.contains(&ElementId::Vertex(v)))
            .map(|(ctx, _)| ctx)
    }

    fn record(&mut self) {
        let (boundary, vertices): (BTreeMap<_, _>, BTreeMap<_, _>) = self
            .vertices
            .iter()
            .map(|(&f, &h)| (f, h))
            .partition(|(f, _)| self.fragment.is_boundary(*f));
        let found = FragmentMatch {
            home: self.home,
            vertices,
            boundary,
            edges: self.edges.clone(),
            cuts: self.cuts.clone(),
        };
        if self.seen.insert((self.home, found.image())) {
            self.results.push(found);
        }
    }
}

/// Orders the fragment's elements for matching.
fn plan(fragment: &Fragment) -> Vec<Step> {
    let graph = fragment.graph();
    let mut steps: Vec<Step> = fragment.boundary().iter().map(|&v| Step::Boundary(v)).collect();
    let mut queue = vec![ContextId::Sheet];
    while !queue.is_empty() {
        let mut next = Vec::new();
        for ctx in queue {
            let area = graph.area(ctx);
            steps.extend(area.iter().filter_map(ElementId::as_edge).map(|e| Step::Edge(e, ctx)));
            steps.extend(
                area.iter()
                    .filter_map(ElementId::as_vertex)
                    .filter(|v| !fragment.is_boundary(*v))
                    .map(|v| Step::Vertex(v, ctx)),
            );
            for cut in area.iter().filter_map(ElementId::as_cut) {
                steps.push(Step::Cut(cut, ctx));
                next.push(ContextId::Cut(cut));
            }
        }
        queue = next;
    }
    steps
}
