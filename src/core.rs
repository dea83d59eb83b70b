//! Core data structures for relational graphs with cuts.
//!
//! Implements Dau's relational graphs with cuts: vertices (lines of identity),
//! hyperedges labelled by relation names, and cuts (negation boundaries), with
//! containment recorded by a single `area` partition rather than a tree of objects.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Chapter 7 "Relational Graphs with Cuts" (2003)
//! - Peirce, Collected Papers 4.394–4.417 (1903) – existential graphs, beta part
//! - Roberts, "The Existential Graphs of Charles S. Peirce" (1973)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

macro_rules! element_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an id from a raw `u64`.
            ///
            /// Prefer the graph's construction API; raw ids are only meaningful
            /// for the graph value that issued them.
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw `u64` representation.
            #[inline]
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

element_id!(
    /// Identifier of a vertex (a line of identity).
    ///
    /// # Invariant
    /// Vertex, edge and cut ids of one graph value are drawn from a single counter,
    /// so a raw id never names two elements of different kinds.
    VertexId,
    "v"
);

element_id!(
    /// Identifier of a hyperedge (an occurrence of a relation).
    EdgeId,
    "e"
);

element_id!(
    /// Identifier of a cut (a negation boundary).
    CutId,
    "c"
);

/// Any element that can be a member of an area: a vertex, an edge or a cut.
///
/// Element kind is resolved once, at lookup time, instead of probing the
/// vertex, edge and cut sets in turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementId {
    /// A vertex.
    Vertex(VertexId),
    /// A hyperedge.
    Edge(EdgeId),
    /// A cut.
    Cut(CutId),
}

impl ElementId {
    /// Returns the vertex id if this element is a vertex.
    #[inline]
    pub fn as_vertex(&self) -> Option<VertexId> {
        match self {
            ElementId::Vertex(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the edge id if this element is an edge.
    #[inline]
    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            ElementId::Edge(e) => Some(*e),
            _ => None,
        }
    }

    /// Returns the cut id if this element is a cut.
    #[inline]
    pub fn as_cut(&self) -> Option<CutId> {
        match self {
            ElementId::Cut(c) => Some(*c),
            _ => None,
        }
    }

    /// Returns the raw id shared by all element kinds.
    #[inline]
    pub fn raw(&self) -> u64 {
        match self {
            ElementId::Vertex(v) => v.as_u64(),
            ElementId::Edge(e) => e.as_u64(),
            ElementId::Cut(c) => c.as_u64(),
        }
    }
}

impl From<VertexId> for ElementId {
    fn from(id: VertexId) -> Self {
        ElementId::Vertex(id)
    }
}

impl From<EdgeId> for ElementId {
    fn from(id: EdgeId) -> Self {
        ElementId::Edge(id)
    }
}

impl From<CutId> for ElementId {
    fn from(id: CutId) -> Self {
        ElementId::Cut(id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Vertex(v) => v.fmt(f),
            ElementId::Edge(e) => e.fmt(f),
            ElementId::Cut(c) => c.fmt(f),
        }
    }
}

/// A context: the sheet of assertion or a cut.
///
/// The sheet is not a cut and is never a member of any area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextId {
    /// The outermost, positive context.
    Sheet,
    /// The area enclosed by a cut.
    Cut(CutId),
}

impl ContextId {
    /// Returns `true` for the sheet of assertion.
    #[inline]
    pub fn is_sheet(&self) -> bool {
        matches!(self, ContextId::Sheet)
    }

    /// Returns the cut id unless this is the sheet.
    #[inline]
    pub fn as_cut(&self) -> Option<CutId> {
        match self {
            ContextId::Sheet => None,
            ContextId::Cut(c) => Some(*c),
        }
    }
}

impl From<CutId> for ContextId {
    fn from(id: CutId) -> Self {
        ContextId::Cut(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Sheet => write!(f, "sheet"),
            ContextId::Cut(c) => c.fmt(f),
        }
    }
}

/// A vertex: an existentially bound individual or a named constant.
///
/// Vertices carry no geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    /// Unique identifier.
    pub id: VertexId,
    /// Constant name, if any.
    pub label: Option<String>,
    /// `true` for an existentially bound variable, `false` for a named constant.
    pub generic: bool,
}

impl Vertex {
    /// Creates a vertex.
    #[inline]
    pub fn new(id: VertexId, label: Option<String>, generic: bool) -> Self {
        Self { id, label, generic }
    }

    /// Returns the constant label, if any.
    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

static EMPTY_AREA: BTreeSet<ElementId> = BTreeSet::new();

/// The immutable graph value: a relational graph with cuts.
///
/// Mathematically `G = (V, E, ν, ⊤, Cut, area, κ)` where `κ` is split into the
/// `rel` mapping (edge → relation name) and `ν` (edge → ordered argument tuple).
/// All public operations take `&self` and return fresh values; in-place mutation is
/// confined to crate-internal helpers used while building a new value.
///
/// # Invariants
/// 1. Every element id is in exactly one `area` set, and every `area` member exists.
/// 2. Cut containment forms a forest; every `area` key is the sheet or an existing cut.
/// 3. Every argument vertex of an edge exists and its context encloses the edge's context.
/// 4. `rel` and `nu` are defined for exactly the edges in `E`.
/// 5. The sheet has no parent (guaranteed by [`ContextId`] not being an [`ElementId`]).
///
/// Values assembled with [`RelationalGraphWithCuts::from_parts`] or deserialized from
/// external state may violate these; [`crate::validator`] reports such violations.
///
/// # Citations
/// - Dau, "Mathematical Logic with Diagrams", Definition 7.1 (2003)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GraphParts", into = "GraphParts")]
pub struct RelationalGraphWithCuts {
    /// Vertex set with attributes.
    vertices: BTreeMap<VertexId, Vertex>,
    /// Edge set `E`.
    edges: BTreeSet<EdgeId>,
    /// Cut set.
    cuts: BTreeSet<CutId>,
    /// Direct members of each context.
    area: BTreeMap<ContextId, BTreeSet<ElementId>>,
    /// Relation name of each edge.
    rel: BTreeMap<EdgeId, String>,
    /// Ordered arguments of each edge.
    nu: BTreeMap<EdgeId, Vec<VertexId>>,
    /// Next fresh raw id.
    next_id: u64,
}

impl RelationalGraphWithCuts {
    /// Creates the empty graph: the sheet of assertion and nothing else.
    pub fn new() -> Self {
        let mut area = BTreeMap::new();
        area.insert(ContextId::Sheet, BTreeSet::new());
        Self {
            vertices: BTreeMap::new(),
            edges: BTreeSet::new(),
            cuts: BTreeSet::new(),
            area,
            rel: BTreeMap::new(),
            nu: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Assembles a graph from raw parts without checking any invariant.
    ///
    /// The fresh-id counter is raised above every id present in the parts.
    pub fn from_parts(parts: GraphParts) -> Self {
        let mut max_seen = 0u64;
        let mut bump = |raw: u64| max_seen = max_seen.max(raw + 1);

        let mut vertices = BTreeMap::new();
        for vertex in parts.vertices {
            bump(vertex.id.as_u64());
            vertices.insert(vertex.id, vertex);
        }
        let edges: BTreeSet<EdgeId> = parts.edges.into_iter().collect();
        edges.iter().for_each(|e| bump(e.as_u64()));
        let cuts: BTreeSet<CutId> = parts.cuts.into_iter().collect();
        cuts.iter().for_each(|c| bump(c.as_u64()));

        let mut area: BTreeMap<ContextId, BTreeSet<ElementId>> = BTreeMap::new();
        area.insert(ContextId::Sheet, BTreeSet::new());
        for (ctx, members) in parts.area {
            let entry = area.entry(ctx).or_default();
            for member in members {
                bump(member.raw());
                entry.insert(member);
            }
        }

        let rel: BTreeMap<EdgeId, String> = parts.rel.into_iter().collect();
        let nu: BTreeMap<EdgeId, Vec<VertexId>> = parts.nu.into_iter().collect();
        rel.keys().chain(nu.keys()).for_each(|e| bump(e.as_u64()));

        Self {
            vertices,
            edges,
            cuts,
            area,
            rel,
            nu,
            next_id: parts.next_id.max(max_seen),
        }
    }

    /// Decomposes the graph into raw parts (deterministic order).
    pub fn to_parts(&self) -> GraphParts {
        GraphParts {
            vertices: self.vertices.values().cloned().collect(),
            edges: self.edges.iter().copied().collect(),
            cuts: self.cuts.iter().copied().collect(),
            area: self
                .area
                .iter()
                .map(|(ctx, members)| (*ctx, members.iter().copied().collect()))
                .collect(),
            rel: self.rel.iter().map(|(e, r)| (*e, r.clone())).collect(),
            nu: self.nu.iter().map(|(e, args)| (*e, args.clone())).collect(),
            next_id: self.next_id,
        }
    }

    /// Returns an iterator over all vertices in id order.
    #[inline]
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Returns an iterator over all edge ids in id order.
    #[inline]
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    /// Returns an iterator over all cut ids in id order.
    #[inline]
    pub fn cuts(&self) -> impl Iterator<Item = CutId> + '_ {
        self.cuts.iter().copied()
    }

    /// Returns every element id: vertices, then edges, then cuts.
    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.vertices
            .keys()
            .map(|&v| ElementId::Vertex(v))
            .chain(self.edges.iter().map(|&e| ElementId::Edge(e)))
            .chain(self.cuts.iter().map(|&c| ElementId::Cut(c)))
    }

    /// Looks up a vertex.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// Checks whether a vertex exists.
    #[inline]
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Checks whether an edge exists.
    #[inline]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains(&id)
    }

    /// Checks whether a cut exists.
    #[inline]
    pub fn contains_cut(&self, id: CutId) -> bool {
        self.cuts.contains(&id)
    }

    /// Checks whether an element exists in `V`, `E` or `Cut`.
    pub fn contains(&self, element: ElementId) -> bool {
        match element {
            ElementId::Vertex(v) => self.contains_vertex(v),
            ElementId::Edge(e) => self.contains_edge(e),
            ElementId::Cut(c) => self.contains_cut(c),
        }
    }

    /// Checks whether a context exists. The sheet always does.
    pub fn contains_context(&self, ctx: ContextId) -> bool {
        match ctx {
            ContextId::Sheet => true,
            ContextId::Cut(c) => self.contains_cut(c),
        }
    }

    /// Returns the relation name of an edge.
    #[inline]
    pub fn relation(&self, edge: EdgeId) -> Option<&str> {
        self.rel.get(&edge).map(String::as_str)
    }

    /// Returns the ordered argument vertices of an edge.
    #[inline]
    pub fn arguments(&self, edge: EdgeId) -> Option<&[VertexId]> {
        self.nu.get(&edge).map(Vec::as_slice)
    }

    /// Returns the direct members of a context (empty for unknown contexts).
    pub fn area(&self, ctx: ContextId) -> &BTreeSet<ElementId> {
        self.area.get(&ctx).unwrap_or(&EMPTY_AREA)
    }

    /// Returns all `area` entries, including entries keyed by unknown cuts.
    pub fn area_entries(&self) -> impl Iterator<Item = (ContextId, &BTreeSet<ElementId>)> {
        self.area.iter().map(|(ctx, members)| (*ctx, members))
    }

    /// Returns all `rel` entries.
    pub(crate) fn rel_entries(&self) -> impl Iterator<Item = (EdgeId, &str)> {
        self.rel.iter().map(|(e, r)| (*e, r.as_str()))
    }

    /// Returns all `nu` entries.
    pub(crate) fn nu_entries(&self) -> impl Iterator<Item = (EdgeId, &[VertexId])> {
        self.nu.iter().map(|(e, args)| (*e, args.as_slice()))
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns the number of cuts.
    #[inline]
    pub fn cut_count(&self) -> usize {
        self.cuts.len()
    }

    /// Returns `true` if the graph has no vertices, edges or cuts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty() && self.cuts.is_empty()
    }

    /// Compares two values ignoring the fresh-id counter.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
            && self.edges == other.edges
            && self.cuts == other.cuts
            && self.rel == other.rel
            && self.nu == other.nu
            && self.normalized_area() == other.normalized_area()
    }

    /// Area entries without empty sets, so an absent entry equals an empty one.
    fn normalized_area(&self) -> BTreeMap<ContextId, &BTreeSet<ElementId>> {
        self.area
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(ctx, members)| (*ctx, members))
            .collect()
    }

    /// Internal method to draw a fresh raw id.
    pub(crate) fn fresh_raw(&mut self) -> u64 {
        let raw = self.next_id;
        self.next_id += 1;
        raw
    }

    /// Internal method to add a vertex to a context without validation.
    pub(crate) fn insert_vertex_raw(&mut self, vertex: Vertex, ctx: ContextId) {
        let id = vertex.id;
        self.vertices.insert(id, vertex);
        self.area.entry(ctx).or_default().insert(ElementId::Vertex(id));
    }

    /// Internal method to add an edge to a context without validation.
    pub(crate) fn insert_edge_raw(
        &mut self,
        id: EdgeId,
        relation: String,
        args: Vec<VertexId>,
        ctx: ContextId,
    ) {
        self.edges.insert(id);
        self.rel.insert(id, relation);
        self.nu.insert(id, args);
        self.area.entry(ctx).or_default().insert(ElementId::Edge(id));
    }

    /// Internal method to add an empty cut to a context without validation.
    pub(crate) fn insert_cut_raw(&mut self, id: CutId, ctx: ContextId) {
        self.cuts.insert(id);
        self.area.entry(ctx).or_default().insert(ElementId::Cut(id));
        self.area.entry(ContextId::Cut(id)).or_default();
    }

    /// Internal method to delete an element from every mapping.
    ///
    /// Deleting a cut drops its own `area` entry but not its members; callers
    /// remove the closure explicitly.
    pub(crate) fn remove_element_raw(&mut self, element: ElementId) {
        for members in self.area.values_mut() {
            members.remove(&element);
        }
        match element {
            ElementId::Vertex(v) => {
                self.vertices.remove(&v);
            }
            ElementId::Edge(e) => {
                self.edges.remove(&e);
                self.rel.remove(&e);
                self.nu.remove(&e);
            }
            ElementId::Cut(c) => {
                self.cuts.remove(&c);
                self.area.remove(&ContextId::Cut(c));
            }
        }
    }

    /// Internal method to move an element between two areas.
    pub(crate) fn move_element_raw(&mut self, element: ElementId, from: ContextId, to: ContextId) {
        if let Some(members) = self.area.get_mut(&from) {
            members.remove(&element);
        }
        self.area.entry(to).or_default().insert(element);
    }
}

impl Default for RelationalGraphWithCuts {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RelationalGraphWithCuts {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(other)
    }
}

impl Eq for RelationalGraphWithCuts {}

/// Raw, unchecked representation of a graph value.
///
/// Used as the serde shape of [`RelationalGraphWithCuts`] and by loaders that
/// need to hand a possibly malformed graph to the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphParts {
    /// Vertices with attributes.
    pub vertices: Vec<Vertex>,
    /// Edge ids.
    pub edges: Vec<EdgeId>,
    /// Cut ids.
    pub cuts: Vec<CutId>,
    /// Context → direct members.
    pub area: Vec<(ContextId, Vec<ElementId>)>,
    /// Edge → relation name.
    pub rel: Vec<(EdgeId, String)>,
    /// Edge → ordered arguments.
    pub nu: Vec<(EdgeId, Vec<VertexId>)>,
    /// Fresh-id counter.
    #[serde(default)]
    pub next_id: u64,
}

impl From<GraphParts> for RelationalGraphWithCuts {
    fn from(parts: GraphParts) -> Self {
        Self::from_parts(parts)
    }
}

impl From<RelationalGraphWithCuts> for GraphParts {
    fn from(graph: RelationalGraphWithCuts) -> Self {
        graph.to_parts()
    }
}
