//! Fingerprints of graph values and selection shapes.
//!
//! Two kinds of hash are provided:
//! - [`graph_fingerprint`] identifies one concrete graph value, ids included; the
//!   proof trace uses it to detect divergence on replay.
//! - [`selection_shape`] is invariant under renaming of elements. It is computed
//!   by Weisfeiler–Lehman refinement over the selection's vertices and edges and
//!   serves as the quick reject before an exact isomorphism search.
//!
//! All hashing uses SHA-256 with domain separation and length prefixing, so
//! fingerprints are identical across fresh builds and platforms.
//!
//! # Citations
//! - Weisfeiler–Lehman graph isomorphism test: Weisfeiler & Lehman, "A reduction of a graph to a canonical form" (1968)
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use crate::core::{ContextId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::subgraph::Subgraph;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Number of refinement rounds for selection shapes.
const SHAPE_ROUNDS: usize = 2;

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// The hashed message is `b"PEIRCE:<domain>:v1" || len(data) as u64 LE || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"PEIRCE:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 4 bytes are enough to tell values apart in logs.
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Rename-invariant fingerprint of a selection.
///
/// Equal shapes are necessary, not sufficient, for two selections to be
/// structurally identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeFingerprint(HashValue);

impl ShapeFingerprint {
    /// Returns the underlying hash value.
    #[inline]
    pub const fn hash(&self) -> HashValue {
        self.0
    }
}

/// Length-prefixed byte encoder feeding [`HashValue::hash_with_domain`].
#[derive(Default)]
struct Encoder(Vec<u8>);

impl Encoder {
    fn u64(&mut self, value: u64) -> &mut Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.u64(data.len() as u64);
        self.0.extend_from_slice(data);
        self
    }

    fn label(&mut self, label: Option<&str>) -> &mut Self {
        match label {
            None => self.u64(0),
            Some(text) => self.u64(1).bytes(text.as_bytes()),
        }
    }

    fn hash(&mut self, value: &HashValue) -> &mut Self {
        self.0.extend_from_slice(value.as_bytes());
        self
    }

    fn finish(&self, domain: &[u8]) -> HashValue {
        HashValue::hash_with_domain(domain, &self.0)
    }
}

fn context_code(ctx: ContextId) -> u64 {
    match ctx {
        ContextId::Sheet => 0,
        ContextId::Cut(c) => c.as_u64() + 1,
    }
}

fn element_code(element: ElementId) -> (u64, u64) {
    match element {
        ElementId::Vertex(v) => (0, v.as_u64()),
        ElementId::Edge(e) => (1, e.as_u64()),
        ElementId::Cut(c) => (2, c.as_u64()),
    }
}

/// Fingerprint of one concrete graph value.
///
/// Covers every vertex, edge, cut and area membership with its id; ignores the
/// fresh-id counter and empty area entries, matching graph equality.
pub fn graph_fingerprint(graph: &RelationalGraphWithCuts) -> HashValue {
    let mut enc = Encoder::default();
    enc.u64(graph.vertex_count() as u64);
    for vertex in graph.vertices() {
        enc.u64(vertex.id.as_u64()).label(vertex.label()).u64(vertex.generic as u64);
    }
    enc.u64(graph.edge_count() as u64);
    for edge in graph.edges() {
        enc.u64(edge.as_u64()).bytes(graph.relation(edge).unwrap_or_default().as_bytes());
        let args = graph.arguments(edge).unwrap_or_default();
        enc.u64(args.len() as u64);
        for v in args {
            enc.u64(v.as_u64());
        }
    }
    enc.u64(graph.cut_count() as u64);
    for cut in graph.cuts() {
        enc.u64(cut.as_u64());
    }
    for (ctx, members) in graph.area_entries().filter(|(_, m)| !m.is_empty()) {
        enc.u64(context_code(ctx)).u64(members.len() as u64);
        for &member in members {
            let (kind, raw) = element_code(member);
            enc.u64(kind).u64(raw);
        }
    }
    enc.finish(b"GRAPH")
}

/// Rename-invariant shape of a selection.
///
/// Vertices (selected and boundary alike) start coloured by label only, edges by
/// relation, arity and nesting depth below the home, cuts by depth and member
/// counts. Vertex colours are then refined by their incident edge colours and
/// argument positions.
pub fn selection_shape(graph: &RelationalGraphWithCuts, selection: &Subgraph) -> ShapeFingerprint {
    // Depth of every selected context relative to the home.
    let mut depth: BTreeMap<ContextId, u64> = BTreeMap::from([(selection.home(), 0)]);
    let mut queue = VecDeque::from([selection.home()]);
    let mut edge_depth = BTreeMap::new();
    let mut cut_colors = Vec::new();
    while let Some(ctx) = queue.pop_front() {
        let d = depth.get(&ctx).copied().unwrap_or_default();
        let members: Vec<ElementId> = if ctx == selection.home() {
            selection.top_level().iter().copied().collect()
        } else {
            graph.area(ctx).iter().copied().collect()
        };
        for member in members {
            match member {
                ElementId::Edge(e) => {
                    edge_depth.insert(e, d);
                }
                ElementId::Cut(c) => {
                    let inner = ContextId::Cut(c);
                    if depth.insert(inner, d + 1).is_none() {
                        queue.push_back(inner);
                    }
                    let area = graph.area(inner);
                    let count = |kind: u64| area.iter().filter(|m| element_code(**m).0 == kind).count() as u64;
                    cut_colors.push(
                        Encoder::default().u64(d + 1).u64(count(0)).u64(count(1)).u64(count(2)).finish(b"SHAPE_CUT"),
                    );
                }
                ElementId::Vertex(_) => {}
            }
        }
    }

    let vertices: BTreeSet<VertexId> = selection.vertices().union(selection.boundary()).copied().collect();
    let mut colors: BTreeMap<VertexId, HashValue> = vertices
        .iter()
        .map(|&v| {
            let label = graph.vertex(v).and_then(|x| x.label());
            (v, Encoder::default().label(label).finish(b"SHAPE_VERTEX"))
        })
        .collect();

    let edge_colors = |colors: &BTreeMap<VertexId, HashValue>| -> Vec<(EdgeId, HashValue)> {
        edge_depth
            .iter()
            .map(|(&e, &d)| {
                let args = graph.arguments(e).unwrap_or_default();
                let mut enc = Encoder::default();
                enc.bytes(graph.relation(e).unwrap_or_default().as_bytes()).u64(args.len() as u64).u64(d);
                for v in args {
                    enc.hash(colors.get(v).unwrap_or(&HashValue::zero()));
                }
                (e, enc.finish(b"SHAPE_EDGE"))
            })
            .collect()
    };

    for _ in 0..SHAPE_ROUNDS {
        let mut incidences: BTreeMap<VertexId, Vec<(HashValue, u64)>> = BTreeMap::new();
        for (e, color) in edge_colors(&colors) {
            for (pos, v) in graph.arguments(e).unwrap_or_default().iter().enumerate() {
                incidences.entry(*v).or_default().push((color, pos as u64));
            }
        }
        colors = colors
            .iter()
            .map(|(&v, old)| {
                let mut seen = incidences.remove(&v).unwrap_or_default();
                seen.sort();
                let mut enc = Encoder::default();
                enc.hash(old).u64(seen.len() as u64);
                for (color, pos) in &seen {
                    enc.hash(color).u64(*pos);
                }
                (v, enc.finish(b"SHAPE_VERTEX_ROUND"))
            })
            .collect();
    }

    let mut edge_multiset: Vec<HashValue> = edge_colors(&colors).into_iter().map(|(_, c)| c).collect();
    let mut vertex_multiset: Vec<HashValue> = colors.into_values().collect();
    vertex_multiset.sort();
    edge_multiset.sort();
    cut_colors.sort();

    let mut enc = Encoder::default();
    for group in [&vertex_multiset, &edge_multiset, &cut_colors] {
        enc.u64(group.len() as u64);
        for color in group.iter() {
            enc.hash(color);
        }
    }
    ShapeFingerprint(enc.finish(b"SHAPE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::GraphBuilder;
    use crate::subgraph::identify_subgraph;

    #[test]
    fn hash_depends_on_domain() {
        let a = HashValue::hash_with_domain(b"A", b"data");
        let b = HashValue::hash_with_domain(b"B", b"data");
        assert_ne!(a, b);
        assert_eq!(a, HashValue::hash_with_domain(b"A", b"data"));
    }

    #[test]
    fn graph_fingerprint_tracks_equality() {
        let mut first = GraphBuilder::new();
        let x = first.variable(ContextId::Sheet).unwrap();
        first.edge(ContextId::Sheet, "P", &[x]).unwrap();
        let mut second = first.clone();
        assert_eq!(graph_fingerprint(first.graph()), graph_fingerprint(second.graph()));
        second.cut(ContextId::Sheet).unwrap();
        assert_ne!(graph_fingerprint(first.graph()), graph_fingerprint(second.graph()));
    }

    /// Test that two copies of `¬[P(x)]` sharing `x` have one shape, and a copy
    /// with a different relation does not.
    #[test]
    fn shape_ignores_ids_but_not_structure() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let c1 = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(c1.into(), "P", &[x]).unwrap();
        let c2 = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(c2.into(), "P", &[x]).unwrap();
        let c3 = builder.cut(ContextId::Sheet).unwrap();
        builder.edge(c3.into(), "Q", &[x]).unwrap();
        let graph = builder.build();

        let shape = |cut| selection_shape(&graph, &identify_subgraph(&graph, [ElementId::Cut(cut)]).unwrap());
        assert_eq!(shape(c1), shape(c2));
        assert_ne!(shape(c1), shape(c3));
    }
}
