//! Peirce: a rule-governed rewriting engine for existential graphs.
//!
//! This crate implements the beta system of Peirce's existential graphs in the
//! formalisation of relational graphs with cuts, providing:
//! - an immutable graph value with vertices (lines of identity), edges (relation
//!   occurrences) and cuts (negation contexts), checked against structural invariants;
//! - context and polarity queries (depth, enclosing cuts, scope of a vertex);
//! - the eight transformation rules, each with a precondition check and a rewrite
//!   that returns a new value and never mutates its input;
//! - selections of subgraphs, by id or by structural probe, and exact structural
//!   identity for deiteration;
//! - a background validator that diagnoses malformed values and lists the rules
//!   applicable to a selection;
//! - proof traces with fingerprint-checked replay and rollback.
//!
//! # Mathematical Foundations
//!
//! A relational graph with cuts is a tuple (V, E, ν, ⊤, Cut, area, κ) where the
//! sheet ⊤ and the cuts form a tree under `area`, and every edge's arguments are
//! visible from the edge's context. A context at even depth is positive, at odd
//! depth negative. Erasure is sound in positive contexts, insertion in negative
//! ones; iteration, deiteration, double cuts and isolated vertices are sound
//! everywhere they apply.
//!
//! # References
//!
//! - Peirce, C. S. "Prolegomena to an Apology for Pragmaticism" (1906)
//! - Roberts, D. "The Existential Graphs of Charles S. Peirce" (1973)
//! - Dau, F. "Mathematical Logic with Diagrams" (2003) – relational graphs with cuts
//! - Shin, S.-J. "The Iconic Logic of Peirce's Graphs" (2002)
//!
//! # Example
//!
//! ```
//! use peirce::prelude::*;
//!
//! // ¬[ ¬[ P(x) ] ]  ⟶  P(x)
//! let mut builder = GraphBuilder::new();
//! let outer = builder.cut(ContextId::Sheet).unwrap();
//! let inner = builder.cut(outer.into()).unwrap();
//! let x = builder.variable(ContextId::Sheet).unwrap();
//! builder.edge(inner.into(), "P", &[x]).unwrap();
//! let graph = builder.build();
//!
//! let engine = TransformationEngine::new(EngineConfig::default().with_double_cut_lifting(true));
//! let params = RuleParams::new().with_cut(outer);
//! let outcome = engine.apply(&graph, Rule::DoubleCutRemoval, None, &params).unwrap();
//! assert_eq!(outcome.graph.cut_count(), 0);
//! assert!(validate_graph_structure(&outcome.graph).is_valid);
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod fingerprint;
pub mod invariants;
pub mod isomorphism;
pub mod operations;
pub mod pattern;
pub mod subgraph;
pub mod traceability;
pub mod transform;
pub mod validator;

pub use crate::config::EngineConfig;
pub use crate::core::{ContextId, CutId, EdgeId, ElementId, GraphParts, RelationalGraphWithCuts, Vertex, VertexId};
pub use crate::error::{EngineError, ErrorKind, InvariantViolation, PreconditionFailure, Result, SelectionError};
pub use crate::transform::{apply_transformation, validate_transformation, Rule, RuleParams, TransformationEngine};
pub use crate::validator::{get_available_transformations, validate_graph_structure};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::{
        context_of, depth, encloses, get_full_context, get_incident_vertices, incident_edges, polarity,
        vertex_in_scope, Polarity,
    };
    pub use crate::core::{ContextId, CutId, EdgeId, ElementId, GraphParts, RelationalGraphWithCuts, Vertex, VertexId};
    pub use crate::error::{EngineError, ErrorKind, InvariantViolation, PreconditionFailure, Result, SelectionError};
    pub use crate::fingerprint::{graph_fingerprint, selection_shape, HashValue, ShapeFingerprint};
    pub use crate::invariants::{check_invariants, ensure_well_formed, Invariant};
    pub use crate::isomorphism::{find_isomorphism, structurally_identical, Isomorphism};
    pub use crate::operations::{create_empty, is_well_formed, with_cut, with_edge, with_vertex, GraphBuilder};
    pub use crate::pattern::{find_matches, match_in, Fragment, FragmentMatch};
    pub use crate::subgraph::{identify_by_probe, identify_subgraph, identify_subgraph_exact, Subgraph};
    pub use crate::traceability::{ProofStep, ProofTrace, TraceError};
    pub use crate::transform::{
        apply_transformation, validate_transformation, Rule, RuleParams, TransformationEngine,
        TransformationOutcome,
    };
    pub use crate::validator::{
        get_available_transformations, validate_graph_structure, ApplicableTransformation, BackgroundValidator,
        StructuralWarning, ValidationReport,
    };
}
