//! Error taxonomy for the rewriting engine.
//!
//! Four kinds of failure exist:
//! - structural invariant violations (a malformed graph value; a bug upstream),
//! - precondition failures (a rule does not apply here; expected and recoverable),
//! - selection errors (a malformed, ambiguous or stale selection),
//! - unknown contexts or elements (a stale or foreign id).
//!
//! Expected failures are values, never panics.

use crate::context::Polarity;
use crate::core::{ContextId, CutId, EdgeId, ElementId, VertexId};
use crate::transform::Rule;
use std::fmt::Display;
use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The graph value breaks one of the structural invariants.
    StructuralInvariantViolation,
    /// A rule's precondition does not hold.
    PreconditionFailure,
    /// The selection or probe cannot be used.
    SelectionError,
    /// A context id does not name a context of the graph.
    UnknownContext,
    /// An element id does not name an element of the graph.
    UnknownElement,
}

/// Top-level error for every fallible engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Structural invariant violation.
    #[error("graph integrity error: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Rule precondition failure.
    #[error("{0}")]
    Precondition(#[from] PreconditionFailure),

    /// Selection or probe failure.
    #[error("invalid selection: {0}")]
    Selection(#[from] SelectionError),

    /// Unknown context id.
    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    /// Unknown element id.
    #[error("unknown element {0}")]
    UnknownElement(ElementId),
}

impl EngineError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Invariant(_) => ErrorKind::StructuralInvariantViolation,
            EngineError::Precondition(_) => ErrorKind::PreconditionFailure,
            EngineError::Selection(_) => ErrorKind::SelectionError,
            EngineError::UnknownContext(_) => ErrorKind::UnknownContext,
            EngineError::UnknownElement(_) => ErrorKind::UnknownElement,
        }
    }

    /// Returns `true` when the caller can recover by choosing differently.
    ///
    /// Only invariant violations are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::StructuralInvariantViolation
    }

    /// Returns a suggested fix, where one exists.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            EngineError::Precondition(failure) => failure.suggestion(),
            EngineError::Selection(SelectionError::AmbiguousMatch { .. }) => {
                Some("add more structure to the probe, or select elements by id".to_string())
            }
            EngineError::UnknownContext(_) | EngineError::UnknownElement(_) => {
                Some("refresh the view of the graph and select again".to_string())
            }
            _ => None,
        }
    }
}

/// Violation of one of the structural invariants of a graph value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum InvariantViolation {
    /// Element is not a member of any area.
    #[error("{0} is not a member of any context")]
    OrphanElement(ElementId),

    /// Element is a member of more than one area.
    #[error("{element} is a member of several contexts: {}", join(.contexts))]
    DuplicateMembership {
        /// The element.
        element: ElementId,
        /// Every context listing it.
        contexts: Vec<ContextId>,
    },

    /// An area lists an element that does not exist.
    #[error("context {context} lists missing element {element}")]
    UnknownMember {
        /// The area.
        context: ContextId,
        /// The missing element.
        element: ElementId,
    },

    /// An area entry is keyed by a cut that does not exist.
    #[error("area entry for missing cut {0}")]
    UnknownAreaKey(CutId),

    /// Cut containment has a cycle through this cut.
    #[error("cut {cut} contains itself transitively")]
    CutCycle {
        /// A cut on the cycle.
        cut: CutId,
    },

    /// Cut's chain of enclosing contexts does not reach the sheet.
    #[error("cut {cut} is not rooted on the sheet")]
    UnrootedCut {
        /// The cut.
        cut: CutId,
    },

    /// Edge argument names a missing vertex.
    #[error("edge {edge} refers to missing vertex {vertex}")]
    DanglingArgument {
        /// The edge.
        edge: EdgeId,
        /// The missing vertex.
        vertex: VertexId,
    },

    /// Edge argument is not visible from the edge's context.
    #[error("vertex {vertex} is not in scope of edge {edge}")]
    ArgumentOutOfScope {
        /// The edge.
        edge: EdgeId,
        /// The argument vertex.
        vertex: VertexId,
    },

    /// Edge without a relation name.
    #[error("edge {0} has no relation name")]
    MissingRelation(EdgeId),

    /// Edge without an argument tuple.
    #[error("edge {0} has no argument tuple")]
    MissingArguments(EdgeId),

    /// Relation name for an id that is not an edge.
    #[error("relation name recorded for non-edge {0}")]
    StrayRelation(EdgeId),

    /// Argument tuple for an id that is not an edge.
    #[error("argument tuple recorded for non-edge {0}")]
    StrayArguments(EdgeId),
}

/// A rule's precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    /// The context has the wrong polarity for the rule.
    #[error("cannot apply {rule} in {found} context {context}: it requires a {required} context")]
    WrongPolarity {
        /// The rule.
        rule: Rule,
        /// The offending context.
        context: ContextId,
        /// Polarity the rule needs.
        required: Polarity,
        /// Polarity found.
        found: Polarity,
    },

    /// A selected vertex is used by edges outside the selection.
    #[error("vertex {vertex} is still used by edges outside the selection: {}", join(.edges))]
    SelectedVertexInUse {
        /// The vertex.
        vertex: VertexId,
        /// The edges outside the selection using it.
        edges: Vec<EdgeId>,
    },

    /// Iteration target is not the source context or nested inside it.
    #[error("iteration target {target} is not {home} or nested inside it")]
    TargetNotNested {
        /// Home context of the selection.
        home: ContextId,
        /// Requested target.
        target: ContextId,
    },

    /// Iteration target lies inside the selection being copied.
    #[error("iteration target {target} lies inside the selection")]
    TargetInsideSelection {
        /// Requested target.
        target: ContextId,
    },

    /// The duplicate and the original share elements.
    #[error("the duplicate and the original overlap")]
    OverlappingSelections,

    /// The duplicate is not in the original's context or nested inside it.
    #[error("duplicate in {duplicate} is not {original} or nested inside it")]
    DuplicateNotNested {
        /// Home context of the original.
        original: ContextId,
        /// Home context of the duplicate.
        duplicate: ContextId,
    },

    /// The duplicate is not an exact copy of the original.
    #[error("selections are not structurally identical: {reason}")]
    NotStructurallyIdentical {
        /// Why the check failed.
        reason: String,
    },

    /// The cut does not enclose exactly one element.
    #[error("cut {cut} must contain exactly one element, a cut; it contains {element_count}")]
    NotADoubleCut {
        /// The outer cut.
        cut: CutId,
        /// Number of direct members.
        element_count: usize,
    },

    /// The cut's only member is not a cut.
    #[error("cut {cut} contains {child}, which is not a cut")]
    ChildNotACut {
        /// The outer cut.
        cut: CutId,
        /// The single member.
        child: ElementId,
    },

    /// The inner cut of a double cut is not empty.
    #[error("inner cut {inner} of {outer} is not empty ({element_count} elements)")]
    InnerCutNotEmpty {
        /// The outer cut.
        outer: CutId,
        /// The inner cut.
        inner: CutId,
        /// Number of direct members of the inner cut.
        element_count: usize,
    },

    /// Vertex still has incident edges.
    #[error("vertex {vertex} is not isolated; incident edges: {}", join(.edges))]
    VertexHasIncidentEdges {
        /// The vertex.
        vertex: VertexId,
        /// Edges whose arguments contain it.
        edges: Vec<EdgeId>,
    },

    /// A boundary vertex of the inserted fragment is not bound.
    #[error("fragment boundary vertex {vertex} is not bound to a graph vertex")]
    UnboundFragmentVertex {
        /// Fragment vertex.
        vertex: VertexId,
    },

    /// A bound graph vertex is not visible from the insertion target.
    #[error("vertex {vertex} is not visible from {target}")]
    BindingOutOfScope {
        /// Graph vertex.
        vertex: VertexId,
        /// Insertion target.
        target: ContextId,
    },

    /// The enclosed selection does not lie in the target context.
    #[error("selection lies in {home}, not in target {target}")]
    SelectionOutsideTarget {
        /// Home of the selection.
        home: ContextId,
        /// Requested target.
        target: ContextId,
    },
}

impl PreconditionFailure {
    /// Returns an actionable fix, where one exists.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            PreconditionFailure::WrongPolarity { required, .. } => Some(match required {
                Polarity::Positive => {
                    "choose a context enclosed by an even number of cuts".to_string()
                }
                Polarity::Negative => {
                    "choose a context enclosed by an odd number of cuts".to_string()
                }
            }),
            PreconditionFailure::SelectedVertexInUse { edges, .. } => Some(format!(
                "add {} to the selection",
                join(edges)
            )),
            PreconditionFailure::TargetNotNested { home, .. } => {
                Some(format!("iterate into {} or a cut nested inside it", home))
            }
            PreconditionFailure::InnerCutNotEmpty { inner, .. } => {
                Some(format!("erase or deiterate the contents of {} first", inner))
            }
            PreconditionFailure::VertexHasIncidentEdges { edges, .. } => {
                Some(format!("remove {} first", join(edges)))
            }
            PreconditionFailure::UnboundFragmentVertex { vertex } => {
                Some(format!("bind {} to a vertex visible from the target", vertex))
            }
            _ => None,
        }
    }
}

/// The selection or probe cannot be turned into a subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Nothing was selected.
    #[error("the selection is empty")]
    EmptySelection,

    /// The probe or fragment is not a well-formed graph fragment.
    #[error("malformed probe: {reason}")]
    MalformedProbe {
        /// What is wrong with it.
        reason: String,
    },

    /// The probe matches more than one place.
    #[error("probe matches {count} places")]
    AmbiguousMatch {
        /// Number of distinct matches found (bounded by the configured limit).
        count: usize,
    },

    /// The probe matches nowhere.
    #[error("probe does not match the graph")]
    NoStructuralMatch,

    /// A cut is selected without its whole contents.
    #[error("cut {cut} is selected without {}", join(.missing))]
    PartialCutSelection {
        /// The cut.
        cut: CutId,
        /// Members of its closure missing from the selection.
        missing: Vec<ElementId>,
    },

    /// Top-level elements lie in different contexts.
    #[error("selection spans several contexts: {}", join(.contexts))]
    MultipleContexts {
        /// The distinct contexts.
        contexts: Vec<ContextId>,
    },

    /// The selection no longer matches the graph it is applied to.
    #[error("selection is stale: {element} changed since it was selected")]
    StaleSelection {
        /// First element found to differ.
        element: ElementId,
    },

    /// A rule parameter is missing.
    #[error("{rule} needs a {parameter}")]
    MissingParameter {
        /// The rule.
        rule: Rule,
        /// Name of the missing parameter.
        parameter: &'static str,
    },
}

pub(crate) fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_variants() {
        let err = EngineError::from(InvariantViolation::OrphanElement(ElementId::Cut(CutId::new(1))));
        assert_eq!(err.kind(), ErrorKind::StructuralInvariantViolation);
        assert!(!err.is_recoverable());

        let err = EngineError::from(SelectionError::NoStructuralMatch);
        assert_eq!(err.kind(), ErrorKind::SelectionError);
        assert!(err.is_recoverable());
    }

    #[test]
    fn polarity_failure_reads_as_actionable_message() {
        let failure = PreconditionFailure::WrongPolarity {
            rule: Rule::Erasure,
            context: ContextId::Cut(CutId::new(2)),
            required: Polarity::Positive,
            found: Polarity::Negative,
        };
        assert_eq!(
            failure.to_string(),
            "cannot apply erasure in negative context c2: it requires a positive context"
        );
        assert!(failure.suggestion().is_some());
    }

    #[test]
    fn incident_edges_are_listed() {
        let failure = PreconditionFailure::VertexHasIncidentEdges {
            vertex: VertexId::new(0),
            edges: vec![EdgeId::new(1), EdgeId::new(4)],
        };
        assert_eq!(failure.to_string(), "vertex v0 is not isolated; incident edges: e1, e4");
        assert_eq!(failure.suggestion().as_deref(), Some("remove e1, e4 first"));
    }
}
