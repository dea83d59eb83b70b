//! Insertion: any well-formed fragment may be grafted into a negative context.
//!
//! The fragment's boundary vertices are bound to host vertices visible from the
//! target; everything else is copied with fresh ids.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "insertion" (2003)

use super::{Step, TransformationOutcome};
use crate::context::{vertex_in_scope, Polarity};
use crate::core::ElementId;
use crate::error::{EngineError, PreconditionFailure, Result};
use crate::pattern::graft;

pub(crate) fn validate(step: &Step<'_>) -> Result<()> {
    let target = step.target()?;
    step.ensure_context(target)?;
    step.require_polarity(target, Polarity::Negative)?;
    let fragment = step.fragment()?;
    fragment.check()?;
    for &vertex in fragment.boundary() {
        let host = step
            .params
            .bindings
            .get(&vertex)
            .copied()
            .ok_or(PreconditionFailure::UnboundFragmentVertex { vertex })?;
        if !step.graph.contains_vertex(host) {
            return Err(EngineError::UnknownElement(ElementId::Vertex(host)));
        }
        if !vertex_in_scope(step.graph, host, target)? {
            return Err(PreconditionFailure::BindingOutOfScope { vertex: host, target }.into());
        }
    }
    Ok(())
}

pub(crate) fn apply(step: &Step<'_>) -> Result<TransformationOutcome> {
    let (graph, introduced) = graft(step.graph, step.fragment()?, step.target()?, &step.params.bindings)?;
    Ok(TransformationOutcome::new(graph, introduced, Vec::new()))
}

#[cfg(test)]
mod tests {
    use crate::context::Polarity;
    use crate::core::ContextId;
    use crate::error::{EngineError, PreconditionFailure};
    use crate::operations::GraphBuilder;
    use crate::pattern::Fragment;
    use crate::transform::{apply_transformation, validate_transformation, Rule, RuleParams};

    fn payload() -> (Fragment, crate::core::VertexId) {
        let mut fragment = Fragment::new();
        let b = fragment.boundary_vertex(None, true).unwrap();
        fragment.edge(ContextId::Sheet, "Mortal", &[b]).unwrap();
        (fragment, b)
    }

    #[test]
    fn insertion_into_negative_context_binds_boundary() {
        let mut builder = GraphBuilder::new();
        let socrates = builder.constant(ContextId::Sheet, "socrates").unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let graph = builder.build();
        let (fragment, b) = payload();

        let params = RuleParams::new().with_target(cut).with_fragment(fragment).with_binding(b, socrates);
        let outcome = apply_transformation(&graph, Rule::Insertion, None, &params).unwrap();
        assert_eq!(outcome.introduced.len(), 1);
        let edge = outcome.graph.edges().next().unwrap();
        assert_eq!(outcome.graph.arguments(edge), Some(&[socrates][..]));
        assert!(outcome.graph.area(cut.into()).contains(&crate::core::ElementId::Edge(edge)));
    }

    #[test]
    fn insertion_on_the_sheet_is_rejected() {
        let graph = GraphBuilder::new().build();
        let mut fragment = Fragment::new();
        fragment.vertex(ContextId::Sheet, None, true).unwrap();
        let params = RuleParams::new().with_target(ContextId::Sheet).with_fragment(fragment);
        let err = validate_transformation(&graph, Rule::Insertion, None, &params).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Precondition(PreconditionFailure::WrongPolarity { required: Polarity::Negative, .. })
        ));
    }

    #[test]
    fn unbound_boundary_vertex_is_rejected() {
        let mut builder = GraphBuilder::new();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let graph = builder.build();
        let (fragment, b) = payload();
        let params = RuleParams::new().with_target(cut).with_fragment(fragment);
        let err = validate_transformation(&graph, Rule::Insertion, None, &params).unwrap_err();
        assert_eq!(err, EngineError::Precondition(PreconditionFailure::UnboundFragmentVertex { vertex: b }));
    }

    /// Test that a binding to a vertex hidden inside a sibling cut is rejected.
    #[test]
    fn binding_must_be_visible_from_target() {
        let mut builder = GraphBuilder::new();
        let left = builder.cut(ContextId::Sheet).unwrap();
        let hidden = builder.variable(left.into()).unwrap();
        let right = builder.cut(ContextId::Sheet).unwrap();
        let graph = builder.build();
        let (fragment, b) = payload();
        let params = RuleParams::new().with_target(right).with_fragment(fragment).with_binding(b, hidden);
        let err = validate_transformation(&graph, Rule::Insertion, None, &params).unwrap_err();
        assert_eq!(
            err,
            EngineError::Precondition(PreconditionFailure::BindingOutOfScope {
                vertex: hidden,
                target: right.into(),
            })
        );
    }
}
