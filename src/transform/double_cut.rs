//! Double cut insertion and removal.
//!
//! Two nested cuts with nothing between them are equivalent to no cuts at all.
//! Both directions are permitted in any context.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "double cuts" (2003)
//! - Peirce, Collected Papers 4.379 (1903)

use super::{ensure_vertices_unused_outside, Step, TransformationOutcome};
use crate::context::parent_of;
use crate::core::{ContextId, CutId, ElementId};
use crate::error::{PreconditionFailure, Result};

pub(crate) fn validate_insertion(step: &Step<'_>) -> Result<()> {
    let target = step.target_or_home()?;
    step.ensure_context(target)?;
    if let Some(selection) = step.selection {
        if selection.home() != target {
            return Err(PreconditionFailure::SelectionOutsideTarget { home: selection.home(), target }.into());
        }
        ensure_vertices_unused_outside(step.graph, selection)?;
    }
    Ok(())
}

pub(crate) fn apply_insertion(step: &Step<'_>) -> Result<TransformationOutcome> {
    let target = step.target_or_home()?;
    let mut next = step.graph.clone();
    let outer = CutId::new(next.fresh_raw());
    next.insert_cut_raw(outer, target);
    let inner = CutId::new(next.fresh_raw());
    next.insert_cut_raw(inner, outer.into());
    if let Some(selection) = step.selection {
        for &element in selection.top_level() {
            next.move_element_raw(element, target, inner.into());
        }
    }
    Ok(TransformationOutcome::new(next, [ElementId::Cut(outer), ElementId::Cut(inner)], Vec::new()))
}

/// The outer cut: an explicit parameter, or a selection whose only top-level
/// element is a cut.
fn outer_cut(step: &Step<'_>) -> Result<CutId> {
    if let Some(cut) = step.params.cut {
        return Ok(cut);
    }
    let selected = step.selection.and_then(|s| match s.top_level().iter().collect::<Vec<_>>().as_slice() {
        [ElementId::Cut(cut)] => Some(*cut),
        _ => None,
    });
    selected.ok_or_else(|| step.missing("cut"))
}

/// Returns the outer cut and its only member, checked to be a cut.
fn double_cut(step: &Step<'_>) -> Result<(CutId, CutId)> {
    let outer = outer_cut(step)?;
    step.ensure_context(outer.into())?;
    let members = step.graph.area(outer.into());
    let mut iter = members.iter();
    match (iter.next(), iter.next()) {
        (Some(&ElementId::Cut(inner)), None) => Ok((outer, inner)),
        (Some(&child), None) => Err(PreconditionFailure::ChildNotACut { cut: outer, child }.into()),
        _ => Err(PreconditionFailure::NotADoubleCut { cut: outer, element_count: members.len() }.into()),
    }
}

pub(crate) fn validate_removal(step: &Step<'_>) -> Result<()> {
    let (outer, inner) = double_cut(step)?;
    let inner_members = step.graph.area(inner.into()).len();
    if inner_members > 0 && !step.config.double_cut_lifts_contents {
        return Err(PreconditionFailure::InnerCutNotEmpty { outer, inner, element_count: inner_members }.into());
    }
    parent_of(step.graph, outer)?;
    Ok(())
}

pub(crate) fn apply_removal(step: &Step<'_>) -> Result<TransformationOutcome> {
    let (outer, inner) = double_cut(step)?;
    let parent: ContextId = parent_of(step.graph, outer)?;
    let mut next = step.graph.clone();
    let lifted: Vec<ElementId> = step.graph.area(inner.into()).iter().copied().collect();
    for element in lifted {
        next.move_element_raw(element, inner.into(), parent);
    }
    next.remove_element_raw(ElementId::Cut(inner));
    next.remove_element_raw(ElementId::Cut(outer));
    Ok(TransformationOutcome::new(next, Vec::new(), [ElementId::Cut(outer), ElementId::Cut(inner)]))
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::core::{ContextId, ElementId};
    use crate::error::{EngineError, PreconditionFailure};
    use crate::invariants::is_well_formed;
    use crate::operations::GraphBuilder;
    use crate::subgraph::identify_subgraph;
    use crate::transform::{
        apply_transformation, validate_transformation, Rule, RuleParams, TransformationEngine,
    };

    /// Test that wrapping a selection in a double cut and removing it again
    /// restores an equal graph.
    #[test]
    fn insertion_then_removal_round_trips() {
        let mut builder = GraphBuilder::new();
        let x = builder.variable(ContextId::Sheet).unwrap();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let y = builder.variable(cut.into()).unwrap();
        builder.edge(cut.into(), "R", &[x, y]).unwrap();
        let graph = builder.build();

        let selection = identify_subgraph(&graph, [ElementId::Cut(cut)]).unwrap();
        let engine = TransformationEngine::new(EngineConfig::default().with_double_cut_lifting(true));
        let wrapped = engine
            .apply(&graph, Rule::DoubleCutInsertion, Some(&selection), &RuleParams::new())
            .unwrap();
        assert!(is_well_formed(&wrapped.graph));
        assert_eq!(wrapped.graph.cut_count(), 3);

        let outer = wrapped.introduced.iter().find_map(|e| {
            let c = e.as_cut()?;
            wrapped.graph.area(ContextId::Sheet).contains(&ElementId::Cut(c)).then_some(c)
        });
        let params = RuleParams::new().with_cut(outer.unwrap());
        let restored = engine.apply(&wrapped.graph, Rule::DoubleCutRemoval, None, &params).unwrap();
        assert_eq!(restored.graph, graph);
    }

    #[test]
    fn empty_double_cut_is_removed_anywhere() {
        let mut builder = GraphBuilder::new();
        let host = builder.cut(ContextId::Sheet).unwrap();
        let outer = builder.cut(host.into()).unwrap();
        builder.cut(outer.into()).unwrap();
        let graph = builder.build();

        let outcome =
            apply_transformation(&graph, Rule::DoubleCutRemoval, None, &RuleParams::new().with_cut(outer)).unwrap();
        assert_eq!(outcome.graph.cut_count(), 1);
        assert!(outcome.graph.area(host.into()).is_empty());
    }

    #[test]
    fn non_empty_inner_cut_is_rejected_by_default() {
        let mut builder = GraphBuilder::new();
        let outer = builder.cut(ContextId::Sheet).unwrap();
        let inner = builder.cut(outer.into()).unwrap();
        builder.variable(inner.into()).unwrap();
        let graph = builder.build();

        let err = validate_transformation(&graph, Rule::DoubleCutRemoval, None, &RuleParams::new().with_cut(outer))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Precondition(PreconditionFailure::InnerCutNotEmpty { outer, inner, element_count: 1 })
        );
    }

    #[test]
    fn outer_cut_with_two_members_is_not_a_double_cut() {
        let mut builder = GraphBuilder::new();
        let outer = builder.cut(ContextId::Sheet).unwrap();
        builder.cut(outer.into()).unwrap();
        builder.variable(outer.into()).unwrap();
        let graph = builder.build();

        let err = validate_transformation(&graph, Rule::DoubleCutRemoval, None, &RuleParams::new().with_cut(outer))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Precondition(PreconditionFailure::NotADoubleCut { cut: outer, element_count: 2 })
        );
    }

    #[test]
    fn selected_outer_cut_stands_in_for_parameter() {
        let mut builder = GraphBuilder::new();
        let outer = builder.cut(ContextId::Sheet).unwrap();
        builder.cut(outer.into()).unwrap();
        let graph = builder.build();
        let selection = identify_subgraph(&graph, [ElementId::Cut(outer)]).unwrap();
        let outcome =
            apply_transformation(&graph, Rule::DoubleCutRemoval, Some(&selection), &RuleParams::new()).unwrap();
        assert!(outcome.graph.is_empty());
    }
}
