//! Isolated vertex addition and removal.
//!
//! A vertex with no incident edges asserts only that something exists, which
//! is true in every context.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "isolated vertex" (2003)

use super::{Step, TransformationOutcome};
use crate::context::incident_edges;
use crate::core::{ElementId, Vertex, VertexId};
use crate::error::{EngineError, PreconditionFailure, Result};

pub(crate) fn validate_addition(step: &Step<'_>) -> Result<()> {
    step.ensure_context(step.target_or_home()?)
}

pub(crate) fn apply_addition(step: &Step<'_>) -> Result<TransformationOutcome> {
    let target = step.target_or_home()?;
    let label = step.params.label.clone();
    let generic = step.params.generic.unwrap_or(label.is_none());
    let mut next = step.graph.clone();
    let id = VertexId::new(next.fresh_raw());
    next.insert_vertex_raw(Vertex::new(id, label, generic), target);
    Ok(TransformationOutcome::new(next, [ElementId::Vertex(id)], Vec::new()))
}

/// The vertex: an explicit parameter, or a selection of exactly one vertex.
fn chosen_vertex(step: &Step<'_>) -> Result<VertexId> {
    if let Some(vertex) = step.params.vertex {
        return Ok(vertex);
    }
    let selected = step.selection.and_then(|s| match s.top_level().iter().collect::<Vec<_>>().as_slice() {
        [ElementId::Vertex(v)] => Some(*v),
        _ => None,
    });
    selected.ok_or_else(|| step.missing("vertex"))
}

pub(crate) fn validate_removal(step: &Step<'_>) -> Result<()> {
    let vertex = chosen_vertex(step)?;
    if !step.graph.contains_vertex(vertex) {
        return Err(EngineError::UnknownElement(ElementId::Vertex(vertex)));
    }
    let edges = incident_edges(step.graph, vertex);
    if !edges.is_empty() {
        return Err(PreconditionFailure::VertexHasIncidentEdges { vertex, edges }.into());
    }
    Ok(())
}

pub(crate) fn apply_removal(step: &Step<'_>) -> Result<TransformationOutcome> {
    let vertex = chosen_vertex(step)?;
    let mut next = step.graph.clone();
    next.remove_element_raw(ElementId::Vertex(vertex));
    Ok(TransformationOutcome::new(next, Vec::new(), [ElementId::Vertex(vertex)]))
}

#[cfg(test)]
mod tests {
    use crate::core::{ContextId, ElementId};
    use crate::operations::GraphBuilder;
    use crate::transform::{apply_transformation, Rule, RuleParams};

    #[test]
    fn labelled_vertex_defaults_to_constant() {
        let mut builder = GraphBuilder::new();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let graph = builder.build();
        let params = RuleParams::new().with_target(cut).with_label("socrates");
        let outcome = apply_transformation(&graph, Rule::IsolatedVertexAddition, None, &params).unwrap();
        let id = outcome.introduced.iter().find_map(ElementId::as_vertex).unwrap();
        let vertex = outcome.graph.vertex(id).unwrap();
        assert_eq!(vertex.label(), Some("socrates"));
        assert!(!vertex.generic);
        assert!(outcome.graph.area(cut.into()).contains(&ElementId::Vertex(id)));
    }

    #[test]
    fn added_vertex_can_be_removed_again() {
        let graph = GraphBuilder::new().build();
        let added = apply_transformation(
            &graph,
            Rule::IsolatedVertexAddition,
            None,
            &RuleParams::new().with_target(ContextId::Sheet),
        )
        .unwrap();
        let id = added.introduced.iter().find_map(ElementId::as_vertex).unwrap();
        let removed =
            apply_transformation(&added.graph, Rule::IsolatedVertexRemoval, None, &RuleParams::new().with_vertex(id))
                .unwrap();
        assert_eq!(removed.graph, graph);
    }
}
