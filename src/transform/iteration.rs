//! Iteration: a copy of a selection may be placed in its home context or any
//! context nested inside it, but not inside the selection itself.
//!
//! The copy shares the selection's boundary vertices, so lines of identity
//! reaching into the selection also reach into the copy.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "iteration" (2003)
//! - Peirce, Collected Papers 4.506 (1903)

use super::{Step, TransformationOutcome};
use crate::context::encloses;
use crate::core::ContextId;
use crate::error::{PreconditionFailure, Result};
use crate::pattern::{graft, Fragment};

pub(crate) fn validate(step: &Step<'_>) -> Result<()> {
    let selection = step.selection()?;
    let target = step.target_or_home()?;
    step.ensure_context(target)?;
    if let ContextId::Cut(cut) = target {
        if selection.cuts().contains(&cut) {
            return Err(PreconditionFailure::TargetInsideSelection { target }.into());
        }
    }
    if !encloses(step.graph, selection.home(), target)? {
        return Err(PreconditionFailure::TargetNotNested { home: selection.home(), target }.into());
    }
    Ok(())
}

pub(crate) fn apply(step: &Step<'_>) -> Result<TransformationOutcome> {
    let selection = step.selection()?;
    let (fragment, bindings) = Fragment::from_subgraph(step.graph, selection)?;
    let (graph, introduced) = graft(step.graph, &fragment, step.target_or_home()?, &bindings)?;
    Ok(TransformationOutcome::new(graph, introduced, Vec::new()))
}
