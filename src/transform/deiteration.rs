//! Deiteration: a selection that is an exact copy of another selection, lying
//! in the original's home context or deeper, may be removed.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "deiteration" (2003)

use super::{ensure_vertices_unused_outside, remove_selection, Step, TransformationOutcome};
use crate::context::encloses;
use crate::error::{PreconditionFailure, Result};
use crate::isomorphism::find_isomorphism;

pub(crate) fn validate(step: &Step<'_>) -> Result<()> {
    let duplicate = step.selection()?;
    let original = step.original()?;
    original.ensure_current(step.graph)?;
    if !duplicate.is_disjoint(original) {
        return Err(PreconditionFailure::OverlappingSelections.into());
    }
    if !encloses(step.graph, original.home(), duplicate.home())? {
        return Err(PreconditionFailure::DuplicateNotNested {
            original: original.home(),
            duplicate: duplicate.home(),
        }
        .into());
    }
    find_isomorphism(step.graph, duplicate, original)?;
    ensure_vertices_unused_outside(step.graph, duplicate)
}

pub(crate) fn apply(step: &Step<'_>) -> Result<TransformationOutcome> {
    Ok(remove_selection(step.graph, step.selection()?))
}
