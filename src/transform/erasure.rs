//! Erasure: any part of a positive context may be removed.
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.1, rule "erasure" (2003)

use super::{ensure_vertices_unused_outside, remove_selection, Step, TransformationOutcome};
use crate::context::Polarity;
use crate::error::Result;

pub(crate) fn validate(step: &Step<'_>) -> Result<()> {
    let selection = step.selection()?;
    step.require_polarity(selection.home(), Polarity::Positive)?;
    ensure_vertices_unused_outside(step.graph, selection)
}

pub(crate) fn apply(step: &Step<'_>) -> Result<TransformationOutcome> {
    Ok(remove_selection(step.graph, step.selection()?))
}
