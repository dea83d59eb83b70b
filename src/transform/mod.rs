//! Transformation rules for existential graphs.
//!
//! The eight rules of Peirce's beta system, as formalised by Dau for relational
//! graphs with cuts. Every rule has a precondition check and a rewrite; rewrites
//! are only reachable through [`TransformationEngine::apply`] (or
//! [`apply_transformation`]), which always re-runs the precondition check against
//! the graph it is handed, so a stale or forged selection can never be applied.
//!
//! | Rule | Where | Effect |
//! |---|---|---|
//! | Erasure | positive context | remove a selection |
//! | Insertion | negative context | graft a fragment |
//! | Iteration | home or deeper | copy a selection |
//! | Deiteration | home of the original or deeper | remove an exact copy |
//! | Double cut insertion | anywhere | wrap in two cuts |
//! | Double cut removal | anywhere | drop two cuts |
//! | Isolated vertex addition | anywhere | add an unconnected vertex |
//! | Isolated vertex removal | anywhere | drop an unconnected vertex |
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Chapter 8 "Calculus for Relational Graphs with Cuts" (2003)
//! - Roberts, "The Existential Graphs of Charles S. Peirce", §4.4 (1973)
//! - Shin, "The Iconic Logic of Peirce's Graphs", Chapter 4 (2002)

mod deiteration;
mod double_cut;
mod erasure;
mod insertion;
mod isolated_vertex;
mod iteration;

use crate::config::EngineConfig;
use crate::context::{incident_edges, polarity, Polarity};
use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::error::{EngineError, PreconditionFailure, Result, SelectionError};
use crate::invariants::check_invariants;
use crate::pattern::Fragment;
use crate::subgraph::Subgraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// The closed set of transformation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rule {
    /// Remove a selection from a positive context.
    Erasure,
    /// Graft a fragment into a negative context.
    Insertion,
    /// Copy a selection into its home or a context nested in it.
    Iteration,
    /// Remove an exact copy of another selection.
    Deiteration,
    /// Wrap a (possibly empty) selection in two fresh cuts.
    DoubleCutInsertion,
    /// Remove a cut whose only member is an empty cut.
    DoubleCutRemoval,
    /// Add a vertex with no incident edges.
    IsolatedVertexAddition,
    /// Remove a vertex with no incident edges.
    IsolatedVertexRemoval,
}

impl Rule {
    /// Every rule, in declaration order.
    pub const ALL: [Rule; 8] = [
        Rule::Erasure,
        Rule::Insertion,
        Rule::Iteration,
        Rule::Deiteration,
        Rule::DoubleCutInsertion,
        Rule::DoubleCutRemoval,
        Rule::IsolatedVertexAddition,
        Rule::IsolatedVertexRemoval,
    ];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Erasure => "erasure",
            Rule::Insertion => "insertion",
            Rule::Iteration => "iteration",
            Rule::Deiteration => "deiteration",
            Rule::DoubleCutInsertion => "double cut insertion",
            Rule::DoubleCutRemoval => "double cut removal",
            Rule::IsolatedVertexAddition => "isolated vertex addition",
            Rule::IsolatedVertexRemoval => "isolated vertex removal",
        }
    }

    /// Returns `true` for rules that only ever add elements.
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            Rule::Insertion | Rule::Iteration | Rule::DoubleCutInsertion | Rule::IsolatedVertexAddition
        )
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-rule parameters besides the selection.
///
/// Only the fields a rule reads need to be set:
/// - `target`: insertion, iteration (defaults to the selection's home), double
///   cut insertion (defaults to the selection's home), isolated vertex addition
/// - `cut`: double cut removal (or select the outer cut)
/// - `vertex`: isolated vertex removal (or select the vertex)
/// - `original`: deiteration
/// - `fragment`, `bindings`: insertion
/// - `label`, `generic`: isolated vertex addition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Context to insert into.
    pub target: Option<ContextId>,
    /// Outer cut of a double cut.
    pub cut: Option<CutId>,
    /// Vertex to remove.
    pub vertex: Option<VertexId>,
    /// Selection the duplicate is a copy of.
    pub original: Option<Subgraph>,
    /// Payload to insert.
    pub fragment: Option<Fragment>,
    /// Fragment boundary vertex → host vertex.
    #[serde(default)]
    pub bindings: BTreeMap<VertexId, VertexId>,
    /// Label of a new isolated vertex.
    pub label: Option<String>,
    /// Whether a new isolated vertex is generic; defaults to "unlabelled".
    pub generic: Option<bool>,
}

impl RuleParams {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target context.
    pub fn with_target(mut self, target: impl Into<ContextId>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the outer cut for double cut removal.
    pub fn with_cut(mut self, cut: CutId) -> Self {
        self.cut = Some(cut);
        self
    }

    /// Sets the vertex for isolated vertex removal.
    pub fn with_vertex(mut self, vertex: VertexId) -> Self {
        self.vertex = Some(vertex);
        self
    }

    /// Sets the original for deiteration.
    pub fn with_original(mut self, original: Subgraph) -> Self {
        self.original = Some(original);
        self
    }

    /// Sets the insertion payload.
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragment = Some(fragment);
        self
    }

    /// Binds a fragment boundary vertex to a host vertex.
    pub fn with_binding(mut self, fragment_vertex: VertexId, host_vertex: VertexId) -> Self {
        self.bindings.insert(fragment_vertex, host_vertex);
        self
    }

    /// Sets the label of a new isolated vertex.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets whether a new isolated vertex is generic.
    pub fn with_generic(mut self, generic: bool) -> Self {
        self.generic = Some(generic);
        self
    }
}

/// Result of a successful transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationOutcome {
    /// The new graph value.
    pub graph: RelationalGraphWithCuts,
    /// Elements that exist in the new value but not in the input.
    pub introduced: BTreeSet<ElementId>,
    /// Elements of the input that no longer exist.
    pub removed: BTreeSet<ElementId>,
}

impl TransformationOutcome {
    fn new(
        graph: RelationalGraphWithCuts,
        introduced: impl IntoIterator<Item = ElementId>,
        removed: impl IntoIterator<Item = ElementId>,
    ) -> Self {
        Self {
            graph,
            introduced: introduced.into_iter().collect(),
            removed: removed.into_iter().collect(),
        }
    }
}

/// Outcome of a precondition check.
pub type ValidationResult = Result<()>;

/// Outcome of applying a rule.
pub type TransformationResult = Result<TransformationOutcome>;

/// Validates and applies rules under a configuration.
#[derive(Debug, Clone, Default)]
pub struct TransformationEngine {
    config: EngineConfig,
}

impl TransformationEngine {
    /// Creates an engine.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checks whether `rule` applies to `selection` in `graph`.
    ///
    /// Never modifies `graph`. Any selection passed in must still describe
    /// `graph`; otherwise the check fails with `StaleSelection`.
    pub fn validate(
        &self,
        graph: &RelationalGraphWithCuts,
        rule: Rule,
        selection: Option<&Subgraph>,
        params: &RuleParams,
    ) -> ValidationResult {
        if let Some(selection) = selection {
            selection.ensure_current(graph)?;
        }
        let step = Step { graph, rule, selection, params, config: &self.config };
        match rule {
            Rule::Erasure => erasure::validate(&step),
            Rule::Insertion => insertion::validate(&step),
            Rule::Iteration => iteration::validate(&step),
            Rule::Deiteration => deiteration::validate(&step),
            Rule::DoubleCutInsertion => double_cut::validate_insertion(&step),
            Rule::DoubleCutRemoval => double_cut::validate_removal(&step),
            Rule::IsolatedVertexAddition => isolated_vertex::validate_addition(&step),
            Rule::IsolatedVertexRemoval => isolated_vertex::validate_removal(&step),
        }
    }

    /// Validates, then applies `rule`, returning a new graph value.
    ///
    /// The input is never modified; on failure it is returned to the caller untouched.
    pub fn apply(
        &self,
        graph: &RelationalGraphWithCuts,
        rule: Rule,
        selection: Option<&Subgraph>,
        params: &RuleParams,
    ) -> TransformationResult {
        self.validate(graph, rule, selection, params)?;
        let step = Step { graph, rule, selection, params, config: &self.config };
        let outcome = match rule {
            Rule::Erasure => erasure::apply(&step),
            Rule::Insertion => insertion::apply(&step),
            Rule::Iteration => iteration::apply(&step),
            Rule::Deiteration => deiteration::apply(&step),
            Rule::DoubleCutInsertion => double_cut::apply_insertion(&step),
            Rule::DoubleCutRemoval => double_cut::apply_removal(&step),
            Rule::IsolatedVertexAddition => isolated_vertex::apply_addition(&step),
            Rule::IsolatedVertexRemoval => isolated_vertex::apply_removal(&step),
        }?;

        if self.config.check_outputs {
            if let Some(violation) = check_invariants(&outcome.graph).into_iter().next() {
                warn!(rule = %rule, %violation, "transformation produced a malformed graph");
                return Err(EngineError::Invariant(violation));
            }
        }
        debug!(
            rule = %rule,
            introduced = outcome.introduced.len(),
            removed = outcome.removed.len(),
            "applied transformation"
        );
        Ok(outcome)
    }
}

/// Checks whether `rule` applies, under the default configuration.
pub fn validate_transformation(
    graph: &RelationalGraphWithCuts,
    rule: Rule,
    selection: Option<&Subgraph>,
    params: &RuleParams,
) -> ValidationResult {
    TransformationEngine::default().validate(graph, rule, selection, params)
}

/// Validates and applies `rule`, under the default configuration.
///
/// # Examples
///
/// ```
/// use peirce::operations::GraphBuilder;
/// use peirce::transform::{apply_transformation, Rule, RuleParams};
/// use peirce::core::ContextId;
///
/// let mut builder = GraphBuilder::new();
/// let outer = builder.cut(ContextId::Sheet).unwrap();
/// builder.cut(outer.into()).unwrap();
/// let graph = builder.build();
///
/// let params = RuleParams::new().with_cut(outer);
/// let outcome = apply_transformation(&graph, Rule::DoubleCutRemoval, None, &params).unwrap();
/// assert!(outcome.graph.is_empty());
/// ```
pub fn apply_transformation(
    graph: &RelationalGraphWithCuts,
    rule: Rule,
    selection: Option<&Subgraph>,
    params: &RuleParams,
) -> TransformationResult {
    TransformationEngine::default().apply(graph, rule, selection, params)
}

/// Everything a rule handler sees.
pub(crate) struct Step<'a> {
    pub(crate) graph: &'a RelationalGraphWithCuts,
    pub(crate) rule: Rule,
    pub(crate) selection: Option<&'a Subgraph>,
    pub(crate) params: &'a RuleParams,
    pub(crate) config: &'a EngineConfig,
}

impl<'a> Step<'a> {
    fn missing(&self, parameter: &'static str) -> EngineError {
        SelectionError::MissingParameter { rule: self.rule, parameter }.into()
    }

    pub(crate) fn selection(&self) -> Result<&'a Subgraph> {
        self.selection.ok_or_else(|| self.missing("selection"))
    }

    /// Explicit target, else the selection's home.
    pub(crate) fn target_or_home(&self) -> Result<ContextId> {
        self.params
            .target
            .or(self.selection.map(Subgraph::home))
            .ok_or_else(|| self.missing("target context"))
    }

    pub(crate) fn target(&self) -> Result<ContextId> {
        self.params.target.ok_or_else(|| self.missing("target context"))
    }

    pub(crate) fn original(&self) -> Result<&'a Subgraph> {
        self.params.original.as_ref().ok_or_else(|| self.missing("original selection"))
    }

    pub(crate) fn fragment(&self) -> Result<&'a Fragment> {
        self.params.fragment.as_ref().ok_or_else(|| self.missing("fragment"))
    }

    /// Fails with `UnknownContext` for a context the graph lacks.
    pub(crate) fn ensure_context(&self, ctx: ContextId) -> Result<()> {
        if self.graph.contains_context(ctx) {
            Ok(())
        } else {
            Err(EngineError::UnknownContext(ctx))
        }
    }

    /// Fails with `WrongPolarity` unless `ctx` has the required polarity.
    pub(crate) fn require_polarity(&self, ctx: ContextId, required: Polarity) -> Result<()> {
        let found = polarity(self.graph, ctx)?;
        if found == required {
            Ok(())
        } else {
            Err(PreconditionFailure::WrongPolarity { rule: self.rule, context: ctx, required, found }.into())
        }
    }
}

/// Fails with `SelectedVertexInUse` if an edge outside the selection uses one of
/// its vertices.
pub(crate) fn ensure_vertices_unused_outside(graph: &RelationalGraphWithCuts, selection: &Subgraph) -> Result<()> {
    for &vertex in selection.vertices() {
        let outside: Vec<EdgeId> = incident_edges(graph, vertex)
            .into_iter()
            .filter(|e| !selection.edges().contains(e))
            .collect();
        if !outside.is_empty() {
            return Err(PreconditionFailure::SelectedVertexInUse { vertex, edges: outside }.into());
        }
    }
    Ok(())
}

/// Removes every selected element.
pub(crate) fn remove_selection(graph: &RelationalGraphWithCuts, selection: &Subgraph) -> TransformationOutcome {
    let mut next = graph.clone();
    let removed: Vec<ElementId> = selection.elements().collect();
    for &element in &removed {
        next.remove_element_raw(element);
    }
    TransformationOutcome::new(next, Vec::new(), removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::GraphBuilder;

    #[test]
    fn rule_names_are_distinct() {
        let names: BTreeSet<&str> = Rule::ALL.iter().map(Rule::name).collect();
        assert_eq!(names.len(), Rule::ALL.len());
        assert_eq!(Rule::DoubleCutRemoval.to_string(), "double cut removal");
    }

    /// Test that additive rules report no removed elements.
    #[test]
    fn additive_rules_remove_nothing() {
        let graph = GraphBuilder::new().build();
        let params = RuleParams::new().with_target(ContextId::Sheet);
        for rule in [Rule::DoubleCutInsertion, Rule::IsolatedVertexAddition] {
            assert!(rule.is_additive());
            let outcome = apply_transformation(&graph, rule, None, &params).unwrap();
            assert!(outcome.removed.is_empty());
            assert!(!outcome.introduced.is_empty());
        }
        assert!(!Rule::Erasure.is_additive());
        assert!(!Rule::DoubleCutRemoval.is_additive());
    }

    #[test]
    fn missing_parameter_names_the_rule() {
        let graph = GraphBuilder::new().build();
        let err = validate_transformation(&graph, Rule::Insertion, None, &RuleParams::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Selection(SelectionError::MissingParameter {
                rule: Rule::Insertion,
                parameter: "target context",
            })
        );
    }

    /// Test that a failed application leaves the input as it was.
    #[test]
    fn failed_application_leaves_input_untouched() {
        let mut builder = GraphBuilder::new();
        let cut = builder.cut(ContextId::Sheet).unwrap();
        let v = builder.variable(cut.into()).unwrap();
        let graph = builder.build();
        let before = graph.clone();
        let selection = crate::subgraph::identify_subgraph(&graph, [ElementId::Vertex(v)]).unwrap();
        assert!(apply_transformation(&graph, Rule::Erasure, Some(&selection), &RuleParams::new()).is_err());
        assert_eq!(graph, before);
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = RuleParams::new().with_target(CutId::new(3)).with_binding(VertexId::new(0), VertexId::new(9));
        let json = serde_json::to_string(&params).unwrap();
        let back: RuleParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
