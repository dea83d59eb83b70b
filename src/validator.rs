//! Background validation and rule discovery.
//!
//! [`BackgroundValidator::validate_graph_structure`] diagnoses a graph value
//! without ever panicking on malformed input, and lists a few rules that apply
//! anywhere in a valid graph. [`BackgroundValidator::get_available_transformations`]
//! answers the narrower question of which rules apply to the caller's current
//! elements. Both are read-only, and every rule they offer has passed
//! [`TransformationEngine::validate`].
//!
//! # Citations
//! - Dau, "Mathematical Logic with Diagrams", Definition 7.1 and Chapter 8 (2003)

use crate::config::EngineConfig;
use crate::context::{incident_edges, nested_contexts, polarity, context_of, Polarity};
use crate::core::{ContextId, CutId, EdgeId, ElementId, RelationalGraphWithCuts, VertexId};
use crate::error::{EngineError, InvariantViolation, Result};
use crate::invariants::check_invariants;
use crate::pattern::{find_matches, Fragment};
use crate::subgraph::{identify_subgraph, identify_subgraph_exact, Subgraph};
use crate::transform::{Rule, RuleParams, TransformationEngine};
use std::fmt;
use tracing::{debug, warn};

/// Something legal but probably unintended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructuralWarning {
    /// A cut with nothing in it; it denies the empty (true) graph.
    EmptyCut(CutId),
    /// A vertex no edge uses.
    IsolatedVertex(VertexId),
    /// A generic vertex that carries a label.
    GenericVertexWithLabel(VertexId),
    /// A constant vertex without a label.
    ConstantVertexWithoutLabel(VertexId),
    /// An edge whose relation name is empty.
    EmptyRelationName(EdgeId),
}

impl fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralWarning::EmptyCut(cut) => write!(f, "cut {} is empty", cut),
            StructuralWarning::IsolatedVertex(v) => write!(f, "vertex {} has no incident edges", v),
            StructuralWarning::GenericVertexWithLabel(v) => {
                write!(f, "vertex {} is generic but carries a label", v)
            }
            StructuralWarning::ConstantVertexWithoutLabel(v) => {
                write!(f, "vertex {} is a constant without a label", v)
            }
            StructuralWarning::EmptyRelationName(e) => write!(f, "edge {} has an empty relation name", e),
        }
    }
}

/// A rule that passes validation, ready to hand to [`TransformationEngine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicableTransformation {
    /// The rule.
    pub rule: Rule,
    /// The selection to apply it to, if the rule takes one.
    pub selection: Option<Subgraph>,
    /// The remaining parameters.
    pub params: RuleParams,
    /// One-line description for display.
    pub description: String,
}

/// Full diagnosis of a graph value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// `true` iff `errors` is empty.
    pub is_valid: bool,
    /// Every invariant violation found.
    pub errors: Vec<InvariantViolation>,
    /// Legal but suspicious structure.
    pub warnings: Vec<StructuralWarning>,
    /// Rules applicable somewhere in the graph; empty for an invalid graph.
    pub suggestions: Vec<ApplicableTransformation>,
}

/// Diagnoses graphs and discovers applicable rules under one configuration.
#[derive(Debug, Clone, Default)]
pub struct BackgroundValidator {
    engine: TransformationEngine,
}

impl BackgroundValidator {
    /// Creates a validator.
    pub fn new(config: EngineConfig) -> Self {
        Self { engine: TransformationEngine::new(config) }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    /// Checks every structural invariant and collects warnings and suggestions.
    ///
    /// Malformed input is reported, never rejected with a panic.
    pub fn validate_graph_structure(&self, graph: &RelationalGraphWithCuts) -> ValidationReport {
        let errors = check_invariants(graph);
        for violation in &errors {
            warn!(%violation, "invariant violation");
        }
        let is_valid = errors.is_empty();
        let warnings = structural_warnings(graph);
        let suggestions = if is_valid { self.global_suggestions(graph) } else { Vec::new() };
        debug!(
            is_valid,
            errors = errors.len(),
            warnings = warnings.len(),
            suggestions = suggestions.len(),
            "validated graph structure"
        );
        ValidationReport { is_valid, errors, warnings, suggestions }
    }

    /// Lists the rules applicable to the given elements.
    ///
    /// - No elements: rules that act on the sheet itself.
    /// - Elements forming a subgraph: erasure, iteration into the home and every
    ///   context nested in it outside the selection, deiteration against every
    ///   structurally identical original, double cut insertion around it.
    /// - A single cut additionally: double cut removal, isolated vertex addition
    ///   and insertion into it.
    /// - A single isolated vertex additionally: isolated vertex removal.
    ///
    /// Fails with `UnknownElement` for an id the graph lacks. Elements that do
    /// not form a subgraph yield only the single-element rules.
    pub fn get_available_transformations(
        &self,
        graph: &RelationalGraphWithCuts,
        elements: &[ElementId],
    ) -> Result<Vec<ApplicableTransformation>> {
        if let Some(&unknown) = elements.iter().find(|&&e| !graph.contains(e)) {
            return Err(EngineError::UnknownElement(unknown));
        }
        let mut found = Offers::new(self, graph);

        match elements {
            [] => {
                found.offer(Rule::DoubleCutInsertion, None, RuleParams::new().with_target(ContextId::Sheet));
                found.offer(Rule::IsolatedVertexAddition, None, RuleParams::new().with_target(ContextId::Sheet));
                return Ok(found.into_inner());
            }
            [ElementId::Cut(cut)] => {
                found.offer(Rule::DoubleCutRemoval, None, RuleParams::new().with_cut(*cut));
                found.offer(Rule::IsolatedVertexAddition, None, RuleParams::new().with_target(*cut));
                let mut placeholder = Fragment::new();
                placeholder.vertex(ContextId::Sheet, None, true)?;
                found.offer(
                    Rule::Insertion,
                    None,
                    RuleParams::new().with_target(*cut).with_fragment(placeholder),
                );
            }
            [ElementId::Vertex(vertex)] => {
                found.offer(Rule::IsolatedVertexRemoval, None, RuleParams::new().with_vertex(*vertex));
            }
            _ => {}
        }

        let selection = match identify_subgraph(graph, elements.iter().copied()) {
            Ok(selection) => selection,
            Err(err) => {
                debug!(%err, "elements do not form a subgraph");
                return Ok(found.into_inner());
            }
        };

        found.offer(Rule::Erasure, Some(&selection), RuleParams::new());
        for target in nested_contexts(graph, selection.home())? {
            if matches!(target, ContextId::Cut(c) if selection.cuts().contains(&c)) {
                continue;
            }
            found.offer(Rule::Iteration, Some(&selection), RuleParams::new().with_target(target));
        }
        for original in self.originals_of(graph, &selection) {
            found.offer(Rule::Deiteration, Some(&selection), RuleParams::new().with_original(original));
        }
        found.offer(Rule::DoubleCutInsertion, Some(&selection), RuleParams::new());
        Ok(found.into_inner())
    }

    /// Every other occurrence of the selection's structure, as a selection.
    fn originals_of(&self, graph: &RelationalGraphWithCuts, selection: &Subgraph) -> Vec<Subgraph> {
        let Ok((probe, _)) = Fragment::from_subgraph(graph, selection) else {
            return Vec::new();
        };
        let Ok(matches) = find_matches(graph, &probe, self.config().max_probe_matches) else {
            return Vec::new();
        };
        matches
            .into_iter()
            .filter(|m| m.image().iter().all(|&e| !selection.contains(e)))
            .filter_map(|m| identify_subgraph_exact(graph, m.image()).ok())
            .collect()
    }

    /// Double cut removal per double cut, isolated vertex removal per isolated
    /// vertex, erasure per edge in a positive context.
    fn global_suggestions(&self, graph: &RelationalGraphWithCuts) -> Vec<ApplicableTransformation> {
        let mut found = Offers::new(self, graph);
        for cut in graph.cuts() {
            if graph.area(cut.into()).len() == 1 {
                found.offer(Rule::DoubleCutRemoval, None, RuleParams::new().with_cut(cut));
            }
        }
        for vertex in graph.vertices() {
            if incident_edges(graph, vertex.id).is_empty() {
                found.offer(Rule::IsolatedVertexRemoval, None, RuleParams::new().with_vertex(vertex.id));
            }
        }
        for edge in graph.edges() {
            let positive = context_of(graph, ElementId::Edge(edge))
                .and_then(|ctx| polarity(graph, ctx))
                .map(Polarity::is_positive)
                .unwrap_or(false);
            if !positive {
                continue;
            }
            if let Ok(selection) = identify_subgraph(graph, [ElementId::Edge(edge)]) {
                found.offer(Rule::Erasure, Some(&selection), RuleParams::new());
            }
        }
        found.into_inner()
    }
}

/// Accumulates suggestions that pass validation, up to the configured limit.
struct Offers<'a> {
    validator: &'a BackgroundValidator,
    graph: &'a RelationalGraphWithCuts,
    found: Vec<ApplicableTransformation>,
}

impl<'a> Offers<'a> {
    fn new(validator: &'a BackgroundValidator, graph: &'a RelationalGraphWithCuts) -> Self {
        Self { validator, graph, found: Vec::new() }
    }

    fn offer(&mut self, rule: Rule, selection: Option<&Subgraph>, params: RuleParams) {
        if self.found.len() >= self.validator.config().suggestion_limit {
            return;
        }
        if self.validator.engine.validate(self.graph, rule, selection, &params).is_err() {
            return;
        }
        let description = describe(rule, selection, &params);
        self.found.push(ApplicableTransformation { rule, selection: selection.cloned(), params, description });
    }

    fn into_inner(self) -> Vec<ApplicableTransformation> {
        self.found
    }
}

fn describe(rule: Rule, selection: Option<&Subgraph>, params: &RuleParams) -> String {
    let mut text = rule.name().to_string();
    if let Some(selection) = selection {
        text.push_str(&format!(" of {} element(s) in {}", selection.len(), selection.home()));
    }
    if let Some(target) = params.target {
        text.push_str(&format!(" into {}", target));
    }
    if let Some(cut) = params.cut {
        text.push_str(&format!(" at {}", cut));
    }
    if let Some(vertex) = params.vertex {
        text.push_str(&format!(" of {}", vertex));
    }
    if let Some(original) = &params.original {
        text.push_str(&format!(" against a copy in {}", original.home()));
    }
    text
}

fn structural_warnings(graph: &RelationalGraphWithCuts) -> Vec<StructuralWarning> {
    let mut warnings = Vec::new();
    for cut in graph.cuts() {
        if graph.area(cut.into()).is_empty() {
            warnings.push(StructuralWarning::EmptyCut(cut));
        }
    }
    for vertex in graph.vertices() {
        if incident_edges(graph, vertex.id).is_empty() {
            warnings.push(StructuralWarning::IsolatedVertex(vertex.id));
        }
        match (vertex.generic, vertex.label.is_some()) {
            (true, true) => warnings.push(StructuralWarning::GenericVertexWithLabel(vertex.id)),
            (false, false) => warnings.push(StructuralWarning::ConstantVertexWithoutLabel(vertex.id)),
            _ => {}
        }
    }
    for edge in graph.edges() {
        if graph.relation(edge).is_some_and(str::is_empty) {
            warnings.push(StructuralWarning::EmptyRelationName(edge));
        }
    }
    warnings
}

/// Diagnoses `graph` under the default configuration.
pub fn validate_graph_structure(graph: &RelationalGraphWithCuts) -> ValidationReport {
    BackgroundValidator::default().validate_graph_structure(graph)
}

/// Lists the rules applicable to `elements` under the default configuration.
pub fn get_available_transformations(
    graph: &RelationalGraphWithCuts,
    elements: &[ElementId],
) -> Result<Vec<ApplicableTransformation>> {
    BackgroundValidator::default().get_available_transformations(graph, elements)
}
