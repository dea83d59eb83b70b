//! Proof traces: recorded sequences of rule applications.
//!
//! A [`ProofTrace`] keeps the initial graph and every [`ProofStep`] applied to
//! it. Steps carry the fingerprints of the graph before and after, so a replay
//! can tell when the recorded history no longer reproduces. Rolling back moves
//! the cursor; the steps past it are discarded on the next [`ProofTrace::apply`].
//!
//! # Citations
//! - Transformation traces: Jouault & Kurtev, "Transforming models with ATL" (2005)
//! - Dau, "Mathematical Logic with Diagrams", Definition 8.2 (proofs) (2003)

use crate::config::EngineConfig;
use crate::core::RelationalGraphWithCuts;
use crate::error::EngineError;
use crate::fingerprint::{graph_fingerprint, HashValue};
use crate::subgraph::Subgraph;
use crate::transform::{Rule, RuleParams, TransformationEngine, TransformationOutcome};
use thiserror::Error;
use tracing::debug;

/// One recorded rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    rule: Rule,
    selection: Option<Subgraph>,
    params: RuleParams,
    pre_fingerprint: HashValue,
    post_fingerprint: HashValue,
}

impl ProofStep {
    /// The rule applied.
    #[inline]
    pub fn rule(&self) -> Rule {
        self.rule
    }

    /// The selection it was applied to.
    #[inline]
    pub fn selection(&self) -> Option<&Subgraph> {
        self.selection.as_ref()
    }

    /// The parameters it was applied with.
    #[inline]
    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    /// Fingerprint of the graph before the step.
    #[inline]
    pub fn pre_fingerprint(&self) -> HashValue {
        self.pre_fingerprint
    }

    /// Fingerprint of the graph after the step.
    #[inline]
    pub fn post_fingerprint(&self) -> HashValue {
        self.post_fingerprint
    }
}

/// Error type for trace operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// The requested version is past the last recorded step.
    #[error("version {requested} is out of range (trace has {available} steps)")]
    VersionOutOfRange {
        /// Version asked for.
        requested: usize,
        /// Number of recorded steps.
        available: usize,
    },

    /// A recorded step no longer applies during replay.
    #[error("step {index} ({rule}) no longer applies: {source}")]
    StepFailed {
        /// Index of the failing step.
        index: usize,
        /// Its rule.
        rule: Rule,
        /// Why it failed.
        #[source]
        source: EngineError,
    },

    /// A replayed step produced a different graph than was recorded.
    #[error("step {index} fingerprint mismatch: recorded {expected}, replayed {found}")]
    FingerprintMismatch {
        /// Index of the step.
        index: usize,
        /// Recorded fingerprint.
        expected: HashValue,
        /// Fingerprint after replay.
        found: HashValue,
    },

    /// Applying a new step failed; the trace is unchanged.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A linear proof history starting from one graph.
#[derive(Debug, Clone)]
pub struct ProofTrace {
    engine: TransformationEngine,
    initial: RelationalGraphWithCuts,
    steps: Vec<ProofStep>,
    current_version: usize,
    current: RelationalGraphWithCuts,
}

impl ProofTrace {
    /// Starts a trace at `initial` under the default configuration.
    pub fn new(initial: RelationalGraphWithCuts) -> Self {
        Self::with_config(initial, EngineConfig::default())
    }

    /// Starts a trace at `initial` under `config`.
    pub fn with_config(initial: RelationalGraphWithCuts, config: EngineConfig) -> Self {
        Self {
            engine: TransformationEngine::new(config),
            current: initial.clone(),
            initial,
            steps: Vec::new(),
            current_version: 0,
        }
    }

    /// Applies `rule` to the current graph and records the step.
    ///
    /// Steps past the current version (left by a rollback) are discarded first.
    /// On failure the trace is unchanged.
    pub fn apply(
        &mut self,
        rule: Rule,
        selection: Option<&Subgraph>,
        params: &RuleParams,
    ) -> Result<TransformationOutcome, TraceError> {
        let outcome = self.engine.apply(&self.current, rule, selection, params)?;
        let step = ProofStep {
            rule,
            selection: selection.cloned(),
            params: params.clone(),
            pre_fingerprint: graph_fingerprint(&self.current),
            post_fingerprint: graph_fingerprint(&outcome.graph),
        };
        let discarded = self.steps.len() - self.current_version;
        self.steps.truncate(self.current_version);
        self.steps.push(step);
        self.current_version = self.steps.len();
        self.current = outcome.graph.clone();
        debug!(rule = %rule, version = self.current_version, discarded, "recorded proof step");
        Ok(outcome)
    }

    /// The graph at the current version.
    #[inline]
    pub fn current_graph(&self) -> &RelationalGraphWithCuts {
        &self.current
    }

    /// The graph the trace starts from.
    #[inline]
    pub fn initial_graph(&self) -> &RelationalGraphWithCuts {
        &self.initial
    }

    /// Fingerprint of the initial graph (version 0).
    pub fn initial_fingerprint(&self) -> HashValue {
        graph_fingerprint(&self.initial)
    }

    /// Current version: the number of steps applied to reach the current graph.
    #[inline]
    pub fn current_version(&self) -> usize {
        self.current_version
    }

    /// Number of recorded steps, including any past the current version.
    #[inline]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the step with the given index.
    pub fn step(&self, index: usize) -> Option<&ProofStep> {
        self.steps.get(index)
    }

    /// Returns an iterator over all recorded steps.
    pub fn steps(&self) -> impl Iterator<Item = &ProofStep> {
        self.steps.iter()
    }

    /// Rebuilds the graph at `version` by re-applying the recorded steps to the
    /// initial graph, checking each step's fingerprints.
    pub fn replay_to(&self, version: usize) -> Result<RelationalGraphWithCuts, TraceError> {
        self.check_version(version)?;
        let mut graph = self.initial.clone();
        for (index, step) in self.steps[..version].iter().enumerate() {
            let found = graph_fingerprint(&graph);
            if found != step.pre_fingerprint {
                return Err(TraceError::FingerprintMismatch { index, expected: step.pre_fingerprint, found });
            }
            graph = self
                .engine
                .apply(&graph, step.rule, step.selection.as_ref(), &step.params)
                .map_err(|source| TraceError::StepFailed { index, rule: step.rule, source })?
                .graph;
            let found = graph_fingerprint(&graph);
            if found != step.post_fingerprint {
                return Err(TraceError::FingerprintMismatch { index, expected: step.post_fingerprint, found });
            }
        }
        Ok(graph)
    }

    /// Moves the cursor back (or forward) to `version`.
    ///
    /// Recorded steps are kept until the next [`ProofTrace::apply`], so rolling
    /// forward again is possible until then.
    pub fn rollback_to(&mut self, version: usize) -> Result<(), TraceError> {
        self.current = self.replay_to(version)?;
        self.current_version = version;
        debug!(version, "rolled back proof trace");
        Ok(())
    }

    fn check_version(&self, version: usize) -> Result<(), TraceError> {
        if version > self.steps.len() {
            Err(TraceError::VersionOutOfRange { requested: version, available: self.steps.len() })
        } else {
            Ok(())
        }
    }
}
