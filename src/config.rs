//! Engine configuration.
//!
//! All knobs have defaults matching the canonical rule set; a caller only sets
//! what it wants to change.

use serde::{Deserialize, Serialize};

/// Configuration shared by the transformation engine and the background validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Let double cut removal lift the contents of a non-empty inner cut into the
    /// outer cut's context (Dau's unrestricted rule). Off by default: the inner cut
    /// must be empty.
    pub double_cut_lifts_contents: bool,
    /// Number of distinct probe matches enumerated before giving up.
    pub max_probe_matches: usize,
    /// Maximum number of suggestions the validator lists.
    pub suggestion_limit: usize,
    /// Re-check all invariants on every produced graph.
    pub check_outputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            double_cut_lifts_contents: false,
            max_probe_matches: 64,
            suggestion_limit: 256,
            check_outputs: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Enables or disables lifting in double cut removal.
    pub fn with_double_cut_lifting(mut self, enabled: bool) -> Self {
        self.double_cut_lifts_contents = enabled;
        self
    }

    /// Sets the probe match limit (at least 2, so ambiguity stays detectable).
    pub fn with_max_probe_matches(mut self, limit: usize) -> Self {
        self.max_probe_matches = limit.max(2);
        self
    }

    /// Sets the suggestion limit.
    pub fn with_suggestion_limit(mut self, limit: usize) -> Self {
        self.suggestion_limit = limit;
        self
    }

    /// Enables or disables output checking.
    pub fn with_output_checks(mut self, enabled: bool) -> Self {
        self.check_outputs = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_canonical_rules() {
        let config = EngineConfig::default();
        assert!(!config.double_cut_lifts_contents);
        assert_eq!(config.max_probe_matches, 64);
        assert_eq!(config.suggestion_limit, 256);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "double_cut_lifts_contents": true }"#).unwrap();
        assert!(config.double_cut_lifts_contents);
        assert_eq!(config.max_probe_matches, 64);
    }

    #[test]
    fn probe_limit_keeps_ambiguity_detectable() {
        let config = EngineConfig::default().with_max_probe_matches(0);
        assert_eq!(config.max_probe_matches, 2);
    }
}
