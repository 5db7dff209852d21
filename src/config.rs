use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "cephalee-triage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,cephalee_triage=trace"
    } else {
        "info"
    }
}

/// Per-user data directory, `None` when the platform has no home.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

/// Directory holding optional ONNX models.
pub fn models_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("models"))
}

/// Sentence embedding model directory (all-MiniLM-L6-v2).
pub fn embedding_model_dir() -> Option<PathBuf> {
    models_dir().map(|d| d.join("all-MiniLM-L6-v2"))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ═══════════════════════════════════════════════════════════
// Triage configuration
// ═══════════════════════════════════════════════════════════

/// Tunable thresholds for the NLU pipeline and dialogue. Missing keys
/// take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Minimum similarity for a typo to be replaced.
    pub fuzzy_threshold: f64,
    pub fuzzy_min_word_len: usize,
    pub fuzzy_max_len_diff: usize,
    /// Rules confidence below which the corpus is consulted.
    pub embedding_confidence_threshold: f64,
    pub embedding_top_k: usize,
    pub embedding_example_min_similarity: f64,
    pub embedding_pattern_min_similarity: f64,
    pub embedding_majority_ratio: f64,
    pub embedding_min_votes: usize,
    pub keyword_min_weight: f64,
    pub ngram_override_min_confidence: f64,
    /// Share of a question set already answered that ends the dialogue.
    pub early_stop_ratio: f64,
    pub early_stop_absolute_criteria: usize,
    /// A first message under this many tokens counts as "short".
    pub short_input_token_limit: usize,
    pub max_sessions: usize,
    pub enable_embedding: bool,
    /// Attach the diagnostic block to dialogue responses.
    pub include_diagnostics: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.80,
            fuzzy_min_word_len: 4,
            fuzzy_max_len_diff: 3,
            embedding_confidence_threshold: 0.70,
            embedding_top_k: 5,
            embedding_example_min_similarity: 0.60,
            embedding_pattern_min_similarity: 0.65,
            embedding_majority_ratio: 0.5,
            embedding_min_votes: 2,
            keyword_min_weight: 0.65,
            ngram_override_min_confidence: 0.80,
            early_stop_ratio: 0.80,
            early_stop_absolute_criteria: 3,
            short_input_token_limit: 10,
            max_sessions: 1000,
            enable_embedding: true,
            include_diagnostics: true,
        }
    }
}

impl TriageConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("embedding_confidence_threshold", self.embedding_confidence_threshold),
            ("embedding_example_min_similarity", self.embedding_example_min_similarity),
            ("embedding_pattern_min_similarity", self.embedding_pattern_min_similarity),
            ("embedding_majority_ratio", self.embedding_majority_ratio),
            ("keyword_min_weight", self.keyword_min_weight),
            ("ngram_override_min_confidence", self.ngram_override_min_confidence),
            ("early_stop_ratio", self.early_stop_ratio),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }
        let positive = [
            ("embedding_top_k", self.embedding_top_k),
            ("embedding_min_votes", self.embedding_min_votes),
            ("max_sessions", self.max_sessions),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dirs_nest() {
        if let (Some(app), Some(models), Some(embed)) =
            (app_data_dir(), models_dir(), embedding_model_dir())
        {
            assert!(app.ends_with(APP_NAME));
            assert!(models.starts_with(&app));
            assert!(embed.starts_with(&models));
            assert!(embed.ends_with("all-MiniLM-L6-v2"));
        }
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn debug_builds_trace_the_crate() {
        if cfg!(debug_assertions) {
            assert!(default_log_filter().contains("cephalee_triage=trace"));
        }
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TriageConfig::from_json_str(r#"{"fuzzy_threshold": 0.9}"#).unwrap();
        assert_eq!(config.fuzzy_threshold, 0.9);
        assert_eq!(config.max_sessions, 1000);
        assert!(config.enable_embedding);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let err = TriageConfig::from_json_str(r#"{"early_stop_ratio": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "early_stop_ratio", .. }));
    }

    #[test]
    fn zero_sessions_rejected() {
        assert!(TriageConfig::from_json_str(r#"{"max_sessions": 0}"#).is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TriageConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, TriageConfig::default());
    }

    #[test]
    fn file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triage.json");
        std::fs::write(&path, r#"{"enable_embedding": false, "embedding_top_k": 3}"#).unwrap();
        let config = TriageConfig::load(&path).unwrap();
        assert!(!config.enable_embedding);
        assert_eq!(config.embedding_top_k, 3);
    }
}
