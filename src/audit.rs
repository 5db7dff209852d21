//! Audit records for triage decisions and NLU calls.
//!
//! Records are handed to an [`AuditSink`]. The tracing sink never emits
//! patient text: NLU events carry the input length and a SHA-256
//! fingerprint, the truncated preview stays in the record for sinks that
//! store it under their own access controls.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{ImagingRecommendation, Urgency};
use crate::nlu::{NluMetadata, NluMethod};

/// Characters kept in an NLU input preview.
pub const PREVIEW_CHARS: usize = 50;

// ═══════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub case_id: Uuid,
    /// Exam identifiers joined by `+`, or `no_imaging`.
    pub decision: String,
    pub rule_matched: Option<String>,
    pub confidence: f64,
    pub urgency: Urgency,
    pub timestamp: DateTime<Utc>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DecisionRecord {
    pub fn new(case_id: Uuid, recommendation: &ImagingRecommendation, confidence: f64) -> Self {
        let decision = if recommendation.imaging.is_empty() {
            "no_imaging".to_string()
        } else {
            recommendation
                .imaging
                .iter()
                .map(|e| e.as_str())
                .collect::<Vec<_>>()
                .join("+")
        };
        Self {
            case_id,
            decision,
            rule_matched: recommendation.applied_rule_id.clone(),
            confidence,
            urgency: recommendation.urgency,
            timestamp: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NluRecord {
    pub input_preview: String,
    pub input_chars: usize,
    /// First 16 hex digits of the SHA-256 of the full input.
    pub input_fingerprint: String,
    pub detected_count: usize,
    pub confidence: f64,
    pub method: NluMethod,
    pub processing_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl NluRecord {
    pub fn from_metadata(input: &str, meta: &NluMetadata) -> Self {
        Self {
            input_preview: preview(input, PREVIEW_CHARS),
            input_chars: input.chars().count(),
            input_fingerprint: fingerprint(input),
            detected_count: meta.detected_fields().len(),
            confidence: meta.overall_confidence(),
            method: meta.method(),
            processing_ms: meta.processing_ms,
            timestamp: Utc::now(),
        }
    }
}

/// First `max` characters, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn fingerprint(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Sinks
// ═══════════════════════════════════════════════════════════

pub trait AuditSink: Send + Sync {
    fn record_decision(&self, record: &DecisionRecord);
    fn record_nlu(&self, record: &NluRecord);
}

/// Emits records as structured tracing events on the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record_decision(&self, record: &DecisionRecord) {
        tracing::info!(
            target: "audit",
            case_id = %record.case_id,
            decision = %record.decision,
            rule = record.rule_matched.as_deref().unwrap_or("none"),
            confidence = record.confidence,
            urgency = %record.urgency,
            "Triage decision"
        );
    }

    fn record_nlu(&self, record: &NluRecord) {
        tracing::info!(
            target: "audit",
            input_chars = record.input_chars,
            fingerprint = %record.input_fingerprint,
            detected = record.detected_count,
            confidence = record.confidence,
            method = record.method.as_str(),
            "NLU parse"
        );
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    decisions: Mutex<Vec<DecisionRecord>>,
    nlu: Mutex<Vec<NluRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<DecisionRecord> {
        self.decisions.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn nlu_records(&self) -> Vec<NluRecord> {
        self.nlu.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_decision(&self, record: &DecisionRecord) {
        if let Ok(mut decisions) = self.decisions.lock() {
            decisions.push(record.clone());
        }
    }

    fn record_nlu(&self, record: &NluRecord) {
        if let Ok(mut nlu) = self.nlu.lock() {
            nlu.push(record.clone());
        }
    }
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record_decision(&self, record: &DecisionRecord) {
        (**self).record_decision(record)
    }

    fn record_nlu(&self, record: &NluRecord) {
        (**self).record_nlu(record)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;
    use crate::models::ImagingExam;
    use crate::nlu::HybridNlu;

    #[test]
    fn decision_joins_exams() {
        let rec = ImagingRecommendation::new(
            vec![ImagingExam::ScannerSansInjection, ImagingExam::PonctionLombaire],
            Urgency::Immediate,
            "HSA",
        )
        .unwrap()
        .with_rule_id("HSA_001");
        let record = DecisionRecord::new(Uuid::new_v4(), &rec, 0.9).with_extra("turns", 2);
        assert_eq!(
            record.decision,
            "scanner_cerebral_sans_injection+ponction_lombaire"
        );
        assert_eq!(record.rule_matched.as_deref(), Some("HSA_001"));
        assert_eq!(record.extra["turns"], 2);
    }

    #[test]
    fn empty_imaging_is_no_imaging() {
        let rec = ImagingRecommendation::new(vec![], Urgency::None, "RAS").unwrap();
        let record = DecisionRecord::new(Uuid::new_v4(), &rec, 0.5);
        assert_eq!(record.decision, "no_imaging");
        assert!(record.rule_matched.is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("céphalée", 3), "cép...");
        assert_eq!(preview("court", 50), "court");
    }

    #[test]
    fn nlu_record_summarizes_metadata() {
        let nlu = HybridNlu::rules_only(&TriageConfig::default());
        let text = "Patient de 45 ans, céphalée brutale en coup de tonnerre avec fièvre à 39";
        let (_, meta) = nlu.parse(text);
        let record = NluRecord::from_metadata(text, &meta);
        assert!(record.input_preview.ends_with("..."));
        assert_eq!(record.input_chars, text.chars().count());
        assert_eq!(record.input_fingerprint.len(), 16);
        assert!(record.detected_count >= 3);
        assert_eq!(record.method, NluMethod::Rules);
    }

    #[test]
    fn memory_sink_keeps_records() {
        let sink = MemoryAuditSink::new();
        let rec = ImagingRecommendation::new(vec![], Urgency::None, "RAS").unwrap();
        sink.record_decision(&DecisionRecord::new(Uuid::new_v4(), &rec, 0.4));
        assert_eq!(sink.decisions().len(), 1);
        assert!(sink.nlu_records().is_empty());
    }

    // ── Log hygiene ──────────────────────────────────────────

    /// Variables holding patient text; none may reach a tracing macro.
    const RAW_TEXT_PATTERNS: &[&str] = &[
        "original_text",
        "user_text",
        "raw_text",
        "corrected_text",
        "normalized_text",
        "input_preview",
        "matched_term",
    ];

    #[test]
    fn no_patient_text_in_tracing_calls() {
        let src_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
        let mut violations = Vec::new();
        scan_directory(&src_dir, &mut violations);
        assert!(
            violations.is_empty(),
            "patient text reaches tracing calls:\n{}",
            violations.join("\n")
        );
    }

    #[test]
    fn scanner_flags_interpolated_text() {
        let call = r#"tracing::info!(text = %meta.original_text, "parsed");"#;
        assert!(RAW_TEXT_PATTERNS.iter().any(|p| call.contains(p)));
        let clean = r#"tracing::info!(fields = meta.detected_fields.len(), "parsed");"#;
        assert!(!RAW_TEXT_PATTERNS.iter().any(|p| clean.contains(p)));
    }

    fn scan_directory(dir: &std::path::Path, violations: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                scan_directory(&path, violations);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                scan_file(&path, violations);
            }
        }
    }

    fn scan_file(path: &std::path::Path, violations: &mut Vec<String>) {
        let Ok(content) = std::fs::read_to_string(path) else {
            return;
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();
            let is_tracing = ["info!", "warn!", "error!", "debug!", "trace!"]
                .iter()
                .any(|m| trimmed.starts_with(&format!("tracing::{m}")));
            if !is_tracing {
                i += 1;
                continue;
            }

            let mut call = trimmed.to_string();
            let mut depth: i32 = paren_delta(trimmed);
            let mut j = i + 1;
            while depth > 0 && j < lines.len() {
                let next = lines[j].trim();
                call.push(' ');
                call.push_str(next);
                depth += paren_delta(next);
                j += 1;
            }

            for pattern in RAW_TEXT_PATTERNS {
                if call.contains(pattern) {
                    violations.push(format!("{}:{}: {pattern}", path.display(), i + 1));
                }
            }
            i = j;
        }
    }

    fn paren_delta(line: &str) -> i32 {
        line.chars().fold(0, |d, c| match c {
            '(' => d + 1,
            ')' => d - 1,
            _ => d,
        })
    }
}
