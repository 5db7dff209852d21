//! Annotated example phrasings used for semantic voting.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::EmbeddingError;
use crate::models::{CaseField, FieldValue};

const DEFAULT_CORPUS: &str = include_str!("../../../resources/corpus/medical_examples.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    /// Clinical label, e.g. "HSA classique".
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub imaging: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExample {
    text: String,
    #[serde(default)]
    annotations: Annotations,
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    version: Option<String>,
    examples: Vec<RawExample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorpusExample {
    pub text: String,
    pub annotations: Annotations,
    pub fields: Vec<(CaseField, FieldValue)>,
}

impl CorpusExample {
    pub fn value(&self, field: CaseField) -> Option<&FieldValue> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct Corpus {
    pub version: Option<String>,
    pub examples: Vec<CorpusExample>,
}

impl Corpus {
    /// The compiled-in example set.
    pub fn builtin() -> Result<Self, EmbeddingError> {
        Self::from_json_str(DEFAULT_CORPUS)
    }

    /// Parse `{version, examples: [{text, annotations, <field>: <value>...}]}`.
    /// Keys that are not case fields are ignored.
    pub fn from_json_str(json: &str) -> Result<Self, EmbeddingError> {
        let file: CorpusFile = serde_json::from_str(json)?;
        if file.examples.is_empty() {
            return Err(EmbeddingError::EmptyCorpus);
        }

        let examples = file
            .examples
            .into_iter()
            .map(|raw| {
                let fields = raw
                    .fields
                    .into_iter()
                    .filter_map(|(key, value)| {
                        let field = CaseField::from_str(&key).ok()?;
                        let value = serde_json::from_value::<FieldValue>(value).ok()?;
                        Some((field, value))
                    })
                    .collect();
                CorpusExample {
                    text: raw.text,
                    annotations: raw.annotations,
                    fields,
                }
            })
            .collect();

        Ok(Self {
            version: file.version,
            examples,
        })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_corpus_loads() {
        let corpus = Corpus::builtin().unwrap();
        assert!(corpus.len() >= 80, "only {} examples", corpus.len());
        let first = &corpus.examples[0];
        assert_eq!(first.value(CaseField::Onset), Some(&FieldValue::text("thunderclap")));
        assert_eq!(first.annotations.source, "HSA classique");
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let corpus = Corpus::from_json_str(
            r#"{"examples": [{"text": "x", "frequency_high": true, "fever": true}]}"#,
        )
        .unwrap();
        assert_eq!(corpus.examples[0].fields, vec![(CaseField::Fever, FieldValue::Bool(true))]);
    }

    #[test]
    fn empty_corpus_rejected() {
        assert!(matches!(
            Corpus::from_json_str(r#"{"examples": []}"#),
            Err(EmbeddingError::EmptyCorpus)
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            Corpus::from_json_str("{"),
            Err(EmbeddingError::Corpus(_))
        ));
    }
}
