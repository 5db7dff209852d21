//! Clarification questions and interpretation of short answers.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{CaseField, FieldValue, HeadacheCase, Profile, Sex};
use crate::nlu::extractors::{extract_duration_hours, extract_profile, profile_for_hours};
use crate::nlu::normalize::normalize;
use crate::nlu::vocabulary::{detect_headache_profile, detect_onset};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Question {
    pub field: CaseField,
    /// Higher is asked first.
    pub priority: u8,
    pub text: &'static str,
}

/// Every question the dialogue may ask, highest priority first.
pub static QUESTIONS: &[Question] = &[
    Question {
        field: CaseField::Onset,
        priority: 100,
        text: "Comment la douleur a-t-elle débuté ? Soudainement comme un coup de tonnerre, \
               progressivement, ou s'agit-il d'une douleur chronique ?",
    },
    Question {
        field: CaseField::Fever,
        priority: 95,
        text: "Le patient a-t-il de la fièvre ?",
    },
    Question {
        field: CaseField::MeningealSigns,
        priority: 94,
        text: "Le patient présente-t-il une raideur de la nuque (difficulté ou douleur à plier \
               la tête vers l'avant) ?",
    },
    Question {
        field: CaseField::Intensity,
        priority: 90,
        text: "Sur une échelle de 0 à 10, quelle est l'intensité de la douleur ?",
    },
    Question {
        field: CaseField::HticPattern,
        priority: 85,
        text: "La douleur est-elle pire le matin au réveil ? Y a-t-il des vomissements en jet \
               ou une aggravation à la toux ou à l'effort ?",
    },
    Question {
        field: CaseField::NeuroDeficit,
        priority: 84,
        text: "Le patient présente-t-il une faiblesse musculaire, des troubles de la parole \
               ou des troubles visuels ?",
    },
    Question {
        field: CaseField::Seizure,
        priority: 80,
        text: "Le patient a-t-il eu une crise d'épilepsie ou des convulsions ?",
    },
    Question {
        field: CaseField::Profile,
        priority: 70,
        text: "Depuis combien de temps dure cette céphalée ? Quelques heures ou jours, \
               plusieurs semaines, ou des mois ?",
    },
    Question {
        field: CaseField::RecentPatternChange,
        priority: 65,
        text: "Les céphalées habituelles ont-elles changé récemment (aggravation, nouveaux \
               symptômes, fréquence) ?",
    },
    Question {
        field: CaseField::PregnancyPostpartum,
        priority: 60,
        text: "La patiente est-elle enceinte ou a-t-elle accouché il y a moins de 6 semaines ?",
    },
    Question {
        field: CaseField::Trauma,
        priority: 55,
        text: "Le patient a-t-il eu un traumatisme crânien récent ?",
    },
    Question {
        field: CaseField::RecentPl,
        priority: 52,
        text: "Le patient a-t-il eu une ponction lombaire ou une péridurale récemment ?",
    },
    Question {
        field: CaseField::Immunosuppression,
        priority: 50,
        text: "Le patient est-il immunodéprimé (VIH, chimiothérapie, corticothérapie au long \
               cours, greffe) ?",
    },
    Question {
        field: CaseField::HeadacheProfile,
        priority: 30,
        text: "Pouvez-vous décrire la douleur ? Unilatérale ou bilatérale, pulsatile ou en étau, \
               avec nausées, photophobie ?",
    },
    Question {
        field: CaseField::Duration,
        priority: 20,
        text: "Depuis combien de temps exactement dure l'épisode actuel (en heures ou en jours) ?",
    },
];

pub fn question_for(field: CaseField) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.field == field)
}

fn applies_to(field: CaseField, case: &HeadacheCase) -> bool {
    match field {
        CaseField::PregnancyPostpartum => case.sex != Sex::Male,
        CaseField::RecentPatternChange => case.profile == Profile::Chronic,
        _ => true,
    }
}

/// Criterion set for the current case: the question fields that apply.
pub fn target_fields(case: &HeadacheCase) -> Vec<CaseField> {
    QUESTIONS
        .iter()
        .map(|q| q.field)
        .filter(|f| applies_to(*f, case))
        .collect()
}

/// Highest-priority applicable question whose field is unset and which has
/// not been asked yet. A chronic case is asked about pattern change first.
pub fn next_question(case: &HeadacheCase, asked: &[CaseField]) -> Option<&'static Question> {
    let open = |q: &&Question| {
        applies_to(q.field, case) && !case.is_set(q.field) && !asked.contains(&q.field)
    };

    if case.profile == Profile::Chronic {
        if let Some(q) = question_for(CaseField::RecentPatternChange).filter(open) {
            return Some(q);
        }
    }
    QUESTIONS.iter().find(open)
}

// ═══════════════════════════════════════════════════════════
// Answer interpretation
// ═══════════════════════════════════════════════════════════

static YES: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\b(?:oui|yes|absolument|effectivement|affirmatif|tout a fait|present|presente)\b")
        .ok()
});

static NO: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:non|no|aucun|aucune|jamais|nie|negatif|negative|absent|absente|pas du tout|pas vraiment)\b",
    )
    .ok()
});

static UNSURE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:ne sai[st] pas|sai[st] pas|je ne sais|j'en sais rien|aucune idee|incertaine?|peut[- ]?etre|pas sure?|difficile a dire)\b",
    )
    .ok()
});

static FIRST_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})(?:[.,]\d+)?\b").ok());

fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

/// Read a direct answer to the question about `field`. `None` when the text
/// does not answer it; the caller then relies on the full NLU parse.
pub fn interpret_answer(field: CaseField, text: &str) -> Option<FieldValue> {
    let normalized = normalize(text);

    if field.is_boolean() {
        if is_match(&UNSURE, &normalized) {
            return None;
        }
        // "oui, ... aucune raideur": the negation may be about another sign
        return match (is_match(&YES, &normalized), is_match(&NO, &normalized)) {
            (true, false) => Some(FieldValue::Bool(true)),
            (false, true) => Some(FieldValue::Bool(false)),
            _ => None,
        };
    }

    match field {
        CaseField::Intensity => {
            let caps = FIRST_NUMBER.as_ref()?.captures(&normalized)?;
            let n: i64 = caps.get(1)?.as_str().parse().ok()?;
            (0..=10).contains(&n).then_some(FieldValue::Int(n))
        }
        CaseField::Duration => {
            if let Some(hours) = extract_duration_hours(&normalized).detected_value() {
                return Some(FieldValue::Float(*hours));
            }
            // A bare number answers "en heures"
            let caps = FIRST_NUMBER.as_ref()?.captures(&normalized)?;
            let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
            (normalized.split_whitespace().count() <= 2).then_some(FieldValue::Float(hours))
        }
        CaseField::Onset => detect_onset(&normalized)
            .detected_value()
            .map(|o| FieldValue::text(o.as_str())),
        CaseField::Profile => {
            if let Some(p) = extract_profile(&normalized).detected_value() {
                return Some(FieldValue::text(p.as_str()));
            }
            extract_duration_hours(&normalized)
                .detected_value()
                .map(|h| FieldValue::text(profile_for_hours(*h).as_str()))
        }
        CaseField::HeadacheProfile => detect_headache_profile(&normalized)
            .detected_value()
            .map(|p| FieldValue::text(p.as_str())),
        _ => None,
    }
}
