//! User-facing French messages.

use crate::models::{HeadacheCase, ImagingRecommendation, Urgency};
use crate::nlu::embedding::{SpecialPattern, SpecialPatternKind};

pub const ACKNOWLEDGMENT: &str = "D'accord, j'ai bien noté. ";

pub const DETAIL_REQUEST: &str = "Pouvez-vous décrire la céphalée plus en détail ? \
    Par exemple : comment elle a commencé, depuis combien de temps, son intensité, \
    et les signes associés (fièvre, raideur de nuque, troubles neurologiques).";

pub const DISCLAIMER: &str = "Outil d'aide à la décision. Évaluation clinique du médecin \
    primordiale. En cas de doute, avis spécialisé recommandé.";

const SAFETY_AGE_THRESHOLD: u8 = 50;

pub fn clarification(acknowledge: bool, question: &str) -> String {
    if acknowledge {
        format!("{ACKNOWLEDGMENT}{question}")
    } else {
        question.to_string()
    }
}

fn header(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Immediate => "URGENCE MÉDICALE DÉTECTÉE",
        Urgency::Urgent => "Consultation urgente recommandée",
        Urgency::Routine => "Évaluation médicale recommandée",
        Urgency::None => "Évaluation complétée",
    }
}

fn footer(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Immediate => "Adresser le patient aux urgences immédiatement.",
        Urgency::Urgent => "Consultation médicale dans les plus brefs délais (< 24h).",
        Urgency::Routine => "Prévoir consultation avec médecin traitant.",
        Urgency::None => "Surveillance clinique. Consulter si aggravation.",
    }
}

/// Final recommendation text: header, comment, semantic hints, exams,
/// urgency footer and disclaimer.
pub fn final_message(recommendation: &ImagingRecommendation, patterns: &[SpecialPattern]) -> String {
    let mut out = String::new();
    out.push_str(header(recommendation.urgency));
    out.push_str("\n\n");
    out.push_str(&recommendation.comment);
    out.push_str("\n\n");

    if !patterns.is_empty() {
        out.push_str("Diagnostic différentiel suggéré (via analyse sémantique):\n");
        for pattern in patterns {
            out.push_str(&format!(
                "  - {} (similarité: {:.2})\n",
                pattern.description, pattern.similarity
            ));
            match pattern.kind {
                SpecialPatternKind::Neuralgia if !pattern.imaging_recommendation.is_empty() => {
                    out.push_str(&format!(
                        "    → IRM recommandée: {}\n",
                        pattern.imaging_recommendation.replace('_', " ")
                    ));
                }
                SpecialPatternKind::ChronicDailyHeadache => {
                    if let Some(note) = &pattern.note {
                        out.push_str(&format!("    → {note}\n"));
                    }
                }
                _ => {}
            }
        }
        out.push('\n');
    }

    if recommendation.requires_imaging() {
        out.push_str("Examens recommandés:\n");
        for exam in &recommendation.imaging {
            out.push_str(&format!("  - {}\n", exam.label()));
        }
        out.push('\n');
    } else {
        out.push_str("Aucun examen d'imagerie n'est nécessaire.\n\n");
    }

    out.push_str(footer(recommendation.urgency));
    out.push_str("\n\n---\n");
    out.push_str(DISCLAIMER);
    out
}

/// Recommendation given when the description stays too thin to triage.
/// Pregnancy and age over 50 raise it to urgent.
pub fn safety_recommendation(case: &HeadacheCase) -> ImagingRecommendation {
    let (urgency, id, comment) = if case.pregnancy_postpartum == Some(true) {
        (
            Urgency::Urgent,
            "SAFETY_PREGNANCY",
            "Céphalée chez une patiente enceinte ou en post-partum, description clinique \
             insuffisante. Avis médical rapide pour rechercher une pré-éclampsie ou une \
             thrombose veineuse cérébrale (mesure de la pression artérielle).",
        )
    } else if case.age.is_some_and(|a| a > SAFETY_AGE_THRESHOLD) {
        (
            Urgency::Urgent,
            "SAFETY_AGE50",
            "Céphalée chez un patient de plus de 50 ans, description clinique insuffisante. \
             Une céphalée nouvelle après 50 ans impose un examen médical rapide \
             (maladie de Horton, cause secondaire).",
        )
    } else {
        (
            Urgency::Routine,
            "SAFETY_GENERIC",
            "Description clinique insuffisante pour orienter l'imagerie. Examen médical \
             recommandé. Consulter en urgence en cas de céphalée brutale, fièvre, raideur de \
             nuque, déficit neurologique ou crise convulsive.",
        )
    };
    ImagingRecommendation {
        imaging: Vec::new(),
        urgency,
        comment: comment.to_string(),
        applied_rule_id: Some(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImagingExam, Sex};

    #[test]
    fn clarification_acknowledges_new_information() {
        assert_eq!(clarification(false, "Fièvre ?"), "Fièvre ?");
        assert_eq!(
            clarification(true, "Fièvre ?"),
            "D'accord, j'ai bien noté. Fièvre ?"
        );
    }

    #[test]
    fn emergency_message_layout() {
        let rec = ImagingRecommendation::new(
            vec![ImagingExam::ScannerSansInjection, ImagingExam::PonctionLombaire],
            Urgency::Immediate,
            "Suspicion d'hémorragie méningée.",
        )
        .unwrap();
        let msg = final_message(&rec, &[]);
        assert!(msg.starts_with("URGENCE MÉDICALE DÉTECTÉE"));
        assert!(msg.contains("Examens recommandés:\n  - scanner cerebral sans injection"));
        assert!(msg.contains("aux urgences immédiatement"));
        assert!(msg.ends_with(DISCLAIMER));
    }

    #[test]
    fn no_imaging_message() {
        let rec = ImagingRecommendation::new(vec![], Urgency::None, "Migraine typique.").unwrap();
        let msg = final_message(&rec, &[]);
        assert!(msg.starts_with("Évaluation complétée"));
        assert!(msg.contains("Aucun examen d'imagerie n'est nécessaire."));
        assert!(msg.contains("Surveillance clinique"));
    }

    #[test]
    fn special_patterns_are_listed() {
        let rec = ImagingRecommendation::new(vec![], Urgency::Routine, "Bilan.").unwrap();
        let patterns = vec![SpecialPattern {
            kind: SpecialPatternKind::Neuralgia,
            description: "Névralgie du trijumeau".into(),
            similarity: 0.81,
            imaging_recommendation: "irm_cerebrale".into(),
            note: None,
        }];
        let msg = final_message(&rec, &patterns);
        assert!(msg.contains("Névralgie du trijumeau (similarité: 0.81)"));
        assert!(msg.contains("IRM recommandée: irm cerebrale"));
    }

    #[test]
    fn safety_recommendation_by_population() {
        let pregnant = HeadacheCase {
            sex: Sex::Female,
            pregnancy_postpartum: Some(true),
            ..Default::default()
        };
        let older = HeadacheCase {
            age: Some(67),
            ..Default::default()
        };
        assert_eq!(
            safety_recommendation(&pregnant).applied_rule_id.as_deref(),
            Some("SAFETY_PREGNANCY")
        );
        assert_eq!(safety_recommendation(&older).urgency, Urgency::Urgent);
        let generic = safety_recommendation(&HeadacheCase::default());
        assert_eq!(generic.urgency, Urgency::Routine);
        assert!(generic.imaging.is_empty());
    }
}
