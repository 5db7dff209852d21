//! Patient-specific adjustments applied after a rule has been selected.
//! Urgency and rule id are never changed here; only the exam list and the
//! comment are.

use crate::models::{HeadacheCase, ImagingExam, ImagingRecommendation, Sex};

const PREGNANCY_TEST_AGE_LIMIT: u8 = 50;
const CREATININE_AGE_THRESHOLD: u8 = 60;

/// Adapt a recommendation to the patient: pregnancy swaps ionizing exams
/// for MRI, and each exam family appends its safety checks.
pub fn adapt(case: &HeadacheCase, recommendation: ImagingRecommendation) -> ImagingRecommendation {
    let mut imaging = recommendation.imaging.clone();
    let mut precautions: Vec<String> = Vec::new();
    let mut contraindications: Vec<String> = Vec::new();

    let pregnant = case.pregnancy_postpartum == Some(true);
    if pregnant {
        let had_scanner = imaging.iter().any(ImagingExam::is_scanner);
        imaging = replace_scanners_with_mri(&imaging);
        if !imaging.contains(&ImagingExam::AngioIrmVeineuse) {
            imaging.push(ImagingExam::AngioIrmVeineuse);
        }

        precautions.push("PATIENTE ENCEINTE:".into());
        if had_scanner {
            precautions.push("- Scanner remplacé par IRM (éviter les radiations)".into());
            contraindications.push("- Scanner contre-indiqué si grossesse < 2-4 semaines".into());
        }
        if case.pregnancy_trimester == Some(1) {
            contraindications.push(
                "- Premier trimestre: IRM à discuter, privilégier le scanner si urgence vitale"
                    .into(),
            );
        } else if imaging.iter().any(ImagingExam::is_mri) {
            contraindications
                .push("- IRM contre-indiquée si grossesse < 3 mois (privilégier scanner si urgence)".into());
        }
        if imaging.contains(&ImagingExam::IrmGadolinium) {
            contraindications.push("- Gadolinium à éviter pendant la grossesse".into());
        }
        precautions.push("- Risque de thrombose veineuse cérébrale augmenté".into());
    }

    let young_woman = case.sex == Sex::Female
        && case.age.map_or(true, |a| a < PREGNANCY_TEST_AGE_LIMIT);
    if !pregnant && young_woman && imaging.iter().any(ImagingExam::is_scanner) {
        precautions.push("FEMME < 50 ANS:".into());
        precautions.push("- Test de grossesse urinaire OBLIGATOIRE avant scanner".into());
        precautions.push("- Sauf si ménopause précoce confirmée".into());
    }

    if imaging.iter().any(ImagingExam::is_contrast_scanner) {
        precautions.push("SCANNER INJECTÉ:".into());
        if case.age.is_some_and(|a| a > CREATININE_AGE_THRESHOLD) {
            precautions.push("- Dosage créatinine OBLIGATOIRE (patient > 60 ans)".into());
        }
        precautions.push("- Vérifier l'absence d'allergie au produit de contraste iodé".into());
        precautions.push("- Allergie crustacés/Bétadine à préciser, ne contre-indique pas".into());
    }

    if let Some(mri) = imaging.iter().find(|e| e.is_mri()).copied() {
        precautions.push("IRM - VÉRIFICATIONS NÉCESSAIRES:".into());
        precautions.push("- Chirurgie récente < 6 semaines avec matériel: attendre ou urgence seulement".into());
        precautions.push("- Pace-maker: contacter le centre d'imagerie".into());
        precautions.push("- Valve cardiaque ou prothèse aortique: transmettre les références du matériel".into());
        precautions.push("- Claustrophobie: contacter le centre d'imagerie".into());
        if mri == ImagingExam::IrmGadolinium || imaging.contains(&ImagingExam::IrmGadolinium) {
            precautions.push("- IRM injectée: vérifier l'absence d'allergie au gadolinium".into());
        }
    }

    if precautions.is_empty() && contraindications.is_empty() && imaging == recommendation.imaging {
        return recommendation;
    }

    let mut comment = recommendation.comment;
    if !contraindications.is_empty() {
        comment.push_str("\n\nCONTRE-INDICATIONS:\n");
        comment.push_str(&contraindications.join("\n"));
    }
    if !precautions.is_empty() {
        comment.push_str("\n\nPRÉCAUTIONS ET VÉRIFICATIONS:\n");
        comment.push_str(&precautions.join("\n"));
    }

    tracing::debug!(
        rule_id = recommendation.applied_rule_id.as_deref().unwrap_or("none"),
        pregnant,
        notes = precautions.len() + contraindications.len(),
        "Recommendation adapted"
    );

    ImagingRecommendation {
        imaging,
        urgency: recommendation.urgency,
        comment,
        applied_rule_id: recommendation.applied_rule_id,
    }
}

/// Scanners become MRI; contrast-injected scanners become gadolinium MRI.
/// Order is kept and duplicates are dropped.
fn replace_scanners_with_mri(imaging: &[ImagingExam]) -> Vec<ImagingExam> {
    let mut out: Vec<ImagingExam> = Vec::with_capacity(imaging.len());
    for exam in imaging {
        let replaced = if exam.is_contrast_scanner() {
            ImagingExam::IrmGadolinium
        } else if exam.is_scanner() {
            ImagingExam::IrmCerebrale
        } else {
            *exam
        };
        if !out.contains(&replaced) {
            out.push(replaced);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Urgency;

    fn rec(exams: &[ImagingExam]) -> ImagingRecommendation {
        ImagingRecommendation::new(exams.to_vec(), Urgency::Urgent, "Base")
            .unwrap()
            .with_rule_id("T_001")
    }

    #[test]
    fn pregnancy_swaps_scanner_for_mri_and_adds_venous_angio() {
        let case = HeadacheCase {
            sex: Sex::Female,
            age: Some(30),
            pregnancy_postpartum: Some(true),
            ..Default::default()
        };
        let out = adapt(
            &case,
            rec(&[ImagingExam::ScannerSansInjection, ImagingExam::PonctionLombaire]),
        );
        assert_eq!(
            out.imaging,
            vec![
                ImagingExam::IrmCerebrale,
                ImagingExam::PonctionLombaire,
                ImagingExam::AngioIrmVeineuse
            ]
        );
        assert!(out.comment.starts_with("Base"));
        assert!(out.comment.contains("PATIENTE ENCEINTE"));
        assert!(out.comment.contains("CONTRE-INDICATIONS"));
        assert!(!out.comment.contains("Test de grossesse"));
        assert_eq!(out.urgency, Urgency::Urgent);
        assert_eq!(out.applied_rule_id.as_deref(), Some("T_001"));
    }

    #[test]
    fn pregnancy_does_not_duplicate_mri() {
        let case = HeadacheCase {
            pregnancy_postpartum: Some(true),
            ..Default::default()
        };
        let out = adapt(
            &case,
            rec(&[ImagingExam::ScannerSansInjection, ImagingExam::IrmCerebrale]),
        );
        assert_eq!(
            out.imaging,
            vec![ImagingExam::IrmCerebrale, ImagingExam::AngioIrmVeineuse]
        );
    }

    #[test]
    fn contrast_scanner_in_pregnancy_becomes_gadolinium_mri() {
        let case = HeadacheCase {
            pregnancy_postpartum: Some(true),
            pregnancy_trimester: Some(2),
            ..Default::default()
        };
        let out = adapt(&case, rec(&[ImagingExam::ScannerAvecInjection]));
        assert_eq!(out.imaging[0], ImagingExam::IrmGadolinium);
        assert!(out.comment.contains("Gadolinium"));
    }

    #[test]
    fn young_woman_needs_pregnancy_test_before_scanner() {
        let case = HeadacheCase {
            sex: Sex::Female,
            age: Some(35),
            ..Default::default()
        };
        let out = adapt(&case, rec(&[ImagingExam::ScannerSansInjection]));
        assert!(out.comment.contains("Test de grossesse"));
        assert_eq!(out.imaging, vec![ImagingExam::ScannerSansInjection]);
    }

    #[test]
    fn older_contrast_scanner_patient_needs_creatinine() {
        let case = HeadacheCase {
            sex: Sex::Male,
            age: Some(70),
            ..Default::default()
        };
        let out = adapt(&case, rec(&[ImagingExam::ScannerAvecInjection]));
        assert!(out.comment.contains("créatinine"));
        assert!(out.comment.contains("contraste iodé"));
        assert!(!out.comment.contains("Test de grossesse"));
    }

    #[test]
    fn mri_gets_safety_checks() {
        let out = adapt(&HeadacheCase::default(), rec(&[ImagingExam::IrmCerebrale]));
        assert!(out.comment.contains("Pace-maker"));
        assert!(!out.comment.contains("gadolinium"));
    }

    #[test]
    fn no_imaging_is_left_untouched() {
        let original = rec(&[]);
        let out = adapt(&HeadacheCase::default(), original.clone());
        assert_eq!(out, original);
    }
}
