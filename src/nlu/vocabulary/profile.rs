//! Multi-class descriptors: onset pattern, headache characteristic
//! profile, location and visual disturbance.

use std::sync::LazyLock;

use super::{ClassVocabulary, CountVocabulary, DetectionResult, TermGroup, TermSet};
use crate::models::{HeadacheLocation, HeadacheProfile, Onset, VisualDisturbance};

// ═══════════════════════════════════════════════════════════
// Onset
// ═══════════════════════════════════════════════════════════

static ONSET: LazyLock<ClassVocabulary<Onset>> = LazyLock::new(|| ClassVocabulary {
    classes: vec![
        (
            Onset::Thunderclap,
            0.95,
            vec![
                TermGroup::new("canonical", &["coup de tonnerre", "thunderclap"], 1.0),
                TermGroup::new(
                    "phrases",
                    &[
                        "en quelques secondes",
                        "en une seconde",
                        "d'un coup",
                        "d'un seul coup",
                        "pire douleur de ma vie",
                        "pire douleur de sa vie",
                        "pire mal de tête de ma vie",
                        "pire mal de tête de sa vie",
                        "pire céphalée de sa vie",
                        "pire céphalée de ma vie",
                        "maximale d'emblée",
                        "d'emblée maximale",
                    ],
                    1.0,
                ),
                TermGroup::new(
                    "medical_terms",
                    &[
                        "hsa suspectée",
                        "suspicion d'hsa",
                        "hémorragie sous-arachnoïdienne",
                        "hémorragie méningée",
                    ],
                    0.98,
                ),
                TermGroup::acronyms("acronyms", &["cdt"], 0.95),
                TermGroup::new(
                    "synonyms",
                    &[
                        "début brutal",
                        "installation brutale",
                        "d'apparition brutale",
                        "brutale",
                        "brutal",
                        "soudaine",
                        "soudain",
                        "instantanée",
                        "instantané",
                        "foudroyante",
                        "foudroyant",
                        "explosive",
                    ],
                    0.90,
                )
                .guarded(),
            ],
        ),
        (
            Onset::Progressive,
            0.85,
            vec![
                TermGroup::new(
                    "canonical",
                    &["progressive", "progressif", "installation progressive"],
                    1.0,
                )
                .guarded(),
                TermGroup::new(
                    "synonyms",
                    &[
                        "progressivement",
                        "qui augmente",
                        "en quelques heures",
                        "en quelques jours",
                        "de plus en plus",
                        "s'installe lentement",
                        "graduelle",
                        "graduellement",
                        "insidieuse",
                        "insidieux",
                    ],
                    1.0,
                ),
            ],
        ),
        (
            Onset::Chronic,
            0.90,
            vec![
                TermGroup::new(
                    "medical_terms",
                    &["céphalée chronique quotidienne", "céphalées chroniques quotidiennes", "ccq"],
                    1.0,
                ),
                TermGroup::new("canonical", &["chronique", "chroniques"], 1.0),
                TermGroup::new(
                    "synonyms",
                    &[
                        "permanente",
                        "quotidienne",
                        "quotidiennes",
                        "de longue date",
                        "depuis longtemps",
                        "depuis des mois",
                        "depuis des années",
                        "tous les jours",
                        "chaque jour",
                    ],
                    1.0,
                ),
            ],
        ),
    ],
});

pub fn detect_onset(normalized: &str) -> DetectionResult<Onset> {
    ONSET.detect(normalized)
}

// ═══════════════════════════════════════════════════════════
// Headache characteristic profile
// ═══════════════════════════════════════════════════════════

// Tie-break order: cluster, then migraine, then tension.
static HEADACHE_PROFILE: LazyLock<CountVocabulary<HeadacheProfile>> = LazyLock::new(|| {
    CountVocabulary {
        classes: vec![
            (
                HeadacheProfile::ClusterLike,
                0.85,
                TermSet::new(
                    &[
                        "algie vasculaire de la face",
                        "avf",
                        "cluster",
                        "périorbitaire",
                        "péri-orbitaire",
                        "autour de l'œil",
                        "autour de l'oeil",
                        "derrière l'œil",
                        "derrière l'oeil",
                        "en salves",
                        "atroce",
                        "insupportable",
                        "larmoiement",
                        "œil rouge",
                        "oeil rouge",
                        "rhinorrhée",
                        "ptosis",
                        "myosis",
                        "même heure",
                        "à heure fixe",
                        "plusieurs fois par jour",
                    ],
                    false,
                ),
            ),
            (
                HeadacheProfile::MigraineLike,
                0.85,
                TermSet::new(
                    &[
                        "migraine",
                        "migraineuse",
                        "migraineux",
                        "unilatérale",
                        "unilatéral",
                        "hémicrânienne",
                        "hémicrânien",
                        "d'un côté",
                        "pulsatile",
                        "battante",
                        "lancinante",
                        "qui bat",
                        "photophobie",
                        "phonophobie",
                        "photo+",
                        "phono+",
                        "nausées",
                        "nausée",
                        "vomissements",
                        "vomissement",
                        "n/v",
                        "nv",
                        "aggravée à l'effort",
                        "aggravation à l'effort",
                    ],
                    false,
                ),
            ),
            (
                HeadacheProfile::TensionLike,
                0.80,
                TermSet::new(
                    &[
                        "céphalée de tension",
                        "céphalées de tension",
                        "tension",
                        "bilatérale",
                        "bilatéral",
                        "des deux côtés",
                        "en casque",
                        "en pression",
                        "étau",
                        "serrement",
                        "en bandeau",
                        "constrictive",
                        "sans nausées",
                        "pas de nausées",
                        "pas de photophobie",
                        "sans photophobie",
                        "ø photo",
                    ],
                    false,
                ),
            ),
        ],
    }
});

/// Highest match count wins; ties resolve by the order above.
pub fn detect_headache_profile(normalized: &str) -> DetectionResult<HeadacheProfile> {
    HEADACHE_PROFILE.detect(normalized)
}

// ═══════════════════════════════════════════════════════════
// Location
// ═══════════════════════════════════════════════════════════

static LOCATION: LazyLock<CountVocabulary<HeadacheLocation>> = LazyLock::new(|| {
    CountVocabulary {
        classes: vec![
            (
                HeadacheLocation::Unilateral,
                0.85,
                TermSet::new(
                    &[
                        "unilatérale",
                        "unilatéral",
                        "hémicrânie",
                        "d'un côté",
                        "d'un seul côté",
                        "côté droit",
                        "côté gauche",
                        "à droite",
                        "à gauche",
                    ],
                    false,
                ),
            ),
            (
                HeadacheLocation::Temporal,
                0.80,
                TermSet::new(&["temporale", "temporal", "tempe", "tempes"], true),
            ),
            (
                HeadacheLocation::Occipital,
                0.80,
                TermSet::new(
                    &["occipitale", "occipital", "arrière de la tête", "derrière la tête"],
                    false,
                ),
            ),
            (
                HeadacheLocation::Frontal,
                0.80,
                TermSet::new(&["frontale", "frontal", "front"], true),
            ),
            (
                HeadacheLocation::Diffuse,
                0.75,
                TermSet::new(
                    &["diffuse", "généralisée", "partout", "toute la tête", "holocrânienne"],
                    false,
                ),
            ),
        ],
    }
});

pub fn detect_location(normalized: &str) -> DetectionResult<HeadacheLocation> {
    LOCATION.detect(normalized)
}

// ═══════════════════════════════════════════════════════════
// Visual disturbance
// ═══════════════════════════════════════════════════════════

static VISUAL: LazyLock<CountVocabulary<VisualDisturbance>> = LazyLock::new(|| {
    CountVocabulary {
        classes: vec![
            (
                VisualDisturbance::Blindness,
                0.90,
                TermSet::new(
                    &[
                        "cécité",
                        "perte de vision",
                        "perte de la vision",
                        "perte de vue",
                        "amaurose",
                        "ne voit plus",
                        "baisse brutale de l'acuité visuelle",
                    ],
                    false,
                ),
            ),
            (
                VisualDisturbance::Stroboscopic,
                0.85,
                TermSet::new(
                    &[
                        "scotome scintillant",
                        "aura visuelle",
                        "phosphènes",
                        "zigzags lumineux",
                        "zigzags",
                        "lumières clignotantes",
                        "taches lumineuses",
                    ],
                    false,
                ),
            ),
            (
                VisualDisturbance::Blur,
                0.80,
                TermSet::new(
                    &[
                        "vision floue",
                        "flou visuel",
                        "voit flou",
                        "vue trouble",
                        "vision trouble",
                        "vue brouillée",
                    ],
                    false,
                ),
            ),
            (
                VisualDisturbance::None,
                0.75,
                TermSet::new(
                    &[
                        "pas de troubles visuels",
                        "pas de trouble visuel",
                        "sans troubles visuels",
                        "sans trouble visuel",
                        "pas de vision floue",
                        "vision normale",
                        "vue normale",
                    ],
                    false,
                ),
            ),
        ],
    }
});

pub fn detect_visual_disturbance(normalized: &str) -> DetectionResult<VisualDisturbance> {
    VISUAL.detect(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    #[test]
    fn migraine_profile_from_four_criteria() {
        let r = detect_headache_profile(&normalize(
            "céphalée unilatérale pulsatile avec photophobie et phonophobie",
        ));
        assert_eq!(r.value, Some(HeadacheProfile::MigraineLike));
        assert_eq!(r.confidence, 0.85);
        assert_eq!(r.metadata.get("match_count"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn tension_profile_from_band_description() {
        let r = detect_headache_profile(&normalize("douleur bilatérale en étau, sans nausées"));
        assert_eq!(r.value, Some(HeadacheProfile::TensionLike));
        assert_eq!(r.confidence, 0.80);
    }

    #[test]
    fn profile_tie_prefers_cluster() {
        let r = detect_headache_profile(&normalize("larmoiement et nausées"));
        assert_eq!(r.value, Some(HeadacheProfile::ClusterLike));
    }

    #[test]
    fn negated_migraine_symptom_not_counted() {
        let r = detect_headache_profile(&normalize("pas de photophobie"));
        assert_eq!(r.value, Some(HeadacheProfile::TensionLike));
    }

    #[test]
    fn thunderclap_phrase() {
        let r = detect_onset(&normalize("Pire douleur de ma vie"));
        assert_eq!(r.value, Some(Onset::Thunderclap));
        assert_eq!(r.confidence, 0.95);
    }

    #[test]
    fn brutal_synonym_lower_confidence() {
        let r = detect_onset(&normalize("céphalée brutale"));
        assert_eq!(r.value, Some(Onset::Thunderclap));
        assert!((r.confidence - 0.855).abs() < 1e-9);
    }

    #[test]
    fn negated_brutal_not_thunderclap() {
        let r = detect_onset(&normalize("début non brutal, progressif"));
        assert_eq!(r.value, Some(Onset::Progressive));
    }

    #[test]
    fn chronic_daily_headache() {
        let r = detect_onset(&normalize("CCQ depuis des années"));
        assert_eq!(r.value, Some(Onset::Chronic));
    }

    #[test]
    fn location_temporal() {
        let r = detect_location(&normalize("douleur de la tempe droite"));
        assert_eq!(r.value, Some(HeadacheLocation::Temporal));
    }

    #[test]
    fn visual_blindness_outranks_blur_on_tie() {
        let r = detect_visual_disturbance(&normalize("vision floue puis ne voit plus"));
        assert_eq!(r.value, Some(VisualDisturbance::Blindness));
    }

    #[test]
    fn visual_none() {
        let r = detect_visual_disturbance(&normalize("pas de troubles visuels"));
        assert_eq!(r.value, Some(VisualDisturbance::None));
    }
}
