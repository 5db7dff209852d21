//! Boolean clinical concepts: fever, meningeal signs, HTIC, trauma,
//! neurological deficit, seizure, pregnancy, immunosuppression, cancer,
//! ENT and vascular findings, pattern change.

use std::sync::LazyLock;

use regex::Regex;

use super::{is_negated_at, BoolVocabulary, DetectionResult, DetectionSource, TermGroup, TermSet};

// ═══════════════════════════════════════════════════════════
// Fever
// ═══════════════════════════════════════════════════════════

const FEVER_BASE: f64 = 0.90;
const FEVER_NEGATION: f64 = 0.85;
const FEVER_NUMERIC: f64 = 0.95;
const AFEBRILE_NUMERIC: f64 = 0.90;
const FEVER_THRESHOLD_C: f64 = 38.0;
const HYPOTHERMIA_FLOOR_C: f64 = 35.0;

static FEVER_TERMS: LazyLock<TermSet> =
    LazyLock::new(|| TermSet::new(&["fièvre", "fébrile", "féb", "hyperthermie"], false));

static FEVER_NEGATIONS: LazyLock<TermSet> = LazyLock::new(|| {
    TermSet::new(
        &[
            "sans fièvre",
            "apyrétique",
            "apyrexie",
            "apyr",
            "pas de fièvre",
            "afébrile",
            "absence de fièvre",
            "pas fébrile",
            "non fébrile",
            "aucune fièvre",
            "nie toute fièvre",
            "nie la fièvre",
            "nie fièvre",
        ],
        false,
    )
});

static TEMPERATURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bt°?\s*(?:=\s*)?(\d{2}(?:[.,]\d+)?)",
        r"\b(\d{2})°(\d)\b",
        r"\b(\d{2}(?:[.,]\d+)?)°c?",
        r"temperature\s*(?:a\s*)?(\d{2}(?:[.,]\d+)?)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Temporal markers with their recency weight; the most recent statement wins.
static TEMPORAL_MARKERS: LazyLock<Vec<(Regex, u8)>> = LazyLock::new(|| {
    [
        (r"\bavant-hier\b|\bhier\b", 1),
        (r"\bil y a (?:plusieurs|quelques) jours\b", 1),
        (r"\bla semaine derniere\b|\ble mois dernier\b", 1),
        (r"\bce matin\b|\bcet apres-midi\b|\baujourd'hui\b", 10),
        (r"\bactuellement\b|\ben ce moment\b|\bmaintenant\b", 15),
        (r"\ba present\b|\ba l'heure actuelle\b", 15),
    ]
    .iter()
    .filter_map(|(p, w)| Regex::new(p).ok().map(|r| (r, *w)))
    .collect()
});

static CONTRAST_WORDS: LazyLock<TermSet> =
    LazyLock::new(|| TermSet::new(&["mais", "cependant", "toutefois"], true));

struct FeverMention {
    pos: usize,
    value: bool,
    confidence: f64,
    term: String,
    source: DetectionSource,
}

fn parse_temperature(caps: &regex::Captures<'_>) -> Option<f64> {
    let whole = caps.get(1)?.as_str().replace(',', ".");
    let value = match caps.get(2) {
        Some(decimal) => format!("{whole}.{}", decimal.as_str()),
        None => whole,
    };
    value.parse().ok()
}

fn temperature_mentions(text: &str) -> Vec<FeverMention> {
    let mut mentions = Vec::new();
    for pattern in TEMPERATURE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(t)) = (caps.get(0), parse_temperature(&caps)) else {
                continue;
            };
            let (value, confidence) = if t >= FEVER_THRESHOLD_C {
                (true, FEVER_NUMERIC)
            } else if t >= HYPOTHERMIA_FLOOR_C {
                (false, AFEBRILE_NUMERIC)
            } else {
                continue;
            };
            mentions.push(FeverMention {
                pos: whole.start(),
                value,
                confidence,
                term: whole.as_str().to_string(),
                source: DetectionSource::Pattern,
            });
        }
    }
    mentions
}

fn all_fever_mentions(text: &str) -> Vec<FeverMention> {
    let mut mentions: Vec<FeverMention> = FEVER_NEGATIONS
        .find_all(text)
        .into_iter()
        .map(|(pos, term)| FeverMention {
            pos,
            value: false,
            confidence: FEVER_NEGATION,
            term: term.to_string(),
            source: DetectionSource::NegationKeyword,
        })
        .collect();

    for (pos, term) in FEVER_TERMS.find_all(text) {
        let inside_negation = mentions
            .iter()
            .any(|m| !m.value && pos >= m.pos && pos < m.pos + m.term.len());
        if !inside_negation && !is_negated_at(text, pos) {
            mentions.push(FeverMention {
                pos,
                value: true,
                confidence: FEVER_BASE,
                term: term.to_string(),
                source: DetectionSource::Keyword,
            });
        }
    }
    mentions.extend(temperature_mentions(text));
    mentions
}

fn temporal_priority(text: &str, pos: usize) -> u8 {
    TEMPORAL_MARKERS
        .iter()
        .flat_map(|(re, weight)| re.find_iter(text).map(move |m| (m.start(), *weight)))
        .filter(|(start, _)| *start <= pos)
        .max_by_key(|(start, _)| *start)
        .map(|(_, weight)| weight)
        .unwrap_or(0)
}

fn is_temporal(text: &str) -> bool {
    CONTRAST_WORDS.is_match(text) || TEMPORAL_MARKERS.iter().any(|(re, _)| re.is_match(text))
}

fn mention_result(m: FeverMention) -> DetectionResult<bool> {
    DetectionResult::found(m.value, m.confidence, &m.term, m.source)
}

/// Fever with numeric temperature parsing. When the text contrasts
/// moments ("fébrile hier, apyrétique ce matin") the most recent wins.
pub fn detect_fever(normalized: &str) -> DetectionResult<bool> {
    if is_temporal(normalized) {
        let mut mentions = all_fever_mentions(normalized);
        mentions.sort_by_key(|m| (temporal_priority(normalized, m.pos), m.pos));
        if let Some(latest) = mentions.pop() {
            return mention_result(latest).with_meta("temporal_resolution", true);
        }
        return DetectionResult::not_detected();
    }

    if let Some((_, term)) = FEVER_NEGATIONS.find(normalized) {
        return DetectionResult::negative(FEVER_NEGATION, term);
    }
    let mut numeric = temperature_mentions(normalized);
    numeric.sort_by_key(|m| m.pos);
    if let Some(first) = numeric.into_iter().next() {
        return mention_result(first);
    }
    if let Some((_, term)) = FEVER_TERMS.find_unnegated(normalized) {
        return DetectionResult::found(true, FEVER_BASE, term, DetectionSource::Keyword);
    }
    DetectionResult::not_detected()
}

// ═══════════════════════════════════════════════════════════
// Red-flag vocabularies
// ═══════════════════════════════════════════════════════════

static MENINGEAL: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("meningeal", 0.95, 0.85)
        .negations(&[
            "sans signe méningé",
            "sans signes méningés",
            "pas de signe méningé",
            "pas de signes méningés",
            "pas de syndrome méningé",
            "sans syndrome méningé",
            "aucun signe méningé",
            "rdn-",
            "rdn nég",
            "rdn négatif",
            "kernig-",
            "brudzinski-",
            "sans raideur",
            "pas de raideur",
            "aucune raideur",
            "nuque souple",
            "kernig négatif",
            "brudzinski négatif",
        ])
        .group(TermGroup::new("acronyms", &["sdm", "rdn", "rdn+", "rdn++"], 1.0))
        .group(
            TermGroup::new(
                "clinical_signs",
                &[
                    "raideur nuque",
                    "raideur de la nuque",
                    "raideur de nuque",
                    "raideur méningée",
                    "kernig positif",
                    "kernig+",
                    "signe de kernig",
                    "brudzinski positif",
                    "brudzinski+",
                    "signe de brudzinski",
                    "nuque raide",
                    "chien de fusil",
                ],
                1.0,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "patient_language",
                &[
                    "ne peut pas bouger le cou",
                    "ne peut pas tourner le cou",
                    "ne peut pas plier le cou",
                    "ne peut pas bouger la nuque",
                    "ne peut pas tourner la tête",
                    "cou bloqué",
                    "cou raide",
                    "nuque douloureuse",
                    "nuque tendue",
                    "nuque bloquée",
                    "mal à la nuque",
                ],
                0.85,
            )
            .guarded(),
        )
        .group(
            TermGroup::new(
                "canonical",
                &["syndrome méningé", "signes méningés", "signe méningé", "méningisme"],
                1.0,
            )
            .guarded(),
        )
});

static HTIC: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("htic", 0.90, 0.85)
        .exclusions(&["scotome", "scotomes", "aura"])
        .negations(&[
            "pas de signes htic",
            "pas de signe d'htic",
            "sans htic",
            "sans signe d'htic",
            "htic négatif",
            "htic absent",
            "htic écarté",
            "pas d'htic",
        ])
        .group(TermGroup::acronyms(
            "acronyms",
            &["htic", "signes htic", "signes d'htic", "syndrome htic"],
            1.0,
        ))
        .group(
            TermGroup::new(
                "clinical",
                &["vomissements en jet", "vomissement en jet", "vom en jet"],
                1.0,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "ophthalmology",
                &[
                    "œdème papillaire",
                    "oedème papillaire",
                    "op+",
                    "op++",
                    "flou visuel",
                    "éclipses visuelles",
                ],
                0.95,
            )
            .clinical(),
        )
        .group(TermGroup::new(
            "canonical",
            &["hypertension intracrânienne", "hypertension intra-crânienne"],
            1.0,
        ))
});

static TRAUMA: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("trauma", 0.90, 0.85)
        .negations(&[
            "pas de traumatisme",
            "sans traumatisme",
            "aucun traumatisme",
            "pas de choc",
            "sans choc",
            "nie tout traumatisme",
            "nie traumatisme",
            "sans trauma",
            "nie trauma",
            "pas de trauma",
        ])
        .group(TermGroup::acronyms("acronyms", &["tcc", "tce", "avp", "pdc"], 1.0))
        .group(TermGroup::new(
            "full_terms",
            &[
                "traumatisme cranio-cérébral",
                "traumatisme crânio-encéphalique",
                "accident de la voie publique",
                "perte de connaissance",
                "accident de voiture",
            ],
            1.0,
        ))
        .group(
            TermGroup::new(
                "mechanisms",
                &[
                    "chute",
                    "choc à la tête",
                    "choc sur la tête",
                    "choc au crâne",
                    "coup à la tête",
                    "coup sur la tête",
                    "coup au crâne",
                    "tête cognée",
                ],
                0.90,
            )
            .guarded(),
        )
        .group(TermGroup::new(
            "temporal_context",
            &[
                "depuis traumatisme",
                "depuis trauma",
                "depuis la chute",
                "depuis chute",
                "après traumatisme",
                "après trauma",
                "après la chute",
                "après chute",
                "post-traumatique",
                "post traumatique",
            ],
            1.0,
        ))
        .group(
            TermGroup::new(
                "canonical",
                &["traumatisme crânien", "trauma crânien", "traumatisme", "trauma"],
                1.0,
            )
            .guarded(),
        )
});

static NEURO_DEFICIT: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("neuro_deficit", 0.90, 0.85)
        .negation_exceptions(&["mais", "cependant", "toutefois", "sauf", "excepté"])
        .negations(&[
            "pas de déficit",
            "sans déficit",
            "aucun déficit",
            "pas de déficit neurologique",
            "sans déficit neurologique",
            "pas de trouble neurologique",
            "pas de troubles neurologiques",
            "pas de trouble moteur",
            "pas de trouble sensitif",
            "examen neurologique normal",
            "examen neurologique strictement normal",
            "examen neuro normal",
        ])
        .group(TermGroup::acronyms("acronyms", &["dsm", "pf", "glasgow", "gcs"], 1.0))
        .group(
            TermGroup::new(
                "motor",
                &[
                    "hémiparésie",
                    "hémiplégie",
                    "parésie",
                    "paralysie",
                    "faiblesse du bras",
                    "faiblesse bras",
                    "faiblesse de la jambe",
                    "faiblesse jambe",
                    "faiblesse d'un membre",
                    "faiblesse membre",
                    "déficit moteur",
                    "déficit sensitif",
                    "déficit neurologique",
                ],
                1.0,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "language",
                &[
                    "aphasie",
                    "trouble du langage",
                    "troubles du langage",
                    "difficulté à parler",
                    "difficultés à parler",
                    "difficulté pour parler",
                    "trouble de la parole",
                    "troubles de la parole",
                    "dysarthrie",
                ],
                1.0,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "visual",
                &[
                    "hémianopsie",
                    "diplopie",
                    "vision double",
                    "perte de vision",
                    "perte de la vision",
                ],
                0.90,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "consciousness",
                &[
                    "confusion",
                    "désorientation",
                    "désorienté",
                    "désorientée",
                    "altération de conscience",
                    "altération de la conscience",
                    "trouble mnésique",
                    "troubles mnésiques",
                ],
                1.0,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "patient_language",
                &[
                    "ne peut plus bouger",
                    "ne peut pas bouger le bras",
                    "ne peut pas bouger la jambe",
                    "ne peut plus lever le bras",
                    "ne peut pas lever le bras",
                    "ne peut plus lever la jambe",
                    "ne peut pas lever la jambe",
                ],
                0.85,
            )
            .guarded(),
        )
        .group(
            TermGroup::new("canonical", &["déficit focal", "signe de localisation"], 1.0)
                .guarded(),
        )
});

static SEIZURE: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("seizure", 0.90, 0.85)
        .negations(&[
            "pas de crise",
            "sans crise",
            "pas de convulsion",
            "pas de convulsions",
            "sans convulsion",
            "sans convulsions",
            "nie toute crise",
            "nie crise",
            "aucune crise",
        ])
        .group(TermGroup::acronyms("acronyms", &["cgt", "crise tc"], 1.0))
        .group(TermGroup::new(
            "medical",
            &[
                "crise comitiale",
                "crise convulsive",
                "crises épileptiques",
                "crise épileptique",
                "crises convulsives",
                "crise tonico-clonique",
                "crise généralisée tonico-clonique",
                "crise tonique",
                "crise clonique",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "temporal",
            &[
                "crise ce matin",
                "crise hier",
                "crise ce soir",
                "suivie d'une crise",
                "puis convulsions",
                "avec convulsions",
                "accompagnée de convulsions",
            ],
            1.0,
        ))
        .group(
            TermGroup::new(
                "clinical_description",
                &["mouvements anormaux", "secousses", "pdc avec secousses"],
                0.90,
            )
            .clinical(),
        )
        .group(
            TermGroup::new(
                "generic",
                &[
                    "convulsions",
                    "convulsion",
                    "épilepsie",
                    "a convulsé",
                    "a fait une crise",
                    "fait une crise",
                ],
                0.85,
            )
            .guarded(),
        )
});

static PREGNANCY_PATTERNS: LazyLock<Vec<(Regex, f64)>> = LazyLock::new(|| {
    [
        (r"\bg\d+p\d+\b", 0.98),
        (r"\b\d{1,2}\s*sa\b", 0.95),
        (r"\bt[123]\b", 0.90),
    ]
    .iter()
    .filter_map(|(p, c)| Regex::new(p).ok().map(|r| (r, *c)))
    .collect()
});

static PREGNANCY: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("pregnancy", 0.95, 0.85)
        .negations(&["pas enceinte", "non enceinte", "pas de grossesse", "nie grossesse"])
        .group(TermGroup::new(
            "postpartum",
            &[
                "post-partum",
                "postpartum",
                "post partum",
                "accouchement",
                "a accouché",
                "vient d'accoucher",
                "après l'accouchement",
                "après accouchement",
                "jeune mère",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "medical",
            &["femme enceinte", "patiente enceinte", "gestante", "en gestation"],
            1.0,
        ))
        .group(TermGroup::new(
            "temporal",
            &[
                "1er trimestre",
                "2ème trimestre",
                "2e trimestre",
                "3ème trimestre",
                "3e trimestre",
                "premier trimestre",
                "deuxième trimestre",
                "second trimestre",
                "troisième trimestre",
            ],
            0.95,
        ))
        .group(TermGroup::new("obstetric", &["gravidique"], 1.0))
        .group(TermGroup::new("canonical", &["enceinte", "grossesse"], 1.0).guarded())
});

static IMMUNOSUPPRESSION: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("immunosuppression", 0.90, 0.85)
        .negations(&["immunocompétent", "immunocompétente", "pas d'immunodépression"])
        .group(
            TermGroup::new(
                "conditions",
                &["vih", "vih+", "vih positif", "sida", "séropositif", "séropositive"],
                1.0,
            )
            .guarded(),
        )
        .group(
            TermGroup::new(
                "treatments",
                &[
                    "chimiothérapie",
                    "chimio",
                    "corticoïdes",
                    "corticoïde",
                    "corticothérapie",
                    "cortico",
                    "immunosuppresseur",
                    "immunosuppresseurs",
                    "ttt immunosup",
                ],
                1.0,
            )
            .guarded(),
        )
        .group(TermGroup::new("contexts", &["greffe", "greffé", "greffée"], 1.0).guarded())
        // "pas de cancer" says nothing about immune status: leave the field open
        .group(
            TermGroup::new(
                "oncology",
                &["cancer", "k poumon", "k sein", "k colon", "k prostate", "k ovaire"],
                0.95,
            )
            .guarded(),
        )
        .group(TermGroup::acronyms("biology", &["cd4"], 1.0))
        .group(
            TermGroup::new(
                "canonical",
                &[
                    "immunodéprimé",
                    "immunodéprimée",
                    "immunodépression",
                    "immunosupprimé",
                    "immunosuppression",
                ],
                1.0,
            )
            .guarded(),
        )
});

static CANCER_TERMS: LazyLock<TermSet> =
    LazyLock::new(|| TermSet::new(&["cancer", "tumeur", "chimio", "oncologique"], false));

static CANCER_HISTORY: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("cancer_history", 0.95, 0.85)
        .negations(&[
            "pas de cancer",
            "pas d'antécédent de cancer",
            "pas d'atcd de cancer",
            "sans antécédent de cancer",
            "aucun antécédent de cancer",
            "pas d'antécédent oncologique",
        ])
        .group(TermGroup::new(
            "metastasis",
            &[
                "métastases",
                "métastase",
                "métastatique",
                "lésions secondaires",
                "localisations secondaires",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "specific_cancers",
            &[
                "cancer du sein",
                "cancer du poumon",
                "cancer pulmonaire",
                "cancer du côlon",
                "cancer colorectal",
                "cancer de la prostate",
                "cancer du rein",
                "mélanome",
                "lymphome",
                "leucémie",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "treatments",
            &["chimiothérapie", "chimio", "radiothérapie", "immunothérapie", "hormonothérapie"],
            0.95,
        ))
        .group(TermGroup::new("contexts", &["oncologique", "en rémission"], 0.90))
        .group(TermGroup::new(
            "medical",
            &["néoplasie", "néoplasique", "tumeur maligne", "carcinome", "adénocarcinome", "sarcome"],
            0.95,
        ))
        .group(
            TermGroup::new(
                "canonical",
                &["antécédent de cancer", "antécédent cancer", "atcd cancer", "atcd de cancer", "cancer"],
                1.0,
            )
            .guarded(),
        )
});

static CANCER_TEMPORAL_CONTEXT: LazyLock<TermSet> = LazyLock::new(|| {
    TermSet::new(
        &["traité pour", "traitée pour", "atcd de", "antécédent de", "antécédents de", "suivi pour"],
        false,
    )
});

static VERTIGO: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("vertigo", 0.85, 0.80)
        .negations(&["pas de vertige", "pas de vertiges", "sans vertige", "sans vertiges", "aucun vertige"])
        .group(TermGroup::new(
            "medical",
            &[
                "syndrome vestibulaire",
                "vertige positionnel",
                "vertige rotatoire",
                "vertiges rotatoires",
                "nystagmus",
            ],
            1.0,
        ))
        .group(TermGroup::new("canonical", &["vertiges", "vertige"], 1.0).guarded())
        .group(TermGroup::new(
            "patient_language",
            &["tout tourne", "la pièce tourne", "la pièce qui tourne", "tête qui tourne"],
            0.90,
        ))
        .group(
            TermGroup::new("generic", &["instabilité", "déséquilibre", "perte d'équilibre"], 0.75)
                .guarded(),
        )
});

static TINNITUS: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("tinnitus", 0.85, 0.80)
        .negations(&["pas d'acouphène", "pas d'acouphènes", "sans acouphène", "sans acouphènes"])
        .group(TermGroup::new(
            "medical",
            &["acouphènes pulsatiles", "acouphène pulsatile", "acouphènes unilatéraux"],
            1.0,
        ))
        .group(TermGroup::new("canonical", &["acouphènes", "acouphène", "tinnitus"], 1.0).guarded())
        .group(
            TermGroup::new(
                "patient_language",
                &[
                    "sifflements",
                    "sifflement",
                    "bourdonnements",
                    "bourdonnement",
                    "bruit dans l'oreille",
                    "bruits dans les oreilles",
                    "oreille qui siffle",
                ],
                0.90,
            )
            .guarded(),
        )
});

static JOINT_PAIN: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("joint_pain", 0.80, 0.75)
        .negations(&["pas de douleur articulaire", "pas de douleurs articulaires", "sans arthralgie"])
        .group(TermGroup::new(
            "medical",
            &["arthralgies", "arthralgie", "polyarthralgies", "rhumatisme"],
            1.0,
        ))
        .group(
            TermGroup::new(
                "canonical",
                &["douleurs articulaires", "douleur articulaire"],
                1.0,
            )
            .guarded(),
        )
        .group(
            TermGroup::new(
                "patient_language",
                &["mal aux articulations", "mal aux épaules", "mal aux hanches", "épaules douloureuses"],
                0.85,
            )
            .guarded(),
        )
});

static HORTON: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("horton", 0.90, 0.80)
        .negations(&["pas de horton", "horton éliminé", "horton écarté", "pas d'artérite"])
        .group(TermGroup::new(
            "canonical",
            &["maladie de horton", "horton", "artérite temporale", "artérite à cellules géantes"],
            1.0,
        ))
        .group(TermGroup::new(
            "clinical",
            &[
                "claudication de la mâchoire",
                "claudication mâchoire",
                "claudication mandibulaire",
                "douleur à la mastication",
                "douleur en mâchant",
                "hyperesthésie du cuir chevelu",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "vascular",
            &[
                "artère temporale indurée",
                "artère temporale épaissie",
                "artère temporale douloureuse",
                "pouls temporal aboli",
                "pouls temporal diminué",
            ],
            0.95,
        ))
        .group(TermGroup::acronyms(
            "systemic",
            &[
                "ppr",
                "pseudopolyarthrite rhizomélique",
                "aeg",
                "altération de l'état général",
                "amaigrissement",
                "sueurs nocturnes",
                "fièvre prolongée",
            ],
            0.75,
        ))
        .group(TermGroup::acronyms(
            "laboratory",
            &[
                "vs élevée",
                "vs augmentée",
                "crp élevée",
                "crp augmentée",
                "syndrome inflammatoire",
            ],
            0.70,
        ))
});

static PATTERN_CHANGE: LazyLock<BoolVocabulary> = LazyLock::new(|| {
    BoolVocabulary::new("recent_pattern_change", 0.85, 0.80)
        .group(TermGroup::new(
            "canonical",
            &[
                "changement récent",
                "aggravation récente",
                "a changé",
                "changement de caractère",
                "modification récente",
                "différente de d'habitude",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "temporal_markers",
            &[
                "pire depuis",
                "inhabituel",
                "inhabituelle",
                "pas comme d'habitude",
                "pas comme avant",
                "jamais eu",
                "nouvelle douleur",
            ],
            1.0,
        ))
        .group(TermGroup::new(
            "intensity_change",
            &[
                "s'aggrave",
                "empire",
                "plus fréquentes",
                "plus fréquente",
                "plus intenses",
                "plus intense",
                "plus forte",
                "plus fortes",
                "de plus en plus",
            ],
            0.95,
        ))
        .group(TermGroup::new(
            "new_symptoms",
            &["apparition de", "nouveaux symptômes", "nouveau symptôme"],
            1.0,
        ))
        .group(TermGroup::new(
            "windows",
            &[
                "depuis 1 semaine",
                "depuis une semaine",
                "depuis quelques jours",
                "depuis 2 semaines",
                "depuis quelques semaines",
            ],
            0.90,
        ))
});

/// "No change" answers checked before positive markers.
static PATTERN_STABLE: LazyLock<TermSet> = LazyLock::new(|| {
    TermSet::new(
        &[
            "aucun changement",
            "pas de changement",
            "stable",
            "stables",
            "pareil",
            "pareille",
            "comme d'habitude",
            "toujours pareil",
            "toujours pareille",
            "habituelle",
            "habituelles",
            "connue",
            "inchangé",
            "inchangée",
            "identique",
            "identiques",
            "même chose",
        ],
        true,
    )
});

pub fn detect_meningeal(normalized: &str) -> DetectionResult<bool> {
    MENINGEAL.detect(normalized)
}

/// HTIC detection; aura or scotoma mentions point to migraine instead.
pub fn detect_htic(normalized: &str) -> DetectionResult<bool> {
    HTIC.detect(normalized)
}

pub fn detect_trauma(normalized: &str) -> DetectionResult<bool> {
    TRAUMA.detect(normalized)
}

pub fn detect_neuro_deficit(normalized: &str) -> DetectionResult<bool> {
    NEURO_DEFICIT.detect(normalized)
}

pub fn detect_seizure(normalized: &str) -> DetectionResult<bool> {
    SEIZURE.detect(normalized)
}

pub fn detect_pregnancy(normalized: &str) -> DetectionResult<bool> {
    let vocabulary = PREGNANCY.detect(normalized);
    if vocabulary.detected {
        return vocabulary;
    }
    for (pattern, confidence) in PREGNANCY_PATTERNS.iter() {
        if let Some(m) = pattern.find(normalized) {
            return DetectionResult::found(true, *confidence, m.as_str(), DetectionSource::Pattern);
        }
    }
    vocabulary
}

pub fn detect_immunosuppression(normalized: &str) -> DetectionResult<bool> {
    IMMUNOSUPPRESSION.detect(normalized)
}

pub fn detect_cancer_history(normalized: &str) -> DetectionResult<bool> {
    let result = CANCER_HISTORY.detect(normalized);
    if result.detected {
        return result;
    }
    // "traité pour ..." only counts next to an oncology word
    if let Some((_, term)) = CANCER_TEMPORAL_CONTEXT.find(normalized) {
        if CANCER_TERMS.is_match(normalized) {
            return DetectionResult::found(true, 0.95 * 0.90, term, DetectionSource::Pattern)
                .with_meta("category", "temporal_context");
        }
    }
    result
}

pub fn detect_vertigo(normalized: &str) -> DetectionResult<bool> {
    VERTIGO.detect(normalized)
}

pub fn detect_tinnitus(normalized: &str) -> DetectionResult<bool> {
    TINNITUS.detect(normalized)
}

pub fn detect_joint_pain(normalized: &str) -> DetectionResult<bool> {
    JOINT_PAIN.detect(normalized)
}

pub fn detect_horton(normalized: &str) -> DetectionResult<bool> {
    HORTON.detect(normalized)
}

pub fn detect_pattern_change(normalized: &str) -> DetectionResult<bool> {
    if let Some((_, term)) = PATTERN_STABLE.find(normalized) {
        return DetectionResult::negative(0.80, term);
    }
    PATTERN_CHANGE.detect(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    fn fever(text: &str) -> DetectionResult<bool> {
        detect_fever(&normalize(text))
    }

    #[test]
    fn apyretique_is_confirmed_negative() {
        let r = fever("Patient apyrétique");
        assert!(r.detected);
        assert_eq!(r.value, Some(false));
    }

    #[test]
    fn febrile_is_positive() {
        let r = fever("Céphalée fébrile depuis hier soir");
        assert_eq!(r.value, Some(true));
    }

    #[test]
    fn afebrile_not_read_as_febrile() {
        assert_eq!(fever("patiente afébrile").value, Some(false));
    }

    #[test]
    fn temperature_above_threshold_is_fever() {
        let r = fever("T° 39.2");
        assert_eq!(r.value, Some(true));
        assert_eq!(r.confidence, 0.95);
        assert_eq!(fever("température à 38,5").value, Some(true));
        assert_eq!(fever("38°5 au domicile").value, Some(true));
    }

    #[test]
    fn normal_temperature_is_negative() {
        assert_eq!(fever("T 37.2").value, Some(false));
    }

    #[test]
    fn most_recent_fever_statement_wins() {
        assert_eq!(fever("fièvre hier mais apyrétique ce matin").value, Some(false));
        assert_eq!(fever("apyrétique hier, fébrile ce matin").value, Some(true));
    }

    #[test]
    fn fever_not_mentioned() {
        assert!(!fever("céphalée frontale").detected);
    }

    #[test]
    fn meningeal_acronym_and_negation() {
        assert_eq!(detect_meningeal(&normalize("RDN +")).value, Some(true));
        assert_eq!(detect_meningeal(&normalize("nuque souple")).value, Some(false));
        assert_eq!(
            detect_meningeal(&normalize("pas de raideur de nuque")).value,
            Some(false)
        );
    }

    #[test]
    fn meningeal_patient_language_lower_confidence() {
        let r = detect_meningeal(&normalize("il a le cou bloqué"));
        assert_eq!(r.value, Some(true));
        assert!(r.confidence < 0.95);
    }

    #[test]
    fn htic_excluded_by_aura() {
        let r = detect_htic(&normalize("aura visuelle puis vomissements en jet"));
        assert!(!r.detected);
    }

    #[test]
    fn htic_ophthalmology_sign() {
        let r = detect_htic(&normalize("Œdème papillaire au fond d'œil"));
        assert_eq!(r.value, Some(true));
    }

    #[test]
    fn trauma_acronym_needs_word_boundary() {
        assert_eq!(detect_trauma(&normalize("AVP ce matin")).value, Some(true));
        assert!(!detect_trauma(&normalize("avpx")).detected);
    }

    #[test]
    fn trauma_negated() {
        assert_eq!(
            detect_trauma(&normalize("pas de traumatisme")).value,
            Some(false)
        );
    }

    #[test]
    fn neuro_negation_reopened_by_exception() {
        let r = detect_neuro_deficit(&normalize(
            "pas de déficit moteur mais aphasie depuis ce matin",
        ));
        assert_eq!(r.value, Some(true));
        let neg = detect_neuro_deficit(&normalize("pas de déficit neurologique"));
        assert_eq!(neg.value, Some(false));
    }

    #[test]
    fn seizure_generic_term() {
        let r = detect_seizure(&normalize("a fait une crise ce matin"));
        assert_eq!(r.value, Some(true));
    }

    #[test]
    fn pregnancy_amenorrhea_weeks() {
        let r = detect_pregnancy(&normalize("32 SA"));
        assert_eq!(r.value, Some(true));
        assert_eq!(r.source, Some(DetectionSource::Pattern));
        assert_eq!(detect_pregnancy(&normalize("G2P1")).value, Some(true));
    }

    #[test]
    fn immunosuppression_hiv() {
        assert_eq!(detect_immunosuppression(&normalize("VIH+")).value, Some(true));
    }

    #[test]
    fn negated_cancer_leaves_immunosuppression_open() {
        for text in [
            "céphalée progressive, pas de cancer",
            "sans cancer connu",
            "pas d'antécédent de cancer",
            "pas de chimiothérapie",
        ] {
            let r = detect_immunosuppression(&normalize(text));
            assert!(!r.detected, "{text}: {:?}", r.value);
        }
        assert_eq!(
            detect_cancer_history(&normalize("pas de cancer")).value,
            Some(false)
        );
        assert_eq!(
            detect_immunosuppression(&normalize("cancer du sein sous chimio")).value,
            Some(true)
        );
    }

    #[test]
    fn cancer_temporal_context_requires_oncology_word() {
        assert_eq!(
            detect_cancer_history(&normalize("traitée pour tumeur mammaire")).value,
            Some(true)
        );
        assert!(!detect_cancer_history(&normalize("traité pour hypertension")).detected);
    }

    #[test]
    fn horton_jaw_claudication() {
        let r = detect_horton(&normalize("claudication de la mâchoire"));
        assert_eq!(r.value, Some(true));
    }

    #[test]
    fn pattern_change_stable_first() {
        assert_eq!(
            detect_pattern_change(&normalize("toujours pareil")).value,
            Some(false)
        );
        assert_eq!(
            detect_pattern_change(&normalize("plus fréquentes depuis un mois")).value,
            Some(true)
        );
        assert!(!detect_pattern_change(&normalize("céphalée frontale")).detected);
    }
}
