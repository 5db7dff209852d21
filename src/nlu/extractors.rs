//! Regex extractors for scalar case fields: age, sex, episode duration,
//! pain intensity, temporal profile, recent lumbar puncture and
//! pregnancy trimester. All operate on normalized (accent-folded) text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::vocabulary::{DetectionResult, DetectionSource};
use crate::models::case::{MAX_AGE, MAX_INTENSITY};
use crate::models::{Onset, Profile, Sex};

const AGE_CONFIDENCE: f64 = 0.90;
const SEX_CONFIDENCE: f64 = 0.80;
const DURATION_CONFIDENCE: f64 = 0.90;
const INTENSITY_CONFIDENCE: f64 = 0.85;
const PROFILE_CONFIDENCE: f64 = 0.80;
const RECENT_PL_CONFIDENCE: f64 = 0.90;
const TRIMESTER_CONFIDENCE: f64 = 0.85;

pub const HOURS_PER_WEEK: f64 = 168.0;
/// Three months, the acute/subacute/chronic boundary.
pub const HOURS_PER_QUARTER: f64 = 2160.0;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn compile_one(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().replace(',', ".").parse().ok()
}

// ═══════════════════════════════════════════════════════════
// Age
// ═══════════════════════════════════════════════════════════

static AGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b(\d{1,3})a\b",
        r"\b(\d{1,3})\s*ans?\b",
        r"\bagee? de (\d{1,3})\b",
    ])
});

/// Words that turn "N ans" into a duration rather than an age.
const DURATION_LEADS: &[&str] = &["depuis", "dep", "il y a", "pendant", "fait", "durant"];

fn preceded_by_duration_lead(text: &str, pos: usize) -> bool {
    let before = text[..pos].trim_end();
    DURATION_LEADS.iter().any(|lead| before.ends_with(lead))
}

pub fn extract_age(text: &str) -> DetectionResult<u8> {
    for pattern in AGE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(age)) = (caps.get(0), number::<i64>(&caps, 1)) else {
                continue;
            };
            if preceded_by_duration_lead(text, whole.start()) {
                continue;
            }
            if (0..=MAX_AGE).contains(&age) {
                return DetectionResult::found(
                    age as u8,
                    AGE_CONFIDENCE,
                    whole.as_str(),
                    DetectionSource::Pattern,
                );
            }
        }
    }
    DetectionResult::not_detected()
}

// ═══════════════════════════════════════════════════════════
// Sex
// ═══════════════════════════════════════════════════════════

static OBSTETRIC_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bg\d+p\d+",
        r"\b\d+\s*sa\b",
        r"\bt[123]\b",
        r"\b(?:enceinte|gravidique|gestante|post-partum)\b",
    ])
});

static ABBREVIATED_SEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile_one(r"(?:^|[,.])\s*([fh])\s+\d+a"));

static FEMALE_MARKERS: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile_one(r"\b(?:femme|patiente|elle|madame|mme|mere)\b"));

static MALE_MARKERS: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile_one(r"\b(?:homme|patient|il|monsieur|mr)\b"));

pub fn extract_sex(text: &str) -> DetectionResult<Sex> {
    let found = |sex: Sex, term: &str| {
        DetectionResult::found(sex, SEX_CONFIDENCE, term, DetectionSource::Pattern)
    };

    if let Some(m) = OBSTETRIC_MARKERS.iter().find_map(|r| r.find(text)) {
        return found(Sex::Female, m.as_str());
    }
    if let Some(caps) = ABBREVIATED_SEX.as_ref().and_then(|r| r.captures(text)) {
        let sex = match caps.get(1).map(|m| m.as_str()) {
            Some("f") => Sex::Female,
            _ => Sex::Male,
        };
        return found(sex, caps.get(0).map_or("", |m| m.as_str()));
    }
    if let Some(m) = FEMALE_MARKERS.as_ref().and_then(|r| r.find(text)) {
        return found(Sex::Female, m.as_str());
    }
    if let Some(regex) = MALE_MARKERS.as_ref() {
        // Impersonal "il y a" says nothing about the patient
        let male = regex
            .find_iter(text)
            .find(|m| !(m.as_str() == "il" && text[m.end()..].starts_with(" y a")));
        if let Some(m) = male {
            return found(Sex::Male, m.as_str());
        }
    }
    DetectionResult::not_detected()
}

// ═══════════════════════════════════════════════════════════
// Duration of the current episode
// ═══════════════════════════════════════════════════════════

struct DurationPatterns {
    explicit_hours: Option<Regex>,
    episode_minutes: Option<Regex>,
    comma_minutes: Option<Regex>,
    minute_range: Option<Regex>,
    trailing_minutes: Option<Regex>,
    minutes_then: Option<Regex>,
    bare_hours: Option<Regex>,
    hour_range: Option<Regex>,
    since_hours: Option<Regex>,
    since_days: Option<Regex>,
    since_weeks: Option<Regex>,
    bare_weeks: Option<Regex>,
    since_months: Option<Regex>,
    ago: Option<Regex>,
    colloquial: Option<Regex>,
}

static DURATION: LazyLock<DurationPatterns> = LazyLock::new(|| DurationPatterns {
    explicit_hours: compile_one(r"duree\s+(?:totale\s+)?(\d+(?:\.\d+)?)\s*h(?:eures?)?"),
    episode_minutes: compile_one(r"(?:crises?|duree|episode)\s*(\d+)(?:-(\d+))?\s*min(?:utes?)?"),
    comma_minutes: compile_one(r",\s*(\d+)\s*min(?:utes?)?\s*[,.]"),
    minute_range: compile_one(r"\b(\d+)-(\d+)\s*min(?:utes?)?\b"),
    trailing_minutes: compile_one(r"\b(\d+)\s*min(?:utes?)?\s*(?:[,.]|$)"),
    minutes_then: compile_one(r"\d+\s*min(?:utes?)?\s+puis"),
    bare_hours: compile_one(r"\b(\d+(?:\.\d+)?)\s*h(?:eures?)?\b"),
    hour_range: compile_one(r"(\d+)-(\d+)\s*h(?:eures?)?"),
    since_hours: compile_one(r"(?:depuis|dep)\s+(\d+(?:\.\d+)?)\s*h(?:eures?)?"),
    since_days: compile_one(r"(?:depuis|dep)\s+(\d+)\s*j(?:ours?)?\b"),
    since_weeks: compile_one(r"(?:depuis|dep)\s+(\d+)\s*sem(?:aines?)?"),
    bare_weeks: compile_one(r"\b(\d+)\s*sem(?:aines?)?\b"),
    since_months: compile_one(r"(?:depuis|dep)\s+(\d+)\s*mois"),
    ago: compile_one(r"il y a (\d+)\s*(h(?:eures?)?|j(?:ours?)?|sem(?:aines?)?|mois)"),
    colloquial: compile_one(r"(?:ca|cela) fait (\d+)\s*(h(?:eures?)?|j(?:ours?)?|sem(?:aines?)?|mois)"),
});

fn unit_hours(value: f64, unit: &str) -> f64 {
    if unit.starts_with("sem") {
        value * HOURS_PER_WEEK
    } else if unit.starts_with("mois") {
        value * 30.0 * 24.0
    } else if unit.starts_with('j') {
        value * 24.0
    } else {
        value
    }
}

fn caps<'t>(regex: &Option<Regex>, text: &'t str) -> Option<Captures<'t>> {
    regex.as_ref().and_then(|r| r.captures(text))
}

fn range_mean_minutes(c: &Captures<'_>) -> Option<f64> {
    let low: f64 = number(c, 1)?;
    match number::<f64>(c, 2) {
        Some(high) => Some((low + high) / 120.0),
        None => Some(low / 60.0),
    }
}

/// Episode duration in hours. Attack lengths ("crises 45min") win over
/// "depuis" spans, which win over colloquial forms.
fn duration_hours(text: &str) -> Option<(f64, String)> {
    let d = &*DURATION;
    let hit = |c: &Captures<'_>| c.get(0).map_or(String::new(), |m| m.as_str().to_string());

    if let Some(c) = caps(&d.explicit_hours, text) {
        return Some((number(&c, 1)?, hit(&c)));
    }
    if let Some(c) = caps(&d.episode_minutes, text) {
        return Some((range_mean_minutes(&c)?, hit(&c)));
    }
    if let Some(c) = caps(&d.comma_minutes, text) {
        return Some((number::<f64>(&c, 1)? / 60.0, hit(&c)));
    }
    if let Some(c) = caps(&d.minute_range, text) {
        return Some((range_mean_minutes(&c)?, hit(&c)));
    }
    let aura_like = d.minutes_then.as_ref().is_some_and(|r| r.is_match(text));
    if !aura_like {
        if let Some(c) = caps(&d.trailing_minutes, text) {
            return Some((number::<f64>(&c, 1)? / 60.0, hit(&c)));
        }
    }
    if let Some(regex) = &d.bare_hours {
        for c in regex.captures_iter(text) {
            let Some(whole) = c.get(0) else { continue };
            let mut from = whole.start().saturating_sub(10);
            while !text.is_char_boundary(from) {
                from -= 1;
            }
            if !text[from..whole.start()].contains("dep") {
                return Some((number(&c, 1)?, hit(&c)));
            }
        }
    }
    if let Some(c) = caps(&d.hour_range, text) {
        let low: f64 = number(&c, 1)?;
        let high: f64 = number(&c, 2)?;
        return Some(((low + high) / 2.0, hit(&c)));
    }
    if let Some(c) = caps(&d.since_hours, text) {
        return Some((number(&c, 1)?, hit(&c)));
    }
    if let Some(c) = caps(&d.since_days, text) {
        return Some((number::<f64>(&c, 1)? * 24.0, hit(&c)));
    }
    for weeks in [&d.since_weeks, &d.bare_weeks] {
        if let Some(c) = caps(weeks, text) {
            return Some((number::<f64>(&c, 1)? * HOURS_PER_WEEK, hit(&c)));
        }
    }
    if let Some(c) = caps(&d.since_months, text) {
        return Some((number::<f64>(&c, 1)? * 30.0 * 24.0, hit(&c)));
    }
    for spoken in [&d.ago, &d.colloquial] {
        if let Some(c) = caps(spoken, text) {
            let value: f64 = number(&c, 1)?;
            let unit = c.get(2).map_or("h", |m| m.as_str());
            return Some((unit_hours(value, unit), hit(&c)));
        }
    }
    None
}

pub fn extract_duration_hours(text: &str) -> DetectionResult<f64> {
    match duration_hours(text) {
        Some((hours, term)) if hours >= 0.0 && hours.is_finite() => {
            DetectionResult::found(hours, DURATION_CONFIDENCE, &term, DetectionSource::Pattern)
        }
        _ => DetectionResult::not_detected(),
    }
}

// ═══════════════════════════════════════════════════════════
// Intensity (EVA 0-10)
// ═══════════════════════════════════════════════════════════

struct IntensityPatterns {
    over_ten: Option<Regex>,
    eva_max: Option<Regex>,
    scale_value: Option<Regex>,
    maximum: Vec<Regex>,
    severe: Vec<Regex>,
}

static INTENSITY: LazyLock<IntensityPatterns> = LazyLock::new(|| IntensityPatterns {
    over_ten: compile_one(r"(\d{1,2})(?:-(\d{1,2}))?\s*/\s*10"),
    eva_max: compile_one(r"\beva\s*(?:max(?:imum|imale?)?|10/10)"),
    scale_value: compile_one(r"\b(?:eva|en)\s*(?:=\s*)?(\d{1,2})\b"),
    maximum: compile(&[
        r"maximale? (?:et |, )?insupportable",
        r"insupportable (?:et |, )?maximale?",
        r"atroce (?:et |, )?insupportable",
        r"insupportable (?:et |, )?atroce",
        r"brutale? (?:et |, )?explosive?",
        r"explosive? (?:et |, )?brutale?",
        r"intensite maximale",
        r"douleur maximale",
        r"pire (?:douleur|mal|cephalee) de (?:ma|sa) vie",
        r"jamais (?:eu|ressenti) aussi mal",
        r"douleur (?:la plus )?intense de (?:ma|sa) vie",
        r"epouvantable",
    ]),
    severe: compile(&[
        r"\bintense\b",
        r"\bsevere\b",
        r"\batroce\b",
        r"\bmaximale?\b",
        r"\beva\s*(?:=\s*)?[89]\b",
        r"\bhorrible\b",
    ]),
});

/// Units that make "en 2" a time span instead of a pain score.
const TIME_UNITS: &[&str] = &["h", "j", "min", "sem", "mois", "an", "sec", "jour", "heure"];

fn is_followed_by_unit(text: &str, end: usize) -> bool {
    let after = text[end..].trim_start();
    TIME_UNITS.iter().any(|u| after.starts_with(u))
}

fn intensity_score(text: &str) -> Option<(u8, String)> {
    let p = &*INTENSITY;
    let max = MAX_INTENSITY as u8;

    if let Some(regex) = &p.over_ten {
        let best = regex
            .captures_iter(text)
            .filter_map(|c| {
                let low: u8 = number(&c, 1)?;
                let high = number::<u8>(&c, 2).unwrap_or(low);
                let score = low.max(high);
                (score <= max).then(|| (score, c.get(0).map_or("", |m| m.as_str()).to_string()))
            })
            .max_by_key(|(score, _)| *score);
        if best.is_some() {
            return best;
        }
    }
    if let Some(m) = p.eva_max.as_ref().and_then(|r| r.find(text)) {
        return Some((max, m.as_str().to_string()));
    }
    if let Some(regex) = &p.scale_value {
        for c in regex.captures_iter(text) {
            let Some(whole) = c.get(0) else { continue };
            if is_followed_by_unit(text, whole.end()) {
                continue;
            }
            if let Some(score) = number::<u8>(&c, 1).filter(|s| *s <= max) {
                return Some((score, whole.as_str().to_string()));
            }
        }
    }

    let has = |w: &str| text.contains(w);
    if has("insupportable") && !has("maximal") && !has("atroce") {
        return Some((max, "insupportable".into()));
    }
    if has("terrible") {
        return Some((9, "terrible".into()));
    }
    if has("moderee") || text.split_whitespace().any(|w| w.trim_matches(',') == "modere") {
        return Some((5, "moderee".into()));
    }
    if let Some(m) = p.maximum.iter().find_map(|r| r.find(text)) {
        return Some((max, m.as_str().to_string()));
    }
    if has("atroce") && has("insupportable") {
        return Some((max, "atroce insupportable".into()));
    }
    if let Some(m) = p.severe.iter().find_map(|r| r.find(text)) {
        return Some((9, m.as_str().to_string()));
    }
    None
}

pub fn extract_intensity(text: &str) -> DetectionResult<u8> {
    match intensity_score(text) {
        Some((score, term)) => {
            DetectionResult::found(score, INTENSITY_CONFIDENCE, &term, DetectionSource::Pattern)
        }
        None => DetectionResult::not_detected(),
    }
}

// ═══════════════════════════════════════════════════════════
// Temporal profile
// ═══════════════════════════════════════════════════════════

static PROFILE_PATTERNS: LazyLock<Vec<(Profile, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            Profile::Subacute,
            compile(&[
                r"\bsubaigu[ee]?",
                r"depuis (?:quelques )?semaines?",
                r"depuis \d+\s*sem(?:aines?)?",
                r"dep\s+\d+\s*sem",
                r"depuis [1-2]\s*mois",
                r"depuis (?:[7-9]|[1-9]\d)\s*(?:jours?|j)\b",
            ]),
        ),
        (
            Profile::Acute,
            compile(&[
                r"\baigu[e]?\b",
                r"depuis (?:quelques )?heures?",
                r"depuis \d+\s*heures?",
                r"dep\s+\d+\s*h\b",
                r"depuis (?:quelques )?jours?",
                r"depuis [1-6]\s*(?:jours?|j)\b",
                r"dep\s+[1-6]\s*j\b",
                r"il y a [1-6]\s*(?:jours?|j)\b",
                r"il y a \d+\s*(?:heures?|h)\b",
                r"\bj-\d+",
                r"\brecente?\b",
                r"\bsoudaine?\b",
                r"(?:depuis )?ce matin",
                r"(?:depuis )?cet apres-midi",
                r"(?:depuis )?ce soir",
                r"(?:depuis )?aujourd'hui",
                r"\bhier\b",
                r"(?:depuis )?la nuit derniere",
                r"(?:depuis )?cette nuit",
            ]),
        ),
        (
            Profile::Chronic,
            compile(&[
                r"\bchroniques?\b",
                r"depuis (?:plusieurs|des) (?:mois|annees?|ans)",
                r"de longue date",
                r"\bpermanente?\b",
                r"cephalee chronique quotidienne",
                r"depuis (?:\d+|de nombreux) mois",
                r"depuis (?:\d+|de nombreuses?) (?:annees?|ans)",
                r"depuis \d+\s*ans?\b",
                r">3\s*mois",
                r"\bquotid(?:iennes?)?\b",
                r"(?:tous les|chaque) jours?",
                r"cch (?:chroniques?|quotid)",
                r"fond (?:douloureux|migraineux)",
                r"migraineuse? (?:connue?|depuis)",
                r"(?:migraines?|cephalees?) (?:connues?|habituelles?)",
            ]),
        ),
    ]
});

/// Explicit temporal-profile phrases. Subacute is checked first so that
/// "subaiguë" is not read as "aiguë".
pub fn extract_profile(text: &str) -> DetectionResult<Profile> {
    for (profile, patterns) in PROFILE_PATTERNS.iter() {
        if let Some(m) = patterns.iter().find_map(|r| r.find(text)) {
            return DetectionResult::found(
                *profile,
                PROFILE_CONFIDENCE,
                m.as_str(),
                DetectionSource::Pattern,
            );
        }
    }
    DetectionResult::not_detected()
}

/// Profile implied by onset and duration when no explicit phrase exists.
pub fn infer_profile(
    onset: Onset,
    duration_hours: Option<f64>,
    text: &str,
) -> Option<(Profile, f64)> {
    match onset {
        Onset::Thunderclap => Some((Profile::Acute, 0.95)),
        Onset::Chronic => Some((Profile::Chronic, 0.90)),
        Onset::Progressive => Some(match duration_hours {
            Some(h) => (profile_for_hours(h), 0.90),
            None if text.contains("semaine") => (Profile::Subacute, 0.75),
            None => (Profile::Acute, 0.60),
        }),
        Onset::Unknown => duration_hours.map(|h| (profile_for_hours(h), 0.85)),
    }
}

pub fn profile_for_hours(hours: f64) -> Profile {
    if hours < HOURS_PER_WEEK {
        Profile::Acute
    } else if hours < HOURS_PER_QUARTER {
        Profile::Subacute
    } else {
        Profile::Chronic
    }
}

// ═══════════════════════════════════════════════════════════
// Recent lumbar puncture / peridural
// ═══════════════════════════════════════════════════════════

static RECENT_PL_NEGATIVE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"pas de (?:ponction|pl\b|peridurale)",
        r"sans (?:ponction|pl\b|peridurale)",
        r"nie (?:ponction|pl\b|peridurale)",
    ])
});

static RECENT_PL_POSITIVE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"ponction lombaire",
        r"\bpl\s+(?:il y a|depuis|j-?\d+)",
        r"\bpl\s+recente?",
        r"apres (?:la )?pl\b",
        r"post[- ]pl\b",
        r"suite a (?:une )?pl\b",
        r"peridurale?\s+(?:il y a|depuis|recente?)",
        r"anesthesie peridurale",
        r"apres (?:la )?peridurale",
        r"post[- ]peridurale",
        r"rachianesthesie",
        r"\brachi\s+(?:il y a|depuis)",
        r"ponction\s+(?:il y a|depuis)",
        r"apres (?:la )?ponction",
        r"\bpl\s+faite",
        r"depuis\s+(?:la\s+)?pl\b",
        r"depuis\s+(?:la\s+)?ponction",
        r"\bpl\b.*\bil y a\b",
        r"cephalee.*(?:position debout|orthostatique)",
        r"amelioration.*decubitus",
        r"cephalee positionnelle",
    ])
});

pub fn extract_recent_pl(text: &str) -> DetectionResult<bool> {
    if let Some(m) = RECENT_PL_NEGATIVE.iter().find_map(|r| r.find(text)) {
        return DetectionResult::negative(RECENT_PL_CONFIDENCE, m.as_str());
    }
    if let Some(m) = RECENT_PL_POSITIVE.iter().find_map(|r| r.find(text)) {
        return DetectionResult::found(
            true,
            RECENT_PL_CONFIDENCE,
            m.as_str(),
            DetectionSource::Pattern,
        );
    }
    DetectionResult::not_detected()
}

// ═══════════════════════════════════════════════════════════
// Pregnancy trimester
// ═══════════════════════════════════════════════════════════

struct TrimesterPatterns {
    named: Vec<(Regex, f64)>,
    amenorrhea: Option<Regex>,
    weeks: Option<Regex>,
    months: Option<Regex>,
    days: Option<Regex>,
}

static TRIMESTER: LazyLock<TrimesterPatterns> = LazyLock::new(|| TrimesterPatterns {
    named: [
        (r"(?:1er|premier|\bt1)\s*trimestre|\bt1\b", 6.5),
        (r"(?:2e|2eme|deuxieme|second|\bt2)\s*trimestre|\bt2\b", 20.5),
        (r"(?:3e|3eme|troisieme|\bt3)\s*trimestre|\bt3\b", 34.0),
    ]
    .iter()
    .filter_map(|(p, w)| Regex::new(p).ok().map(|r| (r, *w)))
    .collect(),
    amenorrhea: compile_one(r"(\d+(?:\.\d+)?)\s*sa\b"),
    weeks: compile_one(r"(\d+(?:\.\d+)?)\s*(?:semaines?|sem)\b"),
    months: compile_one(r"(\d+(?:\.\d+)?)\s*mois"),
    days: compile_one(r"(\d+)\s*jours?"),
});

/// Gestational age in weeks from named trimester, SA, weeks, months or days.
pub fn pregnancy_weeks(text: &str) -> Option<f64> {
    let t = &*TRIMESTER;
    if let Some((_, weeks)) = t.named.iter().find(|(r, _)| r.is_match(text)) {
        return Some(*weeks);
    }
    if let Some(c) = caps(&t.amenorrhea, text) {
        return number(&c, 1);
    }
    if let Some(c) = caps(&t.weeks, text) {
        return number(&c, 1);
    }
    if let Some(c) = caps(&t.months, text) {
        return number::<f64>(&c, 1).map(|m| m * 4.33);
    }
    let pregnancy_context = ["enceinte", "grossesse", "gravid"]
        .iter()
        .any(|w| text.contains(w));
    if pregnancy_context {
        if let Some(c) = caps(&t.days, text) {
            return number::<f64>(&c, 1).map(|d| d / 7.0);
        }
    }
    None
}

pub fn trimester_for_weeks(weeks: f64) -> Option<u8> {
    if !(0.0..=42.0).contains(&weeks) {
        None
    } else if weeks < 14.0 {
        Some(1)
    } else if weeks < 28.0 {
        Some(2)
    } else {
        Some(3)
    }
}

pub fn extract_trimester(text: &str) -> DetectionResult<u8> {
    match pregnancy_weeks(text).and_then(trimester_for_weeks) {
        Some(trimester) => DetectionResult::found(
            trimester,
            TRIMESTER_CONFIDENCE,
            "gestational_age",
            DetectionSource::Pattern,
        ),
        None => DetectionResult::not_detected(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::normalize::normalize;

    fn n(text: &str) -> String {
        normalize(text)
    }

    #[test]
    fn age_from_common_forms() {
        assert_eq!(extract_age(&n("Femme de 45 ans")).value, Some(45));
        assert_eq!(extract_age(&n("F 62a, céphalée")).value, Some(62));
        assert_eq!(extract_age(&n("âgée de 71")).value, Some(71));
    }

    #[test]
    fn age_ignores_durations() {
        assert!(!extract_age(&n("migraineuse depuis 10 ans")).detected);
        assert_eq!(
            extract_age(&n("migraineuse depuis 10 ans, 40 ans")).value,
            Some(40)
        );
    }

    #[test]
    fn age_out_of_range_skipped() {
        assert!(!extract_age(&n("200 ans")).detected);
    }

    #[test]
    fn sex_from_markers() {
        assert_eq!(extract_sex(&n("Patiente de 30 ans")).value, Some(Sex::Female));
        assert_eq!(extract_sex(&n("H 45a")).value, Some(Sex::Male));
        assert_eq!(extract_sex(&n("32 SA")).value, Some(Sex::Female));
        assert_eq!(extract_sex(&n("homme 50 ans")).value, Some(Sex::Male));
    }

    #[test]
    fn impersonal_il_y_a_is_not_male() {
        assert!(!extract_sex(&n("céphalée il y a 3 jours")).detected);
    }

    #[test]
    fn duration_attack_minutes_first() {
        let r = extract_duration_hours(&n("crises 30-60min depuis 10j"));
        assert!((r.value.unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn duration_since_days() {
        assert_eq!(extract_duration_hours(&n("céphalée depuis 3 jours")).value, Some(72.0));
        assert_eq!(extract_duration_hours(&n("depuis 2 semaines")).value, Some(336.0));
    }

    #[test]
    fn duration_bare_hours() {
        assert_eq!(extract_duration_hours(&n("céphalée 8h")).value, Some(8.0));
        assert_eq!(extract_duration_hours(&n("depuis 6h")).value, Some(6.0));
    }

    #[test]
    fn duration_spoken_forms() {
        assert_eq!(extract_duration_hours(&n("il y a 2 jours")).value, Some(48.0));
        assert_eq!(extract_duration_hours(&n("ça fait 3 mois")).value, Some(2160.0));
    }

    #[test]
    fn intensity_scale_takes_maximum() {
        assert_eq!(extract_intensity(&n("EVA 6/10 puis 8/10")).value, Some(8));
        assert_eq!(extract_intensity(&n("7-9/10")).value, Some(9));
    }

    #[test]
    fn intensity_words() {
        assert_eq!(extract_intensity(&n("douleur insupportable")).value, Some(10));
        assert_eq!(extract_intensity(&n("douleur terrible")).value, Some(9));
        assert_eq!(extract_intensity(&n("douleur modérée")).value, Some(5));
        assert_eq!(extract_intensity(&n("pire douleur de ma vie")).value, Some(10));
    }

    #[test]
    fn intensity_ignores_time_spans() {
        assert!(!extract_intensity(&n("installée en 2 jours")).detected);
        assert_eq!(extract_intensity(&n("EN 7")).value, Some(7));
    }

    #[test]
    fn profile_phrases() {
        assert_eq!(extract_profile(&n("depuis ce matin")).value, Some(Profile::Acute));
        assert_eq!(extract_profile(&n("depuis 3 semaines")).value, Some(Profile::Subacute));
        assert_eq!(extract_profile(&n("céphalée subaiguë")).value, Some(Profile::Subacute));
        assert_eq!(extract_profile(&n("migraines connues")).value, Some(Profile::Chronic));
    }

    #[test]
    fn profile_inference() {
        assert_eq!(infer_profile(Onset::Thunderclap, None, ""), Some((Profile::Acute, 0.95)));
        assert_eq!(
            infer_profile(Onset::Progressive, Some(500.0), "").map(|p| p.0),
            Some(Profile::Subacute)
        );
        assert_eq!(
            infer_profile(Onset::Unknown, Some(3000.0), "").map(|p| p.0),
            Some(Profile::Chronic)
        );
        assert_eq!(infer_profile(Onset::Unknown, None, ""), None);
    }

    #[test]
    fn recent_pl_negation_first() {
        assert_eq!(extract_recent_pl(&n("pas de PL récente")).value, Some(false));
        assert_eq!(extract_recent_pl(&n("PL il y a 3 jours")).value, Some(true));
        assert_eq!(
            extract_recent_pl(&n("céphalée orthostatique après péridurale")).value,
            Some(true)
        );
    }

    #[test]
    fn trimester_from_weeks_and_names() {
        assert_eq!(extract_trimester(&n("enceinte de 32 SA")).value, Some(3));
        assert_eq!(extract_trimester(&n("2ème trimestre")).value, Some(2));
        assert_eq!(extract_trimester(&n("enceinte de 2 mois")).value, Some(1));
        assert_eq!(trimester_for_weeks(45.0), None);
    }
}
