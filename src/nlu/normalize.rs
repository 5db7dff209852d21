//! Matching key for every lexical layer: lowercase, accents folded,
//! whitespace collapsed. The original text is kept by callers for display
//! and case-preserving corrections.

/// Fold one lowercase character to its unaccented form.
/// Ligatures expand to two characters.
fn fold_char(c: char, out: &mut String) {
    let folded = match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' => 'a',
        'ç' => 'c',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' | 'ì' => 'i',
        'ô' | 'ö' | 'ó' | 'ò' | 'õ' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ÿ' | 'ý' => 'y',
        'ñ' => 'n',
        'œ' => {
            out.push_str("oe");
            return;
        }
        'æ' => {
            out.push_str("ae");
            return;
        }
        '’' | '‘' | '`' | '´' => '\'',
        '\u{00A0}' | '\u{202F}' | '\t' | '\n' | '\r' => ' ',
        other => other,
    };
    out.push(folded);
}

/// Lowercase and strip diacritics without touching spacing.
pub fn fold_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        fold_char(c, &mut out);
    }
    out
}

/// Full normalization used as the detector matching key.
pub fn normalize(text: &str) -> String {
    let folded = fold_accents(text);
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    // Glue symbols used in clinical shorthand: "rdn +" -> "rdn+", "39 °c" -> "39°c"
    let mut out = String::with_capacity(collapsed.len());
    let chars: Vec<char> = collapsed.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let glued = |ch: Option<char>| matches!(ch, Some('+') | Some('-') | Some('°'));
            if glued(prev) || glued(next) {
                continue;
            }
        }
        out.push(c);
    }
    out.trim().to_string()
}

/// Number of whitespace-separated tokens.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
