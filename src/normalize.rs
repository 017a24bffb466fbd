//! String normalization for heterogeneous commercial product names.
//!
//! Implements a fixed 14-stage pipeline: whitespace unification, glyph
//! lookalike folding, case folding, decimal separators, dimension
//! extraction, domain synonyms, punctuation stripping, number-unit
//! attachment, weak-word removal, unit stripping, tokenization, dedup,
//! token sort, and join. Every stage after the first is gated by an
//! `Options` flag or unconditional; none of this is configurable beyond
//! the documented flags.

use crate::types::Options;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DIGIT_COMMA_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d),(\d)").unwrap());

static MUL_SEP_BETWEEN_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)( *)([×*хХ])( *)(\d)").unwrap());

static DIMENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{2,5} ?[xх×*] ?\d{2,5}(?: ?[xх×*] ?\d{1,5})? ?(?:мм|mm)?").unwrap()
});

static DIMENSION_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{2,5})\s*[xх×*]\s*(\d{2,5})(?:\s*[xх×*]\s*(\d{1,5}))?").unwrap());

static EURO_PALLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:евро[\s-]*поддон|поддон[\s-]*евро)\b").unwrap());

// Longest-alternative-first so a short unit can't shadow a longer one under
// leftmost-first alternation semantics.
const UNIT_ALT: &str = "мл|кг|мг|мм|см|шт|л|г|м|%";

static PALLET_SYNONYM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(паллетта|паллета|палета|паллет|палет)\b").unwrap());
static SHT_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bшт\.").unwrap());
static L_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bл\.").unwrap());

static NON_NAME_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}%.,]+").unwrap());

static NUM_UNIT_ATTACH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(\d+(?:[.,]\d+)?)\s+({})\b", UNIT_ALT)).unwrap()
});

static WEAK_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bтара\b|\bупаковочн\w*\b|\bуп\.").unwrap());

static BARE_UNIT: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?i)\b(?:{})\b", UNIT_ALT)).unwrap());

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

static NUM_UNIT_ATOM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d+(?:\.\d+)?(шт|л|кг|г|гр|мл|мм|см|м|pcs|pc|l|kg|g|ml|mm|cm|m)$").unwrap()
});
static DIM_ATOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2,5}x\d{2,5}$").unwrap());

fn unify_whitespace(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{202F}' | '\u{2007}' | '\t' | '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

fn fold_lookalikes(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A' => 'А',
            'B' => 'В',
            'C' => 'С',
            'E' => 'Е',
            'H' => 'Н',
            'K' => 'К',
            'M' => 'М',
            'O' => 'О',
            'P' => 'Р',
            'T' => 'Т',
            'X' => 'Х',
            'Y' => 'У',
            'L' => 'Л',
            'a' => 'а',
            'c' => 'с',
            'e' => 'е',
            'o' => 'о',
            'p' => 'р',
            'x' => 'х',
            'm' => 'м',
            'l' => 'л',
            'y' => 'у',
            'k' => 'к',
            'Ё' => 'Е',
            'ё' => 'е',
            other => other,
        })
        .collect()
}

fn unify_mul_separators(s: &str) -> String {
    MUL_SEP_BETWEEN_DIGITS
        .replace_all(s, "${1}${2}x${4}${5}")
        .into_owned()
}

fn strip_leading_zeros(s: &str) -> String {
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Stage 5: pull out `AxB`-style dimension tokens, returning the text with
/// every matched span excised (replaced by a single space) and the list of
/// stashed `AxB` tokens in order of appearance.
fn extract_dimensions(s: &str) -> (String, Vec<String>) {
    let mut stashed = Vec::new();
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for m in DIMENSION.find_iter(s) {
        out.push_str(&s[last..m.start()]);
        out.push(' ');
        last = m.end();
        if let Some(caps) = DIMENSION_PARTS.captures(m.as_str()) {
            let a = strip_leading_zeros(&caps[1]);
            let b = strip_leading_zeros(&caps[2]);
            stashed.push(format!("{}x{}", a, b));
        }
    }
    out.push_str(&s[last..]);
    (out, stashed)
}

fn apply_domain_synonyms(s: &str) -> String {
    let s = EURO_PALLET.replace_all(s, "европоддон");
    let s = PALLET_SYNONYM.replace_all(&s, "поддон");
    let s = SHT_DOT.replace_all(&s, "шт");
    let s = L_DOT.replace_all(&s, "л");
    s.into_owned()
}

fn attach_num_units(s: &str) -> String {
    let mut current = s.to_string();
    for _ in 0..8 {
        let next = NUM_UNIT_ATTACH.replace_all(&current, "$1$2").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Implements the fixed 14-stage normalization pipeline described above.
pub fn normalize(name: &str, opt: &Options) -> String {
    if name.is_empty() {
        return String::new();
    }

    // Stage 1: whitespace unification.
    let mut s = unify_whitespace(name);

    // Stage 2: glyph unification.
    if opt.unify {
        s = fold_lookalikes(&s);
        s = unify_mul_separators(&s);
    }

    // Stage 3: case folding.
    if opt.lowercase {
        s = s.to_lowercase();
    }

    // Stage 4: decimal separator.
    s = DIGIT_COMMA_DIGIT.replace_all(&s, "$1.$2").into_owned();

    // Stage 5: dimension extraction.
    let (s, dims) = extract_dimensions(&s);
    let mut s = s;

    // Stage 6: domain synonyms.
    s = apply_domain_synonyms(&s);

    // Stage 7: punctuation stripping.
    if opt.normalization {
        s = NON_NAME_PUNCT.replace_all(&s, " ").into_owned();
    }

    // Stage 8: number-unit attachment (fixed point).
    s = attach_num_units(&s);

    // Stage 9: weak-word removal.
    s = WEAK_WORD.replace_all(&s, " ").into_owned();

    // Stage 10: unit stripping.
    if opt.strip_units {
        s = BARE_UNIT.replace_all(&s, " ").into_owned();
    }

    // Stage 11: tokenization.
    let mut tokens: Vec<String> = TOKEN_SPLIT
        .split(&s)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    // Stage 12: dedup (preserve first occurrence), then append stashed dims.
    let mut seen = HashSet::new();
    tokens.retain(|t| seen.insert(t.clone()));
    for d in dims {
        if seen.insert(d.clone()) {
            tokens.push(d);
        }
    }

    // Stage 13: token sort.
    if opt.token_sort {
        tokens.sort();
    }

    // Stage 14: join + trim.
    tokens.join(" ").trim().to_string()
}

/// Re-sorts the whitespace-separated tokens of an already-normalized string.
/// Used by the fuzzy tier's token-order-independent similarity comparison,
/// independent of whether `Options::token_sort` was enabled when `name_norm`
/// was produced.
pub fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort();
    tokens.join(" ")
}

/// Extracts the sorted multiset of numeric-unit atoms from an already
/// normalized name: fused `<number><unit>` tokens (unit canonicalized to a
/// fixed internal alphabet) and `<a>x<b>` dimension tokens.
pub fn num_units(name_norm: &str) -> Vec<String> {
    let mut atoms: Vec<String> = name_norm
        .split_whitespace()
        .filter_map(|tok| {
            if DIM_ATOM.is_match(tok) {
                return Some(tok.to_string());
            }
            NUM_UNIT_ATOM.captures(tok).map(|caps| {
                let unit = canonical_unit(&caps[1]);
                let number_len = tok.len() - caps[1].len();
                format!("{}{}", &tok[..number_len], unit)
            })
        })
        .collect();
    atoms.sort();
    atoms
}

fn canonical_unit(unit: &str) -> &'static str {
    match unit.to_lowercase().as_str() {
        "шт" | "pcs" | "pc" => "pcs",
        "л" | "l" => "l",
        "кг" | "kg" => "kg",
        "г" | "гр" | "g" => "g",
        "мл" | "ml" => "ml",
        "мм" | "mm" => "mm",
        "см" | "cm" => "cm",
        "м" | "m" => "m",
        other => unreachable!("unexpected unit alternative: {other}"),
    }
}


#[cfg(test)]
mod idempotence_property {
    use super::*;
    use proptest::prelude::*;

    // Product-name-shaped strings: Cyrillic/Latin letters, digits, and the
    // punctuation/separators the pipeline specifically targets, rather than
    // arbitrary Unicode — a uniformly random string would mostly exercise
    // the fall-through "no stage matches" path and tell us nothing about
    // the stages that interact (dimension extraction, synonym folding,
    // unit fusion, tokenization).
    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Zа-яА-ЯёЁ0-9 .,×x*х/%-]{0,40}"
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in name_strategy()) {
            let opt = Options::default();
            let once = normalize(&s, &opt);
            let twice = normalize(&once, &opt);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalize_never_panics(s in name_strategy()) {
            let opt = Options::default();
            let _ = normalize(&s, &opt);
        }
    }
}
