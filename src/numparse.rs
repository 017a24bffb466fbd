//! Parses a text cell into a real number.
//!
//! Tolerates NBSP/narrow-NBSP/figure-space/thin-space padding, parenthesized
//! negatives, the Unicode minus sign, and thousands separators expressed as
//! spaces or commas. Returns `None` rather than panicking on anything it
//! cannot parse — malformed cells become zero quantities upstream in the
//! matcher, never an error.

const SPECIAL_SPACES: [char; 4] = ['\u{00A0}', '\u{202F}', '\u{2007}', '\u{2009}'];

fn is_separator_space(c: char) -> bool {
    c == ' ' || c == '\t' || SPECIAL_SPACES.contains(&c)
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || SPECIAL_SPACES.contains(&c));
    if trimmed.is_empty() {
        return None;
    }

    let mut neg = false;
    let inner = if trimmed.starts_with('(') && trimmed.ends_with(')') && trimmed.len() >= 2 {
        neg = true;
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let unicode_minus_folded: String = inner.chars().map(|c| if c == '\u{2212}' { '-' } else { c }).collect();

    let no_seps: String = unicode_minus_folded
        .chars()
        .filter(|&c| !is_separator_space(c))
        .collect();

    if no_seps.is_empty() {
        return None;
    }

    let cleaned = if no_seps.contains('.') {
        // commas are thousands separators when a period is also present.
        no_seps.chars().filter(|&c| c != ',').collect::<String>()
    } else if let Some(last_comma) = no_seps.rfind(',') {
        // the last (and only meaningful) comma is the decimal point.
        let (head, tail) = no_seps.split_at(last_comma);
        let tail = &tail[1..];
        let head_digits: String = head.chars().filter(|&c| c != ',').collect();
        format!("{}.{}", head_digits, tail)
    } else {
        no_seps
    };

    match cleaned.as_str() {
        "" | "-" | "." | "-." => return None,
        _ => {}
    }

    cleaned.parse::<f64>().ok().map(|v| if neg { -v } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parenthesized_negative() {
        assert_eq!(parse_number("(1 234,50)"), Some(-1234.50));
    }

    #[test]
    fn plain_negative_with_thousands_comma_decimal() {
        assert_eq!(parse_number("-1 234,50"), Some(-1234.50));
    }

    #[test]
    fn us_style_thousands_and_decimal_point() {
        assert_eq!(parse_number("1,234.56"), Some(1234.56));
    }

    #[test]
    fn unicode_minus_sign() {
        assert_eq!(parse_number("\u{2212}42"), Some(-42.0));
    }

    #[test]
    fn nbsp_padding() {
        assert_eq!(parse_number("\u{00A0}7\u{00A0}"), Some(7.0));
    }

    #[test]
    fn thin_space_thousands_separator() {
        assert_eq!(parse_number("1\u{2009}234"), Some(1234.0));
    }

    #[test]
    fn rejects_degenerate_inputs() {
        for s in ["", "-", ".", "-.", "   ", "abc"] {
            assert_eq!(parse_number(s), None, "expected None for {:?}", s);
        }
    }

    #[test]
    fn plain_integer() {
        assert_eq!(parse_number("42"), Some(42.0));
    }
}
