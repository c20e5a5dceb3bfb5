// src/similarity/normalize.rs - Text canonicalization applied before similarity scoring

use once_cell::sync::Lazy;
use regex::Regex;

/// Dimension separators between digits: "3х2.5", "3 x 2.5", "3×2.5" all become "3x2.5".
static DIMENSION_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*[xх×*]\s*(\d)").expect("valid dimension regex"));

const EXTRA_PUNCTUATION: &[char] = &['«', '»', '“', '”', '„', '…', '–', '—', '№'];

/// Canonical form used by the pipeline, the candidate index and exact-match detection.
///
/// Lowercases, folds `ё` into `е`, turns a decimal comma between digits into a dot,
/// replaces every other punctuation mark with a space and collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect();

    let chars: Vec<char> = lowered.chars().collect();
    let mut cleaned = String::with_capacity(lowered.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' || c == '.' {
            let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let next_digit = chars.get(i + 1).map_or(false, |n| n.is_ascii_digit());
            if prev_digit && next_digit {
                cleaned.push('.');
            } else {
                cleaned.push(' ');
            }
        } else if c.is_ascii_punctuation() && c != '*' || EXTRA_PUNCTUATION.contains(&c) {
            cleaned.push(' ');
        } else {
            cleaned.push(c);
        }
    }

    let mut normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    // A match consumes the digit it shares with the next separator ("2×3×4"),
    // so repeat until nothing changes.
    loop {
        let next = DIMENSION_SEPARATOR.replace_all(&normalized, "${1}x${2}").into_owned();
        if next == normalized {
            return normalized;
        }
        normalized = next;
    }
}

/// Lowercased word tokens with surrounding punctuation trimmed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| c.is_ascii_punctuation() || EXTRA_PUNCTUATION.contains(&c))
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_comma_and_dot_agree() {
        assert_eq!(normalize_text("Кабель ВВГ 3x2,5"), "кабель ввг 3x2.5");
        assert_eq!(normalize_text("Кабель ВВГ 3x2.5"), "кабель ввг 3x2.5");
    }

    #[test]
    fn test_punctuation_and_whitespace() {
        assert_eq!(normalize_text("  ООО «Ромашка»,  г. Москва "), "ооо ромашка г москва");
        assert_eq!(normalize_text("Ёлка-палка"), "елка палка");
    }

    #[test]
    fn test_dimension_separators() {
        assert_eq!(normalize_text("Провод 3 х 1,5"), "провод 3x1.5");
        assert_eq!(normalize_text("Брус 2×3×4"), "брус 2x3x4");
        assert_eq!(normalize_text("Лист 1 х 2 х 3 х 4"), "лист 1x2x3x4");
        assert_eq!(normalize_text("Брус 2x3x4"), normalize_text("Брус 2×3 × 4"));
    }

    #[test]
    fn test_tokenize_trims_punctuation() {
        assert_eq!(
            tokenize("Hello, (World)! ok"),
            vec!["hello".to_string(), "world".to_string(), "ok".to_string()]
        );
        assert!(tokenize("  ,, ").is_empty());
    }
}
