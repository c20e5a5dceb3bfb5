// src/similarity/algorithms/phonetic.rs - Phonetic-code family scorers (Cyrillic and Latin)

use super::edit_distance::damerau_levenshtein_distance;
use super::SimilarityAlgorithm;

const SOUNDEX_LEN: usize = 4;
const METAPHONE_MAX_LEN: usize = 6;

/// Soundex digit for a Cyrillic or Latin letter, uppercase input.
/// 0 marks vowels and signs, which are skipped.
fn soundex_digit(c: char) -> u8 {
    match c {
        'Б' | 'П' | 'Ф' | 'В' => 1,
        'Г' | 'К' | 'Х' => 2,
        'Д' | 'Т' => 3,
        'Ж' | 'Ш' | 'Щ' | 'Ч' => 4,
        'З' | 'С' | 'Ц' => 5,
        'Л' => 6,
        'М' | 'Н' => 7,
        'Р' => 8,
        'Й' => 9,
        'B' | 'F' | 'P' | 'V' => 1,
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => 2,
        'D' | 'T' => 3,
        'L' => 6,
        'M' | 'N' => 7,
        'R' => 8,
        _ => 0,
    }
}

/// Four-character code: first letter followed by three digits, zero padded.
/// Returns an empty code when the text holds no letters.
pub fn soundex_code(text: &str) -> String {
    let letters: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .map(|c| if c == 'Ё' { 'Е' } else { c })
        .collect();
    let Some(&first) = letters.first() else {
        return String::new();
    };

    let mut code = String::with_capacity(SOUNDEX_LEN);
    code.push(first);
    let mut last = soundex_digit(first);
    let mut digits = 0;
    for &c in &letters[1..] {
        let digit = soundex_digit(c);
        if digit != 0 && digit != last {
            code.push(char::from(b'0' + digit));
            digits += 1;
            if digits == SOUNDEX_LEN - 1 {
                break;
            }
        }
        last = digit;
    }
    while code.chars().count() < SOUNDEX_LEN {
        code.push('0');
    }
    code
}

pub struct Soundex;

impl SimilarityAlgorithm for Soundex {
    fn name(&self) -> &'static str {
        "soundex"
    }

    /// Share of equal code positions.
    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let code_a: Vec<char> = soundex_code(a).chars().collect();
        let code_b: Vec<char> = soundex_code(b).chars().collect();
        if code_a.is_empty() || code_b.is_empty() {
            return 0.0;
        }
        let matches = code_a.iter().zip(&code_b).filter(|(x, y)| x == y).count();
        matches as f64 / SOUNDEX_LEN as f64
    }
}

fn is_vowel(c: char) -> bool {
    matches!(
        c,
        'А' | 'Е' | 'И' | 'О' | 'У' | 'Ы' | 'Э' | 'Ю' | 'Я' | 'A' | 'E' | 'I' | 'O' | 'U' | 'Y'
    )
}

/// Collapses voiced/voiceless and near-identical consonants into one class letter.
fn consonant_class(c: char) -> Option<char> {
    let class = match c {
        'Б' | 'П' | 'B' | 'P' => 'П',
        'В' | 'Ф' | 'V' | 'F' | 'W' => 'Ф',
        'Г' | 'К' | 'Х' | 'G' | 'K' | 'C' | 'Q' | 'H' => 'К',
        'Д' | 'Т' | 'D' | 'T' => 'Т',
        'Ж' | 'Ш' | 'Щ' | 'Ч' | 'J' => 'Ш',
        'З' | 'С' | 'Ц' | 'Z' | 'S' | 'X' => 'С',
        'Л' | 'L' => 'Л',
        'М' | 'M' => 'М',
        'Н' | 'N' => 'Н',
        'Р' | 'R' => 'Р',
        'Й' => 'Й',
        'Ь' | 'Ъ' => return None,
        other if other.is_alphabetic() => other,
        _ => return None,
    };
    Some(class)
}

/// Phonetic key: the first letter's class, then consonant classes with vowels dropped
/// and repeats collapsed, truncated to six characters.
pub fn metaphone_code(text: &str) -> String {
    let letters: Vec<char> = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .map(|c| if c == 'Ё' { 'Е' } else { c })
        .collect();
    let Some(&first) = letters.first() else {
        return String::new();
    };

    let mut code: Vec<char> = Vec::with_capacity(METAPHONE_MAX_LEN);
    let first_class = if is_vowel(first) {
        Some(first)
    } else {
        consonant_class(first)
    };
    code.extend(first_class);

    for &c in &letters[1..] {
        if code.len() >= METAPHONE_MAX_LEN {
            break;
        }
        if is_vowel(c) {
            continue;
        }
        if let Some(class) = consonant_class(c) {
            if code.last() != Some(&class) {
                code.push(class);
            }
        }
    }
    code.into_iter().collect()
}

pub struct Metaphone;

impl SimilarityAlgorithm for Metaphone {
    fn name(&self) -> &'static str {
        "metaphone"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let code_a = metaphone_code(a);
        let code_b = metaphone_code(b);
        if code_a.is_empty() || code_b.is_empty() {
            return 0.0;
        }
        if code_a == code_b {
            return 1.0;
        }
        let max_len = code_a.chars().count().max(code_b.chars().count());
        let distance = damerau_levenshtein_distance(&code_a, &code_b);
        (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
    }
}
