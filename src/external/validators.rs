// src/external/validators.rs - Checksum and format validators for requisites

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

const TAX_ID10_WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const TAX_ID12_FIRST_WEIGHTS: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const TAX_ID12_SECOND_WEIGHTS: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const BUSINESS_ID_WEIGHTS: [u32; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
const BUSINESS_ID_FALLBACK_WEIGHTS: [u32; 11] = [3, 4, 5, 6, 7, 8, 9, 10, 11, 1, 2];

/// Legal-form abbreviations accepted without penalty (Russian and Kazakh registries, common Latin forms).
const KNOWN_LEGAL_FORMS: &[&str] = &[
    "ооо", "оао", "зао", "пао", "ао", "ип", "нко", "ано", "гуп", "муп", "фгуп", "тоо", "ао нк",
    "кх", "пк", "llc", "ltd", "inc", "jsc", "gmbh", "corp",
];

/// Checksum-based tax identifier validation, consumed by quality scoring.
pub trait TaxIdValidator: Send + Sync {
    fn validate_tax_id10(&self, value: &str) -> bool;
    fn validate_tax_id12(&self, value: &str) -> bool;
    fn validate_business_id12(&self, value: &str) -> bool;

    /// Accepts either tax identifier length, or a 12-digit business id.
    fn validate_any(&self, value: &str) -> bool {
        self.validate_tax_id10(value)
            || self.validate_tax_id12(value)
            || self.validate_business_id12(value)
    }
}

/// The standard weighted-sum mod 11 checksums.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumValidators;

impl TaxIdValidator for ChecksumValidators {
    fn validate_tax_id10(&self, value: &str) -> bool {
        validate_tax_id10(value)
    }

    fn validate_tax_id12(&self, value: &str) -> bool {
        validate_tax_id12(value)
    }

    fn validate_business_id12(&self, value: &str) -> bool {
        validate_business_id12(value)
    }
}

/// Digits with `separators` removed, or None when anything else remains.
fn digits_of(value: &str, separators: &[char], expected_len: usize) -> Option<Vec<u32>> {
    let digits: Vec<u32> = value
        .trim()
        .chars()
        .filter(|c| !separators.contains(c))
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()?;
    (digits.len() == expected_len).then_some(digits)
}

fn weighted_mod11(digits: &[u32], weights: &[u32]) -> u32 {
    digits.iter().zip(weights).map(|(d, w)| d * w).sum::<u32>() % 11
}

/// Mod 11 remainder with 10 mapped to 0.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    weighted_mod11(digits, weights) % 10
}

pub fn validate_tax_id10(value: &str) -> bool {
    let Some(d) = digits_of(value, &[' ', '-'], 10) else {
        return false;
    };
    check_digit(&d[..9], &TAX_ID10_WEIGHTS) == d[9]
}

pub fn validate_tax_id12(value: &str) -> bool {
    let Some(d) = digits_of(value, &[' ', '-'], 12) else {
        return false;
    };
    check_digit(&d[..10], &TAX_ID12_FIRST_WEIGHTS) == d[10]
        && check_digit(&d[..11], &TAX_ID12_SECOND_WEIGHTS) == d[11]
}

/// 12-digit business identification number. A remainder of 10 is recomputed
/// with the shifted weights; a second 10 maps to 0.
pub fn validate_business_id12(value: &str) -> bool {
    let Some(d) = digits_of(value, &[' ', '-'], 12) else {
        return false;
    };
    let mut check = weighted_mod11(&d[..11], &BUSINESS_ID_WEIGHTS);
    if check == 10 {
        check = weighted_mod11(&d[..11], &BUSINESS_ID_FALLBACK_WEIGHTS);
        if check == 10 {
            check = 0;
        }
    }
    check == d[11]
}

/// 10- or 12-digit tax identifier.
pub fn validate_tax_id(value: &str) -> bool {
    validate_tax_id10(value) || validate_tax_id12(value)
}

/// Regional registration code: nine digits, no checksum.
pub fn validate_regional_tax_id(value: &str) -> bool {
    digits_of(value, &[' ', '-'], 9).is_some()
}

/// Ten or eleven digits once spaces, dashes, brackets and the plus sign are removed.
pub fn validate_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    (cleaned.len() == 10 || cleaned.len() == 11) && cleaned.chars().all(|c| c.is_ascii_digit())
}

pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && EMAIL_PATTERN.is_match(email.trim())
}

/// Nine-digit bank identification code.
pub fn validate_bank_code(value: &str) -> bool {
    digits_of(value, &[' '], 9).is_some()
}

pub fn validate_bank_account(value: &str) -> bool {
    digits_of(value, &[' '], 20).is_some()
}

pub fn validate_correspondent_account(value: &str) -> bool {
    validate_bank_account(value)
}

/// Validates whatever requisites are present. Empty fields are skipped.
/// The correspondent account must end with the last three digits of the bank code.
pub fn validate_bank_requisites(
    bank_code: Option<&str>,
    account: Option<&str>,
    correspondent_account: Option<&str>,
) -> (bool, Vec<String>) {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|v| !v.is_empty())
    }
    let (bank_code, account, correspondent) = (
        present(bank_code),
        present(account),
        present(correspondent_account),
    );
    let mut errors = Vec::new();

    if let Some(code) = bank_code {
        if !validate_bank_code(code) {
            errors.push("invalid bank code format".to_string());
        }
    }
    if let Some(account) = account {
        if !validate_bank_account(account) {
            errors.push("invalid bank account format".to_string());
        }
    }
    if let Some(correspondent) = correspondent {
        if !validate_correspondent_account(correspondent) {
            errors.push("invalid correspondent account format".to_string());
        }
    }
    if let (Some(code), Some(correspondent)) = (bank_code, correspondent) {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        let correspondent: String = correspondent.chars().filter(|c| !c.is_whitespace()).collect();
        let code_suffix = code.get(code.len().saturating_sub(3)..);
        let account_suffix = correspondent.get(correspondent.len().saturating_sub(3)..);
        if code.len() >= 3 && correspondent.len() >= 3 && code_suffix != account_suffix {
            errors.push("correspondent account does not match bank code".to_string());
        }
    }

    (errors.is_empty(), errors)
}

/// Case-insensitive match against the known legal-form abbreviations.
pub fn is_known_legal_form(value: &str) -> bool {
    let normalized = value
        .trim()
        .trim_matches(|c: char| c == '.' || c == '"')
        .to_lowercase();
    KNOWN_LEGAL_FORMS.contains(&normalized.as_str())
}
