// src/orchestrator/quality.rs - Weighted completeness and validity score for one record

use serde::{Deserialize, Serialize};

use crate::external::validators::{
    is_known_legal_form, validate_bank_requisites, validate_email, validate_phone, TaxIdValidator,
};
use crate::models::ExtractedAttributes;

const INVALID_TAX_ID_CREDIT: f64 = 0.4;
const INVALID_BANKING_CREDIT: f64 = 0.5;
const UNKNOWN_LEGAL_FORM_CREDIT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub name: f64,
    pub tax_id: f64,
    pub address: f64,
    pub contacts: f64,
    pub banking: f64,
    pub legal_form: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            name: 0.20,
            tax_id: 0.25,
            address: 0.15,
            contacts: 0.15,
            banking: 0.15,
            legal_form: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub issues: Vec<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Scores a record in [0, 1]. Missing fields earn nothing; malformed ones earn partial credit.
pub fn score_record(
    name: &str,
    attributes: &ExtractedAttributes,
    validator: &dyn TaxIdValidator,
    weights: &QualityWeights,
) -> QualityAssessment {
    let mut score = 0.0;
    let mut issues = Vec::new();

    if name.trim().is_empty() {
        issues.push("missing name".to_string());
    } else {
        score += weights.name;
    }

    match present(&attributes.tax_id).or(present(&attributes.business_id)) {
        Some(tax_id) if validator.validate_any(tax_id) => score += weights.tax_id,
        Some(tax_id) => {
            score += weights.tax_id * INVALID_TAX_ID_CREDIT;
            issues.push(format!("invalid tax id '{}'", tax_id));
        }
        None => issues.push("missing tax id".to_string()),
    }

    if present(&attributes.address).is_some() {
        score += weights.address;
    } else {
        issues.push("missing address".to_string());
    }

    let mut contacts: f64 = 0.0;
    match present(&attributes.phone) {
        Some(phone) if validate_phone(phone) => contacts += 2.0 / 3.0,
        Some(phone) => {
            contacts += 1.0 / 3.0;
            issues.push(format!("invalid phone '{}'", phone));
        }
        None => {}
    }
    match present(&attributes.email) {
        Some(email) if validate_email(email) => contacts += 1.0 / 3.0,
        Some(email) => issues.push(format!("invalid email '{}'", email)),
        None => {}
    }
    if contacts == 0.0 && present(&attributes.contact_person).is_some() {
        contacts = 1.0 / 3.0;
    }
    if contacts == 0.0 && present(&attributes.phone).is_none() && present(&attributes.email).is_none() {
        issues.push("missing contacts".to_string());
    }
    score += weights.contacts * contacts.min(1.0);

    let bank_code = present(&attributes.bank_code);
    let account = present(&attributes.bank_account);
    let correspondent = present(&attributes.correspondent_account);
    if bank_code.is_some() || account.is_some() || correspondent.is_some() {
        let (valid, errors) = validate_bank_requisites(bank_code, account, correspondent);
        if valid {
            score += weights.banking;
        } else {
            score += weights.banking * INVALID_BANKING_CREDIT;
            issues.extend(errors);
        }
    } else {
        issues.push("missing banking details".to_string());
    }

    match present(&attributes.legal_form) {
        Some(form) if is_known_legal_form(form) => score += weights.legal_form,
        Some(form) => {
            score += weights.legal_form * UNKNOWN_LEGAL_FORM_CREDIT;
            issues.push(format!("unrecognized legal form '{}'", form));
        }
        None => issues.push("missing legal form".to_string()),
    }

    QualityAssessment {
        score: score.clamp(0.0, 1.0),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ChecksumValidators;

    fn complete() -> ExtractedAttributes {
        ExtractedAttributes {
            tax_id: Some("7707083893".into()),
            address: Some("Москва, ул. Вавилова, 19".into()),
            phone: Some("+7 (495) 500-55-50".into()),
            email: Some("info@sberbank.ru".into()),
            legal_form: Some("ПАО".into()),
            bank_code: Some("044525225".into()),
            bank_account: Some("40702810400000000001".into()),
            correspondent_account: Some("30101810400000000225".into()),
            ..Default::default()
        }
    }

    fn score(name: &str, attrs: &ExtractedAttributes) -> QualityAssessment {
        score_record(name, attrs, &ChecksumValidators, &QualityWeights::default())
    }

    #[test]
    fn test_complete_record_scores_one() {
        let assessment = score("ПАО Сбербанк", &complete());
        assert!((assessment.score - 1.0).abs() < 1e-9, "{:?}", assessment);
        assert!(assessment.issues.is_empty());
    }

    #[test]
    fn test_empty_record_scores_zero() {
        let assessment = score("", &ExtractedAttributes::default());
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.issues.len(), 6);
    }

    #[test]
    fn test_invalid_tax_id_earns_partial_credit() {
        let mut attrs = complete();
        attrs.tax_id = Some("7707083894".into());
        let assessment = score("ПАО Сбербанк", &attrs);
        assert!((assessment.score - (1.0 - 0.25 * 0.6)).abs() < 1e-9);
        assert!(assessment.issues[0].contains("invalid tax id"));

        attrs.tax_id = None;
        assert!((score("ПАО Сбербанк", &attrs).score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_contact_credit() {
        let base = ExtractedAttributes::default();
        let weights = QualityWeights::default();
        let contacts_of = |attrs: &ExtractedAttributes| score("x", attrs).score - weights.name;

        let phone_only = ExtractedAttributes {
            phone: Some("8 800 555 35 35".into()),
            ..base.clone()
        };
        assert!((contacts_of(&phone_only) - 0.15 * 2.0 / 3.0).abs() < 1e-9);

        let bad_phone = ExtractedAttributes {
            phone: Some("12".into()),
            ..base.clone()
        };
        assert!((contacts_of(&bad_phone) - 0.05).abs() < 1e-9);

        let person_only = ExtractedAttributes {
            contact_person: Some("Иванов И.И.".into()),
            ..base
        };
        assert!((contacts_of(&person_only) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_banking_and_unknown_form_earn_half() {
        let mut attrs = complete();
        attrs.correspondent_account = Some("30101810400000000999".into());
        attrs.legal_form = Some("Товарищество".into());
        let assessment = score("Ромашка", &attrs);
        assert!((assessment.score - (1.0 - 0.075 - 0.05)).abs() < 1e-9);
        assert!(assessment
            .issues
            .iter()
            .any(|i| i.contains("does not match bank code")));
    }

    #[test]
    fn test_score_stays_in_unit_range_with_custom_weights() {
        let weights = QualityWeights {
            name: 0.9,
            tax_id: 0.9,
            ..QualityWeights::default()
        };
        let assessment = score_record("x", &complete(), &ChecksumValidators, &weights);
        assert_eq!(assessment.score, 1.0);
    }
}
