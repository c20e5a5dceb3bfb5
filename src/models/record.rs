// src/models/record.rs - Source records and their extracted attributes

use serde::{Deserialize, Serialize};

/// One uploaded master-data row as received from a source system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    /// Unstructured attribute payload handed to the extractor as-is.
    #[serde(default)]
    pub attributes: String,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, attributes: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: attributes.into(),
        }
    }
}

/// Structured fields found in a record's attributes. `None` means not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedAttributes {
    pub tax_id: Option<String>,
    pub regional_tax_id: Option<String>,
    pub business_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact_person: Option<String>,
    pub legal_form: Option<String>,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
    pub correspondent_account: Option<String>,
    pub bank_code: Option<String>,
}

impl ExtractedAttributes {
    /// Number of present, non-blank fields.
    pub fn filled_fields(&self) -> usize {
        [
            &self.tax_id,
            &self.regional_tax_id,
            &self.business_id,
            &self.address,
            &self.phone,
            &self.email,
            &self.contact_person,
            &self.legal_form,
            &self.bank_name,
            &self.bank_account,
            &self.correspondent_account,
            &self.bank_code,
        ]
        .iter()
        .filter(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count()
    }

    pub fn has_banking(&self) -> bool {
        self.bank_account.is_some()
            || self.correspondent_account.is_some()
            || self.bank_code.is_some()
            || self.bank_name.is_some()
    }
}

/// A trusted catalog entry returned by (or registered with) the reference lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: String,
    pub canonical_name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_fields_ignores_blank_values() {
        let attrs = ExtractedAttributes {
            tax_id: Some("7707083893".into()),
            address: Some("   ".into()),
            email: Some("info@example.ru".into()),
            ..Default::default()
        };
        assert_eq!(attrs.filled_fields(), 2);
        assert!(!attrs.has_banking());
    }

    #[test]
    fn test_source_record_attributes_default_to_empty() {
        let record: SourceRecord = serde_json::from_str(r#"{"id":"1","name":"ООО Ромашка"}"#).unwrap();
        assert_eq!(record.attributes, "");
    }
}
