// src/external/extractor.rs - Structured attribute extraction from raw record payloads

use serde_json::{Map, Value};

use crate::error::BatchError;
use crate::models::ExtractedAttributes;

/// Turns a record's raw attribute payload into structured fields.
/// Missing fields are `None`; only an unreadable payload is an error.
pub trait AttributeExtractor: Send + Sync {
    fn extract(&self, raw_attributes: &str) -> Result<ExtractedAttributes, BatchError>;
}

/// Reads the payload as a flat JSON object. Keys are matched case-insensitively
/// against English field names and the common Russian/Kazakh registry abbreviations.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAttributeExtractor;

fn field_for<'a>(attributes: &'a mut ExtractedAttributes, key: &str) -> Option<&'a mut Option<String>> {
    let slot = match key {
        "tax_id" | "inn" | "инн" => &mut attributes.tax_id,
        "regional_tax_id" | "kpp" | "кпп" => &mut attributes.regional_tax_id,
        "business_id" | "bin" | "бин" => &mut attributes.business_id,
        "address" | "legal_address" | "адрес" => &mut attributes.address,
        "phone" | "contact_phone" | "телефон" => &mut attributes.phone,
        "email" | "contact_email" => &mut attributes.email,
        "contact_person" | "контактное_лицо" => &mut attributes.contact_person,
        "legal_form" | "опф" => &mut attributes.legal_form,
        "bank_name" | "банк" => &mut attributes.bank_name,
        "bank_account" | "account" | "расчетный_счет" => &mut attributes.bank_account,
        "correspondent_account" | "корр_счет" => &mut attributes.correspondent_account,
        "bank_code" | "bik" | "бик" => &mut attributes.bank_code,
        _ => return None,
    };
    Some(slot)
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

impl AttributeExtractor for JsonAttributeExtractor {
    fn extract(&self, raw_attributes: &str) -> Result<ExtractedAttributes, BatchError> {
        if raw_attributes.trim().is_empty() {
            return Ok(ExtractedAttributes::default());
        }
        let object: Map<String, Value> = match serde_json::from_str(raw_attributes) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                return Err(BatchError::record(format!(
                    "attributes must be a JSON object, got {}",
                    match other {
                        Value::Array(_) => "an array",
                        Value::String(_) => "a string",
                        Value::Number(_) => "a number",
                        Value::Bool(_) => "a boolean",
                        _ => "null",
                    }
                )))
            }
            Err(e) => return Err(BatchError::record(format!("unreadable attributes: {}", e))),
        };

        let mut attributes = ExtractedAttributes::default();
        for (key, value) in &object {
            let key = key.trim().to_lowercase();
            if let (Some(slot), Some(text)) = (field_for(&mut attributes, &key), value_text(value)) {
                // First non-empty occurrence wins.
                slot.get_or_insert(text);
            }
        }
        Ok(attributes)
    }
}
