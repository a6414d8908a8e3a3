//! Document parsing and validation around the envelope.

use serde_json::Value;

use crate::error::{Result, ShareError};

/// Checks a parsed document before it is sealed and after it is opened.
pub trait DocumentValidator: Send + Sync {
    /// Return a human-readable reason when `document` is unacceptable.
    fn validate(&self, document: &Value) -> std::result::Result<(), String>;
}

/// Accepts any JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectValidator;

impl DocumentValidator for JsonObjectValidator {
    fn validate(&self, document: &Value) -> std::result::Result<(), String> {
        if document.is_object() {
            Ok(())
        } else {
            Err("document must be a JSON object".to_string())
        }
    }
}

/// Parse `text` as JSON and run `validator` over it.
pub fn parse_document(text: &str, validator: &dyn DocumentValidator) -> Result<Value> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| ShareError::InvalidDocument(format!("not valid JSON: {}", e)))?;
    validator
        .validate(&document)
        .map_err(ShareError::InvalidDocument)?;
    Ok(document)
}

/// Compact serialization of a parsed document.
pub fn compact(document: &Value) -> Result<String> {
    serde_json::to_string(document).map_err(|e| ShareError::InvalidDocument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_accepted_and_compacted() {
        let doc = parse_document("{ \"a\" : [1, 2] }", &JsonObjectValidator).unwrap();
        assert_eq!(compact(&doc).unwrap(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_rejections() {
        for text in ["[1,2]", "\"str\"", "{not json", ""] {
            assert!(matches!(
                parse_document(text, &JsonObjectValidator),
                Err(ShareError::InvalidDocument(_))
            ));
        }
    }
}
