use bridge_api::{resolve_path, ClientError, DocumentParser, SchemaValidator};

// ═══════════════════════════════════════════════════════════════
//  JsonDocumentParser
// ═══════════════════════════════════════════════════════════════

/// Parses message values as UTF-8 JSON documents.
pub struct JsonDocumentParser;

impl DocumentParser for JsonDocumentParser {
    fn parse(&self, data: &[u8]) -> Result<serde_json::Value, ClientError> {
        let s = std::str::from_utf8(data)?;
        Ok(serde_json::from_str(s)?)
    }
}

// ═══════════════════════════════════════════════════════════════
//  RequiredFieldsValidator
// ═══════════════════════════════════════════════════════════════

/// Rejects documents that lack any of the configured dot-notation paths
/// (e.g. `"message._id"`, `"message.db"`).
pub struct RequiredFieldsValidator {
    paths: Vec<String>,
}

impl RequiredFieldsValidator {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }
}

impl SchemaValidator for RequiredFieldsValidator {
    fn validate(&self, document: &serde_json::Value) -> Result<(), ClientError> {
        if !document.is_object() {
            return Err(ClientError::format_err("document is not a JSON object"));
        }
        match self.paths.iter().find(|p| resolve_path(document, p).is_none()) {
            Some(missing) => Err(ClientError::format_err(format!("missing required field '{missing}'"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_api::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_json_with_any_whitespace() {
        let doc = JsonDocumentParser.parse(b"{ \"message\" :\n { \"_id\": 1 } }").unwrap();
        assert_eq!(doc, json!({"message": {"_id": 1}}));
    }

    #[test]
    fn malformed_input_is_a_format_error() {
        let err = JsonDocumentParser.parse(b"{\"message\":").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = JsonDocumentParser.parse(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn validator_checks_paths() {
        let validator = RequiredFieldsValidator::new(vec!["message._id".into(), "message.db".into()]);
        assert!(validator.validate(&json!({"message": {"_id": 1, "db": "x"}})).is_ok());

        let err = validator.validate(&json!({"message": {"_id": 1}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.message().contains("message.db"));
    }

    #[test]
    fn validator_rejects_non_objects() {
        let validator = RequiredFieldsValidator::new(Vec::new());
        assert!(validator.validate(&json!({})).is_ok());
        assert!(validator.validate(&json!([1, 2])).is_err());
    }
}
