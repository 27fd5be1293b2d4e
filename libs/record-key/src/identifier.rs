use serde_json::{Map, Value};

/// Locate `message._id` and normalize it to an object.
///
/// - `_id` object → returned as is
/// - `_id` scalar → `{"id": "<text>"}` (`123` → `{"id":"123"}`)
/// - `message` missing or not an object, `_id` missing or an array → `None`
pub fn extract_identifier(doc: &Value) -> Option<Value> {
    let id = doc.get("message")?.as_object()?.get("_id")?;

    let text = match id {
        Value::Object(_) => return Some(id.clone()),
        Value::Array(_) => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    };

    let mut wrapped = Map::new();
    wrapped.insert("id".to_string(), Value::String(text));
    Some(Value::Object(wrapped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalize_to_string;
    use serde_json::json;

    fn id_text(body: &str) -> Option<String> {
        let doc: Value = serde_json::from_str(body).unwrap();
        extract_identifier(&doc).map(|id| canonicalize_to_string(&id))
    }

    #[test]
    fn object_id_is_returned_unchanged() {
        assert_eq!(
            id_text(r#"{"message":{"_id":{"test_key":"test_value"}}}"#).as_deref(),
            Some(r#"{"test_key":"test_value"}"#)
        );
    }

    #[test]
    fn string_id_is_wrapped() {
        assert_eq!(id_text(r#"{"message":{"_id":"value"}}"#).as_deref(), Some(r#"{"id":"value"}"#));
    }

    #[test]
    fn numeric_id_is_wrapped_as_text() {
        assert_eq!(id_text(r#"{"message":{"_id":123}}"#).as_deref(), Some(r#"{"id":"123"}"#));
        assert_eq!(id_text(r#"{"message":{"_id":12.5}}"#).as_deref(), Some(r#"{"id":"12.5"}"#));
    }

    #[test]
    fn other_scalars_are_wrapped_as_text() {
        assert_eq!(id_text(r#"{"message":{"_id":true}}"#).as_deref(), Some(r#"{"id":"true"}"#));
        assert_eq!(id_text(r#"{"message":{"_id":null}}"#).as_deref(), Some(r#"{"id":"null"}"#));
    }

    #[test]
    fn missing_message() {
        assert_eq!(id_text(r#"{"test_object":{"_id":{"test_key":"test_value"}}}"#), None);
    }

    #[test]
    fn message_not_an_object() {
        assert_eq!(id_text(r#"{"message":"test_value"}"#), None);
        assert_eq!(id_text(r#"{"message":["test_value"]}"#), None);
    }

    #[test]
    fn missing_id() {
        assert_eq!(id_text(r#"{"message":{"test_object":{"test_key":"test_value"}}}"#), None);
    }

    #[test]
    fn array_id() {
        assert_eq!(id_text(r#"{"message":{"_id":["test_value"]}}"#), None);
    }

    #[test]
    fn top_level_not_an_object() {
        assert_eq!(extract_identifier(&json!("message")), None);
        assert_eq!(extract_identifier(&json!([{"message": {"_id": 1}}])), None);
    }
}
