use crate::ClientError;

/// Resolve a dot-notation path in a `serde_json::Value`.
///
/// Supports nested field access via dot separation:
/// - `"message"` → `value["message"]`
/// - `"message._id"` → `value["message"]["_id"]`
/// - `"message.ts.date"` → `value["message"]["ts"]["date"]`
///
/// Returns `None` if any segment is missing.
pub fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Offset right after `offset`: the value to commit once `offset` is
/// processed. Fails with a logic error at `i64::MAX`.
pub fn next_offset(offset: i64) -> Result<i64, ClientError> {
    offset
        .checked_add(1)
        .ok_or_else(|| ClientError::new(format!("offset {offset} has no successor")))
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
