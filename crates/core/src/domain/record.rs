use serde_json::Value;

/// Schema-less record returned by a record store lookup.
pub type Record = serde_json::Map<String, Value>;

/// First present field among `keys`, rendered as display text.
pub fn field_text(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    })
}
