use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize the gateway's "boolean-ish" flags. Depending on firmware, `transApproved` and friends arrive as a
/// bool, a 0/1 number, or a "true"/"Y" string. Absent counts as false.
pub fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(is_truthy))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !s.is_empty() && s != "0" && s != "false" && s != "n" && s != "no"
        },
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
