pub mod access_requests;
pub mod borrow;
pub mod notifications;
pub mod qr;
pub mod scans;
pub mod theses;
pub mod users;
pub mod views;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Free-text columns that some rows store as numbers (batch year, year level).
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
