use serde::{Deserialize, Serialize};

/// A catalogued thesis (`thesestwo` row).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Thesis {
    pub thesis_id: i64,
    pub title: String,
    pub author: Option<String>,
    pub college: Option<String>,
    #[serde(default, deserialize_with = "super::string_or_number")]
    pub batch: Option<String>,
    #[serde(rename = "abstract")]
    pub summary: Option<String>,
    pub file_url: Option<String>,
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub available_copies: i64,
}
