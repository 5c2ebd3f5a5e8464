use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TYPE_ORIGINAL: &str = "tweet";
pub const TYPE_RESHARE: &str = "reshare";
pub const TYPE_QUOTE: &str = "quote";

/// A normalized record handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub cid: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Epoch seconds of the action this item represents.
    pub date: i64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ContentItem {
    pub fn new(source: &str, record_id: &str, item_type: &str, date: i64) -> Self {
        Self {
            cid: Self::generate_cid(source, record_id),
            item_type: item_type.to_string(),
            source: source.to_string(),
            text: None,
            link: None,
            date,
            metadata: Map::new(),
        }
    }

    /// Deterministic content id for the action identified by `record_id`.
    pub fn generate_cid(source: &str, record_id: &str) -> String {
        format!("{}-{}", source, record_id)
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}
