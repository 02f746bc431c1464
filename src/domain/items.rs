//! Canonical item produced from untrusted webhook payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single image/news/recommendation entry with a URL and any extra fields
/// the upstream returned, serialized flat next to `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NormalizedItem {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extra: Map::new(),
        }
    }

    /// Build an item from an upstream object; returns `None` unless `url` is a string.
    pub fn from_object(mut object: Map<String, Value>) -> Option<Self> {
        match object.remove("url") {
            Some(Value::String(url)) => Some(Self { url, extra: object }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extra_fields_serialize_next_to_url() {
        let Value::Object(object) = json!({"url": "a.jpg", "alt": "cover"}) else {
            unreachable!()
        };
        let item = NormalizedItem::from_object(object).expect("object has url");

        assert_eq!(item.url, "a.jpg");
        assert_eq!(
            serde_json::to_value(&item).expect("serialize"),
            json!({"url": "a.jpg", "alt": "cover"})
        );
    }

    #[test]
    fn object_without_string_url_is_rejected() {
        let Value::Object(object) = json!({"url": 42}) else {
            unreachable!()
        };
        assert!(NormalizedItem::from_object(object).is_none());
    }
}
