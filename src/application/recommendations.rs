//! Typed extraction of idea recommendations from workflow payloads.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::gateway::WebhookError;

/// JSON pointers tried in order; the first one resolving to an array wins.
const RECOMMENDATION_POINTERS: [&str; 4] = [
    "/output/recommendations",
    "/0/recommendations",
    "/recommendations",
    "/0/output/recommendations",
];

/// Keys read as the description, first string value wins.
const DESCRIPTION_KEYS: [&str; 3] = ["description", "summary", "idea"];

/// One creative idea suggested by the generation workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Recommendation {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Self {
                title: text.trim().to_string(),
                description: String::new(),
                details: Map::new(),
            }),
            Value::Object(object) => Self::from_object(object.clone()),
            other => {
                debug!(
                    target = "marketdesk::ideas",
                    entry = %other,
                    "skipping recommendation entry"
                );
                None
            }
        }
    }

    fn from_object(mut details: Map<String, Value>) -> Option<Self> {
        let title = match details.remove("title") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(title)) => title,
            Some(other) => {
                debug!(
                    target = "marketdesk::ideas",
                    title = %other,
                    "skipping recommendation with a non-string title"
                );
                return None;
            }
        };

        let description_key = DESCRIPTION_KEYS
            .into_iter()
            .find(|key| details.get(*key).is_some_and(Value::is_string));
        let description = match description_key.and_then(|key| details.remove(key)) {
            Some(Value::String(description)) => description,
            _ => String::new(),
        };

        Some(Self {
            title,
            description,
            details,
        })
    }
}

/// Pull the recommendation list out of any of the known wrapper layouts.
pub fn extract_recommendations(payload: &Value) -> Result<Vec<Recommendation>, WebhookError> {
    for pointer in RECOMMENDATION_POINTERS {
        let Some(entries) = payload.pointer(pointer).and_then(Value::as_array) else {
            continue;
        };

        let recommendations: Vec<Recommendation> =
            entries.iter().filter_map(Recommendation::from_value).collect();
        debug!(
            target = "marketdesk::ideas",
            pointer,
            count = recommendations.len(),
            "recommendations located"
        );

        if recommendations.is_empty() {
            return Err(WebhookError::NoItemsFound);
        }
        return Ok(recommendations);
    }

    let hint_keys = top_level_keys(payload);
    Err(WebhookError::UnrecognizedShape { hint_keys })
}

fn top_level_keys(payload: &Value) -> Vec<String> {
    let object = match payload {
        Value::Object(object) => Some(object),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    };
    object
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default()
}
