//! Canonical item extraction from heterogeneous webhook payloads.
//!
//! Upstream workflows answer with a bare array, `{images: [...]}`,
//! `{data: [...]}`, `{urls: [...]}`, `{url: [...]}`, a single object with a
//! `url`, or a bare string. The shapes are an ordered rule table; the first
//! rule whose predicate matches decides the result.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::items::NormalizedItem;

/// Outcome of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A rule matched and produced at least one item.
    Recognized {
        rule: &'static str,
        items: Vec<NormalizedItem>,
    },
    /// A rule matched but the payload carried no usable items.
    Empty { rule: &'static str },
    /// No rule matched. `hint_keys` lists object keys mentioning `url`/`image`.
    Unrecognized { hint_keys: Vec<String> },
}

impl Normalized {
    pub fn items(&self) -> &[NormalizedItem] {
        match self {
            Normalized::Recognized { items, .. } => items,
            Normalized::Empty { .. } | Normalized::Unrecognized { .. } => &[],
        }
    }
}

/// One recognized payload shape.
#[derive(Clone, Copy)]
pub struct ShapeRule {
    pub name: &'static str,
    pub matches: fn(&Value) -> bool,
    pub extract: fn(&Value) -> Vec<NormalizedItem>,
}

impl std::fmt::Debug for ShapeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeRule").field("name", &self.name).finish()
    }
}

/// Ordered rule table applied to untrusted payloads.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<ShapeRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl Normalizer {
    /// The canonical priority order shared by every integration route.
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.to_vec(),
        }
    }

    /// Append a rule evaluated after the existing ones.
    pub fn with_rule(mut self, rule: ShapeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ShapeRule] {
        &self.rules
    }

    pub fn normalize(&self, payload: &Value) -> Normalized {
        for rule in &self.rules {
            if !(rule.matches)(payload) {
                continue;
            }

            let items = (rule.extract)(payload);
            debug!(
                target = "marketdesk::normalize",
                rule = rule.name,
                item_count = items.len(),
                "payload shape matched"
            );

            if items.is_empty() {
                return Normalized::Empty { rule: rule.name };
            }
            return Normalized::Recognized {
                rule: rule.name,
                items,
            };
        }

        let hint_keys = scan_hint_keys(payload);
        warn!(
            target = "marketdesk::normalize",
            hint_keys = ?hint_keys,
            payload_kind = value_kind(payload),
            "payload shape not recognized"
        );
        Normalized::Unrecognized { hint_keys }
    }
}

const STANDARD_RULES: [ShapeRule; 7] = [
    ShapeRule {
        name: "bare_array",
        matches: Value::is_array,
        extract: extract_bare_array,
    },
    ShapeRule {
        name: "images_array",
        matches: |value| array_field(value, "images").is_some(),
        extract: |value| items_from_elements(array_field(value, "images")),
    },
    ShapeRule {
        name: "data_array",
        matches: |value| array_field(value, "data").is_some(),
        extract: |value| items_from_elements(array_field(value, "data")),
    },
    ShapeRule {
        name: "urls_array",
        matches: |value| array_field(value, "urls").is_some(),
        extract: |value| items_from_strings(array_field(value, "urls")),
    },
    ShapeRule {
        name: "url_array",
        matches: |value| array_field(value, "url").is_some(),
        extract: |value| items_from_strings(array_field(value, "url")),
    },
    ShapeRule {
        name: "single_object",
        matches: |value| value.get("url").is_some_and(Value::is_string),
        extract: extract_single_object,
    },
    ShapeRule {
        name: "bare_string",
        matches: Value::is_string,
        extract: extract_bare_string,
    },
];

fn array_field<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value.as_object()?.get(key)?.as_array()
}

fn extract_bare_array(value: &Value) -> Vec<NormalizedItem> {
    items_from_elements(value.as_array())
}

fn extract_single_object(value: &Value) -> Vec<NormalizedItem> {
    value
        .as_object()
        .cloned()
        .and_then(NormalizedItem::from_object)
        .into_iter()
        .collect()
}

fn extract_bare_string(value: &Value) -> Vec<NormalizedItem> {
    value
        .as_str()
        .map(NormalizedItem::from_url)
        .into_iter()
        .collect()
}

fn items_from_elements(elements: Option<&Vec<Value>>) -> Vec<NormalizedItem> {
    let Some(elements) = elements else {
        return Vec::new();
    };

    let mut skipped = 0usize;
    let items: Vec<NormalizedItem> = elements
        .iter()
        .filter_map(|element| {
            let item = match element {
                Value::String(url) => Some(NormalizedItem::from_url(url.clone())),
                Value::Object(object) => NormalizedItem::from_object(object.clone()),
                _ => None,
            };
            if item.is_none() {
                skipped += 1;
            }
            item
        })
        .collect();

    if skipped > 0 {
        debug!(
            target = "marketdesk::normalize",
            skipped,
            kept = items.len(),
            "dropped array elements without a url"
        );
    }
    items
}

fn items_from_strings(elements: Option<&Vec<Value>>) -> Vec<NormalizedItem> {
    elements
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(NormalizedItem::from_url)
        .collect()
}

/// Object keys that look like they carry image or URL data, for diagnostics only.
pub fn scan_hint_keys(payload: &Value) -> Vec<String> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };
    hint_keys_of(object)
}

fn hint_keys_of(object: &Map<String, Value>) -> Vec<String> {
    object
        .keys()
        .filter(|key| {
            let lowered = key.to_ascii_lowercase();
            lowered.contains("url") || lowered.contains("image")
        })
        .cloned()
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
