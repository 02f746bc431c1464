//! Recovery of JSON embedded in free-form LLM output.

use serde_json::Value;

/// Strip a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Remove commas that directly precede a closing `}` or `]`, ignoring string contents.
pub fn remove_trailing_commas(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut pending_comma: Option<String> = None;
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            output.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if let Some(buffer) = pending_comma.as_mut() {
            if ch.is_whitespace() {
                buffer.push(ch);
                continue;
            }
            let buffered = pending_comma.take().unwrap_or_default();
            if ch == '}' || ch == ']' {
                // Keep the whitespace, drop the comma.
                output.push_str(&buffered[1..]);
            } else {
                output.push_str(&buffered);
            }
        }

        match ch {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_string = true;
                output.push(ch);
            }
            _ => output.push(ch),
        }
    }

    if let Some(buffered) = pending_comma {
        output.push_str(&buffered);
    }
    output
}

/// Span from the first `open` to the last `close`, if any.
fn delimited_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the object span and the array span inside surrounding prose separately.
/// The widest one that parses wins, so a stray `[1]` never shadows the payload.
fn embedded_json(text: &str) -> Option<Value> {
    [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| delimited_span(text, open, close))
        .filter_map(|span| {
            serde_json::from_str::<Value>(span)
                .ok()
                .map(|value| (span.len(), value))
        })
        .max_by_key(|(len, _)| *len)
        .map(|(_, value)| value)
}

/// Parse JSON from LLM output, tolerating fences, trailing commas and surrounding prose.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    let unfenced = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let repaired = remove_trailing_commas(unfenced);
    match serde_json::from_str(&repaired) {
        Ok(value) => Ok(value),
        Err(err) => embedded_json(&repaired).ok_or(err),
    }
}
