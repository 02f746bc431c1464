//! Request field cleanup shared by the services.

use url::Url;

use crate::application::error::ServiceError;

/// Trimmed value, rejecting blanks.
pub fn required(value: &str, field: &'static str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("`{field}` must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed value, with blanks collapsed to `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Trimmed, de-duplicated, non-empty tags in first-seen order.
pub fn tags(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !out.iter().any(|existing| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// An absolute `http`/`https` URL.
pub fn http_url(value: &str, field: &'static str) -> Result<Url, ServiceError> {
    let value = required(value, field)?;
    let url = Url::parse(&value)
        .map_err(|err| ServiceError::validation(format!("`{field}` is not a valid URL: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ServiceError::validation(format!(
            "`{field}` must use http or https, got `{other}`"
        ))),
    }
}
