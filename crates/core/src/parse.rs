//! Google Books volumes response parsing.
//!
//! Parsing fails soft: a bad document yields no volumes, a bad item is
//! skipped without affecting its neighbours. Diagnostics go to `tracing`.

use serde_json::Value;

use crate::error::ParseError;
use crate::volume::Volume;

/// Parse a volumes response body into volumes, in response order.
pub fn parse_volumes(json: Option<&str>) -> Vec<Volume> {
    let items = match response_items(json) {
        Ok(items) => items,
        Err(ParseError::Empty) => {
            tracing::debug!("empty volumes response");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "problem parsing the volume JSON results");
            return Vec::new();
        }
    };

    let mut volumes = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match parse_item(index, item) {
            Ok(v) => volumes.push(v),
            Err(e) => tracing::warn!(error = %e, "skipping volume"),
        }
    }
    volumes
}

/// Top-level validation: returns the `items` array. A response without
/// `items` is how the API reports zero hits, so that is an empty list.
fn response_items(json: Option<&str>) -> Result<Vec<Value>, ParseError> {
    let body = json.map(str::trim).unwrap_or("");
    if body.is_empty() {
        return Err(ParseError::Empty);
    }
    let v: Value = serde_json::from_str(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let Value::Object(mut obj) = v else {
        return Err(ParseError::UnexpectedShape("top-level value is not an object".to_string()));
    };
    match obj.remove("items") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ParseError::UnexpectedShape("`items` is not an array".to_string())),
    }
}

fn parse_item(index: usize, item: &Value) -> Result<Volume, ParseError> {
    let invalid = |detail: &str| ParseError::InvalidItem { index, detail: detail.to_string() };

    let info = item
        .get("volumeInfo")
        .and_then(|i| i.as_object())
        .ok_or_else(|| invalid("missing `volumeInfo` object"))?;

    let title = info
        .get("title")
        .and_then(|t| t.as_str())
        .ok_or_else(|| invalid("missing or non-string `title`"))?;

    // Entries must be strings; numbers or objects are not coerced into names.
    let authors = match info.get("authors") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(a)) => a
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| invalid("non-string entry in `authors`"))?,
        Some(_) => return Err(invalid("`authors` is not an array")),
    };

    let thumbnail = info
        .get("imageLinks")
        .and_then(|l| l.get("thumbnail"))
        .and_then(|t| t.as_str())
        .unwrap_or("");

    Ok(Volume::new(title, authors, thumbnail))
}
