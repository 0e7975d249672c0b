//! Collection semantics shared by every store backend.
//!
//! A collection is a JSON array of objects keyed by `id`. Ids are positive
//! integers assigned as `max(existing) + 1`, so an id freed by a delete is
//! only reused if it was the highest one. Lookups compare ids loosely: the
//! number `3` and the string `"3"` name the same document.

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::Document;

/// String form of a document's `id`, or `None` when it has none.
pub fn id_string(doc: &Value) -> Option<String> {
    match doc.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            // 3.0 and 3 are the same id
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                Some(format!("{}", f as i64))
            }
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn id_matches(doc: &Value, id: &str) -> bool {
    id_string(doc).as_deref() == Some(id)
}

/// Numeric value of a document's id for id assignment; anything that is
/// not a positive number counts as zero.
fn numeric_id(doc: &Value) -> u64 {
    let n = match doc.get("id") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n.floor() as u64
    } else {
        0
    }
}

/// Id for the next appended document.
pub fn next_id(items: &[Document]) -> u64 {
    items.iter().map(numeric_id).max().unwrap_or(0) + 1
}

/// Views a collection file as an array.
pub fn into_items(content: Value, name: &str) -> Result<Vec<Document>, StoreError> {
    match content {
        Value::Array(items) => Ok(items),
        _ => Err(StoreError::Decode(format!(
            "{} is not a JSON array",
            name
        ))),
    }
}

fn into_object(body: Document) -> Result<Map<String, Value>, StoreError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::BadRequest(
            "Document body must be a JSON object".to_string(),
        )),
    }
}

pub fn find<'a>(items: &'a [Document], id: &str) -> Option<&'a Document> {
    items.iter().find(|doc| id_matches(doc, id))
}

/// Assigns the next id to `body`, appends it, and returns the stored copy.
pub fn append(items: &mut Vec<Document>, body: Document) -> Result<Document, StoreError> {
    let mut doc = into_object(body)?;
    doc.insert("id".to_string(), Value::from(next_id(items)));
    let doc = Value::Object(doc);
    items.push(doc.clone());
    Ok(doc)
}

/// Replaces the document with `id` by `body`, keeping the stored id.
pub fn replace(
    items: &mut [Document],
    id: &str,
    body: Document,
) -> Result<Document, StoreError> {
    let index = items
        .iter()
        .position(|doc| id_matches(doc, id))
        .ok_or_else(StoreError::item_not_found)?;
    let original_id = items[index].get("id").cloned().unwrap_or(Value::Null);

    let mut doc = into_object(body)?;
    doc.insert("id".to_string(), original_id);
    let doc = Value::Object(doc);
    items[index] = doc.clone();
    Ok(doc)
}

/// Removes every document whose id matches; fails if none did.
pub fn remove(items: &mut Vec<Document>, id: &str) -> Result<(), StoreError> {
    let before = items.len();
    items.retain(|doc| !id_matches(doc, id));
    if items.len() == before {
        return Err(StoreError::item_not_found());
    }
    Ok(())
}

/// Settings are a single object, replaced wholesale.
pub fn settings_body(body: Document) -> Result<Document, StoreError> {
    into_object(body).map(Value::Object)
}
