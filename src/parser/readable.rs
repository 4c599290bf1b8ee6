//! Human-readable JSON projection of a [`Chunk`]
//!
//! Builds a fresh `serde_json::Value` tree from the chunk; every span is
//! collapsed into a `"line:col-line:col"` string, prefixed with the file
//! name when it lies in an included file. The chunk itself is not touched.

use serde_json::{Map, Value};

use crate::parser::ast::{Chunk, FileId};

pub fn readable(chunk: &Chunk) -> serde_json::Result<Value> {
    let tree = serde_json::to_value(chunk)?;
    Ok(collapse(tree, chunk))
}

/// [`readable`] rendered as indented JSON text.
pub fn readable_string(chunk: &Chunk) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&readable(chunk)?)
}

fn collapse(value: Value, chunk: &Chunk) -> Value {
    match value {
        Value::Object(map) => match span_text(&map, chunk) {
            Some(text) => Value::String(text),
            None => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, collapse(value, chunk)))
                    .collect(),
            ),
        },
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| collapse(v, chunk)).collect())
        }
        other => other,
    }
}

/// Display text of a serialized `Bounds`, or `None` for any other object.
fn span_text(map: &Map<String, Value>, chunk: &Chunk) -> Option<String> {
    if map.len() != 2 {
        return None;
    }
    let (start_line, start_column, file) = position(map.get("start")?)?;
    let (end_line, end_column, _) = position(map.get("end")?)?;

    let span = format!("{}:{}-{}:{}", start_line, start_column, end_line, end_column);
    match file {
        FileId::ROOT => Some(span),
        file => {
            let name = chunk.file_name(file).unwrap_or("?");
            Some(format!("{}:{}", name, span))
        }
    }
}

fn position(value: &Value) -> Option<(u64, u64, FileId)> {
    let position = value.as_object()?;
    let line = position.get("line")?.as_u64()?;
    let column = position.get("column")?.as_u64()?;
    let file = position.get("file")?.as_u64()?;
    Some((line, column, FileId(u32::try_from(file).ok()?)))
}
