//! Response inspection: header/body split and JSON flattening.
//!
//! Pure functions over the text left in a
//! [`ResponseBuffer`](super::buffer::ResponseBuffer).  No HTTP semantics
//! beyond finding the blank line after the header block.

use serde_json::{Map, Value};

/// Separator between the header block and the body.
pub const HEADER_END: &str = "\r\n\r\n";

/// Array elements shown before the remainder is summarised.
pub const ARRAY_PREVIEW: usize = 3;

/// Split at the first blank line.  `None` when there is no separator.
pub fn split_header_body(text: &str) -> Option<(&str, &str)> {
    text.find(HEADER_END)
        .map(|at| (&text[..at], &text[at + HEADER_END.len()..]))
}

/// Locate `marker` in `text` and parse the first JSON object starting
/// there.  Trailing bytes after the object are ignored.
pub fn extract_json_object(text: &str, marker: &str) -> Option<Map<String, Value>> {
    if marker.is_empty() {
        return None;
    }
    let start = text.find(marker)?;
    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(map))) => Some(map),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────
// Visitor
// ───────────────────────────────────────────────────────────────

/// Callbacks for [`walk_object`].
pub trait JsonVisitor {
    /// One object member.  `path` is the dotted name from the root.
    fn field(&mut self, path: &str, value: &Value);

    /// One of the first [`ARRAY_PREVIEW`] array elements.
    fn array_item(&mut self, path: &str, index: usize, value: &Value);

    /// Elements of an array that were not visited.
    fn array_rest(&mut self, path: &str, remaining: usize);
}

/// Visit every member of `obj`, descending into nested objects.  Arrays
/// get their first [`ARRAY_PREVIEW`] elements visited and the rest counted.
/// Array elements are reported whole and never walked, so objects nested
/// inside an array produce no `field` calls.
pub fn walk_object<V: JsonVisitor + ?Sized>(obj: &Map<String, Value>, visitor: &mut V) {
    walk_members(obj, "", visitor);
}

fn walk_members<V: JsonVisitor + ?Sized>(obj: &Map<String, Value>, prefix: &str, visitor: &mut V) {
    for (name, value) in obj {
        let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
        visitor.field(&path, value);
        match value {
            Value::Object(inner) => walk_members(inner, &path, visitor),
            Value::Array(items) => {
                for (i, item) in items.iter().take(ARRAY_PREVIEW).enumerate() {
                    visitor.array_item(&path, i, item);
                }
                if items.len() > ARRAY_PREVIEW {
                    visitor.array_rest(&path, items.len() - ARRAY_PREVIEW);
                }
            }
            _ => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Flat printer
// ───────────────────────────────────────────────────────────────

/// Renders a walk as `name = value` lines.
#[derive(Debug, Default)]
pub struct FlatPrinter {
    lines: Vec<String>,
}

impl FlatPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Null => "NULL".into(),
        Value::Object(_) => "{Object}".into(),
        Value::Array(items) => format!("[Array] of {} items", items.len()),
    }
}

impl JsonVisitor for FlatPrinter {
    fn field(&mut self, path: &str, value: &Value) {
        self.lines.push(format!("{path} = {}", render_scalar(value)));
    }

    fn array_item(&mut self, _path: &str, _index: usize, value: &Value) {
        self.lines.push(format!("   {}", render_scalar(value)));
    }

    fn array_rest(&mut self, _path: &str, remaining: usize) {
        self.lines.push(format!("   + {remaining} more..."));
    }
}

/// Convenience: flatten `obj` into printable lines.
pub fn flatten(obj: &Map<String, Value>) -> Vec<String> {
    let mut printer = FlatPrinter::new();
    walk_object(obj, &mut printer);
    printer.into_lines()
}
