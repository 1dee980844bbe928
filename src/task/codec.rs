#![forbid(unsafe_code)]

//! JSON encoding of the task list.
//!
//! Encoding is plain serde. Decoding walks a `serde_json::Value` tree one
//! record at a time so that a bad field (or a record that is not an object)
//! never costs the rest of the list. Only a document that fails to parse, or
//! whose top level is not an array, is rejected as a whole.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::TodoError;
use crate::task::model::{Priority, Task};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("stored task list is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("stored task list is not a JSON array (found {found})")]
    NotAnArray { found: &'static str },
}

pub fn encode(tasks: &[Task]) -> Result<String, TodoError> {
    serde_json::to_string(tasks).map_err(TodoError::Encode)
}

pub fn decode(text: &str) -> Result<Vec<Task>, DecodeError> {
    let root: Value = serde_json::from_str(text).map_err(DecodeError::Malformed)?;
    let items = match root {
        Value::Array(items) => items,
        other => {
            return Err(DecodeError::NotAnArray {
                found: kind(&other),
            });
        }
    };

    let mut tasks = Vec::with_capacity(items.len());
    for item in &items {
        let Value::Object(fields) = item else {
            continue;
        };
        tasks.push(PermissiveRecord::new(fields).into_task());
    }
    Ok(tasks)
}

/// A stored object whose fields are read one by one, each falling back to
/// its default when missing or of the wrong shape.
#[derive(Debug, Clone, Copy)]
pub struct PermissiveRecord<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> PermissiveRecord<'a> {
    #[must_use]
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name)
    }

    /// Numeric ids from older versions become their decimal form.
    #[must_use]
    pub fn id(&self) -> String {
        match self.field("id") {
            Some(Value::Number(n)) => number_to_i64(n).map_or_else(Task::new_id, |v| v.to_string()),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => Task::new_id(),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        match self.field("text") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    #[must_use]
    pub fn done(&self) -> bool {
        self.bool_field("done")
    }

    #[must_use]
    pub fn starred(&self) -> bool {
        self.bool_field("starred")
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        let level = match self.field("priority") {
            Some(Value::Number(n)) => number_to_i64(n),
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            _ => None,
        };
        level.and_then(Priority::from_level).unwrap_or_default()
    }

    #[must_use]
    pub fn due_millis(&self) -> Option<i64> {
        let millis = match self.field("dueMillis")? {
            Value::Number(n) => number_to_i64(n),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        };
        millis.filter(|m| *m > 0)
    }

    #[must_use]
    pub fn into_task(self) -> Task {
        Task {
            id: self.id(),
            text: self.text(),
            done: self.done(),
            priority: self.priority(),
            starred: self.starred(),
            due_millis: self.due_millis(),
        }
    }

    fn bool_field(&self, name: &str) -> bool {
        matches!(self.field(name), Some(Value::Bool(true)))
    }
}

fn number_to_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(v) = n.as_i64() {
        return Some(v);
    }
    // Fractional or out-of-range values truncate toward zero.
    let f = n.as_f64()?;
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
