// src/host/mod.rs
//! The automation surface of the host application, as the rest of the crate
//! consumes it.
//!
//! Every call answers with a dynamic [`Value`]: the host hands back variant
//! tuples whose arity and element order change between versions, so nothing
//! here assumes a fixed layout. Interpretation lives in `catalog`, `reader`
//! and `selection`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

/// One automation variant: a scalar or a (possibly nested) list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Build a list from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Strict integer view: ints, and floats with no fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Loose integer coercion used for status codes: bools, truncated
    /// floats and numeric strings are accepted.
    pub fn coerce_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Str(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Tri-state flag view (`IsEmpty` columns arrive as bools, 0/1 or text).
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Str(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// One level of list expansion; null and blank placeholders expand to nothing.
    pub fn items(&self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::Str(s) if s.is_empty() => Vec::new(),
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Flattening for table cells: an outer null means no values, a null
    /// inside the run keeps its position (rendered as a blank cell).
    pub fn flatten_cells(&self) -> Vec<Value> {
        let mut out = Vec::new();
        if !matches!(self, Value::Null) {
            self.cells_into(&mut out);
        }
        out
    }

    fn cells_into(&self, out: &mut Vec<Value>) {
        match self {
            Value::List(items) => {
                for item in items {
                    item.cells_into(out);
                }
            }
            cell => out.push(cell.clone()),
        }
    }

    /// Every string found anywhere in the structure, in order.
    pub fn strings(&self) -> Vec<String> {
        match self {
            Value::Str(s) => vec![s.clone()],
            Value::List(items) => items.iter().flat_map(Value::strings).collect(),
            _ => Vec::new(),
        }
    }

    /// Text rendering of a scalar cell.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(_) => self.to_string(),
        }
    }

    /// Short type tag used in shape diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

/// The host is inconsistent about how it says "ok": an integer zero, an empty
/// placeholder, `false`, or nothing at all. Everything else is a failure code.
pub fn is_success_status(status: &Value) -> bool {
    match status {
        Value::Null => true,
        Value::Bool(b) => !*b,
        Value::Int(i) => *i == 0,
        Value::Float(f) => *f == 0.0,
        Value::Str(s) => s.is_empty() || s.trim().parse::<i64>() == Ok(0),
        Value::List(items) => items.is_empty(),
    }
}

/// Failure raised by an automation call itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The call exists but rejects this argument list; another arity may work.
    #[error("signature mismatch: {0}")]
    SignatureMismatch(String),
    /// This version of the host does not expose the call.
    #[error("call not supported by this host version: {0}")]
    Unsupported(String),
    /// The host application or its model is gone.
    #[error("host unavailable: {0}")]
    Disconnected(String),
    #[error("call failed: {0}")]
    Call(String),
}

/// `SapModel.DatabaseTables`.
pub trait DatabaseTables {
    fn get_all_tables(&mut self) -> Result<Value, ApiError>;
    fn get_available_tables(&mut self) -> Result<Value, ApiError>;
    fn set_all_tables_selected(&mut self, selected: bool) -> Result<Value, ApiError>;
    fn set_table_selected(&mut self, key: &str) -> Result<Value, ApiError>;
    /// `args[0]` is always the table key; the rest depends on the host version.
    fn get_table_for_display_array(&mut self, args: &[&str]) -> Result<Value, ApiError>;
}

/// `SapModel.Results.Setup`.
pub trait OutputSetup {
    fn deselect_all_cases_and_combos(&mut self) -> Result<Value, ApiError>;
    fn set_case_selected(&mut self, name: &str, selected: bool) -> Result<Value, ApiError>;
    fn set_combo_selected(&mut self, name: &str, selected: bool) -> Result<Value, ApiError>;
    fn selected_cases(&mut self) -> Result<Value, ApiError>;
    fn selected_combos(&mut self) -> Result<Value, ApiError>;
}

/// An open model in the host application. Not safe for concurrent use; the
/// crate only ever drives it through `&mut`.
pub trait HostModel {
    fn database_tables(&mut self) -> Result<&mut dyn DatabaseTables, ApiError>;
    fn output_setup(&mut self) -> Result<&mut dyn OutputSetup, ApiError>;
    /// `LoadCases.GetNameList`.
    fn load_case_names(&mut self) -> Result<Value, ApiError>;
    /// `RespCombo.GetNameList`.
    fn combo_names(&mut self) -> Result<Value, ApiError>;

    /// Human-readable label for logs.
    fn describe(&self) -> String {
        "host model".to_string()
    }
}
