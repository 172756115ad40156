// src/catalog/shapes.rs
//! The layouts the two listing calls are known to answer with, and the
//! normalization of each into [`TableEntry`] records.

use tracing::{debug, trace};

use super::TableEntry;
use crate::error::ExtractError;
use crate::host::Value;

/// Which listing entry point produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingCall {
    /// `GetAllTables`: keys and names, optionally import types and empty flags.
    All,
    /// `GetAvailableTables`: names only on some versions.
    Available,
}

impl ListingCall {
    pub fn method(&self) -> &'static str {
        match self {
            ListingCall::All => "GetAllTables",
            ListingCall::Available => "GetAvailableTables",
        }
    }

    fn min_len(&self) -> usize {
        match self {
            ListingCall::All => 3,
            ListingCall::Available => 2,
        }
    }
}

/// A classified listing response. Fields borrow from the raw value.
#[derive(Debug, PartialEq)]
pub enum ListingShape<'a> {
    /// `(status, keys, names, [types], [empty])`, the documented layout.
    StatusFirst {
        status: &'a Value,
        keys: &'a Value,
        names: &'a Value,
        types: Option<&'a Value>,
        empties: Option<&'a Value>,
    },
    /// `(status, count, keys, names, [types], [empty])`: by-ref count echoed back.
    Counted {
        status: &'a Value,
        count: i64,
        keys: &'a Value,
        names: &'a Value,
        types: Option<&'a Value>,
        empties: Option<&'a Value>,
    },
    /// `(count, keys, names, [types], [empty], status)`: out-params first,
    /// return value last.
    StatusLast {
        status: &'a Value,
        count: i64,
        keys: &'a Value,
        names: &'a Value,
        types: Option<&'a Value>,
        empties: Option<&'a Value>,
    },
    /// `(status, names)`: names double as keys.
    NamesOnly { status: &'a Value, names: &'a Value },
}

/// Uniform view over every shape.
struct Fields<'a> {
    status: &'a Value,
    keys: Option<&'a Value>,
    names: &'a Value,
    types: Option<&'a Value>,
    empties: Option<&'a Value>,
}

fn shape_error(call: ListingCall, detail: impl Into<String>) -> ExtractError {
    ExtractError::Shape {
        call: call.method().to_string(),
        detail: detail.into(),
    }
}

/// Identify the layout of `raw`, trying the more specific shapes first.
pub fn classify(call: ListingCall, raw: &Value) -> Result<ListingShape<'_>, ExtractError> {
    let items = raw.as_list().ok_or_else(|| {
        shape_error(
            call,
            format!("expected a sequence, got {} {}", raw.kind(), raw),
        )
    })?;
    let n = items.len();
    if n < call.min_len() {
        return Err(shape_error(
            call,
            format!(
                "{} element(s), at least {} expected; check the API version",
                n,
                call.min_len()
            ),
        ));
    }

    if n == 2 {
        return Ok(ListingShape::NamesOnly {
            status: &items[0],
            names: &items[1],
        });
    }

    if n >= 4 && !items[0].is_list() && items[2].is_list() {
        if let Some(count) = items[1].as_integer() {
            return Ok(ListingShape::Counted {
                status: &items[0],
                count,
                keys: &items[2],
                names: &items[3],
                types: items.get(4),
                empties: items.get(5),
            });
        }
    }

    if n >= 4 && items[1].is_list() && items[n - 1].as_integer().is_some() {
        if let Some(count) = items[0].as_integer() {
            return Ok(ListingShape::StatusLast {
                status: &items[n - 1],
                count,
                keys: &items[1],
                names: &items[2],
                types: if n >= 5 { Some(&items[3]) } else { None },
                empties: if n >= 6 { Some(&items[4]) } else { None },
            });
        }
    }

    Ok(ListingShape::StatusFirst {
        status: &items[0],
        keys: &items[1],
        names: &items[2],
        types: items.get(3),
        empties: items.get(4),
    })
}

impl<'a> ListingShape<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            ListingShape::StatusFirst { .. } => "status-first",
            ListingShape::Counted { .. } => "counted",
            ListingShape::StatusLast { .. } => "status-last",
            ListingShape::NamesOnly { .. } => "names-only",
        }
    }

    fn fields(&self) -> Fields<'a> {
        match *self {
            ListingShape::StatusFirst {
                status,
                keys,
                names,
                types,
                empties,
            } => Fields {
                status,
                keys: Some(keys),
                names,
                types,
                empties,
            },
            ListingShape::Counted {
                status,
                count,
                keys,
                names,
                types,
                empties,
            }
            | ListingShape::StatusLast {
                status,
                count,
                keys,
                names,
                types,
                empties,
            } => {
                trace!(count, "listing carries an explicit table count");
                Fields {
                    status,
                    keys: Some(keys),
                    names,
                    types,
                    empties,
                }
            }
            ListingShape::NamesOnly { status, names } => Fields {
                status,
                keys: None,
                names,
                types: None,
                empties: None,
            },
        }
    }
}

/// Normalize one listing response into `(status, entries)`.
///
/// Keys and names are aligned by position; whichever list is shorter is
/// padded, then a missing name falls back to the key and a missing key to the
/// name. Positions where both are missing are dropped.
pub fn normalize(call: ListingCall, raw: &Value) -> Result<(i64, Vec<TableEntry>), ExtractError> {
    let shape = classify(call, raw)?;
    let fields = shape.fields();

    let status = if fields.status.is_null() {
        -1
    } else {
        fields.status.coerce_i64().ok_or_else(|| {
            shape_error(
                call,
                format!("status {} is not an integer", fields.status),
            )
        })?
    };

    let keys = fields.keys.map(Value::items).unwrap_or_default();
    let names = fields.names.items();
    let types = fields.types.filter(|v| !v.is_null()).map(Value::items);
    let empties = fields.empties.filter(|v| !v.is_null()).map(Value::items);

    let total = keys.len().max(names.len());
    let mut entries = Vec::with_capacity(total);
    let mut dropped = 0usize;
    for idx in 0..total {
        let key = keys.get(idx).map(Value::to_cell).unwrap_or_default();
        let name = names.get(idx).map(Value::to_cell).unwrap_or_default();
        let key = if key.is_empty() { name.clone() } else { key };
        let name = if name.is_empty() { key.clone() } else { name };
        if key.is_empty() {
            dropped += 1;
            continue;
        }
        entries.push(TableEntry {
            key,
            name,
            import_type: types
                .as_ref()
                .and_then(|t| t.get(idx))
                .and_then(Value::coerce_i64),
            is_empty: empties
                .as_ref()
                .and_then(|e| e.get(idx))
                .and_then(Value::as_flag),
        });
    }

    debug!(
        call = call.method(),
        shape = shape.name(),
        status,
        tables = entries.len(),
        dropped,
        "normalized listing"
    );
    Ok((status, entries))
}
