// src/error.rs
//! Error types produced while listing, reading and exporting host tables.

use std::{fmt, path::PathBuf};
use thiserror::Error;

use crate::catalog::DiagnosticStep;
use crate::host::ApiError;

/// Failure of any extraction step.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The host application is not running or has no model open.
    #[error("cannot reach the host model: {0}")]
    Connection(String),

    /// A call answered with fewer elements than any known layout, or with
    /// something that is not a sequence at all.
    #[error("{call} returned an unexpected structure: {detail}")]
    Shape { call: String, detail: String },

    /// The host itself signalled failure.
    #[error("{call} returned status {code}{}", for_table(.table))]
    Status {
        call: String,
        table: Option<String>,
        code: String,
    },

    #[error("table '{table}' returned no column headings")]
    NoHeadings { table: String },

    #[error(
        "table '{table}': {values} data values do not divide into {columns} columns"
    )]
    CountMismatch {
        table: String,
        values: usize,
        columns: usize,
    },

    #[error("table '{table}' returned no rows (0 records); check that the model has results for it")]
    NoRows { table: String },

    #[error("table '{label}' was not found; check that the model has results and the name is correct")]
    NotFound { label: String },

    #[error("table name '{label}' is ambiguous, be more specific. Matches: {}", .candidates.join(", "))]
    Ambiguous {
        label: String,
        candidates: Vec<String>,
    },

    /// Every listing path was tried and none produced a table.
    #[error("could not list the available tables. Attempts: {}", Steps(.steps))]
    Listing { steps: Vec<DiagnosticStep> },

    #[error("could not read table '{table}'")]
    Read {
        table: String,
        #[source]
        source: ApiError,
    },

    /// A host call outside table reading failed.
    #[error("{call} failed")]
    Call {
        call: String,
        #[source]
        source: ApiError,
    },

    #[error("unsupported export format '{0}'; use csv, txt or both")]
    InvalidFormat(String),

    #[error("no tables were requested")]
    NoTablesRequested,

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write delimited file {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("snapshot {} is not valid", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtractError {
    /// Map an [`ApiError`] raised while obtaining a sub-object of the model.
    pub fn from_access(err: ApiError) -> Self {
        ExtractError::Connection(err.to_string())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostic steps attached to a listing failure, if any.
    pub fn steps(&self) -> &[DiagnosticStep] {
        match self {
            ExtractError::Listing { steps } => steps,
            _ => &[],
        }
    }
}

fn for_table(table: &Option<String>) -> String {
    match table {
        Some(t) => format!(" while reading table '{}'", t),
        None => String::new(),
    }
}

struct Steps<'a>(&'a [DiagnosticStep]);

impl fmt::Display for Steps<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<String> = self
            .0
            .iter()
            .filter(|s| !s.success)
            .map(|s| format!("{}: {}", s.method, s.detail))
            .collect();
        if failed.is_empty() {
            f.write_str("no detail")
        } else {
            f.write_str(&failed.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_error_names_every_failed_step() {
        let err = ExtractError::Listing {
            steps: vec![
                DiagnosticStep::new("GetAllTables", false, "call failed: boom"),
                DiagnosticStep::new("GetAvailableTables", false, "ret=0, tables=0, attempt 1"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("GetAllTables: call failed: boom"));
        assert!(text.contains("attempt 1"));
        assert_eq!(err.steps().len(), 2);
    }

    #[test]
    fn status_error_mentions_table() {
        let err = ExtractError::Status {
            call: "GetTableForDisplayArray".into(),
            table: Some("Story Drifts".into()),
            code: "1".into(),
        };
        assert_eq!(
            err.to_string(),
            "GetTableForDisplayArray returned status 1 while reading table 'Story Drifts'"
        );
    }
}
