// src/plot/mod.rs
//! Per-story line charts from extracted tables.

use std::{collections::BTreeMap, path::PathBuf};
use thiserror::Error;

use crate::table::Table;

pub mod columns;
pub mod render;
pub mod series;

pub use columns::{column_key, order_stories, ColumnMap};
pub use render::{render_svg, RenderOptions};
pub use series::{
    joint_drifts, max_story_drift, percentile, story_columns, LineStyle, Series, SeriesFilter,
    StoryChart,
};

/// Table looked up when none is named.
pub const DEFAULT_TABLE: &str = "Story Drifts";

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("table '{0}' is not among the extracted tables")]
    TableNotFound(String),

    #[error("no {needed} column(s) found in the table")]
    MissingColumns { needed: String },

    #[error("no plottable columns among the candidates: {candidates}")]
    NoValueColumns { candidates: String },

    #[error("no rows left after filtering; check cases, directions and input data")]
    EmptyAfterFilter,

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pick the table to chart from an extraction result: the only table when
/// there is one and no name was asked for, otherwise the one whose label
/// matches `name` (default [`DEFAULT_TABLE`]) ignoring case.
pub fn find_table<'a>(
    tables: &'a BTreeMap<String, Table>,
    name: Option<&str>,
) -> Result<&'a Table, PlotError> {
    if name.is_none() && tables.len() == 1 {
        if let Some(only) = tables.values().next() {
            return Ok(only);
        }
    }
    let wanted = name.unwrap_or(DEFAULT_TABLE);
    tables
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(wanted))
        .map(|(_, t)| t)
        .ok_or_else(|| PlotError::TableNotFound(wanted.to_string()))
}
