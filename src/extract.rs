// src/extract.rs
//! End-to-end extraction: catalog, output selection, per-table read and
//! optional export.

use std::{collections::BTreeMap, fs, path::PathBuf};
use tracing::{info, instrument};

use crate::catalog::{resolve_catalog, RetryPolicy};
use crate::debug_log::{DebugEntry, DebugLog};
use crate::error::ExtractError;
use crate::export::{export_table, normalize_formats, ExportFormat};
use crate::host::HostModel;
use crate::matcher::resolve_table;
use crate::reader::read_table;
use crate::selection::apply_output_selection;
use crate::table::Table;

/// Tables read when the caller names none.
pub const DEFAULT_TABLES: [&str; 3] = ["Story Forces", "Diaphragm Accelerations", "Story Drifts"];

#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Labels to read; `None` means [`DEFAULT_TABLES`].
    pub tables: Option<Vec<String>>,
    /// Folder to export into. Nothing is written when absent.
    pub destination: Option<PathBuf>,
    /// Only consulted when a destination is given.
    pub formats: Vec<String>,
    pub cases: Vec<String>,
    pub combos: Vec<String>,
    /// Write optional entries to the diagnostic log.
    pub debug_log: bool,
    pub retry: RetryPolicy,
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            tables: None,
            destination: None,
            formats: vec![ExportFormat::Csv.to_string()],
            cases: Vec::new(),
            combos: Vec::new(),
            debug_log: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExtractRequest {
    fn labels(&self) -> Result<Vec<String>, ExtractError> {
        match &self.tables {
            None => Ok(DEFAULT_TABLES.iter().map(|t| t.to_string()).collect()),
            Some(t) if t.is_empty() => Err(ExtractError::NoTablesRequested),
            Some(t) => Ok(t.clone()),
        }
    }
}

/// Read every requested table from `model`, keyed by the label it was
/// requested under.
#[instrument(level = "info", skip(model, request), fields(host = %model.describe()))]
pub fn extract_tables(
    model: &mut dyn HostModel,
    request: &ExtractRequest,
) -> Result<BTreeMap<String, Table>, ExtractError> {
    // 1) what to read, and what the model has
    let labels = request.labels()?;
    let catalog = resolve_catalog(model, &request.retry)?;

    // 2) where to put it
    let formats = match &request.destination {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| ExtractError::io(dir, e))?;
            normalize_formats(&request.formats)?
        }
        None => Vec::new(),
    };
    let log = DebugLog::in_dir(request.destination.as_deref(), request.debug_log);

    // 3) narrow the result set
    let mut allowed: Vec<String> = Vec::new();
    if !request.cases.is_empty() || !request.combos.is_empty() {
        let report = apply_output_selection(model, &request.cases, &request.combos);
        if log.verbose() {
            log.record(&DebugEntry::new("output selection", report.summary()));
        }
        allowed.extend(request.cases.iter().cloned());
        allowed.extend(request.combos.iter().cloned());
    }

    // 4) read each table
    let mut results = BTreeMap::new();
    for label in labels {
        let entry = resolve_table(&label, &catalog.entries)?;
        let table = read_table(model, entry, &allowed, &log)?;
        if let Some(dir) = &request.destination {
            export_table(&table, &label, dir, &formats)?;
        }
        results.insert(label, table);
    }

    info!(tables = results.len(), "extraction finished");
    Ok(results)
}
