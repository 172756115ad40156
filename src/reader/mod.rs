// src/reader/mod.rs
//! Reading one database table through `GetTableForDisplayArray`.
//!
//! The call's arity differs between host versions, so a fixed list of
//! argument signatures is tried in order until one is accepted.

use tracing::{debug, info, instrument, warn};

use crate::catalog::TableEntry;
use crate::debug_log::{DebugEntry, DebugLog};
use crate::error::ExtractError;
use crate::host::{is_success_status, ApiError, DatabaseTables, HostModel, Value};
use crate::table::Table;

pub mod reshape;

pub use reshape::{filter_cases, is_output_case_column, reshape, PayloadLayout};

pub const READ_CALL: &str = "GetTableForDisplayArray";

/// Arguments passed after the table key, in the order they are tried.
pub const SIGNATURES: [&[&str]; 5] = [&[], &[""], &["All"], &["", ""], &["All", ""]];

/// Rows kept in the preview attached to verbose debug entries.
pub const PREVIEW_ROWS: usize = 5;

/// Some wrappers need the table selected before reading, others reject the
/// calls outright. Either way the read is attempted.
fn preselect(tables: &mut dyn DatabaseTables, key: &str) {
    if let Err(e) = tables.set_all_tables_selected(false) {
        debug!(error = %e, "SetAllTablesSelected(false) failed, continuing");
    }
    if let Err(e) = tables.set_table_selected(key) {
        debug!(error = %e, key, "SetTableSelected failed, continuing");
    }
}

/// Try each signature until the host accepts one. Returns the raw response,
/// already checked to be a list of at least three elements.
fn probe(tables: &mut dyn DatabaseTables, entry: &TableEntry) -> Result<Value, ExtractError> {
    let mut last_mismatch: Option<ApiError> = None;

    for extra in SIGNATURES {
        let mut args: Vec<&str> = Vec::with_capacity(1 + extra.len());
        args.push(&entry.key);
        args.extend_from_slice(extra);

        match tables.get_table_for_display_array(&args) {
            Ok(raw) => {
                let long_enough = raw.as_list().map_or(false, |items| items.len() >= 3);
                if !long_enough {
                    return Err(ExtractError::Shape {
                        call: READ_CALL.to_string(),
                        detail: format!("table '{}' answered {}", entry.name, raw),
                    });
                }
                debug!(arity = args.len(), "signature accepted");
                return Ok(raw);
            }
            Err(e @ ApiError::SignatureMismatch(_)) => {
                debug!(arity = args.len(), error = %e, "signature rejected");
                last_mismatch = Some(e);
            }
            Err(source) => {
                return Err(ExtractError::Read {
                    table: entry.name.clone(),
                    source,
                })
            }
        }
    }

    Err(ExtractError::Read {
        table: entry.name.clone(),
        source: last_mismatch.unwrap_or_else(|| {
            ApiError::SignatureMismatch("no signature was accepted".to_string())
        }),
    })
}

/// Read `entry` and rebuild it as a [`Table`].
///
/// When `cases` is non-empty and the table has an output-case column, only
/// rows for those cases survive. A table with no rows left is an error, and
/// its raw response is always written to `log`.
#[instrument(level = "info", skip(model, entry, cases, log), fields(table = %entry.name, key = %entry.key))]
pub fn read_table(
    model: &mut dyn HostModel,
    entry: &TableEntry,
    cases: &[String],
    log: &DebugLog,
) -> Result<Table, ExtractError> {
    let tables = model
        .database_tables()
        .map_err(ExtractError::from_access)?;

    // 1) selection, best effort
    preselect(tables, &entry.key);

    // 2) probe signatures
    let raw = probe(tables, entry)?;
    let items = raw.as_list().unwrap_or_default();

    // 3) status
    let status = &items[0];
    if !is_success_status(status) {
        return Err(ExtractError::Status {
            call: READ_CALL.to_string(),
            table: Some(entry.name.clone()),
            code: status.to_cell(),
        });
    }

    // 4) headings and data
    let layout = PayloadLayout::detect(items);
    let headings = layout.headings(items);
    let data = layout.data(items);
    debug!(?layout, "payload layout");
    let mut table = reshape(&entry.name, headings, data)?;

    // 5) output-case filter
    if !cases.is_empty() {
        match filter_cases(&mut table, cases) {
            Some((before, after)) => {
                info!(before, after, "filtered rows by output case");
                if log.verbose() {
                    let name = format!("case filter {}", entry.name);
                    log.record(&DebugEntry::new(
                        &name,
                        format!(
                            "OutputCase filtered by {:?}: rows before={} after={}",
                            cases, before, after
                        ),
                    ));
                }
            }
            None => debug!("no output-case column, rows kept as read"),
        }
    }

    // 6) empty tables are errors
    if table.is_empty() {
        warn!("table has no rows");
        log.record(&DebugEntry {
            raw: Some(&raw),
            headings: Some(headings),
            data: Some(data),
            ..DebugEntry::new(&entry.name, "no rows")
        });
        return Err(ExtractError::NoRows {
            table: entry.name.clone(),
        });
    }

    if log.verbose() {
        log.record(&DebugEntry {
            raw: Some(&raw),
            headings: Some(headings),
            data: Some(data),
            preview: Some(table.preview(PREVIEW_ROWS)),
            ..DebugEntry::new(&entry.name, "debug requested (first rows)")
        });
    }

    info!(rows = table.len(), columns = table.columns.len(), "table read");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::snapshot::{Recorded, RecordedTable, Snapshot, SnapshotModel};
    use crate::host::testing::{drift_model, init_test_logging, table, two_by_two};
    use std::fs;
    use tempfile::tempdir;

    fn single_table_model(key: &str, recorded: RecordedTable) -> SnapshotModel {
        let mut snapshot = Snapshot::default();
        snapshot.tables.insert(key.to_string(), recorded);
        SnapshotModel::new(snapshot)
    }

    fn quiet_log(dir: &std::path::Path) -> DebugLog {
        DebugLog::in_dir(Some(dir), false)
    }

    #[test]
    fn reads_two_by_two() -> anyhow::Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let mut model = single_table_model("TABLE_A", table(two_by_two("A")));
        let entry = TableEntry::new("TABLE_A", "Table A");

        let t = read_table(&mut model, &entry, &[], &quiet_log(dir.path()))?;
        assert_eq!(t.columns, vec!["Col1", "Col2"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0], vec!["A-r1c1", "A-r1c2"]);
        assert_eq!(model.selected_tables(), ["TABLE_A".to_string()]);
        assert!(!dir.path().join(crate::debug_log::FILE_NAME).exists());
        Ok(())
    }

    #[test]
    fn probes_signatures_until_accepted() -> anyhow::Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let recorded = RecordedTable {
            arity: Some(3),
            response: Recorded::Response(two_by_two("A")),
        };
        let mut model = single_table_model("TABLE_A", recorded);
        let entry = TableEntry::new("TABLE_A", "Table A");

        read_table(&mut model, &entry, &[], &quiet_log(dir.path()))?;
        let arities: Vec<usize> = model.read_calls().iter().map(Vec::len).collect();
        assert_eq!(arities, vec![1, 2, 2, 3]);
        assert_eq!(model.read_calls()[3], vec!["TABLE_A", "", ""]);
        Ok(())
    }

    #[test]
    fn every_signature_rejected_names_the_table() {
        let dir = tempdir().expect("tempdir");
        let recorded = RecordedTable {
            arity: Some(7),
            response: Recorded::Response(two_by_two("A")),
        };
        let mut model = single_table_model("TABLE_A", recorded);
        let entry = TableEntry::new("TABLE_A", "Table A");

        let err = read_table(&mut model, &entry, &[], &quiet_log(dir.path())).expect_err("rejected");
        assert!(matches!(
            err,
            ExtractError::Read { source: ApiError::SignatureMismatch(_), .. }
        ));
        assert_eq!(model.read_calls().len(), SIGNATURES.len());
    }

    #[test]
    fn other_call_errors_stop_probing() {
        let dir = tempdir().expect("tempdir");
        let recorded = RecordedTable {
            arity: None,
            response: Recorded::Failure { error: "COM exploded".into() },
        };
        let mut model = single_table_model("TABLE_A", recorded);
        let entry = TableEntry::new("TABLE_A", "Table A");

        let err = read_table(&mut model, &entry, &[], &quiet_log(dir.path())).expect_err("fails");
        assert!(matches!(err, ExtractError::Read { .. }));
        assert_eq!(model.read_calls().len(), 1);
    }

    #[test]
    fn short_response_is_a_shape_error() {
        let dir = tempdir().expect("tempdir");
        let mut model = single_table_model(
            "T",
            table(Value::List(vec![Value::Int(0), Value::list(["A"])])),
        );
        let err = read_table(&mut model, &TableEntry::new("T", "T"), &[], &quiet_log(dir.path()))
            .expect_err("too short");
        assert!(matches!(err, ExtractError::Shape { .. }));
    }

    #[test]
    fn failure_status_is_reported() {
        let dir = tempdir().expect("tempdir");
        let mut response = two_by_two("A");
        if let Value::List(items) = &mut response {
            items[0] = Value::Int(1);
        }
        let mut model = single_table_model("T", table(response));
        let err = read_table(&mut model, &TableEntry::new("T", "Story Drifts"), &[], &quiet_log(dir.path()))
            .expect_err("status 1");
        assert_eq!(
            err.to_string(),
            "GetTableForDisplayArray returned status 1 while reading table 'Story Drifts'"
        );
    }

    #[test]
    fn string_zero_status_is_success() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut response = two_by_two("A");
        if let Value::List(items) = &mut response {
            items[0] = Value::from("0");
        }
        let mut model = single_table_model("T", table(response));
        let t = read_table(&mut model, &TableEntry::new("T", "T"), &[], &quiet_log(dir.path()))?;
        assert_eq!(t.len(), 2);
        Ok(())
    }

    #[test]
    fn counted_payload_layout_is_read() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let response = Value::List(vec![
            Value::Int(0),
            Value::Int(2),
            Value::list(["Story", "Drift"]),
            Value::Int(1),
            Value::list(["Story1", "0.002"]),
            Value::Int(3),
        ]);
        let mut model = single_table_model("T", table(response));
        let t = read_table(&mut model, &TableEntry::new("T", "T"), &[], &quiet_log(dir.path()))?;
        assert_eq!(t.columns, vec!["Story", "Drift"]);
        assert_eq!(t.rows, vec![vec!["Story1".to_string(), "0.002".to_string()]]);
        Ok(())
    }

    #[test]
    fn rows_are_filtered_by_requested_cases() -> anyhow::Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let mut model = drift_model();
        let entry = TableEntry::new("Story Drifts", "Story Drifts");
        let log = DebugLog::in_dir(Some(dir.path()), true);

        let t = read_table(&mut model, &entry, &["eqx ".to_string()], &log)?;
        assert_eq!(t.len(), 3);
        assert!(t.rows.iter().all(|r| r[1] == "EQX"));

        let text = fs::read_to_string(log.path())?;
        assert!(text.contains("rows before=5 after=3"));
        assert!(text.contains("Preview:"));
        Ok(())
    }

    #[test]
    fn empty_table_always_writes_a_debug_entry() -> anyhow::Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let mut model = drift_model();
        let entry = TableEntry::new("Story Drifts", "Story Drifts");

        let err = read_table(&mut model, &entry, &["WIND".to_string()], &quiet_log(dir.path()))
            .expect_err("nothing left");
        assert!(matches!(err, ExtractError::NoRows { .. }));
        assert!(err.to_string().contains("0 records"));

        let text = fs::read_to_string(dir.path().join(crate::debug_log::FILE_NAME))?;
        assert!(text.contains("Reason: no rows"));
        assert!(text.contains("Raw headings: [\"Story\",\"OutputCase\",\"Direction\",\"Drift\"]"));
        Ok(())
    }
}
