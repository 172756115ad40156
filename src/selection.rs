// src/selection.rs
//! Narrowing the host's result set to chosen load cases and combinations,
//! and reading the name lists they are chosen from.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::ExtractError;
use crate::host::{is_success_status, ApiError, HostModel, OutputSetup, Value};

/// A name-list response after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NameList {
    /// Leading numeric element, when there is one.
    pub status: Option<i64>,
    pub names: Vec<String>,
}

/// Normalize `GetNameList`-style responses. A numeric first element is taken
/// as the status; every string in the rest of the structure is a name.
pub fn read_name_list(value: &Value) -> NameList {
    let items = match value {
        Value::List(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    let (status, rest) = match items.split_first() {
        Some((first, rest)) if matches!(first, Value::Int(_) | Value::Float(_)) => {
            (first.coerce_i64(), rest)
        }
        _ => (None, items),
    };
    NameList {
        status,
        names: rest.iter().flat_map(Value::strings).collect(),
    }
}

/// Load-case names defined in the model.
pub fn load_case_names(model: &mut dyn HostModel) -> Result<NameList, ExtractError> {
    let raw = model.load_case_names().map_err(|source| ExtractError::Call {
        call: "LoadCases.GetNameList".to_string(),
        source,
    })?;
    Ok(read_name_list(&raw))
}

/// Load-combination names defined in the model.
pub fn combo_names(model: &mut dyn HostModel) -> Result<NameList, ExtractError> {
    let raw = model.combo_names().map_err(|source| ExtractError::Call {
        call: "RespCombo.GetNameList".to_string(),
        source,
    })?;
    Ok(read_name_list(&raw))
}

/// What was asked for, what the host reports as selected afterwards, and
/// every problem met on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionReport {
    pub requested_cases: Vec<String>,
    pub requested_combos: Vec<String>,
    pub selected_cases: Vec<String>,
    pub selected_combos: Vec<String>,
    pub errors: Vec<String>,
}

impl SelectionReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// One-line account for logs.
    pub fn summary(&self) -> String {
        format!(
            "requested cases={:?}, combos={:?}; selected cases={:?}, combos={:?}; errors: {}",
            self.requested_cases,
            self.requested_combos,
            self.selected_cases,
            self.selected_combos,
            if self.errors.is_empty() {
                "none".to_string()
            } else {
                self.errors.join(", ")
            }
        )
    }
}

fn note(errors: &mut Vec<String>, kind: &str, name: &str, outcome: Result<Value, ApiError>) {
    match outcome {
        Ok(status) if is_success_status(&status) => {}
        Ok(status) => errors.push(format!("{} '{}' ret={}", kind, name, status.to_cell())),
        Err(e) => errors.push(format!("{} '{}': {}", kind, name, e)),
    }
}

fn read_back(
    setup: &mut dyn OutputSetup,
    what: &str,
    call: fn(&mut dyn OutputSetup) -> Result<Value, ApiError>,
    errors: &mut Vec<String>,
) -> Vec<String> {
    match call(setup) {
        Ok(raw) => read_name_list(&raw).names,
        Err(e) => {
            errors.push(format!("reading selected {}: {}", what, e));
            Vec::new()
        }
    }
}

/// Select exactly `cases` and `combos` for output. Never fails: partial
/// failures, including a missing selection interface, are collected in the
/// report and extraction carries on with whatever the host has selected.
#[instrument(level = "info", skip(model, cases, combos), fields(cases = cases.len(), combos = combos.len()))]
pub fn apply_output_selection(
    model: &mut dyn HostModel,
    cases: &[String],
    combos: &[String],
) -> SelectionReport {
    let mut report = SelectionReport {
        requested_cases: cases.to_vec(),
        requested_combos: combos.to_vec(),
        ..SelectionReport::default()
    };

    let setup = match model.output_setup() {
        Ok(setup) => setup,
        Err(e) => {
            warn!(error = %e, "output selection is unavailable");
            report
                .errors
                .push(format!("selecting cases/combos failed: {}", e));
            return report;
        }
    };

    // 1) clear, best effort
    if let Err(e) = setup.deselect_all_cases_and_combos() {
        debug!(error = %e, "DeselectAllCasesAndCombosForOutput failed, continuing");
    }

    // 2) select each
    for name in cases {
        let outcome = setup.set_case_selected(name, true);
        note(&mut report.errors, "case", name, outcome);
    }
    for name in combos {
        let outcome = setup.set_combo_selected(name, true);
        note(&mut report.errors, "combo", name, outcome);
    }

    // 3) read back
    report.selected_cases = read_back(setup, "cases", |s| s.selected_cases(), &mut report.errors);
    report.selected_combos =
        read_back(setup, "combos", |s| s.selected_combos(), &mut report.errors);

    if report.is_clean() {
        info!(
            cases = report.selected_cases.len(),
            combos = report.selected_combos.len(),
            "output selection applied"
        );
    } else {
        warn!(errors = report.errors.len(), "output selection applied with errors");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::snapshot::{Snapshot, SnapshotModel};
    use crate::host::testing::{drift_model, init_test_logging};

    #[test]
    fn name_list_with_leading_count() {
        let raw = Value::List(vec![Value::Int(2), Value::list(["DEAD", "LIVE"]), Value::Int(0)]);
        let list = read_name_list(&raw);
        assert_eq!(list.status, Some(2));
        assert_eq!(list.names, vec!["DEAD", "LIVE"]);
    }

    #[test]
    fn name_list_without_status_keeps_everything() {
        let raw = Value::List(vec![
            Value::from("DEAD"),
            Value::List(vec![Value::from("LIVE"), Value::list(["EQX"])]),
            Value::Null,
        ]);
        let list = read_name_list(&raw);
        assert_eq!(list.status, None);
        assert_eq!(list.names, vec!["DEAD", "LIVE", "EQX"]);

        assert_eq!(read_name_list(&Value::from("ONLY")).names, vec!["ONLY"]);
        assert_eq!(read_name_list(&Value::Null), NameList::default());
    }

    #[test]
    fn case_and_combo_names_from_the_model() -> anyhow::Result<()> {
        let mut model = drift_model();
        assert_eq!(load_case_names(&mut model)?.names, vec!["DEAD", "EQX"]);
        assert_eq!(combo_names(&mut model)?.names, vec!["ENV"]);

        let mut bare = SnapshotModel::new(Snapshot::default());
        let err = load_case_names(&mut bare).expect_err("unsupported");
        assert!(err.to_string().contains("LoadCases.GetNameList"));
        Ok(())
    }

    #[test]
    fn selection_collects_partial_failures() {
        init_test_logging();
        let mut model = drift_model();
        let report = apply_output_selection(
            &mut model,
            &["EQX".to_string(), "WIND".to_string()],
            &["ENV".to_string()],
        );
        assert_eq!(report.selected_cases, vec!["EQX"]);
        assert_eq!(report.selected_combos, vec!["ENV"]);
        assert_eq!(report.errors, vec!["case 'WIND' ret=1"]);
        assert!(report.summary().contains("case 'WIND' ret=1"));
    }

    #[test]
    fn missing_selection_interface_is_reported_not_fatal() {
        init_test_logging();
        let mut model = SnapshotModel::new(Snapshot {
            selection_supported: false,
            ..Snapshot::default()
        });
        let report = apply_output_selection(&mut model, &["DEAD".to_string()], &[]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("selecting cases/combos failed"));
        assert!(report.selected_cases.is_empty());
    }
}
