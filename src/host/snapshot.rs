// src/host/snapshot.rs
//! Replay backend: a [`HostModel`] answered from recorded raw responses.
//!
//! A snapshot is a JSON document holding what one host installation returned
//! for each call. It reproduces version-specific response shapes offline and
//! lets the CLI work against a captured model.
//!
//! ```json
//! {
//!   "model": "Tower.EDB",
//!   "all_tables": {"error": "GetAllTables is not available"},
//!   "available_tables": [
//!     [0, [], [], null, null],
//!     [0, ["Story Drifts"], ["Story Drifts"], [1], [false]]
//!   ],
//!   "tables": {
//!     "Story Drifts": {"arity": 2, "response": [0, ["Story", "OutputCase", "Drift"], ["Story1", "DEAD", "0.001"]]}
//!   },
//!   "load_cases": [2, ["DEAD", "LIVE"], 0],
//!   "combos": [1, ["ENV"], 0]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{debug, info};

use super::{ApiError, DatabaseTables, HostModel, OutputSetup, Value};
use crate::error::ExtractError;

/// One recorded answer: either the raw value or the error the call raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recorded {
    Failure { error: String },
    Response(Value),
}

impl Recorded {
    fn replay(&self) -> Result<Value, ApiError> {
        match self {
            Recorded::Failure { error } => Err(ApiError::Call(error.clone())),
            Recorded::Response(v) => Ok(v.clone()),
        }
    }
}

impl From<Value> for Recorded {
    fn from(v: Value) -> Self {
        Recorded::Response(v)
    }
}

/// Recorded `GetTableForDisplayArray` answer for one table key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedTable {
    /// Number of arguments the recorded host accepted; other arities are
    /// rejected as signature mismatches. `None` accepts any arity.
    #[serde(default)]
    pub arity: Option<usize>,
    pub response: Recorded,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub model: Option<String>,
    /// `false` reproduces "application running, no model open".
    #[serde(default = "default_true")]
    pub model_open: bool,
    #[serde(default)]
    pub all_tables: Option<Recorded>,
    /// Successive answers; the last one repeats once exhausted.
    #[serde(default)]
    pub available_tables: Vec<Recorded>,
    /// Keyed by table key.
    #[serde(default)]
    pub tables: BTreeMap<String, RecordedTable>,
    #[serde(default)]
    pub load_cases: Option<Recorded>,
    #[serde(default)]
    pub combos: Option<Recorded>,
    #[serde(default = "default_true")]
    pub selection_supported: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            model: None,
            model_open: true,
            all_tables: None,
            available_tables: Vec::new(),
            tables: BTreeMap::new(),
            load_cases: None,
            combos: None,
            selection_supported: true,
        }
    }
}

/// Replaying host model. Keeps the mutable selection state a live host would.
#[derive(Debug, Clone)]
pub struct SnapshotModel {
    snapshot: Snapshot,
    available_calls: usize,
    selected_tables: Vec<String>,
    selected_cases: Vec<String>,
    selected_combos: Vec<String>,
    read_calls: Vec<Vec<String>>,
}

impl SnapshotModel {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            available_calls: 0,
            selected_tables: Vec::new(),
            selected_cases: Vec::new(),
            selected_combos: Vec::new(),
            read_calls: Vec::new(),
        }
    }

    /// Load a snapshot file. A missing file is reported like a host that is
    /// not running.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ExtractError::Connection(format!("cannot open snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|source| ExtractError::Snapshot {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            model = snapshot.model.as_deref().unwrap_or("?"),
            tables = snapshot.tables.len(),
            "loaded host snapshot"
        );
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// How many times the available-tables call has been answered.
    pub fn available_calls(&self) -> usize {
        self.available_calls
    }

    pub fn selected_tables(&self) -> &[String] {
        &self.selected_tables
    }

    /// Argument lists received by `GetTableForDisplayArray`, in call order.
    pub fn read_calls(&self) -> &[Vec<String>] {
        &self.read_calls
    }

    fn known_names(recorded: &Option<Recorded>) -> Vec<String> {
        match recorded {
            Some(Recorded::Response(v)) => v.strings(),
            _ => Vec::new(),
        }
    }

    fn toggle(list: &mut Vec<String>, known: &[String], name: &str, selected: bool) -> Value {
        if !known.iter().any(|k| k == name) {
            return Value::Int(1);
        }
        list.retain(|n| n != name);
        if selected {
            list.push(name.to_string());
        }
        Value::Int(0)
    }
}

impl DatabaseTables for SnapshotModel {
    fn get_all_tables(&mut self) -> Result<Value, ApiError> {
        match &self.snapshot.all_tables {
            Some(recorded) => recorded.replay(),
            None => Err(ApiError::Unsupported("GetAllTables".to_string())),
        }
    }

    fn get_available_tables(&mut self) -> Result<Value, ApiError> {
        let answers = &self.snapshot.available_tables;
        if answers.is_empty() {
            return Err(ApiError::Unsupported("GetAvailableTables".to_string()));
        }
        let idx = self.available_calls.min(answers.len() - 1);
        self.available_calls += 1;
        answers[idx].replay()
    }

    fn set_all_tables_selected(&mut self, selected: bool) -> Result<Value, ApiError> {
        if !selected {
            self.selected_tables.clear();
        }
        Ok(Value::Int(0))
    }

    fn set_table_selected(&mut self, key: &str) -> Result<Value, ApiError> {
        self.selected_tables.push(key.to_string());
        Ok(Value::Int(0))
    }

    fn get_table_for_display_array(&mut self, args: &[&str]) -> Result<Value, ApiError> {
        self.read_calls
            .push(args.iter().map(|a| a.to_string()).collect());
        let key = args
            .first()
            .ok_or_else(|| ApiError::SignatureMismatch("missing table key".to_string()))?;
        let recorded = self
            .snapshot
            .tables
            .get(*key)
            .ok_or_else(|| ApiError::Call(format!("table '{}' is not in the snapshot", key)))?;
        if let Some(arity) = recorded.arity {
            if arity != args.len() {
                debug!(key, arity, got = args.len(), "rejecting arity");
                return Err(ApiError::SignatureMismatch(format!(
                    "GetTableForDisplayArray takes {} arguments ({} given)",
                    arity,
                    args.len()
                )));
            }
        }
        recorded.response.replay()
    }
}

impl OutputSetup for SnapshotModel {
    fn deselect_all_cases_and_combos(&mut self) -> Result<Value, ApiError> {
        self.selected_cases.clear();
        self.selected_combos.clear();
        Ok(Value::Int(0))
    }

    fn set_case_selected(&mut self, name: &str, selected: bool) -> Result<Value, ApiError> {
        let known = Self::known_names(&self.snapshot.load_cases);
        Ok(Self::toggle(&mut self.selected_cases, &known, name, selected))
    }

    fn set_combo_selected(&mut self, name: &str, selected: bool) -> Result<Value, ApiError> {
        let known = Self::known_names(&self.snapshot.combos);
        Ok(Self::toggle(&mut self.selected_combos, &known, name, selected))
    }

    fn selected_cases(&mut self) -> Result<Value, ApiError> {
        Ok(Value::List(vec![
            Value::Int(0),
            Value::list(self.selected_cases.clone()),
        ]))
    }

    fn selected_combos(&mut self) -> Result<Value, ApiError> {
        Ok(Value::List(vec![
            Value::Int(0),
            Value::list(self.selected_combos.clone()),
        ]))
    }
}

impl HostModel for SnapshotModel {
    fn database_tables(&mut self) -> Result<&mut dyn DatabaseTables, ApiError> {
        if !self.snapshot.model_open {
            return Err(ApiError::Disconnected(
                "the host application has no model open".to_string(),
            ));
        }
        Ok(self)
    }

    fn output_setup(&mut self) -> Result<&mut dyn OutputSetup, ApiError> {
        if !self.snapshot.selection_supported {
            return Err(ApiError::Unsupported("Results.Setup".to_string()));
        }
        Ok(self)
    }

    fn load_case_names(&mut self) -> Result<Value, ApiError> {
        match &self.snapshot.load_cases {
            Some(recorded) => recorded.replay(),
            None => Err(ApiError::Unsupported("LoadCases.GetNameList".to_string())),
        }
    }

    fn combo_names(&mut self) -> Result<Value, ApiError> {
        match &self.snapshot.combos {
            Some(recorded) => recorded.replay(),
            None => Err(ApiError::Unsupported("RespCombo.GetNameList".to_string())),
        }
    }

    fn describe(&self) -> String {
        match &self.snapshot.model {
            Some(name) => format!("snapshot of {}", name),
            None => "snapshot".to_string(),
        }
    }
}
