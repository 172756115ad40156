// src/host/testing.rs
//! Shared fixtures for unit tests.

use super::snapshot::{Recorded, RecordedTable, Snapshot, SnapshotModel};
use super::Value;

pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,etabs_tables=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Full five-element listing for two tables.
pub(crate) fn two_table_listing() -> Value {
    Value::List(vec![
        Value::Int(0),
        Value::list(["TABLE_A", "TABLE_B"]),
        Value::list(["Table A", "Table B"]),
        Value::list([1, 2]),
        Value::list([false, true]),
    ])
}

/// Display-array answer with two columns and two rows, tagged with `key`.
pub(crate) fn two_by_two(key: &str) -> Value {
    Value::List(vec![
        Value::Int(0),
        Value::list(["Col1", "Col2"]),
        Value::list([
            format!("{key}-r1c1"),
            format!("{key}-r1c2"),
            format!("{key}-r2c1"),
            format!("{key}-r2c2"),
        ]),
        Value::Int(1),
        Value::Null,
        Value::Null,
        Value::Null,
    ])
}

pub(crate) fn table(response: Value) -> RecordedTable {
    RecordedTable {
        arity: None,
        response: Recorded::Response(response),
    }
}

/// Two healthy tables, both listing calls working.
pub(crate) fn two_table_model() -> SnapshotModel {
    let mut snapshot = Snapshot {
        all_tables: Some(two_table_listing().into()),
        available_tables: vec![two_table_listing().into()],
        ..Snapshot::default()
    };
    for key in ["TABLE_A", "TABLE_B"] {
        snapshot.tables.insert(key.to_string(), table(two_by_two(key)));
    }
    SnapshotModel::new(snapshot)
}

/// Full listing unavailable; the available call answers in sequence.
pub(crate) fn retrying_model(answers: Vec<Value>) -> SnapshotModel {
    SnapshotModel::new(Snapshot {
        all_tables: Some(Recorded::Failure {
            error: "GetAllTables is not available".to_string(),
        }),
        available_tables: answers.into_iter().map(Recorded::from).collect(),
        ..Snapshot::default()
    })
}

/// Story-drift table with output cases, for selection, filtering and plots.
pub(crate) fn drift_model() -> SnapshotModel {
    let listing = Value::List(vec![
        Value::Int(0),
        Value::list(["Story Drifts", "Story Drifts Ratio"]),
        Value::list(["Story Drifts", "Story Drifts Ratio"]),
    ]);
    let response = Value::List(vec![
        Value::Int(0),
        Value::list(["Story", "OutputCase", "Direction", "Drift"]),
        Value::list([
            "Story2", "DEAD", "X", "0.0020", //
            "Story2", "EQX", "X", "0.0045", //
            "Story1", "DEAD", "X", "0.0010", //
            "Story1", "EQX", "X", "0.0030", //
            "Base", "EQX", "X", "0",
        ]),
    ]);
    let mut snapshot = Snapshot {
        all_tables: Some(listing.into()),
        load_cases: Some(Value::List(vec![Value::Int(2), Value::list(["DEAD", "EQX"]), Value::Int(0)]).into()),
        combos: Some(Value::List(vec![Value::Int(1), Value::list(["ENV"]), Value::Int(0)]).into()),
        ..Snapshot::default()
    };
    snapshot
        .tables
        .insert("Story Drifts".to_string(), table(response));
    SnapshotModel::new(snapshot)
}
