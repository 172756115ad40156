// src/catalog/mod.rs
//! Table catalog: which database tables the open model can produce.
//!
//! The full listing is tried once. If it fails or comes back empty, the
//! available-tables listing is retried a bounded number of times, since the
//! host often needs a moment after a model is opened or analysed before it
//! reports anything.

use serde::Serialize;
use std::{thread, time::Duration};
use tracing::{debug, info, instrument, warn};

use crate::error::ExtractError;
use crate::host::{DatabaseTables, HostModel};

pub mod shapes;

pub use shapes::{classify, normalize, ListingCall, ListingShape};

/// One table the model can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    /// Identifier passed back to the host when reading.
    pub key: String,
    /// Display name shown to users.
    pub name: String,
    pub import_type: Option<i64>,
    pub is_empty: Option<bool>,
}

impl TableEntry {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            import_type: None,
            is_empty: None,
        }
    }
}

/// Record of one listing attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticStep {
    pub method: String,
    pub success: bool,
    pub detail: String,
}

impl DiagnosticStep {
    pub fn new(method: impl Into<String>, success: bool, detail: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            success,
            detail: detail.into(),
        }
    }
}

/// Normalized listing together with the path taken to obtain it.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub status: i64,
    pub entries: Vec<TableEntry>,
    pub steps: Vec<DiagnosticStep>,
}

impl Catalog {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Bounded retry for the available-tables listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const MIN_ATTEMPTS: usize = 3;
    pub const DEFAULT_ATTEMPTS: usize = 4;
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    /// Attempts below [`Self::MIN_ATTEMPTS`] are raised to it.
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(Self::MIN_ATTEMPTS),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

type Listing = (i64, Vec<TableEntry>);

fn try_listing(
    tables: &mut dyn DatabaseTables,
    call: ListingCall,
    attempt: Option<usize>,
) -> (Option<Listing>, DiagnosticStep) {
    let suffix = attempt
        .map(|n| format!(", attempt {}", n))
        .unwrap_or_default();

    let raw = match call {
        ListingCall::All => tables.get_all_tables(),
        ListingCall::Available => tables.get_available_tables(),
    };
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            return (
                None,
                DiagnosticStep::new(call.method(), false, format!("{}{}", e, suffix)),
            )
        }
    };

    match normalize(call, &raw) {
        Ok((status, entries)) => {
            let step = DiagnosticStep::new(
                call.method(),
                !entries.is_empty(),
                format!("ret={}, tables={}{}", status, entries.len(), suffix),
            );
            (Some((status, entries)), step)
        }
        Err(e) => (
            None,
            DiagnosticStep::new(call.method(), false, format!("{}{}", e, suffix)),
        ),
    }
}

/// Obtain the model's table catalog, falling back from the full listing to
/// the available-tables listing.
///
/// Fails with [`ExtractError::Listing`] carrying every step when no path
/// yields a non-empty list.
#[instrument(level = "info", skip(model, policy), fields(host = %model.describe(), attempts = policy.attempts))]
pub fn resolve_catalog(
    model: &mut dyn HostModel,
    policy: &RetryPolicy,
) -> Result<Catalog, ExtractError> {
    let tables = model
        .database_tables()
        .map_err(ExtractError::from_access)?;
    let mut steps = Vec::new();

    // 1) full listing, once
    let (outcome, step) = try_listing(tables, ListingCall::All, None);
    debug!(detail = %step.detail, success = step.success, "GetAllTables");
    steps.push(step);
    if let Some((status, entries)) = outcome {
        if !entries.is_empty() {
            info!(tables = entries.len(), "catalog from full listing");
            return Ok(Catalog {
                status,
                entries,
                steps,
            });
        }
    }

    // 2) available listing with bounded retry
    for attempt in 1..=policy.attempts {
        if attempt > 1 && !policy.delay.is_zero() {
            thread::sleep(policy.delay);
        }
        let (outcome, step) = try_listing(tables, ListingCall::Available, Some(attempt));
        debug!(attempt, detail = %step.detail, success = step.success, "GetAvailableTables");
        steps.push(step);
        if let Some((status, entries)) = outcome {
            if !entries.is_empty() {
                info!(tables = entries.len(), attempt, "catalog from available listing");
                return Ok(Catalog {
                    status,
                    entries,
                    steps,
                });
            }
        }
    }

    warn!(steps = steps.len(), "no listing path produced any table");
    Err(ExtractError::Listing { steps })
}

/// Display names of every table, optionally narrowed to names containing
/// `filter` (case-insensitive).
pub fn list_table_names(
    model: &mut dyn HostModel,
    filter: Option<&str>,
    policy: &RetryPolicy,
) -> Result<Vec<String>, ExtractError> {
    let catalog = resolve_catalog(model, policy)?;
    if catalog.status != 0 {
        warn!(status = catalog.status, "listing reported a non-zero status but returned tables");
    }
    let needle = filter
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty());
    Ok(catalog
        .names()
        .filter(|name| match &needle {
            Some(n) => name.to_lowercase().contains(n),
            None => true,
        })
        .map(str::to_string)
        .collect())
}

/// Category label used to group table names for display.
pub fn category_of(name: &str) -> String {
    if let Some((head, _)) = name.split_once(':') {
        let head = head.trim();
        if !head.is_empty() {
            return head.to_string();
        }
    }
    let words: Vec<&str> = name.split_whitespace().collect();
    match words.as_slice() {
        [] => "Other".to_string(),
        [one] => one.to_string(),
        [first, second, ..] => format!("{} {}", first, second),
    }
}

/// Group names by [`category_of`]. Categories and the names inside them are
/// sorted case-insensitively.
pub fn group_by_category(names: &[String]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for name in names {
        let category = category_of(name);
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, members)) => members.push(name.clone()),
            None => groups.push((category, vec![name.clone()])),
        }
    }
    for (_, members) in groups.iter_mut() {
        members.sort_by_key(|m| m.to_lowercase());
    }
    groups.sort_by_key(|(c, _)| c.to_lowercase());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::snapshot::{Recorded, Snapshot, SnapshotModel};
    use crate::host::testing::{init_test_logging, retrying_model, two_table_model};
    use crate::host::Value;

    fn fast(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    fn empty_listing() -> Value {
        Value::List(vec![
            Value::Int(0),
            Value::list(Vec::<Value>::new()),
            Value::list(Vec::<Value>::new()),
        ])
    }

    fn kx_listing() -> Value {
        Value::List(vec![Value::Int(0), Value::list(["KX"]), Value::list(["Name X"])])
    }

    #[test]
    fn full_listing_wins_when_it_works() {
        init_test_logging();
        let mut model = two_table_model();
        let catalog = resolve_catalog(&mut model, &fast(3)).expect("catalog");
        assert_eq!(catalog.entries.len(), 2);
        assert_eq!(catalog.entries[1].import_type, Some(2));
        assert_eq!(catalog.entries[1].is_empty, Some(true));
        assert_eq!(catalog.steps.len(), 1);
        assert!(catalog.steps[0].success);
        assert_eq!(model.available_calls(), 0);
    }

    #[test]
    fn available_listing_is_retried_until_tables_appear() {
        init_test_logging();
        let mut model = retrying_model(vec![empty_listing(), Value::Null, kx_listing()]);
        let catalog = resolve_catalog(&mut model, &fast(3)).expect("catalog");
        assert_eq!(catalog.entries, vec![TableEntry::new("KX", "Name X")]);
        assert_eq!(model.available_calls(), 3);
    }

    #[test]
    fn diagnostics_record_every_attempt() {
        init_test_logging();
        let mut model = retrying_model(vec![empty_listing(), kx_listing()]);
        let catalog = resolve_catalog(&mut model, &fast(3)).expect("catalog");

        let methods: Vec<&str> = catalog.steps.iter().map(|s| s.method.as_str()).collect();
        assert_eq!(
            methods,
            vec!["GetAllTables", "GetAvailableTables", "GetAvailableTables"]
        );
        assert!(!catalog.steps[0].success);
        assert!(catalog.steps[1].detail.contains("attempt 1"));
        assert!(!catalog.steps[1].success);
        assert!(catalog.steps[2].detail.contains("attempt 2"));
        assert!(catalog.steps[2].success);
    }

    #[test]
    fn exhausted_retries_fail_with_every_step() {
        init_test_logging();
        let mut model = retrying_model(vec![empty_listing()]);
        let err = resolve_catalog(&mut model, &fast(4)).expect_err("nothing listed");
        assert!(matches!(err, ExtractError::Listing { .. }));
        assert_eq!(err.steps().len(), 5);
        assert_eq!(model.available_calls(), 4);
        assert!(err.to_string().contains("GetAllTables"));
    }

    #[test]
    fn retry_floor_is_three_attempts() {
        assert_eq!(RetryPolicy::new(1, Duration::ZERO).attempts, 3);
        assert_eq!(RetryPolicy::new(6, Duration::ZERO).attempts, 6);
        assert_eq!(RetryPolicy::default().attempts, 4);
    }

    #[test]
    fn closed_model_is_a_connection_error() {
        let mut model = SnapshotModel::new(Snapshot {
            model_open: false,
            all_tables: Some(Recorded::Response(kx_listing())),
            ..Snapshot::default()
        });
        let err = resolve_catalog(&mut model, &fast(3)).expect_err("closed");
        assert!(matches!(err, ExtractError::Connection(_)));
    }

    #[test]
    fn names_are_filtered_case_insensitively() {
        init_test_logging();
        let mut model = two_table_model();
        let all = list_table_names(&mut model, None, &fast(3)).expect("names");
        assert_eq!(all, vec!["Table A", "Table B"]);
        let some = list_table_names(&mut model, Some(" table b"), &fast(3)).expect("names");
        assert_eq!(some, vec!["Table B"]);
        let none = list_table_names(&mut model, Some("joint"), &fast(3)).expect("names");
        assert!(none.is_empty());
    }

    #[test]
    fn categories_follow_prefix_rules() {
        assert_eq!(category_of("Analysis Options: Frame"), "Analysis Options");
        assert_eq!(category_of("Story Drifts Ratio"), "Story Drifts");
        assert_eq!(category_of("Joints"), "Joints");
        assert_eq!(category_of("   "), "Other");

        let names: Vec<String> = ["Story Forces", "joint Drifts", "Story Drifts", "Story Drifts Ratio"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let groups = group_by_category(&names);
        let labels: Vec<&str> = groups.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(labels, vec!["joint Drifts", "Story Drifts", "Story Forces"]);
        assert_eq!(groups[1].1, vec!["Story Drifts", "Story Drifts Ratio"]);
    }
}
