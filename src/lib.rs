// src/lib.rs
//! Extraction of analysis tables from a structural model's database-table
//! interface, with CSV/TXT export, a diagnostic log and per-story charts.

pub mod catalog;
pub mod config;
pub mod debug_log;
pub mod error;
pub mod export;
pub mod extract;
pub mod host;
pub mod matcher;
pub mod plot;
pub mod reader;
pub mod selection;
pub mod table;

pub use catalog::{list_table_names, resolve_catalog, Catalog, RetryPolicy, TableEntry};
pub use error::ExtractError;
pub use export::{export_table, ExportFormat};
pub use extract::{extract_tables, ExtractRequest, DEFAULT_TABLES};
pub use host::{snapshot::SnapshotModel, HostModel, Value};
pub use table::Table;
