// src/reader/reshape.rs
//! Turning a display-array payload into rows.

use tracing::debug;

use crate::error::ExtractError;
use crate::host::Value;
use crate::table::Table;

static MISSING: Value = Value::Null;

/// Where headings and data sit in a display-array response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLayout {
    pub headings: usize,
    /// `None` when no position holds anything list-like besides the headings.
    pub data: Option<usize>,
}

impl PayloadLayout {
    /// The documented layout is `(status, headings, data, ...)`. Some versions
    /// put a column count first, `(status, ncols, headings, nrows, data, ...)`.
    pub fn detect(items: &[Value]) -> Self {
        let is_list = |idx: usize| items.get(idx).map_or(false, Value::is_list);

        if !is_list(1) && is_list(2) {
            let data = if is_list(4) {
                Some(4)
            } else if is_list(3) {
                Some(3)
            } else {
                None
            };
            return PayloadLayout { headings: 2, data };
        }

        if is_list(1) && !is_list(2) && is_list(4) {
            return PayloadLayout {
                headings: 1,
                data: Some(4),
            };
        }

        PayloadLayout {
            headings: 1,
            data: Some(2),
        }
    }

    pub fn headings<'a>(&self, items: &'a [Value]) -> &'a Value {
        items.get(self.headings).unwrap_or(&MISSING)
    }

    pub fn data<'a>(&self, items: &'a [Value]) -> &'a Value {
        self.data
            .and_then(|idx| items.get(idx))
            .unwrap_or(&MISSING)
    }
}

/// Reshape a flat value run into `columns`-wide rows.
///
/// A single value against several headings becomes one row padded with
/// blanks. Any other count that does not divide evenly is rejected. Null
/// cells inside the run stay in place as blanks so later values keep their
/// columns; only a null payload means no values.
pub fn reshape(table: &str, headings: &Value, data: &Value) -> Result<Table, ExtractError> {
    let columns: Vec<String> = headings.flatten_cells().iter().map(Value::to_cell).collect();
    if columns.is_empty() {
        return Err(ExtractError::NoHeadings {
            table: table.to_string(),
        });
    }
    let width = columns.len();

    let mut values: Vec<String> = data.flatten_cells().iter().map(Value::to_cell).collect();
    if values.len() == 1 && width > 1 {
        debug!(table, width, "single value for several columns, padding row");
        values.resize(width, String::new());
    }
    if values.len() % width != 0 {
        return Err(ExtractError::CountMismatch {
            table: table.to_string(),
            values: values.len(),
            columns: width,
        });
    }

    let rows = values.chunks(width).map(<[String]>::to_vec).collect();
    Ok(Table::new(columns, rows))
}

/// `OutputCase`, compared ignoring case and separators.
pub fn is_output_case_column(heading: &str) -> bool {
    let norm: String = heading
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect();
    norm == "outputcase"
}

/// Keep rows whose output case is one of `allowed`. Returns the row counts
/// before and after, or `None` when the table has no output-case column.
pub fn filter_cases(table: &mut Table, allowed: &[String]) -> Option<(usize, usize)> {
    let idx = table.position(is_output_case_column)?;
    let allowed: Vec<String> = allowed.iter().map(|a| a.trim().to_lowercase()).collect();
    let before = table.len();
    table.retain_rows(|row| {
        row.get(idx)
            .map(|v| allowed.contains(&v.trim().to_lowercase()))
            .unwrap_or(false)
    });
    Some((before, table.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_columns_four_values_make_two_rows() {
        let table = reshape(
            "A",
            &Value::list(["Col1", "Col2"]),
            &Value::list(["A-r1c1", "A-r1c2", "A-r2c1", "A-r2c2"]),
        )
        .expect("reshapes");
        assert_eq!(table.columns, strings(&["Col1", "Col2"]));
        assert_eq!(
            table.rows,
            vec![strings(&["A-r1c1", "A-r1c2"]), strings(&["A-r2c1", "A-r2c2"])]
        );
    }

    #[test]
    fn single_value_is_padded_to_one_row() {
        let table = reshape("T", &Value::list(["A", "B", "C"]), &Value::list(["x"]))
            .expect("reshapes");
        assert_eq!(table.rows, vec![strings(&["x", "", ""])]);

        // a bare scalar counts as one value too
        let table = reshape("T", &Value::list(["A", "B"]), &Value::from("x")).expect("reshapes");
        assert_eq!(table.rows, vec![strings(&["x", ""])]);
    }

    #[test]
    fn uneven_counts_are_rejected() {
        let err = reshape("T", &Value::list(["A", "B"]), &Value::list(["1", "2", "3"]))
            .expect_err("3 values into 2 columns");
        match err {
            ExtractError::CountMismatch { values, columns, .. } => {
                assert_eq!((values, columns), (3, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn null_cells_stay_aligned_with_their_columns() {
        let data = Value::List(vec![
            Value::from("S1"),
            Value::Null,
            Value::from("S2"),
            Value::from("0.1"),
            Value::from("S3"),
            Value::Null,
        ]);
        let table = reshape("T", &Value::list(["Story", "Drift"]), &data).expect("reshapes");
        assert_eq!(
            table.rows,
            vec![
                strings(&["S1", ""]),
                strings(&["S2", "0.1"]),
                strings(&["S3", ""])
            ]
        );

        // one null too many no longer lines up
        let data = Value::List(vec![Value::from("S1"), Value::Null, Value::Null]);
        let err = reshape("T", &Value::list(["Story", "Drift"]), &data).expect_err("3 into 2");
        assert!(matches!(err, ExtractError::CountMismatch { values: 3, .. }));
    }

    #[test]
    fn nested_data_is_flattened_and_null_payload_is_empty() {
        let data = Value::List(vec![
            Value::list(["a", "b"]),
            Value::List(vec![Value::Float(1.5), Value::Bool(true)]),
        ]);
        let table = reshape("T", &Value::list(["X", "Y"]), &data).expect("reshapes");
        assert_eq!(table.rows, vec![strings(&["a", "b"]), strings(&["1.5", "True"])]);

        let table = reshape("T", &Value::list(["X", "Y"]), &Value::Null).expect("reshapes");
        assert!(table.is_empty());
    }

    #[test]
    fn null_heading_keeps_its_column() {
        let headings = Value::List(vec![Value::from("Story"), Value::Null, Value::from("Drift")]);
        let table = reshape("T", &headings, &Value::list(["S1", "x", "0.2"])).expect("reshapes");
        assert_eq!(table.columns, strings(&["Story", "", "Drift"]));
        assert_eq!(table.rows, vec![strings(&["S1", "x", "0.2"])]);
    }

    #[test]
    fn missing_headings_are_rejected() {
        let err = reshape("T", &Value::Null, &Value::list(["1"])).expect_err("no headings");
        assert!(matches!(err, ExtractError::NoHeadings { .. }));
    }

    #[test]
    fn layout_detection() {
        let documented = vec![
            Value::Int(0),
            Value::list(["H"]),
            Value::list(["d"]),
            Value::Int(1),
        ];
        assert_eq!(
            PayloadLayout::detect(&documented),
            PayloadLayout { headings: 1, data: Some(2) }
        );

        let counted = vec![
            Value::Int(0),
            Value::Int(2),
            Value::list(["H1", "H2"]),
            Value::Int(1),
            Value::list(["a", "b"]),
            Value::Int(9),
        ];
        let layout = PayloadLayout::detect(&counted);
        assert_eq!(layout, PayloadLayout { headings: 2, data: Some(4) });
        assert_eq!(layout.data(&counted), &Value::list(["a", "b"]));

        let short_counted = vec![
            Value::Int(0),
            Value::Int(1),
            Value::list(["H"]),
            Value::list(["a"]),
        ];
        assert_eq!(
            PayloadLayout::detect(&short_counted),
            PayloadLayout { headings: 2, data: Some(3) }
        );

        let displaced = vec![
            Value::Int(0),
            Value::list(["H"]),
            Value::Int(1),
            Value::Null,
            Value::list(["a"]),
        ];
        assert_eq!(
            PayloadLayout::detect(&displaced),
            PayloadLayout { headings: 1, data: Some(4) }
        );
    }

    #[test]
    fn case_filter_matches_trimmed_and_case_insensitive() {
        let mut table = Table::new(
            strings(&["Story", "Output Case"]),
            vec![
                strings(&["S1", " dead "]),
                strings(&["S1", "EQX"]),
                strings(&["S1", "LIVE"]),
            ],
        );
        let counts = filter_cases(&mut table, &strings(&["DEAD", "eqx"]));
        assert_eq!(counts, Some((3, 2)));
        assert_eq!(table.rows[1][1], "EQX");

        let mut no_case = Table::new(strings(&["Story"]), vec![strings(&["S1"])]);
        assert_eq!(filter_cases(&mut no_case, &strings(&["DEAD"])), None);
        assert_eq!(no_case.len(), 1);
    }
}
