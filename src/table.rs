// src/table.rs
use serde::Serialize;

/// A table reconstructed from the host's flat display array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Column headings, in the order the host reported them.
    pub columns: Vec<String>,
    /// One `Vec` per record, always `columns.len()` wide.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column whose heading satisfies `pred`.
    pub fn position(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.columns.iter().position(|c| pred(c))
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |r| r.get(idx).map(String::as_str).unwrap_or(""))
    }

    /// Keep only rows for which `keep` is true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[String]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// A copy holding only the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Fixed-width text rendering of the first `max_rows` rows, for the
    /// console and the diagnostic log.
    pub fn preview(&self, max_rows: usize) -> String {
        let shown: Vec<&Vec<String>> = self.rows.iter().take(max_rows).collect();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                shown
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|v| v.chars().count())
                    .chain(std::iter::once(c.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let render = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = vec![render(self.columns.as_slice())];
        lines.extend(shown.iter().map(|r| render(r.as_slice())));
        if self.rows.len() > shown.len() {
            lines.push(format!("... {} more row(s)", self.rows.len() - shown.len()));
        }
        lines.join("\n")
    }
}
