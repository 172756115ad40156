// src/plot/series.rs
//! Building per-story series from extracted tables.

use std::collections::BTreeMap;
use tracing::debug;

use super::columns::{column_key, order_stories, ColumnMap};
use super::PlotError;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// One plotted line: a value (or a gap) per story, in chart story order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
    pub style: LineStyle,
    pub markers: bool,
}

impl Series {
    fn solid(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
            style: LineStyle::Solid,
            markers: true,
        }
    }
}

/// Everything needed to draw a per-story chart.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryChart {
    pub title: String,
    pub x_label: String,
    /// Bottom to top.
    pub stories: Vec<String>,
    pub series: Vec<Series>,
    /// Reference values drawn as vertical lines at ±value.
    pub limits: Vec<f64>,
}

/// Row filters shared by every chart.
#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    pub cases: Vec<String>,
    pub directions: Vec<String>,
    /// Used only when `directions` is empty.
    pub prefer_direction: Option<String>,
    pub story_order: Vec<String>,
}

fn norm(value: &str) -> String {
    value.trim().to_lowercase()
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

impl SeriesFilter {
    fn keep_cases<'a>(&self, rows: Vec<&'a Vec<String>>, case_col: Option<usize>) -> Vec<&'a Vec<String>> {
        match case_col {
            Some(idx) if !self.cases.is_empty() => {
                let allowed: Vec<String> = self.cases.iter().map(|c| norm(c)).collect();
                rows.into_iter()
                    .filter(|r| allowed.contains(&norm(cell(r, idx))))
                    .collect()
            }
            _ => rows,
        }
    }

    fn keep_directions<'a>(&self, rows: Vec<&'a Vec<String>>, dir_col: Option<usize>) -> Vec<&'a Vec<String>> {
        let Some(idx) = dir_col else {
            return rows;
        };
        if !self.directions.is_empty() {
            let allowed: Vec<String> = self.directions.iter().map(|d| norm(d)).collect();
            rows.into_iter()
                .filter(|r| allowed.contains(&norm(cell(r, idx))))
                .collect()
        } else if let Some(prefer) = &self.prefer_direction {
            let prefer = norm(prefer);
            rows.into_iter()
                .filter(|r| norm(cell(r, idx)) == prefer)
                .collect()
        } else {
            rows
        }
    }
}

/// `case [direction]`, or `Series` when there is no case column.
fn series_label(row: &[String], cols: &ColumnMap) -> String {
    let case = cols
        .case
        .map(|i| cell(row, i).to_string())
        .unwrap_or_else(|| "Series".to_string());
    match cols.direction.map(|i| cell(row, i).trim()) {
        Some(dir) if !dir.is_empty() => format!("{} {}", case, dir),
        _ => case,
    }
}

/// Distinct values in order of first appearance.
fn distinct<'a>(rows: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for s in rows {
        if !seen.iter().any(|x| x == s) {
            seen.push(s.to_string());
        }
    }
    seen
}

/// Reduce `(story, value)` pairs to one value per story in `order`.
fn per_story(
    order: &[String],
    pairs: impl Iterator<Item = (String, f64)>,
    reduce: fn(&[f64]) -> f64,
) -> Vec<Option<f64>> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (story, value) in pairs {
        buckets.entry(story).or_default().push(value.abs());
    }
    order
        .iter()
        .map(|s| buckets.get(s).filter(|v| !v.is_empty()).map(|v| reduce(v)))
        .collect()
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn p84_of(values: &[f64]) -> f64 {
    percentile(values, 0.84)
}

/// Quantile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Maximum absolute drift per story, one series per case and direction.
pub fn max_story_drift(
    table: &Table,
    filter: &SeriesFilter,
    limits: &[f64],
) -> Result<StoryChart, PlotError> {
    let cols = ColumnMap::detect(table);
    let (story_col, drift_col) = match (cols.story, cols.drift) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            return Err(PlotError::MissingColumns {
                needed: "Story and Drift".to_string(),
            })
        }
    };

    // 1) numeric drift rows only, then filters
    let rows: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|r| parse_number(cell(r, drift_col)).is_some())
        .collect();
    let rows = filter.keep_cases(rows, cols.case);
    let rows = filter.keep_directions(rows, cols.direction);
    if rows.is_empty() {
        return Err(PlotError::EmptyAfterFilter);
    }

    // 2) story order and grouping
    let stories = order_stories(
        &distinct(rows.iter().map(|r| cell(r, story_col))),
        &filter.story_order,
    );
    let mut groups: BTreeMap<String, Vec<&Vec<String>>> = BTreeMap::new();
    for row in rows {
        groups.entry(series_label(row, &cols)).or_default().push(row);
    }

    let series = groups
        .into_iter()
        .map(|(label, rows)| {
            let pairs = rows.into_iter().filter_map(|r| {
                parse_number(cell(r, drift_col)).map(|v| (cell(r, story_col).to_string(), v))
            });
            Series::solid(label, per_story(&stories, pairs, max_of))
        })
        .collect::<Vec<_>>();
    debug!(series = series.len(), stories = stories.len(), "max story drift");

    Ok(StoryChart {
        title: "Maximum Story Drifts".to_string(),
        x_label: "Drift, Unitless".to_string(),
        stories,
        series,
        limits: limits.iter().map(|l| l.abs()).collect(),
    })
}

/// Maximum absolute value of each matching column per story, one series per
/// column and case/direction.
pub fn story_columns(
    table: &Table,
    table_name: &str,
    candidates: &[String],
    filter: &SeriesFilter,
) -> Result<StoryChart, PlotError> {
    let cols = ColumnMap::detect(table);
    let story_col = cols.story.ok_or_else(|| PlotError::MissingColumns {
        needed: "Story".to_string(),
    })?;

    let rows: Vec<&Vec<String>> = table.rows.iter().collect();
    let rows = filter.keep_cases(rows, cols.case);
    let rows = filter.keep_directions(rows, cols.direction);
    if rows.is_empty() {
        return Err(PlotError::EmptyAfterFilter);
    }

    let wanted: Vec<String> = candidates.iter().map(|c| column_key(c)).collect();
    let value_cols: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| wanted.contains(&column_key(c)))
        .map(|(i, _)| i)
        .collect();
    if value_cols.is_empty() {
        return Err(PlotError::NoValueColumns {
            candidates: candidates.join(", "),
        });
    }

    let stories = order_stories(
        &distinct(rows.iter().map(|r| cell(r, story_col))),
        &filter.story_order,
    );
    let labels: Vec<String> = rows.iter().map(|r| series_label(r, &cols)).collect();
    let bases = distinct(labels.iter().map(String::as_str));

    let mut series = Vec::new();
    for &col in &value_cols {
        for base in &bases {
            let pairs = rows
                .iter()
                .filter(|r| series_label(r, &cols) == *base)
                .filter_map(|r| {
                    parse_number(cell(r, col)).map(|v| (cell(r, story_col).to_string(), v))
                });
            let label = if value_cols.len() == 1 {
                base.clone()
            } else {
                format!("{} - {}", base, table.columns[col])
            };
            series.push(Series::solid(label, per_story(&stories, pairs, max_of)));
        }
    }

    Ok(StoryChart {
        title: table_name.to_string(),
        x_label: "Value".to_string(),
        stories,
        series,
        limits: Vec::new(),
    })
}

/// Which drift component a column holds.
fn direction_tag(heading: &str) -> String {
    let key = column_key(heading);
    if key.contains("driftx") {
        "X".to_string()
    } else if key.contains("drifty") {
        "Y".to_string()
    } else {
        heading.to_string()
    }
}

type JointPoint = (String, String, String, f64);

/// `(story, value)` pairs of one drift component.
fn of_direction<'a>(
    points: &'a [JointPoint],
    dir: &'a str,
) -> impl Iterator<Item = (String, f64)> + 'a {
    points
        .iter()
        .filter(move |p| p.1 == dir)
        .map(|p| (p.2.clone(), p.3))
}

/// Per-joint drifts, one series per `case-direction-joint`, plus mean and
/// 84th-percentile envelopes for the X and Y components.
pub fn joint_drifts(
    table: &Table,
    joints: &[String],
    candidates: &[String],
    filter: &SeriesFilter,
) -> Result<StoryChart, PlotError> {
    let cols = ColumnMap::detect(table);
    let keys: Vec<String> = table.columns.iter().map(|c| column_key(c)).collect();

    // 1) joint, story and drift columns
    let joint_col = keys
        .iter()
        .position(|k| k == "label" || k == "storylabel")
        .or_else(|| {
            keys.iter().position(|k| {
                matches!(k.as_str(), "joint" | "point" | "uniquename" | "name" | "node")
            })
        });
    let story_col = keys.iter().position(|k| k.contains("story"));
    let (joint_col, story_col) = match (joint_col, story_col) {
        (Some(j), Some(s)) => (j, s),
        _ => {
            return Err(PlotError::MissingColumns {
                needed: "Story and Joint".to_string(),
            })
        }
    };

    let wanted: Vec<String> = candidates.iter().map(|c| column_key(c)).collect();
    let mut drift_cols: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| k.contains("drift"))
        .filter(|(_, k)| wanted.is_empty() || wanted.contains(k))
        .map(|(i, _)| i)
        .collect();
    if !filter.directions.is_empty() {
        let dirs: Vec<String> = filter.directions.iter().map(|d| norm(d)).collect();
        drift_cols.retain(|&i| dirs.iter().any(|d| keys[i].contains(d.as_str())));
    } else if let Some(prefer) = &filter.prefer_direction {
        let prefer = norm(prefer);
        let preferred: Vec<usize> = drift_cols
            .iter()
            .copied()
            .filter(|&i| keys[i].contains(prefer.as_str()))
            .collect();
        if !preferred.is_empty() {
            drift_cols = preferred;
        }
    }
    if drift_cols.is_empty() {
        return Err(PlotError::NoValueColumns {
            candidates: "Drift, DriftX, DriftY".to_string(),
        });
    }

    // 2) rows with at least one numeric drift, then filters
    let rows: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|r| drift_cols.iter().any(|&c| parse_number(cell(r, c)).is_some()))
        .collect();
    let rows: Vec<&Vec<String>> = if joints.is_empty() {
        rows
    } else {
        let allowed: Vec<String> = joints.iter().map(|j| norm(j)).collect();
        rows.into_iter()
            .filter(|r| allowed.contains(&norm(cell(r, joint_col))))
            .collect()
    };
    let rows = filter.keep_cases(rows, cols.case);
    if rows.is_empty() {
        return Err(PlotError::EmptyAfterFilter);
    }

    // 3) long form: (series, direction, story, value)
    let mut points: Vec<JointPoint> = Vec::new();
    for row in &rows {
        for &col in &drift_cols {
            if let Some(value) = parse_number(cell(row, col)) {
                let dir = direction_tag(&table.columns[col]);
                let case = cols.case.map(|i| cell(row, i)).unwrap_or("");
                let label = format!("{}-{}-{}", case, dir, cell(row, joint_col));
                points.push((label, dir, cell(row, story_col).to_string(), value));
            }
        }
    }

    let stories = order_stories(
        &distinct(points.iter().map(|p| p.2.as_str())),
        &filter.story_order,
    );

    let mut labels: Vec<&str> = points.iter().map(|p| p.0.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    let mut series: Vec<Series> = labels
        .into_iter()
        .map(|label| {
            let pairs = points
                .iter()
                .filter(|p| p.0 == label)
                .map(|p| (p.2.clone(), p.3));
            Series::solid(label, per_story(&stories, pairs, max_of))
        })
        .collect();

    // 4) envelopes
    for dir in ["X", "Y"] {
        if !points.iter().any(|p| p.1 == dir) {
            continue;
        }
        series.push(Series {
            label: format!("Mean {}", dir),
            values: per_story(&stories, of_direction(&points, dir), mean_of),
            style: LineStyle::Dashed,
            markers: false,
        });
        series.push(Series {
            label: format!("P84 {}", dir),
            values: per_story(&stories, of_direction(&points, dir), p84_of),
            style: LineStyle::Dotted,
            markers: false,
        });
    }

    Ok(StoryChart {
        title: "Joint Drifts".to_string(),
        x_label: "Drift, Unitless".to_string(),
        stories,
        series,
        limits: Vec::new(),
    })
}
