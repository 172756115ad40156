// src/plot/render.rs
//! SVG rendering of a [`StoryChart`].

use plotters::coord::Shift;
use plotters::prelude::*;
use std::{fs, path::Path};
use tracing::info;

use super::series::{LineStyle, Series, StoryChart};
use super::PlotError;

/// Vertical distance between stories, in axis units.
const STORY_STEP: i32 = 100;

const COLOR_PALETTE: [RGBColor; 6] = [
    RGBColor(0xe5, 0x39, 0x35),
    RGBColor(0x1e, 0x88, 0xe5),
    RGBColor(0x43, 0xa0, 0x47),
    RGBColor(0xfd, 0xd8, 0x35),
    RGBColor(0x8e, 0x24, 0xaa),
    RGBColor(0x00, 0x89, 0x7b),
];

const GRAY_PALETTE: [RGBColor; 5] = [
    RGBColor(0x00, 0x00, 0x00),
    RGBColor(0x55, 0x55, 0x55),
    RGBColor(0x88, 0x88, 0x88),
    RGBColor(0xaa, 0xaa, 0xaa),
    RGBColor(0xcc, 0xcc, 0xcc),
];

/// Envelope lines come in (mean, P84) pairs per direction.
const ENVELOPE_COLORS: [RGBColor; 2] = [RGBColor(0x55, 0x55, 0x55), RGBColor(0x99, 0x99, 0x99)];

const LIMIT_COLOR: RGBColor = RGBColor(0x66, 0x66, 0x66);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 900,
            height: 700,
            grayscale: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Marker {
    Circle,
    Square,
    Triangle,
    Cross,
}

const MARKERS: [Marker; 4] = [Marker::Circle, Marker::Square, Marker::Triangle, Marker::Cross];

fn render_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Render(e.to_string())
}

/// Runs of consecutive stories that have a value.
fn runs(series: &Series) -> Vec<Vec<(f64, i32)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (idx, value) in series.values.iter().enumerate() {
        match value {
            Some(v) => current.push((*v, idx as i32 * STORY_STEP)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Split each segment of a polyline into dashes `on` units long separated
/// by `off` units, measured along the story axis.
fn dashes(run: &[(f64, i32)], on: i32, off: i32) -> Vec<Vec<(f64, i32)>> {
    let mut out = Vec::new();
    for pair in run.windows(2) {
        let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
        let span = y1 - y0;
        if span == 0 {
            out.push(vec![(x0, y0), (x1, y1)]);
            continue;
        }
        let at = |dy: i32| {
            let t = f64::from(dy) / f64::from(span.abs());
            (x0 + (x1 - x0) * t, y0 + dy * span.signum())
        };
        let mut dy = 0;
        while dy < span.abs() {
            let end = (dy + on).min(span.abs());
            out.push(vec![at(dy), at(end)]);
            dy = end + off;
        }
    }
    out
}

fn x_range(chart: &StoryChart) -> (f64, f64) {
    let values = chart
        .series
        .iter()
        .flat_map(|s| s.values.iter().flatten().copied())
        .chain(chart.limits.iter().flat_map(|l| [*l, -*l]));
    let (lo, hi) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.08).max(1e-6);
    (if lo < 0.0 { lo - pad } else { 0.0 }, hi + pad)
}

fn draw(chart: &StoryChart, root: &DrawingArea<SVGBackend<'_>, Shift>, opts: &RenderOptions) -> Result<(), PlotError> {
    root.fill(&WHITE).map_err(render_err)?;

    let n = chart.stories.len() as i32;
    let (x_lo, x_hi) = x_range(chart);
    let mut ctx = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(110)
        .build_cartesian_2d(x_lo..x_hi, (-STORY_STEP / 2)..(n * STORY_STEP - STORY_STEP / 2))
        .map_err(render_err)?;

    let stories = &chart.stories;
    let story_label = |y: &i32| -> String {
        if y.rem_euclid(STORY_STEP) != 0 {
            return String::new();
        }
        usize::try_from(y / STORY_STEP)
            .ok()
            .and_then(|i| stories.get(i))
            .cloned()
            .unwrap_or_default()
    };
    ctx.configure_mesh()
        .x_desc(chart.x_label.as_str())
        .y_labels(stories.len() + 1)
        .y_label_formatter(&story_label)
        .light_line_style(BLACK.mix(0.05))
        .bold_line_style(BLACK.mix(0.2))
        .draw()
        .map_err(render_err)?;

    let palette: &[RGBColor] = if opts.grayscale {
        &GRAY_PALETTE
    } else {
        &COLOR_PALETTE
    };

    let mut solid_idx = 0usize;
    let mut envelope_idx = 0usize;
    for series in &chart.series {
        let color = match series.style {
            LineStyle::Solid => {
                let c = palette[solid_idx % palette.len()];
                solid_idx += 1;
                c
            }
            _ => {
                let c = ENVELOPE_COLORS[(envelope_idx / 2) % ENVELOPE_COLORS.len()];
                envelope_idx += 1;
                c
            }
        };
        let style = color.stroke_width(2);

        let segments: Vec<Vec<(f64, i32)>> = runs(series)
            .into_iter()
            .flat_map(|run| match series.style {
                LineStyle::Solid => vec![run],
                LineStyle::Dashed => dashes(&run, 12, 8),
                LineStyle::Dotted => dashes(&run, 3, 6),
            })
            .collect();
        ctx.draw_series(segments.into_iter().map(|seg| PathElement::new(seg, style)))
            .map_err(render_err)?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));

        if series.markers {
            let points: Vec<(f64, i32)> = runs(series).into_iter().flatten().collect();
            let marker = MARKERS[solid_idx.saturating_sub(1) % MARKERS.len()];
            let filled = color.filled();
            let drawn = match marker {
                Marker::Circle => ctx.draw_series(points.iter().map(|p| Circle::new(*p, 4, filled))),
                Marker::Square => ctx.draw_series(
                    points
                        .iter()
                        .map(|p| EmptyElement::at(*p) + Rectangle::new([(-4, -4), (4, 4)], filled)),
                ),
                Marker::Triangle => {
                    ctx.draw_series(points.iter().map(|p| TriangleMarker::new(*p, 5, filled)))
                }
                Marker::Cross => ctx.draw_series(points.iter().map(|p| Cross::new(*p, 4, style))),
            };
            drawn.map_err(render_err)?;
        }
    }

    // reference limits at ±value
    let top = n * STORY_STEP - STORY_STEP / 2;
    let bottom = -STORY_STEP / 2;
    for (i, limit) in chart.limits.iter().enumerate() {
        let limit_style = LIMIT_COLOR.stroke_width(1);
        let lines = [*limit, -*limit]
            .into_iter()
            .map(move |x| PathElement::new(vec![(x, bottom), (x, top)], limit_style));
        let anno = ctx.draw_series(lines).map_err(render_err)?;
        if i == 0 {
            anno.label(format!("Limit {}", limit))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], limit_style));
        }
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;
    Ok(())
}

/// Render `chart` to an SVG file at `path`, creating parent folders.
pub fn render_svg(chart: &StoryChart, path: &Path, opts: &RenderOptions) -> Result<(), PlotError> {
    if chart.stories.is_empty() {
        return Err(PlotError::EmptyAfterFilter);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PlotError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let root = SVGBackend::new(path, (opts.width, opts.height)).into_drawing_area();
    draw(chart, &root, opts)?;
    root.present().map_err(render_err)?;

    info!(path = %path.display(), series = chart.series.len(), stories = chart.stories.len(), "chart written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chart() -> StoryChart {
        StoryChart {
            title: "Maximum Story Drifts".into(),
            x_label: "Drift, Unitless".into(),
            stories: vec!["Base".into(), "Story1".into(), "Story2".into()],
            series: vec![
                Series {
                    label: "EQX X".into(),
                    values: vec![None, Some(0.003), Some(0.0045)],
                    style: LineStyle::Solid,
                    markers: true,
                },
                Series {
                    label: "Mean X".into(),
                    values: vec![Some(0.0), Some(0.002), Some(0.003)],
                    style: LineStyle::Dashed,
                    markers: false,
                },
            ],
            limits: vec![0.004],
        }
    }

    #[test]
    fn runs_break_on_gaps() {
        let s = Series {
            label: "s".into(),
            values: vec![Some(1.0), None, Some(2.0), Some(3.0)],
            style: LineStyle::Solid,
            markers: false,
        };
        let r = runs(&s);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0], vec![(1.0, 0)]);
        assert_eq!(r[1], vec![(2.0, 200), (3.0, 300)]);
    }

    #[test]
    fn dashes_cover_the_segment_with_gaps() {
        let d = dashes(&[(0.0, 0), (1.0, 100)], 12, 8);
        assert_eq!(d.len(), 5);
        assert_eq!(d[0], vec![(0.0, 0), (0.12, 12)]);
        assert_eq!(d[4][1], (0.92, 92));
    }

    #[test]
    fn writes_an_svg() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plots").join("drift.svg");
        render_svg(&chart(), &path, &RenderOptions::default())?;

        let svg = fs::read_to_string(&path)?;
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Maximum Story Drifts"));
        assert!(svg.contains("Story2"));
        assert!(svg.contains("Limit 0.004"));
        Ok(())
    }

    #[test]
    fn empty_chart_is_rejected() {
        let mut c = chart();
        c.stories.clear();
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            render_svg(&c, &dir.path().join("x.svg"), &RenderOptions::default()),
            Err(PlotError::EmptyAfterFilter)
        ));
    }
}
