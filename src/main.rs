// src/main.rs
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use etabs_tables::{
    catalog::{group_by_category, list_table_names, resolve_catalog},
    config::Settings,
    extract::{extract_tables, ExtractRequest},
    plot::{
        self, find_table, joint_drifts, max_story_drift, render_svg, story_columns, RenderOptions,
        SeriesFilter,
    },
    selection::{combo_names, load_case_names},
    SnapshotModel, Table,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "etabs-tables", version, about = "Read, export and chart analysis tables of a structural model")]
struct Cli {
    /// Captured model to run against (JSON).
    #[arg(long, env = "ETABS_SNAPSHOT", global = true)]
    snapshot: Option<PathBuf>,

    /// YAML settings file.
    #[arg(long, env = "ETABS_TABLES_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables the model exposes.
    List {
        /// Keep names containing this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
        /// Group names by category.
        #[arg(long)]
        grouped: bool,
        /// Show every listing attempt.
        #[arg(long)]
        diagnose: bool,
    },
    /// List load cases and combinations.
    Cases,
    /// Read tables and optionally export them.
    Extract {
        #[arg(long, num_args = 1..)]
        tables: Vec<String>,
        /// Export folder; tables are only previewed when absent.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, num_args = 1..)]
        formats: Vec<String>,
        #[arg(long, num_args = 1..)]
        cases: Vec<String>,
        #[arg(long, num_args = 1..)]
        combos: Vec<String>,
        /// Rows per console preview.
        #[arg(long)]
        max_rows: Option<usize>,
        #[arg(long)]
        debug_log: bool,
    },
    /// Chart a table per story as SVG.
    Plot(PlotArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PlotKind {
    /// Maximum drift per story.
    Drift,
    /// Chosen value columns per story.
    Columns,
    /// Joint drifts with mean and P84 envelopes.
    Joints,
}

impl PlotKind {
    fn default_table(self) -> &'static str {
        match self {
            PlotKind::Drift => plot::DEFAULT_TABLE,
            PlotKind::Columns => "Story Forces",
            PlotKind::Joints => "Joint Drifts",
        }
    }
}

#[derive(clap::Args, Debug)]
struct PlotArgs {
    #[arg(value_enum)]
    kind: PlotKind,
    /// Table file written by `extract` (.csv or .txt); read from the model otherwise.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Table to read from the model.
    #[arg(long)]
    table: Option<String>,
    /// SVG to write.
    #[arg(long)]
    out: PathBuf,
    #[arg(long, num_args = 1..)]
    cases: Vec<String>,
    #[arg(long, num_args = 1..)]
    directions: Vec<String>,
    /// Direction kept when a case carries several.
    #[arg(long)]
    prefer: Option<String>,
    /// Stories listed bottom to top ahead of the automatic order.
    #[arg(long, num_args = 1..)]
    story_order: Vec<String>,
    /// Drift limits drawn as ± reference lines.
    #[arg(long, num_args = 1..)]
    limits: Vec<f64>,
    /// Value columns to chart (columns and joints charts).
    #[arg(long, num_args = 1..)]
    candidates: Vec<String>,
    /// Joints to keep (joints chart).
    #[arg(long, num_args = 1..)]
    joints: Vec<String>,
    #[arg(long)]
    grayscale: bool,
}

fn main() -> ExitCode {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) run, reporting the whole cause chain ─────────────────────
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load_or_default(cli.config.as_deref())?;
    let snapshot = cli.snapshot.as_deref();

    match cli.command {
        Command::List {
            filter,
            grouped,
            diagnose,
        } => {
            let mut model = open_model(snapshot)?;
            let policy = settings.catalog.policy();
            if diagnose {
                let outcome = resolve_catalog(&mut model, &policy);
                let steps = match &outcome {
                    Ok(catalog) => catalog.steps.as_slice(),
                    Err(e) => e.steps(),
                };
                for step in steps {
                    println!(
                        "{:<20} {:<5} {}",
                        step.method,
                        if step.success { "ok" } else { "fail" },
                        step.detail
                    );
                }
                outcome.context("Listing tables")?;
                return Ok(());
            }

            let names = list_table_names(&mut model, filter.as_deref(), &policy)
                .context("Listing tables")?;
            if grouped {
                for (category, members) in group_by_category(&names) {
                    println!("{} ({})", category, members.len());
                    for name in members {
                        println!("  {}", name);
                    }
                }
            } else {
                names.iter().for_each(|n| println!("{}", n));
            }
            info!(tables = names.len(), "listed");
        }

        Command::Cases => {
            let mut model = open_model(snapshot)?;
            let cases = load_case_names(&mut model).context("Reading load cases")?;
            let combos = combo_names(&mut model).context("Reading combinations")?;
            println!("Load cases ({}):", cases.names.len());
            cases.names.iter().for_each(|n| println!("  {}", n));
            println!("Combinations ({}):", combos.names.len());
            combos.names.iter().for_each(|n| println!("  {}", n));
        }

        Command::Extract {
            tables,
            out,
            formats,
            cases,
            combos,
            max_rows,
            debug_log,
        } => {
            let mut model = open_model(snapshot)?;
            let request = ExtractRequest {
                tables: Some(if tables.is_empty() {
                    settings.tables.clone()
                } else {
                    tables
                }),
                destination: out.or_else(|| settings.output_dir.clone()),
                formats: if formats.is_empty() {
                    settings.formats.iter().map(|f| f.to_string()).collect()
                } else {
                    formats
                },
                cases,
                combos,
                debug_log: debug_log || settings.debug_log,
                retry: settings.catalog.policy(),
            };
            let results = extract_tables(&mut model, &request).context("Extracting tables")?;

            let rows = max_rows.unwrap_or(settings.preview_rows);
            for (label, table) in &results {
                println!("== {} ({} rows, {} columns)", label, table.len(), table.columns.len());
                println!("{}", table.preview(rows));
            }
            if let Some(dir) = &request.destination {
                println!("Exported {} table(s) to {}", results.len(), dir.display());
            }
        }

        Command::Plot(args) => plot_command(args, snapshot, &settings)?,
    }
    Ok(())
}

fn open_model(snapshot: Option<&Path>) -> Result<SnapshotModel> {
    let Some(path) = snapshot else {
        bail!("no model to read from; pass --snapshot <file> or set ETABS_SNAPSHOT");
    };
    SnapshotModel::open(path).with_context(|| format!("Failed to open snapshot {:?}", path))
}

fn plot_command(args: PlotArgs, snapshot: Option<&Path>, settings: &Settings) -> Result<()> {
    // 1) the table, from a file or from the model
    let name = args
        .table
        .clone()
        .unwrap_or_else(|| args.kind.default_table().to_string());
    let tables: BTreeMap<String, Table> = match &args.input {
        Some(path) => {
            let table = etabs_tables::export::read_table_file(path)
                .with_context(|| format!("Failed to read table file {:?}", path))?;
            BTreeMap::from([(name.clone(), table)])
        }
        None => {
            let mut model = open_model(snapshot)?;
            let request = ExtractRequest {
                tables: Some(vec![name.clone()]),
                cases: args.cases.clone(),
                debug_log: settings.debug_log,
                retry: settings.catalog.policy(),
                ..ExtractRequest::default()
            };
            extract_tables(&mut model, &request).context("Extracting table to chart")?
        }
    };
    let table = find_table(&tables, Some(name.as_str()))?;

    // 2) series
    let filter = SeriesFilter {
        cases: args.cases,
        directions: args.directions,
        prefer_direction: args.prefer,
        story_order: args.story_order,
    };
    let chart = match args.kind {
        PlotKind::Drift => max_story_drift(table, &filter, &args.limits)?,
        PlotKind::Columns => story_columns(table, &name, &args.candidates, &filter)?,
        PlotKind::Joints => joint_drifts(table, &args.joints, &args.candidates, &filter)?,
    };

    // 3) render
    let opts = RenderOptions {
        width: settings.plot.width,
        height: settings.plot.height,
        grayscale: args.grayscale || settings.plot.grayscale,
    };
    render_svg(&chart, &args.out, &opts)
        .with_context(|| format!("Failed to render chart to {:?}", args.out))?;
    println!("Chart written to {}", args.out.display());
    Ok(())
}
