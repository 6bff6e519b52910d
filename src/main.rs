//! dbheatmap - render a normalized grayscale heatmap from a delimited table
//!
//! Pivots a table on two categorical columns, divides a numeric column by
//! its maximum and draws the resulting grid as a PNG.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable input, bad rows, empty table, render failure)
//!   2 - Usage error (wrong number of columns, conflicting flags)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod render;
mod table;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use error::HeatmapError;
use models::PivotFields;
use render::{HeatmapRenderer, RenderOptions};
use std::path::PathBuf;
use table::{Source, TableConfig, TableReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const EXIT_RUNTIME: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments before touching any file
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_USAGE);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_RUNTIME);
        }
        return;
    }

    init_logging(&args);

    info!("dbheatmap v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args) {
        Ok(output) => {
            if !args.quiet {
                println!("✅ Heatmap written to: {}", output.display());
            }
        }
        Err(e) => {
            error!("Heatmap failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Handle --init-config: generate a default .dbheatmap.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(EXIT_RUNTIME);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Usage problems exit with 2, everything else with 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<HeatmapError>() {
        Some(e) if e.is_usage() => EXIT_USAGE,
        _ => EXIT_RUNTIME,
    }
}

/// Read, pivot and render. Returns the path of the written image.
fn run(args: &Args) -> Result<PathBuf> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    let (x, y) = args.pivot_columns();
    let fields = PivotFields::new(x, y, config.input.value_column.as_str());
    info!(
        "Pivoting on {} x {} using value column {}",
        fields.x, fields.y, fields.value
    );

    // Build everything that can reject the configuration before reading input
    let reader = TableReader::new(TableConfig::try_from(&config.input)?);
    let renderer = HeatmapRenderer::new(config.render.clone())?;

    let source = Source::from_arg(args.input_file.as_ref());
    let rows = reader
        .read_source(&source)
        .with_context(|| format!("Failed to read table from {}", source.describe()))?;

    let pivot = analysis::pivot(&rows, &fields)?;
    drop(rows);

    let matrix = pivot.normalized_matrix();
    let (n_rows, n_cols) = matrix.dims();
    info!(
        "Matrix is {} x {} (max {})",
        n_rows,
        n_cols,
        pivot.max_value()
    );

    let options = RenderOptions {
        invert: args.invert,
        annotation: args.annotation(),
        add_labels: args.add_labels,
        x_title: fields.x.clone(),
        y_title: fields.y.clone(),
    };

    let layout = renderer
        .render_to_file(&pivot, &matrix, &options, &args.output_file)
        .with_context(|| format!("Failed to write heatmap to {}", args.output_file.display()))?;
    info!(
        "Wrote {}x{} image to {}",
        layout.width,
        layout.height,
        args.output_file.display()
    );

    if let Some(ref matrix_out) = args.matrix_out {
        let export = render::build_export(&pivot, &fields);
        render::write_json_export(&export, matrix_out)
            .with_context(|| format!("Failed to write matrix to {}", matrix_out.display()))?;
        info!("Wrote matrix export to {}", matrix_out.display());
    }

    Ok(args.output_file.clone())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
