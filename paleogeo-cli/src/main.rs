//! Command-line front end for the paleogeo operation engine.
//!
//! Runs the standard raster-processing operations over a directory of
//! `.pgg` layer files, streaming feedback to stderr the way the engine
//! would stream it to a host log panel.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use paleogeo_core::{
    FeedbackMessage, FeedbackSink, ParamDef, ParamForm, ParamKind, ParamValue,
    ParameterError, ParameterSnapshot, RunResult, RunState, Severity,
};
use paleogeo_io::{read_grid, DiskWorkspace};
use paleogeo_ops::ops::standard;
use paleogeo_ops::{Controller, EngineConfig, OpsError};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PaleogeoIo(#[from] paleogeo_io::IoError),

    #[error("Operation error: {0}")]
    Ops(#[from] OpsError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("the run did not complete successfully")]
    RunFailed,
}

/// Paleogeography raster-editing toolkit.
#[derive(Parser)]
#[command(name = "paleogeo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the layer files
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Fail instead of replacing an existing output file
    #[arg(long)]
    no_overwrite: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Smooth a grid with a uniform focal mean
    Smooth {
        /// Raster layer name (without the .pgg extension)
        layer: String,

        /// Window radius in cells
        #[arg(long, default_value = "1")]
        radius: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Interpolate no-data gaps in a grid
    FillGaps {
        /// Raster layer name (without the .pgg extension)
        layer: String,

        /// Interpolation reach in cells
        #[arg(long, default_value = "10")]
        distance: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show information about a grid file
    Info {
        /// Grid file path
        input: PathBuf,
    },
}

/// Streams feedback messages and progress to stderr.
struct StderrSink;

impl FeedbackSink for StderrSink {
    fn message(&self, message: &FeedbackMessage) {
        eprintln!("[{}] {}", message.severity, message.text);
        match message.severity {
            Severity::Debug => log::debug!("{}", message.text),
            Severity::Info => log::info!("{}", message.text),
            Severity::Warning => log::warn!("{}", message.text),
            Severity::Error | Severity::Critical => log::error!("{}", message.text),
        }
    }

    fn progress(&self, percent: u8) {
        eprintln!("  {percent}%");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = EngineConfig {
        overwrite_outputs: !cli.no_overwrite,
        ..EngineConfig::default()
    };
    let workspace = DiskWorkspace::new(&cli.workspace);

    match cli.command {
        Commands::Smooth {
            layer,
            radius,
            output,
        } => {
            let snapshot = standard_snapshot(
                &layer,
                &output,
                &[(standard::params::RADIUS, f64::from(radius))],
            )?;
            let env = workspace.env(config.clone());
            run_to_completion(config, move || standard::smooth_plan(&snapshot, &env))
        }

        Commands::FillGaps {
            layer,
            distance,
            output,
        } => {
            let snapshot = standard_snapshot(
                &layer,
                &output,
                &[(standard::params::FILL_DISTANCE, f64::from(distance))],
            )?;
            let env = workspace.env(config.clone());
            run_to_completion(config, move || standard::fill_gaps_plan(&snapshot, &env))
        }

        Commands::Info { input } => {
            let grid = read_grid(&input)?;
            let transform = grid.transform();
            let (min, max) = value_range(&grid);

            println!("File: {}", input.display());
            println!("Size: {} rows x {} cols", grid.rows(), grid.cols());
            println!(
                "Origin: ({}, {}), cell size {}",
                transform.origin_x, transform.origin_y, transform.cell_size
            );
            println!("No-data cells: {}", grid.nodata_count());
            match (min, max) {
                (Some(min), Some(max)) => println!("Elevation range: {min} .. {max} m"),
                _ => println!("Elevation range: no data"),
            }
            Ok(())
        }
    }
}

/// Builds the snapshot for a standard-processing run from CLI arguments.
fn standard_snapshot(
    layer: &str,
    output: &std::path::Path,
    numbers: &[(&'static str, f64)],
) -> Result<ParameterSnapshot> {
    let mut form = ParamForm::new();
    form.register(ParamDef::mandatory(standard::params::BASE, ParamKind::Layer))?;
    form.register(ParamDef::mandatory(
        standard::params::OUTPUT,
        ParamKind::OutputPath,
    ))?;
    form.set(standard::params::BASE, ParamValue::Layer(layer.to_string()))?;
    form.set(
        standard::params::OUTPUT,
        ParamValue::OutputPath(output.to_string_lossy().into_owned()),
    )?;
    for &(name, value) in numbers {
        form.register(ParamDef::optional(name, ParamKind::Number))?;
        form.set(name, ParamValue::Number(value))?;
    }
    Ok(form.capture()?)
}

/// Runs one plan through the controller and maps the terminal state to the
/// process exit status.
fn run_to_completion(
    config: EngineConfig,
    source: impl FnMut() -> std::result::Result<paleogeo_ops::OperationPlan, OpsError>
        + Send
        + 'static,
) -> Result<()> {
    let mut controller = Controller::new(config, source);
    controller.feedback().set_sink(Arc::new(StderrSink));
    controller.start();
    match controller.join() {
        RunState::Finished(RunResult::Success(path)) => {
            println!("Wrote {}", path.display());
            Ok(())
        }
        RunState::Finished(RunResult::SuccessNoArtifact) => Ok(()),
        RunState::Finished(RunResult::Failure) | RunState::Canceled => Err(CliError::RunFailed),
        RunState::Idle | RunState::Running => Err(CliError::RunFailed),
    }
}

/// Minimum and maximum over the data cells.
fn value_range(grid: &paleogeo_core::Grid) -> (Option<f64>, Option<f64>) {
    let mut min = None;
    let mut max = None;
    for value in grid.array() {
        if value.is_nan() {
            continue;
        }
        min = Some(min.map_or(*value, |m: f64| m.min(*value)));
        max = Some(max.map_or(*value, |m: f64| m.max(*value)));
    }
    (min, max)
}
