//! arbor CLI - build primitive parts and export them.
//!
//! Exit codes: 0 success, 1 invalid input, 2 export backend unavailable,
//! 3 internal failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use arbor::{CadError, Document, Part, PrimitiveError, StepError};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Parametric CAD core: primitives, booleans, export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a box (output format determined by extension: .stl, .step, .json)
    Box {
        /// Extent along X
        width: f64,
        /// Extent along Y
        height: f64,
        /// Extent along Z
        depth: f64,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Export a cylinder along +Z
    Cylinder {
        /// Radius
        radius: f64,
        /// Extent along Z
        height: f64,
        /// Circular resolution
        #[arg(short, long, default_value_t = 32)]
        segments: u32,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Export a box with a cylindrical hole drilled through it along Z
    Drilled {
        /// Extent along X
        width: f64,
        /// Extent along Y
        height: f64,
        /// Extent along Z
        depth: f64,
        /// Hole radius
        radius: f64,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap prints its own help/usage text
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

/// Map the error taxonomy onto process exit codes.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<CadError>() {
        Some(CadError::Primitive(PrimitiveError::InvalidDimension { .. }))
        | Some(CadError::Primitive(PrimitiveError::UnsupportedPrimitive(_)))
        | Some(CadError::InvalidMesh(_))
        | Some(CadError::UnsupportedFormat(_)) => ExitCode::from(1),
        Some(CadError::Step(StepError::BackendUnavailable)) => ExitCode::from(2),
        Some(_) => ExitCode::from(3),
        None => ExitCode::from(3),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Box {
            width,
            height,
            depth,
            output,
        } => {
            let part = Part::cube("box", width, height, depth)?;
            export_part(part, &output)
        }
        Commands::Cylinder {
            radius,
            height,
            segments,
            output,
        } => {
            let part = Part::cylinder_with_segments("cylinder", radius, height, segments)?;
            export_part(part, &output)
        }
        Commands::Drilled {
            width,
            height,
            depth,
            radius,
            output,
        } => {
            let block = Part::cube("block", width, height, depth)?;
            let drill = Part::cylinder("drill", radius, depth * 2.0)?;
            let part = block.difference(&drill)?;
            export_part(part, &output)
        }
    }
}

fn export_part(part: Part, output: &PathBuf) -> Result<()> {
    let format = match output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("stl") => "STL",
        Some("step") | Some("stp") => "STEP",
        Some("json") => "JSON",
        other => bail!(CadError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string()
        )),
    };

    let mut doc = Document::new("arbor");
    doc.add_part(part);
    let bytes = doc.export(format)?;
    std::fs::write(output, bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("wrote {} ({format})", output.display());
    Ok(())
}
