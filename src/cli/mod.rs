//! The driver: orchestrates the front-end pipeline over the command-line
//! inputs and writes the resulting IR modules for the back-end collaborator.

pub mod args;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::debug;

use crate::errors::{print_error, CompileError, ErrorKind};
use crate::pipeline::CompilePipeline;

/// The main entry point for the driver. Exit code zero on success, one on
/// any error.
pub fn run() -> ExitCode {
    init_tracing();
    let cli = match args::parse() {
        Ok(cli) => cli,
        Err(e) => return report_usage(e),
    };

    match drive(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            print_terminated_banner();
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests print and succeed; any real usage mistake is
/// reported like every other driver error and exits with code one.
fn report_usage(e: clap::Error) -> ExitCode {
    use clap::error::ErrorKind as UsageKind;

    if matches!(e.kind(), UsageKind::DisplayHelp | UsageKind::DisplayVersion) {
        let _ = e.print();
        return ExitCode::SUCCESS;
    }

    let rendered = e.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid arguments");
    let message = first_line.strip_prefix("error: ").unwrap_or(first_line);
    print_error(
        CompileError::driver(ErrorKind::InvalidUsage {
            message: message.to_string(),
        })
        .with_help("run 'c99cc --help' for usage"),
    );
    print_terminated_banner();
    ExitCode::FAILURE
}

fn drive(cli: &args::Cli) -> Result<(), CompileError> {
    if cli.compile_only && cli.inputs.len() > 1 && cli.output.is_some() {
        return Err(CompileError::driver(ErrorKind::OutputWithMultipleInputs));
    }

    let pipeline = CompilePipeline::new(
        cli.include_dirs.clone(),
        cli.system_include_dirs.clone(),
    );

    let mut has_main = false;
    let mut linked_modules = Vec::new();

    for input in &cli.inputs {
        let path_str = input.to_string_lossy().into_owned();
        let source = std::fs::read_to_string(input).map_err(|e| {
            CompileError::driver(ErrorKind::Io {
                path: path_str.clone(),
                message: e.to_string(),
            })
        })?;

        let module = pipeline.compile(&path_str, &source)?;
        if module.function("main").is_some() {
            has_main = true;
        }

        if cli.compile_only {
            let out_path = match (&cli.output, cli.inputs.len()) {
                (Some(out), 1) => out.clone(),
                _ => input.with_extension("ir"),
            };
            write_module_text(&out_path, &module.to_string())?;
            debug!(input = %path_str, out = %out_path.display(), "emitted");
        } else {
            linked_modules.push(module);
        }
    }

    if !cli.compile_only {
        if !has_main {
            return Err(CompileError::driver(ErrorKind::NoMainFunction));
        }
        // the object back end and linker are external; this hand-off writes
        // the combined module text where they expect their input
        let out_path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from("a.out"));
        let text = linked_modules
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        write_module_text(&out_path, &text)?;
        debug!(out = %out_path.display(), modules = linked_modules.len(), "handed off");
    }

    Ok(())
}

fn write_module_text(path: &Path, text: &str) -> Result<(), CompileError> {
    std::fs::write(path, text).map_err(|e| {
        CompileError::driver(ErrorKind::Io {
            path: path.to_string_lossy().into_owned(),
            message: e.to_string(),
        })
    })
}

fn print_terminated_banner() {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = writeln!(stderr, "compilation terminated.");
    let _ = stderr.reset();
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
