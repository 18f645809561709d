//! Command-line arguments for the c99cc driver.
//!
//! Uses `clap` with its "derive" feature. The single-dash `-isystem` flag
//! predates getopt conventions, so the raw argv is normalized to the
//! double-dash spelling before clap sees it. Parsing never exits the
//! process itself: usage mistakes come back as errors so the driver keeps
//! control of the exit code.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "c99cc",
    version,
    about = "A front-end compiler for a restricted C99 dialect."
)]
pub struct Cli {
    /// Input source files.
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Output path.
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Stop after emitting one IR file per input.
    #[arg(short = 'c')]
    pub compile_only: bool,

    /// User include search directory (`-I <dir>` or `-I<dir>`).
    #[arg(short = 'I', value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// System include search directory.
    #[arg(long = "isystem", value_name = "DIR")]
    pub system_include_dirs: Vec<PathBuf>,
}

/// Parse the process arguments, accepting `-isystem` as spelled by C
/// compiler drivers. Malformed invocations return the clap error instead
/// of exiting, so the driver can report it and exit with code one.
pub fn parse() -> Result<Cli, clap::Error> {
    try_parse_from(std::env::args_os())
}

fn try_parse_from(args: impl IntoIterator<Item = OsString>) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(normalize(args))
}

fn normalize(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|a| {
            if a == "-isystem" {
                OsString::from("--isystem")
            } else {
                a
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(args: &[&str]) -> Result<Cli, clap::Error> {
        try_parse_from(args.iter().map(OsString::from))
    }

    #[test]
    fn inputs_flags_and_attached_include_dir() {
        let cli = parse_from(&["c99cc", "a.c", "b.c", "-c", "-I", "one", "-Itwo"]).unwrap();
        assert_eq!(cli.inputs.len(), 2);
        assert!(cli.compile_only);
        assert_eq!(
            cli.include_dirs,
            vec![PathBuf::from("one"), PathBuf::from("two")]
        );
    }

    #[test]
    fn isystem_single_dash_spelling() {
        let cli = parse_from(&["c99cc", "a.c", "-isystem", "sys"]).unwrap();
        assert_eq!(cli.system_include_dirs, vec![PathBuf::from("sys")]);
    }

    #[test]
    fn output_path() {
        let cli = parse_from(&["c99cc", "a.c", "-o", "out.ir"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.ir")));
    }

    #[test]
    fn missing_inputs_is_an_error_not_an_exit() {
        assert!(parse_from(&["c99cc"]).is_err());
    }

    #[test]
    fn missing_value_after_include_flag_is_an_error() {
        assert!(parse_from(&["c99cc", "a.c", "-I"]).is_err());
        assert!(parse_from(&["c99cc", "a.c", "-isystem"]).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_from(&["c99cc", "a.c", "--bogus"]).is_err());
    }
}
