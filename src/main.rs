use std::process::ExitCode;

fn main() -> ExitCode {
    c99cc::cli::run()
}
