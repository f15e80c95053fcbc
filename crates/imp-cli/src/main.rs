//! CLI entrypoint for the instrument agent operator tool.
//!
//! The binary delegates to [`imp_cli::run`], which parses arguments, sends
//! one message to an agent and prints what comes back.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    imp_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
