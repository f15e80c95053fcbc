//! Command-line runtime for `impctl`.
//!
//! `impctl` builds one addressed message from its arguments, connects to the
//! agent, writes the encoded line and, for `REQ` messages, prints each reply
//! until the agent sends `DONE`, `ERROR` or `FATAL`. The process exits with
//! success only when the final reply is `DONE` or no reply was expected.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;

use imp_agent::{ContactRegistry, LineChannel};
use imp_wire::{Message, MessageType, NodeName, decode_bytes, encode};

mod address;
mod cli;
mod errors;

use address::AgentAddress;
use cli::Cli;
use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error)
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    match send(&cli, stdout, stderr) {
        Ok(exit_code) => exit_code,
        Err(error) => report(stderr, &error),
    }
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ = writeln!(stderr, "impctl: {error}");
    ExitCode::FAILURE
}

fn send<W: Write, E: Write>(
    cli: &Cli,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError> {
    let message = Message::new(
        NodeName::new(cli.from.as_str())?,
        NodeName::new(cli.destination.as_str())?,
        cli.kind,
        cli.body.join(" "),
    )?;
    let address = AgentAddress::parse(&cli.agent)?;
    let timeout = Duration::from_millis(cli.timeout_ms);

    let registry = ContactRegistry::shared();
    let port = registry
        .resolve_service(&address.service)
        .map_err(AppError::Contact)?;
    let connection = registry
        .connect_with_timeout(&address.host, port, timeout)
        .map_err(AppError::Contact)?;
    connection
        .set_read_timeout(Some(timeout))
        .map_err(AppError::Configure)?;

    let mut channel = LineChannel::new(connection, imp_config::DEFAULT_MAX_LINE_BYTES);
    channel
        .write_line(&encode(&message))
        .map_err(AppError::Send)?;
    if message.kind() != MessageType::Req {
        return Ok(ExitCode::SUCCESS);
    }

    loop {
        let line = channel
            .read_line()
            .map_err(|error| AppError::from_read(error, cli.timeout_ms))?
            .ok_or(AppError::MissingReply)?;
        let reply = match decode_bytes(line.bytes()) {
            Ok(reply) => reply,
            Err(error) => {
                let _ = writeln!(stderr, "impctl: ignoring reply: {error}");
                continue;
            }
        };
        writeln!(stdout, "{}", encode(&reply).trim_end_matches('\r')).map_err(AppError::Output)?;
        if reply.kind().is_terminal() {
            return Ok(exit_code_for(reply.kind()));
        }
    }
}

fn exit_code_for(kind: MessageType) -> ExitCode {
    if kind == MessageType::Done {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests;
