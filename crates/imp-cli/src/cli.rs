//! Command-line argument definitions for `impctl`.

use clap::Parser;
use imp_wire::MessageType;

/// Sends one addressed message to an instrument agent and prints the replies.
#[derive(Parser, Debug)]
#[command(name = "impctl", version)]
pub(crate) struct Cli {
    /// Node name the message is sent from.
    #[arg(long, default_value = imp_config::DEFAULT_STATUS_NODE)]
    pub(crate) from: String,
    /// Message type: REQ, EXEC, STATUS, DONE, ERROR, WARNING or FATAL.
    #[arg(long = "type", default_value = "REQ", value_parser = parse_kind)]
    pub(crate) kind: MessageType,
    /// How long to wait for the connection and for each reply.
    #[arg(long, default_value_t = 5_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout_ms: u64,
    /// Agent address as `host[:port]`; the port may be a service name.
    #[arg(value_name = "AGENT")]
    pub(crate) agent: String,
    /// Node name the message is addressed to.
    #[arg(value_name = "DEST")]
    pub(crate) destination: String,
    /// Message body; separate words are joined with single spaces.
    #[arg(
        value_name = "BODY",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) body: Vec<String>,
}

fn parse_kind(raw: &str) -> Result<MessageType, String> {
    raw.parse::<MessageType>()
        .map_err(|_| format!("unknown message type '{raw}'"))
}
