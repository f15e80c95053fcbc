//! Fake agent used by the CLI test suites.
//!
//! The fake accepts one connection, records the line it receives, writes
//! canned replies and then either closes the connection or holds it open
//! until the client goes away.

use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::thread;

use anyhow::{Context, Result, anyhow};

use imp_agent::LineChannel;

/// What the fake agent does after writing its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(in crate::tests) enum AfterReplies {
    Close,
    HoldOpen,
}

/// A single-connection agent that answers with canned lines.
pub(in crate::tests) struct FakeAgent {
    address: SocketAddr,
    handle: Option<thread::JoinHandle<Result<String>>>,
}

impl FakeAgent {
    /// Spawns a fake agent on an ephemeral loopback port.
    pub fn spawn(replies: Vec<String>, after: AfterReplies) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake agent")?;
        let address = listener.local_addr().context("fake agent address")?;
        let handle = thread::spawn(move || -> Result<String> {
            let (stream, _) = listener.accept().context("accept client")?;
            let mut channel = LineChannel::new(stream, 1024);
            let request = channel
                .read_line()
                .context("read request")?
                .ok_or_else(|| anyhow!("client sent nothing"))?;
            for reply in &replies {
                channel
                    .write_line(&format!("{reply}\r"))
                    .context("write reply")?;
            }
            if after == AfterReplies::HoldOpen {
                // Returns once the client closes its end.
                while channel.read_line().context("drain client")?.is_some() {}
            }
            channel.into_inner().flush().context("flush")?;
            String::from_utf8(request.into_bytes()).context("request is UTF-8")
        });
        Ok(Self {
            address,
            handle: Some(handle),
        })
    }

    /// `host:port` argument addressing this agent.
    pub fn argument(&self) -> String {
        self.address.to_string()
    }

    /// Waits for the agent thread and returns the line it received.
    pub fn take_request(&mut self) -> Result<String> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("request already taken"))?;
        handle
            .join()
            .map_err(|_| anyhow!("fake agent thread panicked"))?
    }
}
