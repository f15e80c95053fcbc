//! Message model: node names, message types and validated messages.

use std::fmt;
use std::str::FromStr;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Maximum number of characters permitted in a node name.
pub const MAX_NODE_NAME_LEN: usize = 8;

/// Message type carried in the optional type token.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum MessageType {
    /// Command request; the implicit default when no type token is present.
    #[default]
    Req,
    /// Command request that asks for execution without further negotiation.
    Exec,
    /// Unsolicited status report, usually `key=value` pairs.
    Status,
    /// Successful completion of a command, usually `key=value` pairs.
    Done,
    /// Command or device failure described in prose.
    Error,
    /// Recoverable anomaly described in prose.
    Warning,
    /// Unrecoverable failure described in prose.
    Fatal,
}

impl MessageType {
    /// Returns `true` for types that ask the receiver to run a command.
    #[must_use]
    pub const fn is_command(self) -> bool {
        matches!(self, Self::Req | Self::Exec)
    }

    /// Returns `true` for types that report an outcome or an observation.
    #[must_use]
    pub const fn is_report(self) -> bool {
        !self.is_command()
    }

    /// Returns `true` for types that end a command/reply exchange.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Fatal)
    }
}

/// Errors raised while constructing a [`Message`] or a [`NodeName`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The node name was empty.
    #[error("node name must not be empty")]
    EmptyNodeName,
    /// The node name was longer than [`MAX_NODE_NAME_LEN`] characters.
    #[error("node name '{name}' exceeds {max} characters")]
    NodeNameTooLong {
        /// Offending name.
        name: String,
        /// Permitted maximum.
        max: usize,
    },
    /// The node name contained whitespace, a control character or `>`.
    #[error("node name '{name}' contains forbidden character {character:?}")]
    ForbiddenCharacter {
        /// Offending name.
        name: String,
        /// First forbidden character found.
        character: char,
    },
    /// The body was empty once surrounding whitespace was removed.
    #[error("message body must not be empty")]
    EmptyBody,
    /// The body contained a carriage return or line feed.
    #[error("message body must not contain line breaks")]
    LineBreakInBody,
}

/// Validated node name used as a source or destination address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeName(String);

impl NodeName {
    /// Validates and wraps a node name.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] when the name is empty, longer than
    /// [`MAX_NODE_NAME_LEN`] characters, or contains whitespace, control
    /// characters or the `>` separator.
    pub fn new(name: impl Into<String>) -> Result<Self, MessageError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MessageError::EmptyNodeName);
        }
        if let Some(character) = name
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || *c == '>')
        {
            return Err(MessageError::ForbiddenCharacter { name, character });
        }
        if name.chars().count() > MAX_NODE_NAME_LEN {
            return Err(MessageError::NodeNameTooLong {
                name,
                max: MAX_NODE_NAME_LEN,
            });
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares two node names without regard to ASCII case.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for NodeName {
    type Err = MessageError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::new(input)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A validated, immutable protocol message.
///
/// Construction trims surrounding whitespace from the body and rejects bodies
/// that are empty or contain line breaks, so every `Message` can be encoded
/// onto the wire and decoded back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    source: NodeName,
    destination: NodeName,
    kind: MessageType,
    body: String,
}

impl Message {
    /// Builds a message from validated addresses.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::EmptyBody`] or [`MessageError::LineBreakInBody`]
    /// when the body cannot be carried on a single line.
    pub fn new(
        source: NodeName,
        destination: NodeName,
        kind: MessageType,
        body: impl AsRef<str>,
    ) -> Result<Self, MessageError> {
        let body = body.as_ref().trim();
        if body.is_empty() {
            return Err(MessageError::EmptyBody);
        }
        if body.contains(['\r', '\n']) {
            return Err(MessageError::LineBreakInBody);
        }
        Ok(Self {
            source,
            destination,
            kind,
            body: body.to_owned(),
        })
    }

    /// Builds a `REQ` message from raw node names.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] when either name or the body is invalid.
    pub fn request(source: &str, destination: &str, body: &str) -> Result<Self, MessageError> {
        Self::new(
            NodeName::new(source)?,
            NodeName::new(destination)?,
            MessageType::Req,
            body,
        )
    }

    /// Builds a reply travelling back to this message's sender.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] when the reply body is invalid.
    pub fn reply(&self, kind: MessageType, body: impl AsRef<str>) -> Result<Self, MessageError> {
        Self::new(self.destination.clone(), self.source.clone(), kind, body)
    }

    /// Node that sent the message.
    #[must_use]
    pub fn source(&self) -> &NodeName {
        &self.source
    }

    /// Node the message is addressed to.
    #[must_use]
    pub fn destination(&self) -> &NodeName {
        &self.destination
    }

    /// Message type.
    #[must_use]
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Message body without the address header or type token.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}
