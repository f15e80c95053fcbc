//! Line encoding and decoding.
//!
//! Decoding validates the address header first and only then looks for a
//! type token. Type-token detection is non-destructive: when the first word
//! of the remainder is not a recognised `TYPE:` token the message defaults
//! to `REQ` and the entire remainder becomes the body.

use thiserror::Error;

use crate::message::{Message, MessageError, MessageType, NodeName};

/// Terminator appended to every encoded message.
const TERMINATOR: char = '\r';
/// Separator between the source and destination node names.
const ADDRESS_SEPARATOR: char = '>';
/// Suffix that marks an explicit type token.
const TYPE_SUFFIX: char = ':';

/// Errors surfaced while decoding a received line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The line is not a syntactically valid message and must be discarded.
    #[error("malformed message: {message}")]
    MalformedMessage {
        /// Human-readable description of the defect.
        message: String,
        /// Validation failure that triggered the rejection, if any.
        #[source]
        source: Option<MessageError>,
    },
}

impl DecodeError {
    /// Creates a malformed-message error with a custom description.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a malformed-message error caused by a validation failure.
    #[must_use]
    pub fn from_validation(source: MessageError) -> Self {
        Self::MalformedMessage {
            message: source.to_string(),
            source: Some(source),
        }
    }
}

impl From<MessageError> for DecodeError {
    fn from(source: MessageError) -> Self {
        Self::from_validation(source)
    }
}

/// Decodes one received line into a [`Message`].
///
/// A trailing CR, LF or CRLF is stripped when present; its absence is not an
/// error.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedMessage`] when the address header does not
/// contain exactly one `>`, when either node name is empty or invalid, or when
/// no body follows the header (or the type token).
pub fn decode(raw: &str) -> Result<Message, DecodeError> {
    let line = raw.trim_end_matches(['\r', '\n']).trim_start();
    let (header, remainder) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));

    let (source, destination) = split_address(header)?;

    let remainder = remainder.trim();
    if remainder.is_empty() {
        return Err(DecodeError::malformed("message has no body"));
    }

    let (kind, body) = split_type_token(remainder).unwrap_or((MessageType::Req, remainder));
    Ok(Message::new(source, destination, kind, body)?)
}

/// Decodes raw bytes as read from a connection.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedMessage`] when the bytes are not UTF-8 or
/// when [`decode`] rejects the resulting text.
pub fn decode_bytes(raw: &[u8]) -> Result<Message, DecodeError> {
    let text = std::str::from_utf8(raw)
        .map_err(|error| DecodeError::malformed(format!("message is not valid UTF-8: {error}")))?;
    decode(text)
}

/// Encodes a [`Message`] as a single CR-terminated line.
///
/// `REQ` messages omit the type token by convention. The token is written
/// explicitly only when the body itself starts with something a decoder
/// would read as a type token.
#[must_use]
pub fn encode(message: &Message) -> String {
    let source = message.source().as_str();
    let destination = message.destination().as_str();
    let body = message.body();
    match message.kind() {
        MessageType::Req if split_type_token(body).is_none() => {
            format!("{source}{ADDRESS_SEPARATOR}{destination} {body}{TERMINATOR}")
        }
        kind => format!(
            "{source}{ADDRESS_SEPARATOR}{destination} {kind}{TYPE_SUFFIX} {body}{TERMINATOR}"
        ),
    }
}

fn split_address(header: &str) -> Result<(NodeName, NodeName), DecodeError> {
    let Some((source, destination)) = header.split_once(ADDRESS_SEPARATOR) else {
        return Err(DecodeError::malformed(format!(
            "address header '{header}' has no '{ADDRESS_SEPARATOR}' separator"
        )));
    };
    if destination.contains(ADDRESS_SEPARATOR) {
        return Err(DecodeError::malformed(format!(
            "address header '{header}' has more than one '{ADDRESS_SEPARATOR}' separator"
        )));
    }
    if source.is_empty() {
        return Err(DecodeError::malformed("source node name is empty"));
    }
    if destination.is_empty() {
        return Err(DecodeError::malformed("destination node name is empty"));
    }
    Ok((NodeName::new(source)?, NodeName::new(destination)?))
}

/// Splits a leading `TYPE:` token from `text`.
///
/// Returns `None` when the first word is not a recognised type token, in which
/// case the caller keeps the whole text as the body.
fn split_type_token(text: &str) -> Option<(MessageType, &str)> {
    let (token, rest) = text.split_once(TYPE_SUFFIX)?;
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    let kind = token.parse::<MessageType>().ok()?;
    Some((kind, rest.trim_start()))
}

#[cfg(test)]
mod tests;
