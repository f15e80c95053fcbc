//! Wire codec for the inter-agent control protocol.
//!
//! Every agent in the instrument control system exchanges short, addressed,
//! typed text messages. A message occupies a single line on the wire:
//!
//! ```text
//! SourceID>DestID [TYPE:] body\r
//! ```
//!
//! The type token is optional; its absence means `REQ`. Decoding is strict
//! about the address header (exactly one `>` separating two non-empty node
//! names) and permissive about the type token: an unrecognised leading word
//! is treated as part of the body rather than as an error.
//!
//! ```
//! use imp_wire::{MessageType, decode, encode};
//!
//! let message = decode("CCD>AGW STATUS: temp=23.4\r\n").expect("valid message");
//! assert_eq!(message.kind(), MessageType::Status);
//! assert_eq!(message.body(), "temp=23.4");
//! assert_eq!(encode(&message), "CCD>AGW STATUS: temp=23.4\r");
//! ```

mod codec;
mod message;

pub use codec::{DecodeError, decode, decode_bytes, encode};
pub use message::{MAX_NODE_NAME_LEN, Message, MessageError, MessageType, NodeName};
