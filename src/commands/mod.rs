//! Command handlers, one file per command.
//!
//! Handlers take the parsed [`Command`](crate::command::Command) and the
//! shared server state and return an [`Outcome`] for the dispatcher to
//! write, which keeps them testable without a socket. Command-level failures
//! surface as a [`CommandError`] and become a `-ERR` reply; the connection
//! stays open.

pub mod config_get;
pub mod echo;
pub mod get;
pub mod info;
pub mod keys;
pub mod ping;
pub mod psync;
pub mod replconf;
pub mod set;
pub mod stream_utils;
pub mod type_command;
pub mod wait;
pub mod xadd;
pub mod xrange;
pub mod xread;

use bytes::Bytes;
use thiserror::Error;

use crate::resp;
use crate::stream::StreamError;

/// A command-level failure, written to the client as `-ERR <message>`.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    /// Wrong arity or a malformed argument.
    #[error("Invalid Command")]
    InvalidCommand,
    /// A stream ID violation; the message carries the exact Redis wording.
    #[error("{0}")]
    Stream(#[from] StreamError),
}

impl CommandError {
    /// The encoded error frame for this failure.
    pub fn to_frame(&self) -> Bytes {
        resp::error(&self.to_string())
    }
}

/// What the dispatcher should do after a handler ran.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Write nothing. Unknown commands are ignored silently.
    Silent,
    /// Write this pre-encoded frame (possibly several concatenated frames).
    Reply(Bytes),
    /// Write the FULLRESYNC status and the RDB payload, then promote the
    /// connection to a replica link.
    FullResync {
        header: Bytes,
        rdb: &'static [u8],
    },
}

// Decodes an argument that must be textual (keys, IDs, option values).
pub(crate) fn utf8_arg(arg: &[u8]) -> Result<String, CommandError> {
    String::from_utf8(arg.to_vec()).map_err(|_| CommandError::InvalidCommand)
}
