//! Client side of the host's scripting pipes.
//!
//! The host exposes two half-duplex pipes: one it reads commands from and one it
//! writes replies to. A `Connection` owns the write handle plus a reader thread
//! that frames replies (lines until a blank line) and hands each finished reply
//! to the caller through a single-slot channel.
//!
//! Architecture:
//! - Caller thread: arms the reply slot, writes one command, blocks on the reply
//! - Reader thread: owns the read handle, never writes, reports end-of-stream

mod channel;
mod endpoints;
mod error;
mod framer;
mod reader;
mod reply;

#[cfg(test)]
mod tests;

pub use channel::{ConnectOptions, Connection, DEFAULT_REPLY_POLL_INTERVAL};
pub use endpoints::PipeEndpoints;
pub use error::{PipeError, ProtocolError};
pub use framer::ReplyFramer;
pub use reply::ReplySlot;

pub(crate) use reply::ReaderEvent;
