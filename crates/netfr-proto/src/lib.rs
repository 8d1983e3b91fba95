//! Wire Protocol Codec (spec component D).
//!
//! Grounded on the teacher's `net::frame`/`net::channel` header
//! read/write pattern (fixed packed header read with `byteorder`, payload
//! validated against a declared size before being trusted) but the message
//! catalogue itself follows spec §4.4's table rather than the teacher's
//! `Category`/`ControlFrame` enum, since the teacher's categories (Payload/
//! Keepalive/ConnectionAccepted/ConnectionClosed) solve a different
//! protocol's handshake.

pub mod header;
pub mod hello;
pub mod message;

pub use header::{Header, MessageType};
pub use hello::HelloStatus;
pub use message::{BufferState, BufferUpdate, DataHeader, Message};
