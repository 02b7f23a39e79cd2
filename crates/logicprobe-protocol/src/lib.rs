//! Line-oriented host command channel.
//!
//! Commands arrive as single bytes; `+` and `*` act immediately, every
//! other command accumulates until a newline and is then decoded and
//! dispatched to the acquisition controller. Responses are staged on
//! the session and delivered by the transmit side ahead of sample data.

pub mod command;
pub mod handler;

pub use command::Command;
pub use handler::ProtocolHandler;
