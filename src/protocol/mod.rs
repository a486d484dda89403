//! RESP2 protocol implementation
//!
//! Incoming bytes are cut into command frames by the resumable `Framer`;
//! replies are modelled as `RespValue` and serialised by `RespEncoder`.
//! Nothing in here knows about commands or storage.

mod framer;
mod resp;
mod types;

pub use framer::Framer;
pub use resp::RespEncoder;
pub use types::{format_double, RespValue};
