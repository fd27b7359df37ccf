//! Decoder for the Extech EA15 thermocouple datalogger serial protocol.
//!
//! The meter streams 9-byte live readings framed by 0x02/0x03. On request it
//! also dumps its stored logging sessions through a short handshake: the host
//! answers "A", the meter announces a length, the host answers "U", and the
//! meter sends one bulk frame holding every session.
//!
//! - [`protocol::decoder`] turns frames into [`models::Reading`]s and
//!   [`models::DatalogSession`]s.
//! - [`protocol::SessionController`] frames the byte stream and drives the
//!   handshake over any [`serial::Transport`].
//! - [`reader::spawn_reader`] runs a controller on its own task and fans the
//!   results out over channels.

pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod reader;
pub mod serial;
pub mod utils;
