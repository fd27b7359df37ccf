//! Error types for the EA15 protocol layer.
//!
//! Only [`Ea15Error`] is fatal. Framing and decode faults are reported through
//! the log and the stream keeps flowing.

use thiserror::Error;

/// Faults detected while segmenting the byte stream into frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// A byte arrived outside any frame and was discarded.
    #[error("stray byte 0x{0:02X} outside a frame")]
    StrayByte(u8),

    /// The frame grew past the buffer limit without an end-of-text marker.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Length reached when the frame was dropped.
        actual: usize,
    },
}

/// Faults detected while decoding a single live-reading frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Missing 0x02 lead byte or 0x03 trailing byte.
    #[error("frame is not delimited by 0x02/0x03")]
    BadDelimiters,

    /// Frame length does not match the packet kind.
    #[error("bad frame length: expected {expected} bytes, got {actual}")]
    BadLength {
        /// Expected length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Temperature unit code not in the lookup table.
    #[error("unknown temperature unit code: 0x{0:02X}")]
    UnknownUnit(u8),

    /// Thermocouple type code not in the lookup table.
    #[error("unknown sensor type code: 0x{0:02X}")]
    UnknownSensor(u8),
}

/// Errors that end the reader. Everything here belongs to the transport.
#[derive(Error, Debug)]
pub enum Ea15Error {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
}
