/// Byte-level framing for the EA15 serial stream
///
/// Frames open with 0x02 and close with the next 0x03. Bytes outside a
/// frame are discarded. A 0x02 seen inside a frame is payload, not a restart.
use crate::error::FrameError;
use crate::protocol::decoder::{ETX, STX};

/// Largest frame the assembler will buffer before giving up on it.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Waiting for a start-of-text byte.
    Idle,
    /// Between a start-of-text and the matching end-of-text.
    InFrame,
}

/// Reassembles frames from bytes fed one at a time.
#[derive(Debug)]
pub struct FrameAssembler {
    state: FramerState,
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        FrameAssembler {
            state: FramerState::Idle,
            buffer: Vec::with_capacity(64),
            max_len,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one byte.
    ///
    /// Returns `Ok(Some(frame))` when the byte closes a frame, `Ok(None)` when
    /// more bytes are needed, and `Err` when the byte was discarded or the
    /// partial frame had to be dropped. The assembler is always usable after
    /// an error.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Vec<u8>>, FrameError> {
        match self.state {
            FramerState::Idle => {
                if byte != STX {
                    return Err(FrameError::StrayByte(byte));
                }
                self.buffer.clear();
                self.buffer.push(byte);
                self.state = FramerState::InFrame;
                Ok(None)
            }
            FramerState::InFrame => {
                if self.buffer.len() >= self.max_len {
                    let actual = self.buffer.len() + 1;
                    self.reset();
                    return Err(FrameError::TooLong {
                        max: self.max_len,
                        actual,
                    });
                }
                self.buffer.push(byte);
                if byte == ETX {
                    self.state = FramerState::Idle;
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
                Ok(None)
            }
        }
    }

    /// Drop any partial frame and return to `Idle`.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = FramerState::Idle;
    }
}
