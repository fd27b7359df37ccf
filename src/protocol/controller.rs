/// Session controller: framing, dispatch and the datalog handshake
///
/// The controller owns the transport. Each call to [`SessionController::next_decoded`]
/// performs at most one read, feeds every byte through the frame assembler,
/// dispatches closed frames by shape and writes handshake acknowledgements
/// back to the meter as the download progresses.
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::Duration;
use time::OffsetDateTime;

use crate::error::{Ea15Error, FrameError};
use crate::models::{DatalogSession, Reading};
use crate::protocol::decoder::{
    decode_length_announcement, decode_reading, is_datalog_frame, scan_datalog, LENGTH_FRAME_LEN,
    READING_FRAME_LEN,
};
use crate::protocol::framer::FrameAssembler;
use crate::serial::Transport;

pub const ACK_REQUEST: u8 = 0x41; // "A": start the datalog exchange
pub const ACK_TRANSFER: u8 = 0x55; // "U": send the bulk payload
pub const ACK_DELAY: Duration = Duration::from_millis(10); // Meter turnaround time

/// Where the controller is in the datalog retrieval exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    /// Caller asked for the datalog; "A" goes out on the next closed frame.
    Requested,
    /// "A" sent, waiting for the length announcement.
    AwaitingLength,
    /// Length announced, waiting for the bulk frame.
    Transferring,
}

/// A fully decoded result, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Reading(Reading),
    Datalog(Vec<DatalogSession>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub frames: u64,
    pub readings: u64,
    pub datalogs: u64,
    pub malformed: u64,
    pub unrecognized: u64,
    pub truncated: u64,
    pub stray_bytes: u64,
    pub oversized: u64,
    pub acks_written: u64,
}

pub struct SessionController<T: Transport> {
    transport: T,
    assembler: FrameAssembler,
    download: DownloadState,
    expected_payload: Option<usize>,
    pending: VecDeque<Decoded>,
    ack_delay: Duration,
    stats: ControllerStats,
    read_buf: Vec<u8>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_assembler(transport, FrameAssembler::new())
    }

    pub fn with_assembler(transport: T, assembler: FrameAssembler) -> Self {
        let chunk = transport.chunk_size().max(1);
        SessionController {
            transport,
            assembler,
            download: DownloadState::Idle,
            expected_payload: None,
            pending: VecDeque::new(),
            ack_delay: ACK_DELAY,
            stats: ControllerStats::default(),
            read_buf: vec![0; chunk],
        }
    }

    /// Override the pause before each acknowledgement write.
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    pub fn download_state(&self) -> DownloadState {
        self.download
    }

    /// Byte count announced for the bulk frame currently being transferred.
    pub fn expected_payload(&self) -> Option<usize> {
        self.expected_payload
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Ask the meter for its datalog. Ignored while a download is underway.
    ///
    /// Returns whether the request took effect.
    pub fn request_datalog(&mut self) -> bool {
        if self.download != DownloadState::Idle {
            debug!("Datalog request ignored, download already {:?}", self.download);
            return false;
        }
        info!("Datalog download requested");
        self.download = DownloadState::Requested;
        true
    }

    /// Perform one unit of work.
    ///
    /// Returns the next decoded result if one is queued or completed by this
    /// read, `Ok(None)` if the read timed out or produced no complete frame.
    pub fn next_decoded(&mut self) -> Result<Option<Decoded>, Ea15Error> {
        if let Some(decoded) = self.pending.pop_front() {
            return Ok(Some(decoded));
        }

        let n = self.transport.read(&mut self.read_buf)?;
        if n == 0 {
            return Ok(None);
        }

        for i in 0..n {
            let byte = self.read_buf[i];
            self.push_byte(byte)?;
        }

        Ok(self.pending.pop_front())
    }

    fn push_byte(&mut self, byte: u8) -> Result<(), Ea15Error> {
        match self.assembler.push_byte(byte) {
            Ok(Some(frame)) => self.on_frame(frame),
            Ok(None) => Ok(()),
            Err(FrameError::StrayByte(b)) => {
                self.stats.stray_bytes += 1;
                debug!("Discarding byte 0x{:02X} outside a frame", b);
                Ok(())
            }
            Err(e @ FrameError::TooLong { .. }) => {
                self.stats.oversized += 1;
                warn!("{}", e);
                // A request not yet acknowledged survives; the meter never saw it
                if matches!(
                    self.download,
                    DownloadState::AwaitingLength | DownloadState::Transferring
                ) {
                    warn!("Abandoning datalog download in state {:?}", self.download);
                    self.finish_download();
                }
                Ok(())
            }
        }
    }

    fn on_frame(&mut self, frame: Vec<u8>) -> Result<(), Ea15Error> {
        self.stats.frames += 1;
        let before = self.download;
        self.dispatch(&frame);

        // "A" answers whatever frame closes first after a request. "U" follows
        // the state the frame left behind, so the announcement itself prompts it.
        if before == DownloadState::Requested {
            self.write_ack(ACK_REQUEST)?;
            self.download = DownloadState::AwaitingLength;
            self.expected_payload = None;
        } else if self.download == DownloadState::Transferring {
            self.write_ack(ACK_TRANSFER)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, frame: &[u8]) {
        let now = OffsetDateTime::now_utc();

        if frame.len() == READING_FRAME_LEN {
            let reading = decode_reading(frame, now);
            if !reading.valid {
                self.stats.malformed += 1;
            }
            self.stats.readings += 1;
            self.pending.push_back(Decoded::Reading(reading));
        } else if frame.len() == LENGTH_FRAME_LEN {
            self.on_length_announcement(frame);
        } else if is_datalog_frame(frame) {
            let scan = scan_datalog(frame, now);
            if scan.truncated {
                self.stats.truncated += 1;
            }
            let sessions = scan.sessions;
            let records: usize = sessions.iter().map(DatalogSession::len).sum();
            if let Some(expected) = self.expected_payload {
                debug!("Datalog frame of {} bytes, {} announced", frame.len(), expected);
            }
            info!(
                "Datalog received: {} session(s), {} record(s)",
                sessions.len(),
                records
            );
            self.stats.datalogs += 1;
            self.finish_download();
            self.pending.push_back(Decoded::Datalog(sessions));
        } else {
            self.stats.unrecognized += 1;
            warn!(
                "Unrecognized frame shape ({} bytes): {:02X?}",
                frame.len(),
                &frame[..frame.len().min(16)]
            );
        }
    }

    fn on_length_announcement(&mut self, frame: &[u8]) {
        let decoded = decode_length_announcement(frame);

        if self.download == DownloadState::Requested {
            // "A" has not gone out yet, so this cannot answer our request
            if decoded.is_none() {
                self.stats.malformed += 1;
                warn!("Malformed datalog length announcement: {:02X?}", frame);
            } else {
                warn!("Length announcement before the request was acknowledged: {:02X?}", frame);
            }
            return;
        }

        match decoded {
            Some(0) => {
                info!("Meter reports an empty datalog");
                self.finish_download();
            }
            Some(n) => {
                if self.download != DownloadState::AwaitingLength {
                    warn!("Unsolicited datalog length announcement in state {:?}", self.download);
                }
                info!("Meter announced a datalog of {} bytes", n);
                self.expected_payload = Some(n);
                self.download = DownloadState::Transferring;
            }
            None => {
                self.stats.malformed += 1;
                warn!("Malformed datalog length announcement: {:02X?}", frame);
                self.finish_download();
            }
        }
    }

    fn finish_download(&mut self) {
        self.download = DownloadState::Idle;
        self.expected_payload = None;
    }

    fn write_ack(&mut self, ack: u8) -> Result<(), Ea15Error> {
        if !self.ack_delay.is_zero() {
            std::thread::sleep(self.ack_delay);
        }
        debug!("Writing handshake byte 0x{:02X}", ack);
        self.transport.write_all(&[ack])?;
        self.transport.flush()?;
        self.stats.acks_written += 1;
        Ok(())
    }
}
