/// Packet decoders for EA15 frames
///
/// Pure functions over a delimited frame. Nothing here performs I/O and
/// nothing here fails: malformed input yields an invalid reading or an empty
/// session list, with the cause written to the log.
use log::{debug, warn};
use time::{Duration, OffsetDateTime};

use crate::error::DecodeError;
use crate::models::{DatalogSession, Reading, SensorType, Temperature, TemperatureUnit};

// EA15 wire constants
pub const STX: u8 = 0x02; // Start of text, opens every frame
pub const ETX: u8 = 0x03; // End of text, closes every frame
pub const READING_FRAME_LEN: usize = 9;
pub const LENGTH_FRAME_LEN: usize = 5;
pub const SUB_RECORD_LEN: usize = 7; // Reading frame without its delimiters
pub const SESSION_MARKER: [u8; 4] = [0x00, 0x55, 0xAA, 0x00];
pub const LENGTH_BIAS: usize = 0x8c80; // Subtracted from the announced length

// Device packs values as hi * 0xff + lo, not hi * 256 + lo.
const HI_BYTE_WEIGHT: u32 = 0xff;

/// Decode a live-reading frame, returning the specific fault on failure.
///
/// Layout: `02 <t1_unit> <t1_hi> <t1_lo> <t2_unit> <t2_hi> <t2_lo> <type> 03`.
/// Temperatures are tenths of a degree in the unit named by the unit byte.
pub fn try_decode_reading(frame: &[u8], timestamp: OffsetDateTime) -> Result<Reading, DecodeError> {
    if frame.first() != Some(&STX) || frame.last() != Some(&ETX) {
        return Err(DecodeError::BadDelimiters);
    }
    if frame.len() != READING_FRAME_LEN {
        return Err(DecodeError::BadLength {
            expected: READING_FRAME_LEN,
            actual: frame.len(),
        });
    }

    let t1 = decode_channel(frame[1], frame[2], frame[3])?;
    let t2 = decode_channel(frame[4], frame[5], frame[6])?;
    let sensor_type =
        SensorType::from_code(frame[7]).ok_or(DecodeError::UnknownSensor(frame[7]))?;

    Ok(Reading {
        timestamp,
        t1,
        t2,
        sensor_type: Some(sensor_type),
        valid: true,
    })
}

fn decode_channel(unit_code: u8, hi: u8, lo: u8) -> Result<Temperature, DecodeError> {
    let unit = TemperatureUnit::from_code(unit_code).ok_or(DecodeError::UnknownUnit(unit_code))?;
    let raw = u32::from(hi) * HI_BYTE_WEIGHT + u32::from(lo);
    Ok(Temperature::from_value(f64::from(raw) / 10.0, unit))
}

/// Decode a live-reading frame; any fault yields [`Reading::invalid`].
pub fn decode_reading(frame: &[u8], timestamp: OffsetDateTime) -> Reading {
    match try_decode_reading(frame, timestamp) {
        Ok(reading) => reading,
        Err(e) => {
            warn!("Invalid reading frame {:02X?}: {}", frame, e);
            Reading::invalid(timestamp)
        }
    }
}

/// Payload length carried by a `02 00 <hi> <lo> 03` announcement.
///
/// Returns `None` when the frame is not an announcement or the value sits
/// below the bias.
pub fn decode_length_announcement(frame: &[u8]) -> Option<usize> {
    if frame.len() != LENGTH_FRAME_LEN || frame[0] != STX || frame[4] != ETX {
        return None;
    }
    let announced = usize::from(frame[2]) * 256 + usize::from(frame[3]);
    announced.checked_sub(LENGTH_BIAS)
}

/// True when the frame opens with `02` followed by the session marker.
pub fn is_datalog_frame(frame: &[u8]) -> bool {
    frame.first() == Some(&STX) && frame[1..].starts_with(&SESSION_MARKER)
}

/// Decode a datalog bulk frame into its logging sessions.
///
/// Layout: `02 (<marker> <interval> <7-byte record>*)+ 03`. Each record is
/// re-wrapped as a live-reading frame. The device sends no per-sample time,
/// so sample `i` of a session is stamped `start_time + i * interval` seconds.
///
/// If the scan stops short of the closing 0x03 the transfer is reported as
/// truncated and the sessions parsed so far are still returned.
pub fn decode_datalog(frame: &[u8], start_time: OffsetDateTime) -> Vec<DatalogSession> {
    scan_datalog(frame, start_time).sessions
}

/// Sessions recovered from a bulk frame, plus whether the scan fell short.
#[derive(Debug, Clone, PartialEq)]
pub struct DatalogScan {
    pub sessions: Vec<DatalogSession>,
    /// The scan stopped before the closing 0x03.
    pub truncated: bool,
}

/// Same as [`decode_datalog`], but also reports truncation to the caller.
///
/// A frame without 0x02/0x03 delimiters yields no sessions and is not
/// counted as truncated.
pub fn scan_datalog(frame: &[u8], start_time: OffsetDateTime) -> DatalogScan {
    let mut sessions = Vec::new();

    if frame.len() < 2 || frame[0] != STX || frame[frame.len() - 1] != ETX {
        warn!("Datalog frame is not delimited by 0x02/0x03 ({} bytes)", frame.len());
        return DatalogScan {
            sessions,
            truncated: false,
        };
    }

    let end = frame.len() - 1;
    let mut current: Option<DatalogSession> = None;
    let mut pos = 1;

    while pos < end {
        if frame[pos..end].starts_with(&SESSION_MARKER) {
            let interval_at = pos + SESSION_MARKER.len();
            if interval_at >= end {
                break;
            }
            if let Some(session) = current.take() {
                sessions.push(session);
            }
            debug!("Datalog session at byte {} with interval {}", pos, frame[interval_at]);
            current = Some(DatalogSession::new(frame[interval_at]));
            pos = interval_at + 1;
            continue;
        }

        let session = match current.as_mut() {
            Some(session) => session,
            None => break,
        };
        if pos + SUB_RECORD_LEN > end {
            break;
        }

        let mut wrapped = [0u8; READING_FRAME_LEN];
        wrapped[0] = STX;
        wrapped[1..1 + SUB_RECORD_LEN].copy_from_slice(&frame[pos..pos + SUB_RECORD_LEN]);
        wrapped[READING_FRAME_LEN - 1] = ETX;

        let elapsed = session.len() as i64 * i64::from(session.samples_per_second);
        let timestamp = start_time + Duration::seconds(elapsed);
        session.readings.push(decode_reading(&wrapped, timestamp));
        pos += SUB_RECORD_LEN;
    }

    if let Some(session) = current {
        sessions.push(session);
    }

    let truncated = pos != end;
    if truncated {
        warn!(
            "Truncated datalog transfer: scan stopped at byte {} of {}, keeping {} session(s)",
            pos,
            frame.len(),
            sessions.len()
        );
    }

    DatalogScan {
        sessions,
        truncated,
    }
}
