use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use rust_ea15_serial::models::SensorType;
use rust_ea15_serial::protocol::controller::{ACK_REQUEST, ACK_TRANSFER};
use rust_ea15_serial::protocol::SessionController;
use rust_ea15_serial::reader::spawn_reader;
use rust_ea15_serial::serial::Transport;

const LIVE: [u8; 9] = [0x02, 0x00, 0x00, 0x14, 0x00, 0x01, 0x28, 0x05, 0x03];
const ANNOUNCE: [u8; 5] = [0x02, 0x00, 0x8c, 0x9b, 0x03];

/// Simulated meter: streams live frames and answers the datalog handshake.
struct FakeMeter {
    queued: VecDeque<u8>,
    bulk_sent: bool,
    stray_prefix: bool,
}

impl FakeMeter {
    fn new() -> Self {
        FakeMeter {
            queued: VecDeque::new(),
            bulk_sent: false,
            stray_prefix: true,
        }
    }

    fn bulk() -> Vec<u8> {
        let mut frame = vec![0x02, 0x00, 0x55, 0xAA, 0x00, 0x02];
        frame.extend_from_slice(&[0x00, 0x00, 0xC8, 0x00, 0x00, 0xD2, 0x00]);
        frame.extend_from_slice(&[0x00, 0x00, 0xC9, 0x00, 0x00, 0xD3, 0x00]);
        frame.extend_from_slice(&[0x00, 0x55, 0xAA, 0x00, 0x3C]);
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x01, 0x01, 0x01]);
        frame.push(0x03);
        frame
    }
}

impl Transport for FakeMeter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.stray_prefix {
            // Connecting mid-frame: the tail of a previous reading
            self.stray_prefix = false;
            self.queued.extend([0x28, 0x05, 0x03]);
        }
        if self.queued.is_empty() {
            std::thread::sleep(Duration::from_millis(1));
            self.queued.extend(LIVE);
        }
        let n = self.queued.len().min(buf.len()).min(4);
        for slot in buf.iter_mut().take(n) {
            *slot = self.queued.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        for &b in bytes {
            if b == ACK_REQUEST {
                self.queued.extend(ANNOUNCE);
            } else if b == ACK_TRANSFER && !self.bulk_sent {
                self.bulk_sent = true;
                self.queued.extend(FakeMeter::bulk());
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_live_stream_and_datalog_download() {
    let controller = SessionController::new(FakeMeter::new()).with_ack_delay(Duration::ZERO);
    let mut reader = spawn_reader(controller, 16);

    let first = tokio::time::timeout(Duration::from_secs(5), reader.readings.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.valid);
    assert_eq!(first.sensor_type, Some(SensorType::S));
    assert!((first.t2.celsius() - 29.5).abs() < 1e-9);

    assert!(reader.request_datalog());

    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    let sessions = loop {
        tokio::select! {
            sessions = reader.datalogs.recv() => break sessions.unwrap(),
            reading = reader.readings.recv() => assert!(reading.unwrap().valid),
            _ = &mut deadline => panic!("datalog never arrived"),
        }
    };

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].samples_per_second, 2);
    assert_eq!(sessions[0].len(), 2);
    assert!((sessions[0].readings[0].t1.celsius() - 20.0).abs() < 1e-9);
    assert!((sessions[0].readings[1].t2.celsius() - 21.1).abs() < 1e-9);
    assert_eq!(
        sessions[0].readings[1].timestamp - sessions[0].readings[0].timestamp,
        time::Duration::seconds(2)
    );
    assert_eq!(sessions[1].samples_per_second, 60);
    assert_eq!(sessions[1].len(), 1);
    assert_eq!(sessions[1].readings[0].sensor_type, Some(SensorType::J));

    let stats = reader.shutdown().await;
    assert_eq!(stats.datalogs, 1);
    assert_eq!(stats.stray_bytes, 3);
    assert_eq!(stats.unrecognized, 0);
    assert!(stats.acks_written >= 2);
}
