/// Background reader task
///
/// One blocking task owns the transport and drives the session controller.
/// Decoded readings and datalogs flow out on two channels; datalog requests
/// flow in on a third. A watch flag asks the loop to stop between reads.
use log::{debug, error, info};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::models::{DatalogSession, Reading};
use crate::protocol::{ControllerStats, Decoded, SessionController};
use crate::serial::Transport;

pub struct ReaderHandle {
    pub readings: mpsc::Receiver<Reading>,
    pub datalogs: mpsc::Receiver<Vec<DatalogSession>>,
    requests: mpsc::UnboundedSender<()>,
    stop: watch::Sender<bool>,
    task: JoinHandle<ControllerStats>,
}

impl ReaderHandle {
    /// Ask the reader to start a datalog download.
    ///
    /// Returns false if the reader has already exited.
    pub fn request_datalog(&self) -> bool {
        self.requests.send(()).is_ok()
    }

    /// Stop the reader and wait for it, returning its final counters.
    ///
    /// The loop notices the stop flag after the read in flight completes.
    pub async fn shutdown(self) -> ControllerStats {
        let ReaderHandle {
            readings,
            datalogs,
            requests,
            stop,
            task,
        } = self;

        let _ = stop.send(true);
        // Unblock a reader waiting on a full channel
        drop(readings);
        drop(datalogs);
        drop(requests);

        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Reader task failed: {}", e);
                ControllerStats::default()
            }
        }
    }
}

/// Spawn the reader on the blocking pool. Must be called inside a Tokio runtime.
pub fn spawn_reader<T>(controller: SessionController<T>, capacity: usize) -> ReaderHandle
where
    T: Transport + Send + 'static,
{
    let (readings_tx, readings) = mpsc::channel(capacity);
    let (datalogs_tx, datalogs) = mpsc::channel(capacity);
    let (requests, requests_rx) = mpsc::unbounded_channel();
    let (stop, stop_rx) = watch::channel(false);

    let task = tokio::task::spawn_blocking(move || {
        run_reader(controller, readings_tx, datalogs_tx, requests_rx, stop_rx)
    });

    ReaderHandle {
        readings,
        datalogs,
        requests,
        stop,
        task,
    }
}

fn run_reader<T: Transport>(
    mut controller: SessionController<T>,
    readings_tx: mpsc::Sender<Reading>,
    datalogs_tx: mpsc::Sender<Vec<DatalogSession>>,
    mut requests_rx: mpsc::UnboundedReceiver<()>,
    stop_rx: watch::Receiver<bool>,
) -> ControllerStats {
    info!("Reader started");

    loop {
        if *stop_rx.borrow() {
            info!("Reader stop requested");
            break;
        }

        loop {
            match requests_rx.try_recv() {
                Ok(()) => {
                    controller.request_datalog();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match controller.next_decoded() {
            Ok(Some(Decoded::Reading(reading))) => {
                if readings_tx.blocking_send(reading).is_err() {
                    debug!("Reading dropped, no consumer");
                }
            }
            Ok(Some(Decoded::Datalog(sessions))) => {
                if datalogs_tx.blocking_send(sessions).is_err() {
                    debug!("Datalog dropped, no consumer");
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Reader stopping: {}", e);
                break;
            }
        }

        if readings_tx.is_closed() && datalogs_tx.is_closed() {
            info!("All consumers gone, reader exiting");
            break;
        }
    }

    controller.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::controller::tests::ScriptedTransport;
    use std::time::Duration;

    const LIVE: [u8; 9] = [0x02, 0x00, 0x00, 0x14, 0x00, 0x01, 0x28, 0x05, 0x03];

    #[tokio::test]
    async fn test_readings_delivered_in_order() {
        let second = [0x02, 0x00, 0x00, 0x15, 0x00, 0x01, 0x28, 0x05, 0x03];
        let transport = ScriptedTransport::new(&[&LIVE, &second]);
        let controller = SessionController::new(transport).with_ack_delay(Duration::ZERO);
        let mut handle = spawn_reader(controller, 4);

        let first = handle.readings.recv().await.unwrap();
        let next = handle.readings.recv().await.unwrap();
        assert!((first.t1.celsius() - 2.0).abs() < 1e-9);
        assert!((next.t1.celsius() - 2.1).abs() < 1e-9);

        let stats = handle.shutdown().await;
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.readings, 2);
    }

    #[tokio::test]
    async fn test_reader_exits_when_consumers_drop() {
        let transport = ScriptedTransport::new(&[&LIVE]);
        let controller = SessionController::new(transport);
        let ReaderHandle {
            readings,
            datalogs,
            task,
            ..
        } = spawn_reader(controller, 1);

        drop(readings);
        drop(datalogs);
        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.frames <= 1);
    }
}
