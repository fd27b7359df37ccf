use log::{error, info, warn};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use rust_ea15_serial::config::DeviceConfig;
use rust_ea15_serial::models::{DatalogSession, TemperatureUnit};
use rust_ea15_serial::protocol::SessionController;
use rust_ea15_serial::reader::{spawn_reader, ReaderHandle};
use rust_ea15_serial::serial::{list_ports, SerialTransport};
use rust_ea15_serial::utils::{format_reading, summarize_session};

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn print_datalog(sessions: &[DatalogSession], unit: TemperatureUnit) {
    if sessions.is_empty() {
        warn!("Datalog download returned no sessions");
        return;
    }

    for (n, session) in sessions.iter().enumerate() {
        println!(
            "Datalog with {} records, sampled every {} seconds",
            session.len(),
            session.samples_per_second
        );
        for (i, reading) in session.readings.iter().enumerate() {
            println!("{:04} : {}", i, format_reading(reading, unit));
        }

        match summarize_session(session) {
            Some(summary) => {
                info!("Summary for session {}:", n + 1);
                info!(
                    "  T1 min/mean/max: {:.1} / {:.2} / {:.1} °C",
                    summary.t1_min, summary.t1_mean, summary.t1_max
                );
                info!(
                    "  T2 min/mean/max: {:.1} / {:.2} / {:.1} °C",
                    summary.t2_min, summary.t2_mean, summary.t2_max
                );
                info!(
                    "  Based on {} samples over {} seconds",
                    summary.samples,
                    summary.span.whole_seconds()
                );
            }
            None => warn!("Session {} holds no valid samples", n + 1),
        }
    }
}

async fn main_loop(
    config: &DeviceConfig,
    reader: &mut ReaderHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting EA15 reader on {}", config.port);

    let mut datalog_timer = config.datalog_interval.map(|period| {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    });

    loop {
        tokio::select! {
            reading = reader.readings.recv() => match reading {
                Some(reading) => println!("{}", format_reading(&reading, config.display_unit)),
                None => return Err("reader stopped".into()),
            },
            sessions = reader.datalogs.recv() => match sessions {
                Some(sessions) => print_datalog(&sessions, config.display_unit),
                None => return Err("reader stopped".into()),
            },
            _ = next_tick(&mut datalog_timer) => {
                info!("Requesting datalog download");
                if !reader.request_datalog() {
                    return Err("reader stopped".into());
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match DeviceConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let transport = match SerialTransport::open(&config.port) {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            let ports = list_ports();
            if ports.is_empty() {
                warn!("No serial ports found");
            }
            for port in ports {
                info!("Available port: {}", port);
            }
            return Err(e.into());
        }
    };

    let mut reader = spawn_reader(SessionController::new(transport), config.channel_capacity);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&config, &mut reader) => {
            if let Err(e) = result {
                error!("Fatal error: {}", e);
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    let stats = reader.shutdown().await;
    info!("Reader stats:");
    info!("  Frames: {}", stats.frames);
    info!("  Readings: {}", stats.readings);
    info!("  Datalogs: {}", stats.datalogs);
    info!("  Malformed frames: {}", stats.malformed);
    info!("  Unrecognized frames: {}", stats.unrecognized);
    info!("  Truncated datalogs: {}", stats.truncated);
    info!("  Stray bytes: {}", stats.stray_bytes);
    info!("  Oversized frames: {}", stats.oversized);
    info!("  Handshake bytes written: {}", stats.acks_written);

    Ok(())
}
