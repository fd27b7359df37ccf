pub mod controller;
pub mod decoder;
pub mod framer;

pub use controller::{ControllerStats, Decoded, DownloadState, SessionController};
pub use decoder::{decode_datalog, decode_reading, scan_datalog, try_decode_reading, DatalogScan};
pub use framer::{FrameAssembler, FramerState};
