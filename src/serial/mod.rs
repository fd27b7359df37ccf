pub mod port;

pub use port::{list_ports, SerialTransport, Transport};
