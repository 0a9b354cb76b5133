// TCP module - TCP transport and local instrument simulator
pub mod client;
pub mod server;

pub use client::{StreamTransport, TcpTransport};
pub use server::InstrumentSimulator;
