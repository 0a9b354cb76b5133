// Communication module - SCPI line protocol over a byte transport
pub mod command;
pub mod flush;
pub mod framer;
pub mod transport;

pub use command::{configuration_sequence, read_request, Command};
pub use flush::flush_handshake;
pub use framer::ResponseFramer;
pub use transport::{CloseHandle, Transport};

#[cfg(test)]
pub(crate) mod mock;
