//! Byte source implementations

mod disconnected;
mod memory;
mod serial;

pub use disconnected::DisconnectedSource;
pub use memory::MemorySource;
pub use serial::SerialSource;

use tracing::warn;

use crate::config::SerialConfig;
use crate::source::ByteSource;

/// Open the configured serial port, or fall back to a source that never
/// yields data.
///
/// A failed open is logged once and not retried; the relay then keeps
/// broadcasting simulated telemetry.
pub fn open_serial_or_disconnected(config: &SerialConfig) -> Box<dyn ByteSource> {
    match SerialSource::open(config) {
        Ok(source) => Box::new(source),
        Err(e) => {
            warn!(
                port = %config.port_name,
                error = %e,
                "Serial port unavailable, relaying without live data"
            );
            Box::new(DisconnectedSource::new(&config.port_name))
        }
    }
}

#[async_trait::async_trait]
impl ByteSource for Box<dyn ByteSource> {
    async fn read_available(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        (**self).read_available(buf).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
