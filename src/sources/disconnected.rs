//! Source used when the serial port could not be opened

use crate::Result;
use crate::source::ByteSource;

/// Stands in for a port that failed to open. Every read returns no data.
#[derive(Debug, Clone)]
pub struct DisconnectedSource {
    port_name: String,
}

impl DisconnectedSource {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self { port_name: port_name.into() }
    }
}

#[async_trait::async_trait]
impl ByteSource for DisconnectedSource {
    async fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!("disconnected ({})", self.port_name)
    }
}
