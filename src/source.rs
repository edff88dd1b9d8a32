//! ByteSource trait for serial data

use crate::Result;

/// Trait for the upstream byte stream
///
/// Sources abstract over the RS-422 line and its stand-ins (a disconnected
/// port, scripted test data). One read per relay cycle; a read never blocks
/// longer than the source's own timeout.
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Read whatever bytes are available into `buf`
    ///
    /// Returns:
    /// - `Ok(n)` with `n > 0` - bytes read
    /// - `Ok(0)` - nothing arrived within the timeout, or no port
    /// - `Err(e)` - the read failed; the relay treats this as a quiet cycle
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether a physical port is attached
    fn is_connected(&self) -> bool;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}
