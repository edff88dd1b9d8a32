//! RS-422 serial source

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read};
use tracing::{info, trace};

use crate::config::{ParitySetting, SerialConfig};
use crate::source::ByteSource;
use crate::{RelayError, Result};

/// Serial port reader.
///
/// The port is blocking, so each read runs on the blocking thread pool and
/// returns after at most the configured timeout.
pub struct SerialSource {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    baud_rate: u32,
    scratch: Vec<u8>,
}

impl SerialSource {
    /// Open the port with the configured line settings and no flow control.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port_name, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits)?)
            .flow_control(FlowControl::None)
            .timeout(config.timeout())
            .open()
            .map_err(|e| RelayError::serial(&config.port_name, e))?;

        info!(
            port = %config.port_name,
            baud_rate = config.baud_rate,
            data_bits = config.data_bits,
            stop_bits = config.stop_bits,
            parity = ?config.parity,
            "Opened serial port"
        );

        Ok(Self {
            port: Some(port),
            port_name: config.port_name.clone(),
            baud_rate: config.baud_rate,
            scratch: vec![0; config.read_buffer],
        })
    }
}

#[async_trait::async_trait]
impl ByteSource for SerialSource {
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(mut port) = self.port.take() else {
            return Ok(0);
        };
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(buf.len(), 0);

        let joined = tokio::task::spawn_blocking(move || {
            let result = match port.read(&mut scratch) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(e),
            };
            (port, scratch, result)
        })
        .await;

        let (port, scratch, result) =
            joined.map_err(|e| RelayError::serial(&self.port_name, e))?;
        self.port = Some(port);

        let n = result.map_err(|e| RelayError::serial(&self.port_name, e))?;
        buf[..n].copy_from_slice(&scratch[..n]);
        self.scratch = scratch;

        if n > 0 {
            trace!(bytes = n, "Serial read");
        }
        Ok(n)
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.port_name, self.baud_rate)
    }
}

fn data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(RelayError::config(format!("unsupported data bits {}", other))),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(RelayError::config(format!("unsupported stop bits {}", other))),
    }
}

fn parity(setting: ParitySetting) -> Parity {
    match setting {
        ParitySetting::None => Parity::None,
        ParitySetting::Odd => Parity::Odd,
        ParitySetting::Even => Parity::Even,
    }
}
