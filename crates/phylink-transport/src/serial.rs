//! Serial port transport adapter.
//!
//! [`SerialAdapter`] implements [`PhysAdapter`] for RS-232/RS-485 links via
//! `tokio-serial`. Field telemetry gear commonly runs 9600 8N1, but every
//! parameter is configurable through [`SerialConfig`].

use bytes::{Bytes, BytesMut};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use phylink_core::adapter::{EventSender, PhysAdapter, PhysEvent};

use crate::io::{self, IoSession};

/// Serial port configuration.
///
/// Defaults match the most common field wiring: 9600 baud, 8 data bits,
/// 1 stop bit, no parity, no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (e.g. 9600, 19200, 115200).
    pub baud_rate: u32,
    /// Number of data bits (typically 8).
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1).
    pub stop_bits: StopBits,
    /// Parity checking (typically none).
    pub parity: Parity,
    /// Flow control (typically none; RTS/CTS on some RS-485 converters).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Serial port adapter.
///
/// Each `open_request` opens the port with the configured parameters and
/// splits it into reader/writer tasks; `close_request` cancels them, which
/// releases the port and fails any in-flight read or write.
pub struct SerialAdapter {
    port: String,
    config: SerialConfig,
    events: EventSender,
    session: Option<IoSession>,
}

impl SerialAdapter {
    /// Create an adapter for `port` (e.g. `/dev/ttyUSB0`, `COM3`) with
    /// default 9600 8N1 settings.
    pub fn new(port: impl Into<String>, events: EventSender) -> Self {
        Self::with_config(port, SerialConfig::default(), events)
    }

    /// Create an adapter with full configuration control.
    pub fn with_config(port: impl Into<String>, config: SerialConfig, events: EventSender) -> Self {
        Self {
            port: port.into(),
            config,
            events,
            session: None,
        }
    }

    /// The port path this adapter opens.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl PhysAdapter for SerialAdapter {
    fn open_request(&mut self) {
        let (session, receivers) = io::session();
        let cancel = session.cancel_token();
        self.session = Some(session);

        let port = self.port.clone();
        let config = self.config.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            debug!(
                port = %port,
                baud_rate = config.baud_rate,
                data_bits = ?config.data_bits,
                stop_bits = ?config.stop_bits,
                parity = ?config.parity,
                flow_control = ?config.flow_control,
                "opening serial port"
            );

            if cancel.is_cancelled() {
                let _ = events.send(PhysEvent::OpenFailure);
                return;
            }

            let stream = match tokio_serial::new(&port, config.baud_rate)
                .data_bits(config.data_bits.into())
                .stop_bits(config.stop_bits.into())
                .parity(config.parity.into())
                .flow_control(config.flow_control.into())
                .open_native_async()
            {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(port = %port, error = %e, "failed to open serial port");
                    let _ = events.send(PhysEvent::OpenFailure);
                    return;
                }
            };

            info!(port = %port, baud_rate = config.baud_rate, "serial port opened");
            let _ = events.send(PhysEvent::OpenSuccess);

            let (read_half, write_half) = tokio::io::split(stream);
            io::run_io(read_half, write_half, receivers, events, cancel).await;
            debug!(port = %port, "serial tasks stopped");
        });
    }

    fn close_request(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(port = %self.port, "closing serial port");
            session.shutdown();
        }
    }

    fn read_request(&mut self, buf: BytesMut) {
        match &self.session {
            Some(session) => session.request_read(&self.events, buf),
            None => {
                let _ = self.events.send(PhysEvent::ReadFailure);
            }
        }
    }

    fn write_request(&mut self, data: Bytes) {
        match &self.session {
            Some(session) => session.request_write(&self.events, data),
            None => {
                let _ = self.events.send(PhysEvent::SendFailure);
            }
        }
    }
}

impl Drop for SerialAdapter {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }
}
