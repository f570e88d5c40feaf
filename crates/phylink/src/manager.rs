//! The manager composition root.
//!
//! [`Manager`] constructs channels over the stock transports and keeps
//! their task handles so a whole station's links can be shut down together.
//! It is deliberately thin: all lifecycle behavior lives in the state
//! machine, all I/O in the adapters.

use tokio::task::JoinHandle;
use tracing::debug;

use phylink_core::upper::UpperLayer;
use phylink_transport::{SerialAdapter, SerialConfig, TcpClientAdapter, TcpServerAdapter};

use crate::channel::{Channel, ChannelHandle};

/// Owner of a set of channels.
///
/// Must be used within a tokio runtime; channel tasks are spawned onto the
/// ambient runtime.
#[derive(Default)]
pub struct Manager {
    channels: Vec<JoinHandle<()>>,
}

impl Manager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel that dials out over TCP (master side).
    pub fn add_tcp_client<U: UpperLayer + 'static>(
        &mut self,
        addr: impl Into<String>,
        upper: U,
    ) -> ChannelHandle {
        let addr = addr.into();
        let (handle, task) =
            Channel::spawn(move |events| TcpClientAdapter::new(addr, events), upper);
        self.channels.push(task);
        handle
    }

    /// Add a channel that accepts one inbound TCP connection per open
    /// (outstation side).
    pub fn add_tcp_server<U: UpperLayer + 'static>(
        &mut self,
        listen_addr: impl Into<String>,
        upper: U,
    ) -> ChannelHandle {
        let addr = listen_addr.into();
        let (handle, task) =
            Channel::spawn(move |events| TcpServerAdapter::new(addr, events), upper);
        self.channels.push(task);
        handle
    }

    /// Add a channel over a serial port.
    pub fn add_serial<U: UpperLayer + 'static>(
        &mut self,
        port: impl Into<String>,
        config: SerialConfig,
        upper: U,
    ) -> ChannelHandle {
        let port = port.into();
        let (handle, task) = Channel::spawn(
            move |events| SerialAdapter::with_config(port, config, events),
            upper,
        );
        self.channels.push(task);
        handle
    }

    /// Number of channels constructed by this manager.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Stop every channel task.
    ///
    /// Callers that want orderly layer-down notifications should issue
    /// `close()` on each handle and let it drain first; this is the hard
    /// stop behind it.
    pub async fn shutdown(self) {
        debug!(channels = self.channels.len(), "shutting down manager");
        for task in self.channels {
            task.abort();
            let _ = task.await;
        }
    }
}
