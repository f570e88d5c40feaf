//! The channel execution context.
//!
//! A [`Channel`] pairs one [`PhysLayer`] with the single tokio task that
//! drives it. Commands from any number of [`ChannelHandle`] clones and
//! completion events from the adapter's I/O tasks are funneled through one
//! `select!` loop, so no two events for the same state machine ever run
//! concurrently -- the serialization guarantee the state machine's
//! lock-free design relies on.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use phylink_core::adapter::{EventSender, PhysAdapter, PhysEvent};
use phylink_core::diag::DiagSink;
use phylink_core::error::{Error, Result};
use phylink_core::layer::PhysLayer;
use phylink_core::upper::UpperLayer;

/// A command accepted by the channel task.
#[derive(Debug)]
enum Command {
    Open,
    Close,
    Read(BytesMut),
    Write(Bytes),
}

/// Cloneable handle for issuing commands to a channel.
///
/// All commands are fire-and-forget: they enqueue onto the channel task and
/// return immediately. Outcomes surface through the channel's
/// [`UpperLayer`] notifications. Commands fail with
/// [`Error::ChannelClosed`] once the channel task has stopped.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ChannelHandle {
    /// Request an open of the physical resource.
    pub fn open(&self) -> Result<()> {
        self.send(Command::Open)
    }

    /// Request a close of the physical resource.
    pub fn close(&self) -> Result<()> {
        self.send(Command::Close)
    }

    /// Request one read into `buf`; the filled buffer is delivered through
    /// the upper layer's receive notification.
    pub fn read(&self, buf: BytesMut) -> Result<()> {
        self.send(Command::Read(buf))
    }

    /// Request one write of `data`.
    pub fn write(&self, data: Bytes) -> Result<()> {
        self.send(Command::Write(data))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::ChannelClosed)
    }
}

/// One physical connection: a state machine plus its execution context.
pub struct Channel;

impl Channel {
    /// Spawn a channel task around an adapter and an upper layer.
    ///
    /// `make_adapter` receives the [`EventSender`] the adapter must use to
    /// report completions; the adapter is then moved into the channel task
    /// along with the upper layer. Must be called within a tokio runtime.
    pub fn spawn<A, U, F>(make_adapter: F, upper: U) -> (ChannelHandle, JoinHandle<()>)
    where
        A: PhysAdapter + 'static,
        U: UpperLayer + 'static,
        F: FnOnce(EventSender) -> A,
    {
        Self::spawn_inner(make_adapter, upper, None)
    }

    /// Spawn a channel with an explicit diagnostic sink on its state
    /// machine. Used by tests asserting illegal-call accounting.
    pub fn spawn_with_sink<A, U, F>(
        make_adapter: F,
        upper: U,
        sink: Box<dyn DiagSink>,
    ) -> (ChannelHandle, JoinHandle<()>)
    where
        A: PhysAdapter + 'static,
        U: UpperLayer + 'static,
        F: FnOnce(EventSender) -> A,
    {
        Self::spawn_inner(make_adapter, upper, Some(sink))
    }

    fn spawn_inner<A, U, F>(
        make_adapter: F,
        upper: U,
        sink: Option<Box<dyn DiagSink>>,
    ) -> (ChannelHandle, JoinHandle<()>)
    where
        A: PhysAdapter + 'static,
        U: UpperLayer + 'static,
        F: FnOnce(EventSender) -> A,
    {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PhysEvent>();
        let adapter = make_adapter(event_tx);
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();

        let task = tokio::spawn(async move {
            let mut layer = match sink {
                Some(sink) => PhysLayer::with_sink(adapter, upper, sink),
                None => PhysLayer::new(adapter, upper),
            };

            loop {
                tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(Command::Open) => layer.open(),
                        Some(Command::Close) => layer.close(),
                        Some(Command::Read(buf)) => layer.read(buf),
                        Some(Command::Write(data)) => layer.write(data),
                        None => {
                            debug!("all channel handles dropped, stopping channel task");
                            break;
                        }
                    },
                    event = event_rx.recv() => match event {
                        Some(event) => layer.dispatch(event),
                        // The layer owns the adapter, which holds the last
                        // event sender; this arm is unreachable in practice.
                        None => break,
                    },
                }
            }
        });

        (ChannelHandle { commands: command_tx }, task)
    }
}
