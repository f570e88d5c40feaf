//! The `PhysAdapter` capability and transport completion events.
//!
//! A concrete transport (TCP client, TCP server, serial port) implements
//! [`PhysAdapter`]. Requests are fire-and-forget: the adapter records
//! intent, kicks off real I/O on its own tasks, and reports the outcome
//! later through the [`EventSender`] it was given at construction. The
//! completion events land back on the channel's execution context and are
//! dispatched into the state machine -- control never flows from the
//! transport to the protocol session directly.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

/// A completion event reported by a transport.
///
/// Each event must match an operation the state machine currently has
/// outstanding; an unmatched event is logged as a protocol-usage error and
/// ignored.
#[derive(Debug)]
pub enum PhysEvent {
    /// The open request succeeded; the link is physically usable.
    OpenSuccess,
    /// The open request failed (or was aborted by a racing close).
    OpenFailure,
    /// A read completed; the buffer comes back with the received bytes.
    ReadSuccess(BytesMut),
    /// A read failed or was aborted by a close.
    ReadFailure,
    /// A write was fully flushed to the medium.
    SendSuccess,
    /// A write failed or was aborted by a close.
    SendFailure,
}

/// The sending half a transport uses to report completions.
///
/// Unbounded so that a transport task can never block on reporting; the
/// state machine bounds the number of in-flight operations to one read and
/// one write, so the queue stays shallow in practice.
pub type EventSender = mpsc::UnboundedSender<PhysEvent>;

/// Asynchronous physical medium below the state machine.
///
/// All four requests return immediately. The adapter owns the actual
/// sockets/ports and the tasks that drive them; completions arrive later as
/// [`PhysEvent`]s. After a `close_request`, the adapter must promptly fail
/// any operations still in flight -- the state machine waits for those
/// completions before declaring the layer down, so an adapter that swallows
/// them would wedge the close.
pub trait PhysAdapter: Send {
    /// Begin establishing the physical resource.
    ///
    /// Resolves later as `OpenSuccess` or `OpenFailure`. Only issued while
    /// no connection exists.
    fn open_request(&mut self);

    /// Release the physical resource.
    ///
    /// Has no completion event of its own; in-flight open/read/write
    /// operations resolve as failures instead.
    fn close_request(&mut self);

    /// Begin one read into the supplied buffer.
    ///
    /// The buffer must have spare capacity. Ownership transfers to the
    /// adapter until the read resolves; on `ReadSuccess` the filled buffer
    /// comes back through the event.
    fn read_request(&mut self, buf: BytesMut);

    /// Begin one write of the supplied bytes.
    ///
    /// Resolves as `SendSuccess` once fully flushed, or `SendFailure`.
    fn write_request(&mut self, data: Bytes);
}
