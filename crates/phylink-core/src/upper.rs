//! The `UpperLayer` seam -- notifications delivered to the protocol session.

use bytes::BytesMut;

/// Consumer of state machine notifications.
///
/// Implemented by the protocol session above the physical layer (in a DNP3
/// stack, the master or outstation link logic). All notifications are
/// delivered on the channel's execution context; handlers must not block.
///
/// The up/down sequence strictly alternates: exactly one `on_layer_up`
/// exists between any two `on_layer_down` calls and vice versa. Receive and
/// send-result notifications are never delivered after the layer-down for
/// their connection.
pub trait UpperLayer: Send {
    /// The physical connection became usable.
    fn on_layer_up(&mut self);

    /// The physical connection became unusable.
    ///
    /// Deferred until every outstanding read/write has resolved, so the
    /// session never learns the layer is down while it still believes an
    /// operation is in flight.
    fn on_layer_down(&mut self);

    /// An open attempt failed, or was overtaken by a close before the link
    /// ever came up. Not a layer-down: no layer-up preceded it.
    fn on_open_failure(&mut self);

    /// A read completed; `buf` holds the received bytes.
    ///
    /// Only successful reads deliver data. Failed reads clear the
    /// outstanding operation silently (the session observes the
    /// consequences through layer-down, if a close was pending).
    fn on_receive(&mut self, buf: BytesMut);

    /// A write resolved. Unlike reads, both outcomes are reported.
    fn on_send_result(&mut self, success: bool);
}
