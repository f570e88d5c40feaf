//! In-process loopback adapter for end-to-end channel tests.
//!
//! [`LoopbackAdapter`] completes every request immediately through its
//! [`EventSender`]: opens succeed, writes are echoed into a receive queue,
//! and reads drain that queue. This exercises the full channel path
//! (commands in, completions out, notifications up) without any sockets.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};

use phylink_core::adapter::{EventSender, PhysAdapter, PhysEvent};

#[derive(Debug, Default)]
struct Inner {
    /// Bytes written and not yet read back.
    echo: VecDeque<Bytes>,
    /// Read buffers waiting for data.
    pending_reads: VecDeque<BytesMut>,
    /// When set, the next open completes as a failure.
    fail_next_open: bool,
}

/// A [`PhysAdapter`] that echoes writes back to reads.
///
/// Cloning yields a handle onto the same queues, so a test can flip
/// [`fail_next_open`](Self::fail_next_open) while a channel task owns the
/// adapter.
#[derive(Debug, Clone)]
pub struct LoopbackAdapter {
    events: EventSender,
    inner: Arc<Mutex<Inner>>,
}

impl LoopbackAdapter {
    /// Create a loopback adapter reporting completions through `events`.
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Make the next open request complete as a failure.
    pub fn fail_next_open(&self) {
        self.inner.lock().unwrap().fail_next_open = true;
    }
}

impl PhysAdapter for LoopbackAdapter {
    fn open_request(&mut self) {
        let failed = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::take(&mut inner.fail_next_open)
        };
        let event = if failed {
            PhysEvent::OpenFailure
        } else {
            PhysEvent::OpenSuccess
        };
        let _ = self.events.send(event);
    }

    fn close_request(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.echo.clear();
        // Reads left waiting for data resolve as failures, as a real
        // transport would after releasing the medium.
        while inner.pending_reads.pop_front().is_some() {
            let _ = self.events.send(PhysEvent::ReadFailure);
        }
    }

    fn read_request(&mut self, mut buf: BytesMut) {
        let mut inner = self.inner.lock().unwrap();
        match inner.echo.pop_front() {
            Some(data) => {
                buf.extend_from_slice(&data);
                let _ = self.events.send(PhysEvent::ReadSuccess(buf));
            }
            None => inner.pending_reads.push_back(buf),
        }
    }

    fn write_request(&mut self, data: Bytes) {
        let mut inner = self.inner.lock().unwrap();
        // Fulfill a waiting read directly, otherwise queue for later.
        if let Some(mut buf) = inner.pending_reads.pop_front() {
            buf.extend_from_slice(&data);
            let _ = self.events.send(PhysEvent::ReadSuccess(buf));
        } else {
            inner.echo.push_back(data);
        }
        let _ = self.events.send(PhysEvent::SendSuccess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn adapter() -> (LoopbackAdapter, mpsc::UnboundedReceiver<PhysEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LoopbackAdapter::new(tx), rx)
    }

    #[test]
    fn open_completes_successfully() {
        let (mut a, mut rx) = adapter();
        a.open_request();
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::OpenSuccess));
    }

    #[test]
    fn fail_next_open_completes_as_failure_once() {
        let (mut a, mut rx) = adapter();
        a.fail_next_open();
        a.open_request();
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::OpenFailure));

        a.open_request();
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::OpenSuccess));
    }

    #[test]
    fn write_then_read_echoes() {
        let (mut a, mut rx) = adapter();
        a.write_request(Bytes::from_static(b"ping"));
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::SendSuccess));

        a.read_request(BytesMut::with_capacity(16));
        match rx.try_recv().unwrap() {
            PhysEvent::ReadSuccess(buf) => assert_eq!(buf.as_ref(), b"ping"),
            other => panic!("expected ReadSuccess, got {other:?}"),
        }
    }

    #[test]
    fn read_waits_until_write_arrives() {
        let (mut a, mut rx) = adapter();
        a.read_request(BytesMut::with_capacity(16));
        assert!(rx.try_recv().is_err());

        a.write_request(Bytes::from_static(b"late"));
        match rx.try_recv().unwrap() {
            PhysEvent::ReadSuccess(buf) => assert_eq!(buf.as_ref(), b"late"),
            other => panic!("expected ReadSuccess, got {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::SendSuccess));
    }

    #[test]
    fn close_fails_pending_reads() {
        let (mut a, mut rx) = adapter();
        a.read_request(BytesMut::with_capacity(16));
        a.close_request();
        assert!(matches!(rx.try_recv().unwrap(), PhysEvent::ReadFailure));
    }
}
