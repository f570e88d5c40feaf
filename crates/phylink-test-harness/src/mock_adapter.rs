//! Mock adapter for deterministic testing of the state machine.
//!
//! [`MockAdapter`] implements [`PhysAdapter`] by recording every request
//! and completing nothing on its own. Tests drive completions explicitly
//! by calling the state machine's signal methods, which makes every
//! interleaving of commands and completions expressible as a plain
//! sequential test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};

use phylink_core::adapter::PhysAdapter;

#[derive(Debug, Default)]
struct Inner {
    opens: usize,
    closes: usize,
    reads: usize,
    writes: Vec<Bytes>,
    pending_reads: VecDeque<BytesMut>,
}

/// A request-recording [`PhysAdapter`] that never completes anything.
///
/// Cloning yields a handle onto the same recorded state, so a test can keep
/// a handle for assertions while the state machine owns the adapter.
#[derive(Debug, Clone, Default)]
pub struct MockAdapter {
    inner: Arc<Mutex<Inner>>,
}

impl MockAdapter {
    /// Create a fresh mock with no recorded requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open requests received.
    pub fn num_open(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    /// Number of close requests received.
    pub fn num_close(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    /// Number of read requests received.
    pub fn num_read(&self) -> usize {
        self.inner.lock().unwrap().reads
    }

    /// Number of write requests received.
    pub fn num_write(&self) -> usize {
        self.inner.lock().unwrap().writes.len()
    }

    /// All payloads passed to `write_request`, in order.
    pub fn written(&self) -> Vec<Bytes> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// Take the oldest buffer handed over by a `read_request`.
    ///
    /// Tests fill this and feed it back through the read-success signal,
    /// playing the role of the I/O completion.
    pub fn take_read_buffer(&self) -> Option<BytesMut> {
        self.inner.lock().unwrap().pending_reads.pop_front()
    }
}

impl PhysAdapter for MockAdapter {
    fn open_request(&mut self) {
        self.inner.lock().unwrap().opens += 1;
    }

    fn close_request(&mut self) {
        self.inner.lock().unwrap().closes += 1;
    }

    fn read_request(&mut self, buf: BytesMut) {
        let mut inner = self.inner.lock().unwrap();
        inner.reads += 1;
        inner.pending_reads.push_back(buf);
    }

    fn write_request(&mut self, data: Bytes) {
        self.inner.lock().unwrap().writes.push(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_requests_in_order() {
        let mut mock = MockAdapter::new();
        let handle = mock.clone();

        mock.open_request();
        mock.write_request(Bytes::from_static(b"ab"));
        mock.write_request(Bytes::from_static(b"cd"));
        mock.read_request(BytesMut::with_capacity(16));
        mock.close_request();

        assert_eq!(handle.num_open(), 1);
        assert_eq!(handle.num_close(), 1);
        assert_eq!(handle.num_read(), 1);
        assert_eq!(handle.num_write(), 2);
        assert_eq!(handle.written()[0].as_ref(), b"ab");
        assert_eq!(handle.written()[1].as_ref(), b"cd");
    }

    #[test]
    fn read_buffers_come_back_fifo() {
        let mut mock = MockAdapter::new();
        mock.read_request(BytesMut::with_capacity(1));
        mock.read_request(BytesMut::with_capacity(2));

        assert_eq!(mock.take_read_buffer().unwrap().capacity(), 1);
        assert_eq!(mock.take_read_buffer().unwrap().capacity(), 2);
        assert!(mock.take_read_buffer().is_none());
    }
}
