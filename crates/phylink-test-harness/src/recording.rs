//! Recording upper layer and capturing diagnostic sink.
//!
//! [`RecordingUpper`] counts every notification the state machine emits so
//! tests can assert the exactly-once contracts (one layer-up per successful
//! open, one deferred layer-down per drained close). [`CapturingSink`]
//! queues diagnostic entries so illegal-call accounting can be checked one
//! entry at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;

use phylink_core::diag::DiagSink;
use phylink_core::upper::UpperLayer;

#[derive(Debug, Default)]
struct UpperState {
    layer_up: usize,
    layer_down: usize,
    open_failures: usize,
    received: Vec<Vec<u8>>,
    send_results: Vec<bool>,
}

/// A notification-counting [`UpperLayer`].
///
/// Cloning yields a handle onto the same counters, so a test can keep a
/// handle for assertions while the state machine (or a channel task) owns
/// the upper layer.
#[derive(Debug, Clone, Default)]
pub struct RecordingUpper {
    state: Arc<Mutex<UpperState>>,
}

impl RecordingUpper {
    /// Create a fresh recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layer-up notifications received.
    pub fn num_layer_up(&self) -> usize {
        self.state.lock().unwrap().layer_up
    }

    /// Number of layer-down notifications received.
    pub fn num_layer_down(&self) -> usize {
        self.state.lock().unwrap().layer_down
    }

    /// Number of open-failure notifications received.
    pub fn num_open_failure(&self) -> usize {
        self.state.lock().unwrap().open_failures
    }

    /// Every payload delivered by a successful read, in order.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().received.clone()
    }

    /// Every send result delivered, in order.
    pub fn send_results(&self) -> Vec<bool> {
        self.state.lock().unwrap().send_results.clone()
    }
}

impl UpperLayer for RecordingUpper {
    fn on_layer_up(&mut self) {
        self.state.lock().unwrap().layer_up += 1;
    }

    fn on_layer_down(&mut self) {
        self.state.lock().unwrap().layer_down += 1;
    }

    fn on_open_failure(&mut self) {
        self.state.lock().unwrap().open_failures += 1;
    }

    fn on_receive(&mut self, buf: BytesMut) {
        self.state.lock().unwrap().received.push(buf.to_vec());
    }

    fn on_send_result(&mut self, success: bool) {
        self.state.lock().unwrap().send_results.push(success);
    }
}

/// A [`DiagSink`] that queues every error entry for inspection.
///
/// Clones share the queue. The typical assertion pattern mirrors how the
/// state machine reports: one entry per illegal call, popped one at a time.
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl CapturingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest error entry, if any.
    pub fn pop_error(&self) -> Option<String> {
        self.entries.lock().unwrap().pop_front()
    }

    /// Pop one entry and assert it was the only one queued.
    ///
    /// Returns `false` if there were zero entries or more than one.
    pub fn pop_one_error(&self) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries.pop_front().is_some() && entries.is_empty()
    }

    /// Number of queued error entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// `true` if no error entries are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl DiagSink for CapturingSink {
    fn error(&mut self, message: &str) {
        self.entries.lock().unwrap().push_back(message.to_string());
    }
}
