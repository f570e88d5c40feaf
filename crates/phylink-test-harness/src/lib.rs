//! phylink-test-harness: Mock transports and recording fixtures for phylink.
//!
//! This crate provides [`MockAdapter`] for deterministic unit testing of the
//! lifecycle state machine without real sockets, [`LoopbackAdapter`] for
//! end-to-end channel tests, [`RecordingUpper`] for counting notifications,
//! and [`CapturingSink`] for asserting diagnostic output entry by entry.

pub mod loopback;
pub mod mock_adapter;
pub mod recording;

pub use loopback::LoopbackAdapter;
pub use mock_adapter::MockAdapter;
pub use recording::{CapturingSink, RecordingUpper};
