//! # phylink -- Physical-Layer Lifecycle for Telemetry Links
//!
//! `phylink` is an asynchronous Rust library for managing the physical
//! transport below an industrial telemetry protocol session (DNP3-style
//! master/outstation stacks and similar SCADA plumbing). It provides the
//! open/close/read/write lifecycle contract that any transport must honor,
//! with strict, race-free sequencing guarantees over asynchronous I/O
//! completions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bytes::{Bytes, BytesMut};
//! use phylink::{Manager, UpperLayer};
//!
//! struct Session;
//!
//! impl UpperLayer for Session {
//!     fn on_layer_up(&mut self) { println!("link up"); }
//!     fn on_layer_down(&mut self) { println!("link down"); }
//!     fn on_open_failure(&mut self) { println!("open failed"); }
//!     fn on_receive(&mut self, buf: BytesMut) { println!("rx {} bytes", buf.len()); }
//!     fn on_send_result(&mut self, success: bool) { println!("tx ok: {success}"); }
//! }
//!
//! #[tokio::main]
//! async fn main() -> phylink::Result<()> {
//!     let mut manager = Manager::new();
//!     let handle = manager.add_tcp_client("10.0.0.5:20000", Session);
//!     handle.open()?;
//!     handle.write(Bytes::from_static(&[0x05, 0x64]))?;
//!     handle.read(BytesMut::with_capacity(4096))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                       |
//! |------------------------|-----------------------------------------------|
//! | `phylink-core`         | Lifecycle state machine, traits, errors       |
//! | `phylink-transport`    | TCP client/server and serial adapters         |
//! | `phylink-test-harness` | Mock adapter, recording fixtures              |
//! | **`phylink`**          | This facade crate -- channels and the manager |
//!
//! ## Guarantees
//!
//! All commands and completion events for one channel are serialized onto
//! one tokio task, so the state machine needs no internal locking. The
//! upper layer sees strictly alternating layer-up/layer-down notifications;
//! a close with reads or writes outstanding defers its layer-down until
//! every outstanding operation resolves; a close racing an in-flight open
//! reports a single open-failure instead of an up/down pair. Commands or
//! completions arriving in a state that does not accept them are logged at
//! error severity and ignored -- a misbehaving caller cannot corrupt the
//! link state.

pub use phylink_core::*;

/// Concrete transport adapters (TCP client, TCP server, serial).
pub mod transport {
    pub use phylink_transport::*;
}

pub mod channel;
pub mod manager;

pub use channel::{Channel, ChannelHandle};
pub use manager::Manager;
