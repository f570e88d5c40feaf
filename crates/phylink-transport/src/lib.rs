//! phylink-transport: Concrete transport adapters for phylink.
//!
//! Each adapter implements [`PhysAdapter`](phylink_core::PhysAdapter) by
//! spawning tokio I/O tasks on `open_request` and reporting completions
//! through the [`EventSender`](phylink_core::EventSender) it was given at
//! construction:
//!
//! - [`TcpClientAdapter`] -- outbound TCP connection (master side)
//! - [`TcpServerAdapter`] -- accepts one inbound TCP connection (outstation side)
//! - [`SerialAdapter`] -- RS-232/RS-485 serial port via `tokio-serial`
//!
//! # Adding a new transport
//!
//! 1. Create `src/my_transport.rs`
//! 2. Implement the `PhysAdapter` trait over the shared I/O loops in `io`
//! 3. Add `pub mod my_transport;` here

mod io;
pub mod serial;
pub mod tcp;

pub use serial::{DataBits, FlowControl, Parity, SerialAdapter, SerialConfig, StopBits};
pub use tcp::{TcpClientAdapter, TcpServerAdapter};
