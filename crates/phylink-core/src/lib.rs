//! phylink-core: Lifecycle state machine and trait seams for phylink.
//!
//! This crate defines the transport-agnostic abstractions that every phylink
//! transport implements. Protocol sessions depend on these types without
//! pulling in any concrete transport driver.
//!
//! # Key types
//!
//! - [`PhysLayer`] -- the open/close/read/write lifecycle state machine
//! - [`PhysAdapter`] -- the capability a concrete transport provides
//! - [`UpperLayer`] -- notifications delivered to the protocol session
//! - [`PhysEvent`] -- completion events reported by a transport
//! - [`Error`] / [`Result`] -- error handling

pub mod adapter;
pub mod diag;
pub mod error;
pub mod layer;
pub mod state;
pub mod upper;

// Re-export key types at crate root for ergonomic `use phylink_core::*`.
pub use adapter::{EventSender, PhysAdapter, PhysEvent};
pub use diag::{DiagSink, TracingSink};
pub use error::{Error, Result};
pub use layer::PhysLayer;
pub use state::{ClosingFrom, Lifecycle, Outstanding};
pub use upper::UpperLayer;
