//! Error types for phylink.
//!
//! Fallible operations on the channel surface return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures are not errors at
//! this level: they resolve as completion events (open/read/send failures)
//! that the state machine turns into upper-layer notifications. The state
//! machine itself never fails either -- commands and signals received in a
//! disallowed state are logged through the diagnostic sink and ignored, so
//! a misbehaving caller cannot tear down a live telemetry link.

/// The error type for phylink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The channel task backing a handle has stopped.
    ///
    /// Commands sent through a [`ChannelHandle`] after its channel task
    /// exits fail with this variant.
    ///
    /// [`ChannelHandle`]: https://docs.rs/phylink
    #[error("channel closed")]
    ChannelClosed,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
