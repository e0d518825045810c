//! Logging hooks for the channel protocol.
//!
//! All logging compiles away unless the `tracing` feature is enabled: the
//! crate-internal `debug!`/`trace!`/`warn!` macros resolve either to the
//! `tracing` crate or to no-ops that discard their arguments.

/// Installs a process-wide subscriber for this crate's trace output.
///
/// The filter comes from `RUST_LOG` when set and defaults to debug-level
/// output for `tether` alone. Safe to call repeatedly (from every test,
/// say); only the first call installs anything. Does nothing without the
/// `tracing` feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use std::sync::Once;

    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("tether=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .without_time()
            .compact()
            .init();
    });
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace, warn};

// A single argument-discarding stand-in covers every level we log at.
#[cfg(not(feature = "tracing"))]
macro_rules! noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use noop as warn;
