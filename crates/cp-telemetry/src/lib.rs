//! Logging setup shared by CodePress binaries.
//!
//! Library crates only emit through `tracing` macros; binaries pick an
//! output format once at startup with [`logging::init`].

pub mod logging;
