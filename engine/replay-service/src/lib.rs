//! Replay service library: configuration, logging and signal plumbing for
//! the producer binary.

pub mod config;
pub mod logging;
pub mod signals;

pub use config::ReplayConfig;
pub use logging::initialize_logging;
pub use signals::register_shutdown_signals;
