//! Logging setup.
//!
//! The crate itself only emits through the `log` facade; hosts pick the backend.
//! These helpers install `env_logger` the way the bundled tools and tests do.

mod init;

pub use init::{LoggingConfig, init_logging, init_test_logging};
