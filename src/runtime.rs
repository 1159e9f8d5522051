//! Runtime glue that wires configuration, fatal error capture, shutdown
//! signalling, telemetry, and runner orchestration.

pub mod config;
pub mod fatal;
pub mod runner;
pub mod shutdown;
pub mod telemetry;
