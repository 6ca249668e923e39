//! Observability setup for Corvid.

pub mod tracing_setup;
