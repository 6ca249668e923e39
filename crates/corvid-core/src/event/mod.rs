//! Event bus and raw-frame classification.

pub mod bus;
pub mod classify;

pub use bus::EventBus;
