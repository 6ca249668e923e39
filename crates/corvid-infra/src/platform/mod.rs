//! Messaging-platform connectivity: REST client and streaming event
//! connection.

pub mod rest;
pub mod stream;

pub use rest::RestPlatformClient;
pub use stream::EventStream;
