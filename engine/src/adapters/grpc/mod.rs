//! gRPC Driving Adapter
//!
//! Exposes dispatchers through tonic. `dispatch` is service-agnostic; `service`
//! wires the demo AccountService definition onto it.

pub mod dispatch;
pub mod service;

pub use dispatch::ResponseStream;
pub use service::AccountEndpoint;
