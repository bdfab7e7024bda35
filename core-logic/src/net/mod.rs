//! Outbound HTTP: per-attempt TLS transports, call deadlines and the
//! retrying client built on top of them.

pub mod client;
pub mod context;
pub mod tls;

pub use client::{is_blocking_error, HttpClient, ProxyPolicy};
pub use context::CallContext;
pub use tls::{FingerprintProfile, HandshakePlan, Transport, TransportFactory};
