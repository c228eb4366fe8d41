// src/search/mod.rs
pub mod backoff;
pub mod client;
pub mod query;
pub mod transport;

pub use backoff::{Backoff, ExponentialBackoff};
pub use client::{Client, DEFAULT_BASE_URL, SearchError};
pub use query::{Field, Query, Response};
pub use transport::{Transport, TransportConfig, TransportError};
