//! Client library for the weather station HTTP API.
//!
//! This crate defines:
//! - Validated connection settings (`StationConfig`, `Settings`)
//! - A blocking request executor with typed errors (`WeatherStation`)
//! - A `Transport` seam with a reqwest-backed implementation
//!
//! Logging goes through `tracing`; installing a subscriber is up to the caller.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod transport;

pub use client::WeatherStation;
pub use config::{Settings, StationConfig};
pub use error::{ClientError, TransportError};
pub use model::{BasicAuth, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
