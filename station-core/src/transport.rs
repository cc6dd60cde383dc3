use std::fmt::Debug;

use crate::{
    error::TransportError,
    model::{HttpRequest, HttpResponse},
};

pub mod blocking;

pub use blocking::ReqwestTransport;

/// Executes one validated request and returns the raw response.
///
/// Implementations report every response they receive, whatever the
/// status code; interpreting the status is left to `WeatherStation`.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync + Debug {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
