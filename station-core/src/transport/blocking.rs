use std::error::Error as _;

use reqwest::{Method, blocking::Client};
use tracing::debug;

use crate::{
    error::TransportError,
    model::{HttpMethod, HttpRequest, HttpResponse},
};

use super::Transport;

/// `Transport` backed by a blocking reqwest client.
///
/// TLS verification is a client-level setting in reqwest, so one client of
/// each kind is built up front and picked per request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    verifying: Client,
    insecure: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let verifying = Client::builder()
            .build()
            .map_err(|e| TransportError::Other(error_chain(&e)))?;
        let insecure = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Other(error_chain(&e)))?;

        Ok(Self { verifying, insecure })
    }

    fn client(&self, verify_ssl: bool) -> &Client {
        if verify_ssl {
            &self.verifying
        } else {
            &self.insecure
        }
    }
}

impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client(request.verify_ssl)
            .request(to_reqwest_method(request.method), request.url.as_str())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &request.basic_auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_deref());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let res = builder.send().map_err(classify)?;

        let status = res.status().as_u16();
        let body = res.text().map_err(classify)?;
        debug!(status, bytes = body.len(), "received response");

        Ok(HttpResponse { status, body })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Connect timeouts count as connection failures.
fn classify(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);
    if err.is_connect() {
        TransportError::Connect(message)
    } else if err.is_timeout() {
        TransportError::Timeout(message)
    } else {
        TransportError::Other(message)
    }
}

/// reqwest's Display only shows the outermost error.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
