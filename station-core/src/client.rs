use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{
    config::StationConfig,
    error::{ClientError, TransportError},
    model::{BasicAuth, HttpMethod, HttpRequest, HttpResponse},
    transport::{ReqwestTransport, Transport},
};

/// Client for the weather station API.
///
/// Owns its `StationConfig`; accessors are reachable through `config()` and
/// `config_mut()`, and changes apply to the next `query_api` call.
#[derive(Debug)]
pub struct WeatherStation<T = ReqwestTransport> {
    config: StationConfig,
    transport: T,
}

impl WeatherStation<ReqwestTransport> {
    pub fn new(config: StationConfig) -> Result<Self, ClientError> {
        let transport =
            ReqwestTransport::new().map_err(|e| ClientError::TransportSetup(e.to_string()))?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> WeatherStation<T> {
    pub fn with_transport(config: StationConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut StationConfig {
        &mut self.config
    }

    /// Query the station API and return the response body as JSON.
    ///
    /// `path` is appended verbatim to the configured `api_url`. `body`, when
    /// given, must be a JSON document and is sent as the request payload.
    /// All arguments and the required configuration are validated before
    /// any I/O happens; nothing is retried.
    #[tracing::instrument(skip(self, body))]
    pub fn query_api(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<Value, ClientError> {
        let request = self.build_request(method, path, body)?;

        if self.config.is_debug_enabled() {
            match &request.body {
                Some(payload) => debug!(
                    "Using HTTP {method} on {} with payload {payload}",
                    request.url
                ),
                None => debug!("Using HTTP {method} on {}", request.url),
            }
        }

        let response = self
            .transport
            .execute(&request)
            .map_err(|e| self.relabel(method, e))?;

        if self.config.enable_http_trace() {
            debug!("Response body:\n{}", pretty_body(&response.body));
        }
        if self.config.is_debug_enabled() {
            debug!("Status code of the {method} request: {}", response.status);
        }

        parse_response(method, response)
    }

    /// Like `query_api`, then deserializes the JSON into `R`.
    pub fn query_api_as<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<R, ClientError> {
        let value = self.query_api(method, path, body)?;
        serde_json::from_value(value).map_err(|e| ClientError::Request {
            method,
            message: format!("Failed to decode response JSON: {e}"),
        })
    }

    fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> Result<HttpRequest, ClientError> {
        if path.is_empty() {
            return Err(ClientError::invalid("path", "value is empty"));
        }

        if let Some(data) = body {
            if let Err(e) = serde_json::from_str::<Value>(data) {
                debug!("Given string is not a valid JSON formatted string: {data}");
                return Err(ClientError::invalid(
                    "body",
                    format!("not a JSON formatted string ({e}). Given value: {data}"),
                ));
            }
        }

        let api_url = self.config.api_url()?;
        let timeout = self.config.timeout_duration()?;
        let verify_ssl = self.config.verify_ssl()?;

        let basic_auth = self.config.api_username().map(|username| BasicAuth {
            username: username.to_string(),
            password: self.config.api_password().map(str::to_string),
        });

        Ok(HttpRequest {
            method,
            url: format!("{api_url}{path}"),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.map(str::to_string),
            basic_auth,
            timeout,
            verify_ssl,
        })
    }

    fn relabel(&self, method: HttpMethod, err: TransportError) -> ClientError {
        match err {
            TransportError::Connect(_) => ClientError::Connection {
                url: self.config.api_url().unwrap_or_default().to_string(),
                source: err,
            },
            TransportError::Timeout(_) => ClientError::Timeout {
                method,
                timeout: self.config.api_timeout().unwrap_or_default(),
                source: err,
            },
            TransportError::Other(message) => ClientError::Request { method, message },
        }
    }
}

fn parse_response(method: HttpMethod, response: HttpResponse) -> Result<Value, ClientError> {
    if response.is_error_status() {
        return Err(ClientError::Http {
            method,
            status: response.status,
            body: truncate_body(&response.body),
        });
    }
    if !response.is_success() {
        return Err(ClientError::Runtime {
            method,
            status: response.status,
        });
    }

    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&response.body).map_err(|e| ClientError::Request {
        method,
        message: format!(
            "Failed to parse response JSON ({e}): {}",
            truncate_body(&response.body)
        ),
    })
}

fn pretty_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> StationConfig {
        let mut cfg = StationConfig::default();
        cfg.set_api_url("https://api.example.com/").unwrap();
        cfg.set_api_timeout(5.0).unwrap();
        cfg.set_verify_ssl(true);
        cfg
    }

    fn respond(status: u16, body: &str) -> MockTransport {
        let body = body.to_string();
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(move |_| {
            Ok(HttpResponse {
                status,
                body: body.clone(),
            })
        });
        transport
    }

    fn never_called() -> MockTransport {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        transport
    }

    #[test]
    fn get_returns_parsed_json() {
        let station = WeatherStation::with_transport(config(), respond(200, r#"{"id":1}"#));
        let value = station.query_api(HttpMethod::Get, "items/1", None).unwrap();
        assert_eq!(value, json!({"id": 1}));
    }

    #[test]
    fn builds_request_from_config() {
        let mut cfg = config();
        cfg.set_verify_ssl(false);
        cfg.set_api_timeout(2.5).unwrap();
        cfg.set_api_username("station").unwrap();
        cfg.set_api_password("secret");

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == "https://api.example.com/devices/7"
                    && req.headers
                        == vec![("content-type".to_string(), "application/json".to_string())]
                    && req.body.as_deref() == Some(r#"{"name":"roof"}"#)
                    && req.basic_auth
                        == Some(BasicAuth {
                            username: "station".into(),
                            password: Some("secret".into()),
                        })
                    && req.timeout == Duration::from_millis(2500)
                    && !req.verify_ssl
            })
            .returning(|_| {
                Ok(HttpResponse {
                    status: 201,
                    body: r#"{"id":7}"#.into(),
                })
            });

        let station = WeatherStation::with_transport(cfg, transport);
        let value = station
            .query_api(HttpMethod::Post, "devices/7", Some(r#"{"name":"roof"}"#))
            .unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn path_is_appended_verbatim() {
        let mut cfg = config();
        cfg.set_api_url("https://api.example.com").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.url == "https://api.example.comitems" && req.basic_auth.is_none())
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    body: "[]".into(),
                })
            });

        let station = WeatherStation::with_transport(cfg, transport);
        assert_eq!(station.query_api(HttpMethod::Get, "items", None).unwrap(), json!([]));
    }

    #[test]
    fn empty_path_fails_before_io() {
        let station = WeatherStation::with_transport(config(), never_called());
        let err = station.query_api(HttpMethod::Get, "", None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { name: "path", .. }));
    }

    #[test]
    fn invalid_json_body_fails_before_io() {
        let station = WeatherStation::with_transport(config(), never_called());
        for body in ["", "{", "not json", "{'single': 'quotes'}"] {
            let err = station
                .query_api(HttpMethod::Put, "items/1", Some(body))
                .unwrap_err();
            assert!(
                matches!(err, ClientError::InvalidArgument { name: "body", .. }),
                "{body:?} should be rejected"
            );
        }
    }

    #[test]
    fn unknown_method_name_fails_before_io() {
        let station = WeatherStation::with_transport(config(), never_called());
        let result = HttpMethod::try_from("PATCH")
            .and_then(|method| station.query_api(method, "items/1", None));
        assert!(matches!(result, Err(ClientError::InvalidArgument { name: "method", .. })));
    }

    #[test]
    fn path_is_checked_before_body() {
        let station = WeatherStation::with_transport(config(), never_called());
        let err = station
            .query_api(HttpMethod::Post, "", Some("not json"))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { name: "path", .. }));
    }

    #[test]
    fn missing_configuration_fails_before_io() {
        let mut cfg = config();
        cfg.clear_api_url();
        let station = WeatherStation::with_transport(cfg, never_called());
        let err = station.query_api(HttpMethod::Get, "items", None).unwrap_err();
        assert!(matches!(err, ClientError::NotInitialized("api_url")));

        let mut cfg = config();
        cfg.clear_api_timeout();
        let station = WeatherStation::with_transport(cfg, never_called());
        let err = station.query_api(HttpMethod::Get, "items", None).unwrap_err();
        assert!(matches!(err, ClientError::NotInitialized("api_timeout")));

        let mut cfg = config();
        cfg.clear_verify_ssl();
        let station = WeatherStation::with_transport(cfg, never_called());
        let err = station.query_api(HttpMethod::Get, "items", None).unwrap_err();
        assert!(matches!(err, ClientError::NotInitialized("verify_ssl")));
    }

    #[test]
    fn not_found_is_http_error() {
        let station = WeatherStation::with_transport(config(), respond(404, "station not found"));
        let err = station.query_api(HttpMethod::Get, "items/1", None).unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 404, .. }));
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("station not found"));
    }

    #[test]
    fn server_error_is_http_error() {
        let station = WeatherStation::with_transport(config(), respond(503, ""));
        let err = station.query_api(HttpMethod::Delete, "items/1", None).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Http { method: HttpMethod::Delete, status: 503, .. }
        ));
    }

    #[test]
    fn unexpected_status_is_runtime_error() {
        let station = WeatherStation::with_transport(config(), respond(304, ""));
        let err = station.query_api(HttpMethod::Get, "items/1", None).unwrap_err();
        assert!(matches!(err, ClientError::Runtime { status: 304, .. }));
        assert!(err.to_string().contains("304"));
    }

    #[test]
    fn empty_success_body_is_null() {
        let station = WeatherStation::with_transport(config(), respond(204, ""));
        let value = station.query_api(HttpMethod::Delete, "items/1", None).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn non_json_success_body_is_request_error() {
        let station = WeatherStation::with_transport(config(), respond(200, "<html>"));
        let err = station.query_api(HttpMethod::Get, "items/1", None).unwrap_err();
        assert!(matches!(err, ClientError::Request { .. }));
        assert!(err.to_string().contains("<html>"));
    }

    #[test]
    fn transport_errors_are_relabelled() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(TransportError::Connect("dns failure".into())));
        let station = WeatherStation::with_transport(config(), transport);
        let err = station.query_api(HttpMethod::Get, "items", None).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Connection { ref url, .. } if url == "https://api.example.com/"
        ));
        assert!(err.to_string().contains("dns failure"));

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(TransportError::Timeout("deadline elapsed".into())));
        let station = WeatherStation::with_transport(config(), transport);
        let err = station.query_api(HttpMethod::Get, "items", None).unwrap_err();
        assert!(matches!(err, ClientError::Timeout { timeout, .. } if timeout == 5.0));
        assert!(err.to_string().contains("5 seconds"));

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(TransportError::Other("bad header".into())));
        let station = WeatherStation::with_transport(config(), transport);
        let err = station.query_api(HttpMethod::Put, "items", None).unwrap_err();
        assert!(matches!(err, ClientError::Request { method: HttpMethod::Put, .. }));
        assert!(err.to_string().contains("bad header"));
    }

    #[test_log::test]
    fn debug_and_trace_logging_do_not_change_result() {
        let mut cfg = config();
        cfg.set_enable_debug("yes").unwrap();
        cfg.set_enable_http_trace(Some(true));

        let station = WeatherStation::with_transport(cfg, respond(200, r#"{"temp":21.5}"#));
        let value = station
            .query_api(HttpMethod::Post, "measure", Some(r#"{"scale":"max"}"#))
            .unwrap();
        assert_eq!(value, json!({"temp": 21.5}));
    }

    #[test]
    fn query_api_as_deserializes() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            id: u32,
        }

        let station = WeatherStation::with_transport(config(), respond(200, r#"{"id":1}"#));
        let item: Item = station.query_api_as(HttpMethod::Get, "items/1", None).unwrap();
        assert_eq!(item, Item { id: 1 });

        let station = WeatherStation::with_transport(config(), respond(200, r#"{"name":"x"}"#));
        let err = station
            .query_api_as::<Item>(HttpMethod::Get, "items/1", None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Request { .. }));
    }

    #[test]
    fn config_changes_apply_to_next_call() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.url == "http://localhost:9000/items")
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    body: "{}".into(),
                })
            });

        let mut station = WeatherStation::with_transport(config(), transport);
        station.config_mut().set_api_url("http://localhost:9000/").unwrap();
        assert_eq!(station.config().api_url().unwrap(), "http://localhost:9000/");
        station.query_api(HttpMethod::Get, "items", None).unwrap();
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
