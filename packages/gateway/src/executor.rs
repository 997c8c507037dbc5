//! The transport below [`ApiClient`](crate::ApiClient).
//!
//! Requests are plain [`HttpRequest`] values so unit tests can swap in a
//! recording executor and never touch the network.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::error::Error;
use crate::types::{HttpRequest, HttpResponse, RequestBody};

/// A response whose body has not been read yet.
pub struct HttpStream {
    pub status: u16,
    pub reader: Box<dyn Read + Send>,
}

/// Sends [`HttpRequest`]s, either buffering the response or streaming it.
pub trait HttpExecutor: Send + Sync {
    /// Execute an HTTP request and buffer the whole response.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;

    /// Execute an HTTP request and hand back the body as a reader.
    fn open_stream(&self, request: &HttpRequest) -> Result<HttpStream, Error>;
}

/// Blocking reqwest transport used against the real service.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Every request, streamed downloads included, gives up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }

    /// Thirty second timeout.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(Duration::from_secs(30))
    }

    fn send(&self, request: &HttpRequest) -> Result<reqwest::blocking::Response, Error> {
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                Error::argument(format!("Invalid header name {}: {}", name, e))
            })?;
            let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                Error::argument(format!("Invalid header value for {}: {}", name, e))
            })?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, &request.url).headers(headers);

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        match &request.body {
            Some(RequestBody::Json(body)) => req_builder = req_builder.json(body),
            Some(RequestBody::Bytes(bytes)) => {
                req_builder = req_builder
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone())
            }
            None => {}
        }

        log::debug!("{:?} {}", request.method, request.url);
        Ok(req_builder.send()?)
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let response = self.send(request)?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body_text = response.text()?;
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
            body_text: Some(body_text),
        })
    }

    fn open_stream(&self, request: &HttpRequest) -> Result<HttpStream, Error> {
        let response = self.send(request)?;
        Ok(HttpStream {
            status: response.status().as_u16(),
            reader: Box::new(response),
        })
    }
}
