use serde::Deserialize;
use std::collections::HashMap;

/// The verbs the storage service API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(serde_json::Value),
    /// Sent verbatim, e.g. file content.
    Bytes(Vec<u8>),
}

/// An outgoing request.
///
/// `url` is absolute; the API client resolves endpoints against its base URL
/// before handing the request to an executor.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,

    pub url: String,

    /// Query parameters, kept ordered so recorded requests compare stably
    pub query: Vec<(String, String)>,

    pub headers: HashMap<String, String>,

    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_bytes_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Bytes(body));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn with_optional_query<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_query(name, value.to_string()),
            None => self,
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,

    /// Canonical reason phrase.
    pub status_text: String,

    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,

    /// Parsed body, `Null` unless the body was JSON.
    pub body: serde_json::Value,

    /// The body as received.
    pub body_text: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the parsed body into a service payload.
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_query_skips_none() {
        let request = HttpRequest::get("https://example.com/folder/")
            .with_optional_query("name", Some("foo"))
            .with_optional_query::<u32>("page", None)
            .with_optional_query("page_size", Some(10));

        assert_eq!(
            request.query,
            vec![
                ("name".to_string(), "foo".to_string()),
                ("page_size".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("etag".to_string(), "\"abc\"".to_string());
        let response = HttpResponse {
            status: 201,
            status_text: "Created".to_string(),
            headers,
            body: serde_json::Value::Null,
            body_text: None,
        };

        assert!(response.is_success());
        assert_eq!(response.header("ETag"), Some("\"abc\""));
    }
}
