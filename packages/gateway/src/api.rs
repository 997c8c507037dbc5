use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;

use crate::config::GatewayConfig;
use crate::error::{validate_uuid, Error};
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::gateway::{EntityQuery, ListOptions, StorageGateway};
use crate::record::{EntityRecord, Page};
use crate::types::{HttpRequest, HttpResponse};

/// A [`StorageGateway`] talking to the storage service REST API.
///
/// Every request except the signed URL download carries the configured
/// bearer token. Response statuses map onto errors as follows:
/// - `403` becomes [`Error::Forbidden`]
/// - `404` becomes [`Error::NotFound`]
/// - any other non-2xx becomes [`Error::Service`]
///
/// # Example
///
/// ```ignore
/// use docstore_gateway::{ApiClient, GatewayConfig, StorageGateway};
///
/// let client = ApiClient::from_config(GatewayConfig::from_env()?)?;
/// let record = client.get_entity_details("2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab")?;
/// ```
pub struct ApiClient<E: HttpExecutor = ReqwestExecutor> {
    executor: E,
    base_url: Url,
    access_token: String,
    page_size: Option<u32>,
}

impl ApiClient<ReqwestExecutor> {
    /// Create a client backed by a reqwest executor honouring the configured
    /// timeout.
    pub fn from_config(config: GatewayConfig) -> Result<Self, Error> {
        let executor = ReqwestExecutor::new(config.timeout)?;
        Ok(Self::with_executor(executor, config))
    }
}

impl<E: HttpExecutor> ApiClient<E> {
    /// Create a client with a custom executor
    pub fn with_executor(executor: E, config: GatewayConfig) -> Self {
        Self {
            executor,
            base_url: config.base_url,
            access_token: config.access_token,
            page_size: config.page_size,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn endpoint(&self, endpoint: &str) -> Result<String, Error> {
        Ok(self.base_url.join(endpoint)?.to_string())
    }

    fn authenticated(&self, request: HttpRequest) -> HttpRequest {
        request.with_header("Authorization", format!("Bearer {}", self.access_token))
    }

    /// Execute an authenticated request and map failure statuses to errors.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let response = self.executor.execute(&self.authenticated(request))?;
        check_status(response)
    }

    fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, Error> {
        let response = self.send(request)?;
        Ok(response.json()?)
    }

    fn list_children(
        &self,
        endpoint: String,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        let request = HttpRequest::get(self.endpoint(&endpoint)?)
            .with_optional_query("name", options.name.as_deref())
            .with_optional_query("entity_type", options.entity_type)
            .with_optional_query("content_type", options.content_type.as_deref())
            .with_optional_query("page_size", options.page_size.or(self.page_size))
            .with_optional_query("page", options.page)
            .with_optional_query("ordering", options.ordering.as_deref());

        self.send_json(request)
    }
}

fn check_status(response: HttpResponse) -> Result<HttpResponse, Error> {
    if response.is_success() {
        return Ok(response);
    }

    let message = response
        .body_text
        .clone()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| response.status_text.clone());

    Err(status_error(response.status, message))
}

fn status_error(status: u16, message: String) -> Error {
    match status {
        403 => Error::Forbidden {
            message: format!("You are forbidden to do this: {}", message),
        },
        404 => Error::NotFound {
            message: format!("The entity is not found: {}", message),
        },
        _ => Error::Service { status, message },
    }
}

/// Build a JSON object from the non-empty pairs.
fn json_params(pairs: &[(&str, Option<&str>)]) -> Value {
    let map: Map<String, Value> = pairs
        .iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), json!(v))))
        .collect();
    Value::Object(map)
}

#[derive(serde::Deserialize)]
struct PathResponse {
    path: String,
}

#[derive(serde::Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

impl<E: HttpExecutor> StorageGateway for ApiClient<E> {
    fn get_entity_details(&self, entity_id: &str) -> Result<EntityRecord, Error> {
        validate_uuid("entity_id", entity_id)?;
        self.send_json(HttpRequest::get(
            self.endpoint(&format!("entity/{}/", entity_id))?,
        ))
    }

    fn get_entity_path(&self, entity_id: &str) -> Result<String, Error> {
        validate_uuid("entity_id", entity_id)?;
        let response: PathResponse = self.send_json(HttpRequest::get(
            self.endpoint(&format!("entity/{}/path/", entity_id))?,
        ))?;
        Ok(response.path)
    }

    fn get_entity_by_query(&self, query: &EntityQuery) -> Result<EntityRecord, Error> {
        let request = HttpRequest::get(self.endpoint("entity/")?);
        let request = match query {
            EntityQuery::Uuid(uuid) => {
                validate_uuid("uuid", uuid)?;
                request.with_query("uuid", uuid)
            }
            EntityQuery::Path(path) if !path.is_empty() => request.with_query("path", path),
            EntityQuery::Metadata { key, value } if !key.is_empty() => {
                request.with_query(key, value)
            }
            _ => return Err(Error::argument("No parameter given for the query.")),
        };

        self.send_json(request)
    }

    fn list_project_content(
        &self,
        project_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        validate_uuid("project_id", project_id)?;
        self.list_children(format!("project/{}/children/", project_id), options)
    }

    fn list_folder_content(
        &self,
        folder_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        validate_uuid("folder", folder_id)?;
        self.list_children(format!("folder/{}/children/", folder_id), options)
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<EntityRecord, Error> {
        validate_uuid("parent", parent_id)?;
        let body = json_params(&[("name", Some(name)), ("parent", Some(parent_id))]);
        self.send_json(HttpRequest::post(self.endpoint("folder/")?).with_json_body(body))
    }

    fn create_file(
        &self,
        name: &str,
        content_type: &str,
        parent_id: &str,
    ) -> Result<EntityRecord, Error> {
        validate_uuid("parent", parent_id)?;
        let body = json_params(&[
            ("name", Some(name)),
            ("content_type", Some(content_type)),
            ("parent", Some(parent_id)),
        ]);
        self.send_json(HttpRequest::post(self.endpoint("file/")?).with_json_body(body))
    }

    fn upload_file_content(
        &self,
        file_id: &str,
        source: &Path,
        etag: Option<&str>,
    ) -> Result<String, Error> {
        validate_uuid("file_id", file_id)?;
        let content = std::fs::read(source)?;

        let mut request = HttpRequest::post(
            self.endpoint(&format!("file/{}/content/upload/", file_id))?,
        )
        .with_bytes_body(content);
        if let Some(etag) = etag {
            request = request.with_header("If-Match", etag);
        }

        let response = self.send(request)?;
        response
            .header("ETag")
            .map(str::to_string)
            .ok_or(Error::MissingEtag)
    }

    fn get_signed_url(&self, file_id: &str) -> Result<String, Error> {
        validate_uuid("file_id", file_id)?;
        let response: SignedUrlResponse = self.send_json(HttpRequest::get(
            self.endpoint(&format!("file/{}/content/secure_link/", file_id))?,
        ))?;
        Ok(response.signed_url)
    }

    fn download_signed_url(&self, signed_url: &str) -> Result<Box<dyn Read + Send>, Error> {
        // Signed URLs may come back relative to the service root.
        let url = self.endpoint(signed_url)?;
        let mut stream = self.executor.open_stream(&HttpRequest::get(url))?;

        if !(200..300).contains(&stream.status) {
            let mut message = String::new();
            stream.reader.read_to_string(&mut message)?;
            return Err(status_error(stream.status, message));
        }

        Ok(stream.reader)
    }

    fn delete_file(&self, file_id: &str) -> Result<(), Error> {
        validate_uuid("file_id", file_id)?;
        self.send(HttpRequest::delete(
            self.endpoint(&format!("file/{}/", file_id))?,
        ))?;
        Ok(())
    }

    fn delete_folder(&self, folder_id: &str) -> Result<(), Error> {
        validate_uuid("folder", folder_id)?;
        self.send(HttpRequest::delete(
            self.endpoint(&format!("folder/{}/", folder_id))?,
        ))?;
        Ok(())
    }
}
