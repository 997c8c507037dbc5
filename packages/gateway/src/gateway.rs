//! The operations the entity tree consumes from the storage service.

use std::io::Read;
use std::path::Path;

use crate::error::Error;
use crate::record::{EntityKind, EntityRecord, Page};

/// Alternate keys an entity can be resolved by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityQuery {
    Uuid(String),
    Path(String),
    /// A single metadata `key=value` pair.
    Metadata { key: String, value: String },
}

/// Filters and paging for a children listing. `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub name: Option<String>,
    pub entity_type: Option<EntityKind>,
    pub content_type: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Sort fields, e.g. `"name"` or `"-created_on"`.
    pub ordering: Option<String>,
}

impl ListOptions {
    /// Page `page` of the children, ordered by name.
    pub fn page_by_name(page: u32) -> Self {
        Self {
            page: Some(page),
            ordering: Some("name".to_string()),
            ..Default::default()
        }
    }

    /// Children named `name` with kind `kind`.
    pub fn named(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: Some(name.into()),
            entity_type: Some(kind),
            ..Default::default()
        }
    }
}

/// Blocking access to the storage service.
///
/// Every call completes or fails before returning; implementations decide on
/// timeouts. Identifier arguments are validated as UUIDs before any request.
pub trait StorageGateway: Send + Sync {
    fn get_entity_details(&self, entity_id: &str) -> Result<EntityRecord, Error>;

    fn get_entity_path(&self, entity_id: &str) -> Result<String, Error>;

    fn get_entity_by_query(&self, query: &EntityQuery) -> Result<EntityRecord, Error>;

    fn list_project_content(
        &self,
        project_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error>;

    fn list_folder_content(
        &self,
        folder_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error>;

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<EntityRecord, Error>;

    fn create_file(
        &self,
        name: &str,
        content_type: &str,
        parent_id: &str,
    ) -> Result<EntityRecord, Error>;

    /// Push the bytes at `source` as the content of `file_id`, returning the
    /// new ETag. With `etag` set the upload only succeeds if the stored
    /// content still matches it.
    fn upload_file_content(
        &self,
        file_id: &str,
        source: &Path,
        etag: Option<&str>,
    ) -> Result<String, Error>;

    /// A short-lived unauthenticated download URL.
    fn get_signed_url(&self, file_id: &str) -> Result<String, Error>;

    fn download_signed_url(&self, signed_url: &str) -> Result<Box<dyn Read + Send>, Error>;

    fn delete_file(&self, file_id: &str) -> Result<(), Error>;

    /// Deletes the folder and everything below it.
    fn delete_folder(&self, folder_id: &str) -> Result<(), Error>;

    /// List one page of a container's children, choosing the project or
    /// folder endpoint from `kind`.
    fn list_container_content(
        &self,
        kind: EntityKind,
        container_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        match kind {
            EntityKind::Project => self.list_project_content(container_id, options),
            EntityKind::Folder => self.list_folder_content(container_id, options),
            EntityKind::File => Err(Error::argument(format!(
                "{} is a file and has no children",
                container_id
            ))),
        }
    }
}
