//! In-memory storage service.
//!
//! Behaves like the REST service closely enough to drive the entity tree in
//! tests: name-ordered pagination, listing filters, path lookup, content
//! upload with ETags and signed URLs that resolve to stored bytes.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{validate_uuid, Error};
use crate::gateway::{EntityQuery, ListOptions, StorageGateway};
use crate::record::{EntityKind, EntityRecord, Page};

const SIGNED_URL_PREFIX: &str = "memory://signed/";
const DEFAULT_PAGE_SIZE: usize = 100;

struct StoredEntity {
    record: EntityRecord,
    content: Option<Vec<u8>>,
    etag: Option<String>,
    metadata: HashMap<String, String>,
}

#[derive(Default)]
struct State {
    entities: HashMap<String, StoredEntity>,
    etag_counter: u64,
    folder_creates: usize,
    file_creates: usize,
    list_calls: usize,
}

impl State {
    fn get(&self, id: &str) -> Result<&StoredEntity, Error> {
        self.entities
            .get(id)
            .ok_or_else(|| Error::not_found(format!("The entity is not found: {}", id)))
    }

    fn path_of(&self, id: &str) -> Result<String, Error> {
        let mut segments = Vec::new();
        let mut current = Some(id.to_string());
        while let Some(id) = current {
            let stored = self.get(&id)?;
            segments.push(stored.record.name.clone());
            current = stored.record.parent.clone();
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    fn children_of(&self, id: &str) -> Vec<&EntityRecord> {
        let mut children: Vec<&EntityRecord> = self
            .entities
            .values()
            .map(|stored| &stored.record)
            .filter(|record| record.parent.as_deref() == Some(id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        name: &str,
        parent: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<EntityRecord, Error> {
        if let Some(parent) = parent {
            if !self.get(parent)?.record.entity_type.is_container() {
                return Err(Error::argument(format!(
                    "The parent {} must be a project or a folder",
                    parent
                )));
            }
        }

        let record = EntityRecord {
            entity_type: kind,
            uuid: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: Some(String::new()),
            created_by: Some("memory".to_string()),
            modified_by: Some("memory".to_string()),
            content_type: content_type.map(str::to_string),
            parent: parent.map(str::to_string),
            created_on: None,
            modified_on: None,
        };
        self.entities.insert(
            record.uuid.clone(),
            StoredEntity {
                record: record.clone(),
                content: None,
                etag: None,
                metadata: HashMap::new(),
            },
        );
        Ok(record)
    }

    fn remove_recursive(&mut self, id: &str) {
        let children: Vec<String> = self
            .children_of(id)
            .into_iter()
            .map(|record| record.uuid.clone())
            .collect();
        for child in children {
            self.remove_recursive(&child);
        }
        self.entities.remove(id);
    }
}

/// A thread-safe fake of the storage service.
///
/// # Example
///
/// ```ignore
/// use docstore_gateway::{InMemoryGateway, StorageGateway};
///
/// let gateway = InMemoryGateway::new();
/// let project = gateway.add_project("demo");
/// let folder = gateway.add_folder(&project, "data");
/// gateway.add_file(&folder, "a.txt", b"hello");
///
/// assert_eq!(gateway.get_entity_path(&folder).unwrap(), "/demo/data");
/// ```
pub struct InMemoryGateway {
    state: Mutex<State>,
    page_size: usize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Listings return at most `page_size` children per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a project, returning its id.
    pub fn add_project(&self, name: &str) -> String {
        self.seed(EntityKind::Project, name, None, None)
    }

    /// Seed a folder under `parent`, returning its id.
    pub fn add_folder(&self, parent: &str, name: &str) -> String {
        self.seed(EntityKind::Folder, name, Some(parent), None)
    }

    /// Seed a file with content under `parent`, returning its id.
    pub fn add_file(&self, parent: &str, name: &str, content: &[u8]) -> String {
        let id = self.seed(EntityKind::File, name, Some(parent), Some("text/plain"));
        let mut state = self.state();
        state.etag_counter += 1;
        let etag = format!("\"{}\"", state.etag_counter);
        if let Some(stored) = state.entities.get_mut(&id) {
            stored.content = Some(content.to_vec());
            stored.etag = Some(etag);
        }
        id
    }

    /// Attach a metadata pair findable with [`EntityQuery::Metadata`].
    pub fn set_metadata(&self, id: &str, key: &str, value: &str) {
        if let Some(stored) = self.state().entities.get_mut(id) {
            stored.metadata.insert(key.to_string(), value.to_string());
        }
    }

    fn seed(
        &self,
        kind: EntityKind,
        name: &str,
        parent: Option<&str>,
        content_type: Option<&str>,
    ) -> String {
        match self.state().insert(kind, name, parent, content_type) {
            Ok(record) => record.uuid,
            Err(e) => panic!("cannot seed {} {}: {}", kind, name, e),
        }
    }

    pub fn record(&self, id: &str) -> Option<EntityRecord> {
        self.state().entities.get(id).map(|s| s.record.clone())
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state().entities.get(id).and_then(|s| s.content.clone())
    }

    /// Records of the direct children of `id`, ordered by name.
    pub fn children(&self, id: &str) -> Vec<EntityRecord> {
        self.state().children_of(id).into_iter().cloned().collect()
    }

    /// Number of create_folder plus create_file calls that reached the store.
    pub fn create_calls(&self) -> usize {
        let state = self.state();
        state.folder_creates + state.file_creates
    }

    /// Number of listing calls, successful or not.
    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    fn list(
        &self,
        expected: EntityKind,
        container_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        let mut state = self.state();
        state.list_calls += 1;

        if state.get(container_id)?.record.entity_type != expected {
            return Err(Error::not_found(format!(
                "No {} with id {}",
                expected, container_id
            )));
        }

        let mut matching: Vec<EntityRecord> = state
            .children_of(container_id)
            .into_iter()
            .filter(|r| options.name.as_ref().map_or(true, |name| &r.name == name))
            .filter(|r| options.entity_type.map_or(true, |kind| r.entity_type == kind))
            .filter(|r| {
                options
                    .content_type
                    .as_ref()
                    .map_or(true, |ct| r.content_type.as_ref() == Some(ct))
            })
            .cloned()
            .collect();

        if let Some(ordering) = &options.ordering {
            if ordering.starts_with('-') {
                matching.reverse();
            }
        }

        let page_size = options
            .page_size
            .map(|size| size as usize)
            .unwrap_or(self.page_size)
            .max(1);
        let page = options.page.unwrap_or(1).max(1) as usize;
        let count = matching.len();
        let start = (page - 1) * page_size;
        if start > 0 && start >= count {
            return Err(Error::not_found(format!("Invalid page {}", page)));
        }
        let end = (start + page_size).min(count);

        Ok(Page {
            count,
            next: (end < count).then(|| format!("?page={}", page + 1)),
            previous: (page > 1).then(|| format!("?page={}", page - 1)),
            results: matching[start..end].to_vec(),
        })
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageGateway for InMemoryGateway {
    fn get_entity_details(&self, entity_id: &str) -> Result<EntityRecord, Error> {
        validate_uuid("entity_id", entity_id)?;
        Ok(self.state().get(entity_id)?.record.clone())
    }

    fn get_entity_path(&self, entity_id: &str) -> Result<String, Error> {
        validate_uuid("entity_id", entity_id)?;
        self.state().path_of(entity_id)
    }

    fn get_entity_by_query(&self, query: &EntityQuery) -> Result<EntityRecord, Error> {
        let state = self.state();
        match query {
            EntityQuery::Uuid(uuid) => {
                validate_uuid("uuid", uuid)?;
                Ok(state.get(uuid)?.record.clone())
            }
            EntityQuery::Path(path) if !path.is_empty() => {
                let wanted = format!("/{}", path.trim_matches('/'));
                state
                    .entities
                    .keys()
                    .find(|id| state.path_of(id).ok().as_deref() == Some(wanted.as_str()))
                    .map(|id| state.entities[id].record.clone())
                    .ok_or_else(|| Error::not_found(format!("No entity at {}", path)))
            }
            EntityQuery::Metadata { key, value } if !key.is_empty() => state
                .entities
                .values()
                .find(|stored| stored.metadata.get(key) == Some(value))
                .map(|stored| stored.record.clone())
                .ok_or_else(|| Error::not_found(format!("No entity with {}={}", key, value))),
            _ => Err(Error::argument("No parameter given for the query.")),
        }
    }

    fn list_project_content(
        &self,
        project_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        validate_uuid("project_id", project_id)?;
        self.list(EntityKind::Project, project_id, options)
    }

    fn list_folder_content(
        &self,
        folder_id: &str,
        options: &ListOptions,
    ) -> Result<Page<EntityRecord>, Error> {
        validate_uuid("folder", folder_id)?;
        self.list(EntityKind::Folder, folder_id, options)
    }

    fn create_folder(&self, name: &str, parent_id: &str) -> Result<EntityRecord, Error> {
        validate_uuid("parent", parent_id)?;
        let mut state = self.state();
        state.folder_creates += 1;
        state.insert(EntityKind::Folder, name, Some(parent_id), None)
    }

    fn create_file(
        &self,
        name: &str,
        content_type: &str,
        parent_id: &str,
    ) -> Result<EntityRecord, Error> {
        validate_uuid("parent", parent_id)?;
        let mut state = self.state();
        state.file_creates += 1;
        state.insert(EntityKind::File, name, Some(parent_id), Some(content_type))
    }

    fn upload_file_content(
        &self,
        file_id: &str,
        source: &Path,
        etag: Option<&str>,
    ) -> Result<String, Error> {
        validate_uuid("file_id", file_id)?;
        let content = std::fs::read(source)?;

        let mut state = self.state();
        let stored = state.get(file_id)?;
        if stored.record.entity_type != EntityKind::File {
            return Err(Error::not_found(format!("No file with id {}", file_id)));
        }
        if let Some(expected) = etag {
            if stored.etag.as_deref() != Some(expected) {
                return Err(Error::Service {
                    status: 412,
                    message: "Precondition Failed".to_string(),
                });
            }
        }

        state.etag_counter += 1;
        let new_etag = format!("\"{}\"", state.etag_counter);
        if let Some(stored) = state.entities.get_mut(file_id) {
            stored.content = Some(content);
            stored.etag = Some(new_etag.clone());
        }
        Ok(new_etag)
    }

    fn get_signed_url(&self, file_id: &str) -> Result<String, Error> {
        validate_uuid("file_id", file_id)?;
        let state = self.state();
        if state.get(file_id)?.record.entity_type != EntityKind::File {
            return Err(Error::not_found(format!("No file with id {}", file_id)));
        }
        Ok(format!("{}{}", SIGNED_URL_PREFIX, file_id))
    }

    fn download_signed_url(&self, signed_url: &str) -> Result<Box<dyn Read + Send>, Error> {
        let file_id = signed_url
            .strip_prefix(SIGNED_URL_PREFIX)
            .ok_or_else(|| Error::not_found(format!("Unknown signed url {}", signed_url)))?;
        let content = self.state().get(file_id)?.content.clone().unwrap_or_default();
        Ok(Box::new(Cursor::new(content)))
    }

    fn delete_file(&self, file_id: &str) -> Result<(), Error> {
        validate_uuid("file_id", file_id)?;
        let mut state = self.state();
        state.get(file_id)?;
        state.entities.remove(file_id);
        Ok(())
    }

    fn delete_folder(&self, folder_id: &str) -> Result<(), Error> {
        validate_uuid("folder", folder_id)?;
        let mut state = self.state();
        state.get(folder_id)?;
        state.remove_recursive(folder_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pagination_walks_children_by_name() {
        let gateway = InMemoryGateway::new().with_page_size(2);
        let project = gateway.add_project("p");
        for name in ["c", "a", "e", "b", "d"] {
            gateway.add_folder(&project, name);
        }

        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let result = gateway
                .list_project_content(&project, &ListOptions::page_by_name(page))
                .unwrap();
            names.extend(result.results.iter().map(|r| r.name.clone()));
            if !result.has_next() {
                break;
            }
            page += 1;
        }

        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(page, 3);
    }

    #[test]
    fn listing_filters_by_name_and_kind() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");
        gateway.add_folder(&project, "data");
        gateway.add_file(&project, "notes", b"");

        let folders = gateway
            .list_project_content(&project, &ListOptions::named("data", EntityKind::Folder))
            .unwrap();
        let files = gateway
            .list_project_content(&project, &ListOptions::named("data", EntityKind::File))
            .unwrap();

        assert_eq!(folders.count, 1);
        assert_eq!(files.count, 0);
    }

    #[test]
    fn folder_endpoint_rejects_projects() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");

        let err = gateway
            .list_folder_content(&project, &ListOptions::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn path_lookup() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");
        let folder = gateway.add_folder(&project, "data");

        let record = gateway
            .get_entity_by_query(&EntityQuery::Path("/p/data/".to_string()))
            .unwrap();
        assert_eq!(record.uuid, folder);

        let missing = gateway
            .get_entity_by_query(&EntityQuery::Path("/p/nope".to_string()))
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn metadata_lookup() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");
        gateway.set_metadata(&project, "collab", "42");

        let record = gateway
            .get_entity_by_query(&EntityQuery::Metadata {
                key: "collab".to_string(),
                value: "42".to_string(),
            })
            .unwrap();
        assert_eq!(record.uuid, project);
    }

    #[test]
    fn upload_then_download_through_signed_url() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");
        let file = gateway.create_file("a.txt", "text/plain", &project).unwrap();

        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"bytes").unwrap();
        let etag = gateway
            .upload_file_content(&file.uuid, source.path(), None)
            .unwrap();

        let stale = gateway.upload_file_content(&file.uuid, source.path(), Some("\"stale\""));
        assert!(matches!(stale, Err(Error::Service { status: 412, .. })));
        assert!(gateway
            .upload_file_content(&file.uuid, source.path(), Some(&etag))
            .is_ok());

        let url = gateway.get_signed_url(&file.uuid).unwrap();
        let mut content = Vec::new();
        gateway
            .download_signed_url(&url)
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"bytes");
        assert_eq!(gateway.create_calls(), 1);
    }

    #[test]
    fn delete_folder_is_recursive() {
        let gateway = InMemoryGateway::new();
        let project = gateway.add_project("p");
        let folder = gateway.add_folder(&project, "data");
        let file = gateway.add_file(&folder, "a", b"x");

        gateway.delete_folder(&folder).unwrap();

        assert!(gateway.record(&file).is_none());
        assert!(gateway.children(&project).is_empty());
    }
}
