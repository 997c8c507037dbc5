//! Entities and the arena that owns them.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use docstore_gateway::{EntityKind, EntityQuery, EntityRecord, StorageGateway};
use serde_json::Value;

use crate::error::Error;

static TREE_COUNTER: AtomicU64 = AtomicU64::new(0);

const REQUIRED_KEYS: [&str; 6] = [
    "entity_type",
    "uuid",
    "name",
    "description",
    "created_by",
    "modified_by",
];

/// Handle to an entity inside one [`EntityTree`].
///
/// Handles are cheap to copy and only valid for the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    tree: u64,
    index: usize,
}

/// Where an entity's authoritative state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Exists in the storage service.
    Remote { id: String },
    /// Read from the local filesystem and not uploaded yet.
    Disk { source: PathBuf },
}

/// A project, folder or file, either in the storage service or on disk.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) kind: EntityKind,
    pub(crate) provenance: Provenance,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) modified_by: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) remote_path: Option<String>,
    /// Where the last download wrote this entity.
    pub(crate) disk_location: Option<PathBuf>,
}

impl Entity {
    fn from_record(record: EntityRecord) -> Self {
        Self {
            kind: record.entity_type,
            provenance: Provenance::Remote { id: record.uuid },
            remote_path: Some(record.name.clone()),
            name: record.name,
            description: record.description,
            created_by: record.created_by,
            modified_by: record.modified_by,
            content_type: record.content_type,
            children: Vec::new(),
            parent: None,
            disk_location: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// The service identifier, `None` for disk-backed entities.
    pub fn remote_id(&self) -> Option<&str> {
        match &self.provenance {
            Provenance::Remote { id } => Some(id),
            Provenance::Disk { .. } => None,
        }
    }

    /// The local path a disk-backed entity was read from.
    pub fn disk_source(&self) -> Option<&Path> {
        match &self.provenance {
            Provenance::Disk { source } => Some(source),
            Provenance::Remote { .. } => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.provenance, Provenance::Remote { .. })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn modified_by(&self) -> Option<&str> {
        self.modified_by.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Children found by the last exploration, in discovery order.
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Slash-separated location in the service, when known.
    pub fn remote_path(&self) -> Option<&str> {
        self.remote_path.as_deref()
    }

    pub fn disk_location(&self) -> Option<&Path> {
        self.disk_location.as_deref()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}: {}[{}])",
            self.remote_id().unwrap_or("None"),
            self.name,
            self.kind
        )
    }
}

/// Owns a forest of entities and the gateway used to reach the service.
///
/// Entities are stored in an arena and refer to each other through
/// [`EntityId`] handles; a child's `parent` is a plain handle, so the tree
/// holds no reference cycles. Re-exploring a container replaces its
/// `children` list, the previous children stay in the arena unreachable.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use docstore_gateway::{ApiClient, GatewayConfig};
/// use docstore_tree::EntityTree;
///
/// let gateway = ApiClient::from_config(GatewayConfig::from_env()?)?;
/// let mut tree = EntityTree::with_gateway(Arc::new(gateway));
///
/// let project = tree.from_path("/my_project")?;
/// for hit in tree.search_subtree(project, r"\.ipynb$")? {
///     println!("{}", tree.get(hit)?);
/// }
/// ```
pub struct EntityTree {
    tag: u64,
    nodes: Vec<Entity>,
    gateway: Option<Arc<dyn StorageGateway>>,
}

impl EntityTree {
    /// A tree without a gateway, limited to disk-backed entities.
    pub fn new() -> Self {
        Self {
            tag: TREE_COUNTER.fetch_add(1, Ordering::SeqCst),
            nodes: Vec::new(),
            gateway: None,
        }
    }

    pub fn with_gateway(gateway: Arc<dyn StorageGateway>) -> Self {
        let mut tree = Self::new();
        tree.gateway = Some(gateway);
        tree
    }

    /// Bind or replace the gateway used by remote operations.
    pub fn bind_gateway(&mut self, gateway: Arc<dyn StorageGateway>) {
        self.gateway = Some(gateway);
    }

    pub(crate) fn gateway(&self) -> Result<Arc<dyn StorageGateway>, Error> {
        self.gateway.clone().ok_or(Error::GatewayUnbound)
    }

    /// Number of entities ever created in this tree, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check(&self, id: EntityId) -> Result<(), Error> {
        if id.tree != self.tag {
            return Err(Error::argument(format!(
                "{:?} belongs to a different entity tree",
                id
            )));
        }
        if id.index >= self.nodes.len() {
            return Err(Error::UnknownEntity(id));
        }
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Result<&Entity, Error> {
        self.check(id)?;
        Ok(&self.nodes[id.index])
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity, Error> {
        self.check(id)?;
        Ok(&mut self.nodes[id.index])
    }

    fn push(&mut self, entity: Entity) -> EntityId {
        self.nodes.push(entity);
        EntityId {
            tree: self.tag,
            index: self.nodes.len() - 1,
        }
    }

    /// Point `child` at `parent`. Both must belong to this tree.
    ///
    /// Only the back-link is set; `parent`'s children are left alone.
    pub fn set_parent(&mut self, child: EntityId, parent: EntityId) -> Result<(), Error> {
        self.check(parent)?;
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Link a freshly created entity below `parent`.
    pub(crate) fn attach(&mut self, parent: EntityId, child: EntityId) -> Result<(), Error> {
        let parent_path = self.get(parent)?.remote_path.clone();

        let entity = self.get_mut(child)?;
        entity.parent = Some(parent);
        if entity.is_remote() {
            entity.remote_path = parent_path.map(|path| join_remote_path(&path, &entity.name));
        }

        self.get_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Build a remote-backed entity from a service record given as JSON.
    ///
    /// The mapping must contain `entity_type`, `uuid`, `name`,
    /// `description`, `created_by` and `modified_by`; `content_type` is
    /// optional.
    pub fn from_record(&mut self, value: &Value) -> Result<EntityId, Error> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::argument("An entity record must be a mapping"))?;

        if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !map.contains_key(**key)) {
            return Err(Error::argument(format!(
                "The entity record has no '{}' key",
                missing
            )));
        }

        let record: EntityRecord = serde_json::from_value(value.clone())
            .map_err(|e| Error::argument(format!("Malformed entity record: {}", e)))?;

        Ok(self.from_entity_record(record))
    }

    pub fn from_entity_record(&mut self, record: EntityRecord) -> EntityId {
        self.push(Entity::from_record(record))
    }

    /// Look `uuid` up in the service.
    pub fn from_uuid(&mut self, uuid: &str) -> Result<EntityId, Error> {
        if uuid::Uuid::parse_str(uuid).is_err() {
            return Err(Error::argument(format!("'{}' is not a valid UUID", uuid)));
        }
        let gateway = self.gateway()?;

        let record = gateway.get_entity_details(uuid)?;
        Ok(self.from_entity_record(record))
    }

    /// Resolve a slash-separated service path such as `/project/folder`.
    pub fn from_path(&mut self, path: &str) -> Result<EntityId, Error> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::argument("An entity path must name at least a project"));
        }
        let gateway = self.gateway()?;

        let record = gateway.get_entity_by_query(&EntityQuery::Path(path.to_string()))?;
        let id = self.from_entity_record(record);
        self.get_mut(id)?.remote_path = Some(format!("/{}", trimmed));
        Ok(id)
    }

    /// Build a disk-backed entity from an absolute path to a directory or a
    /// regular file.
    pub fn from_disk(&mut self, location: impl AsRef<Path>) -> Result<EntityId, Error> {
        let location = location.as_ref();
        if location.as_os_str().is_empty() {
            return Err(Error::argument("The path must not be empty"));
        }
        if !location.is_absolute() {
            return Err(Error::argument(format!(
                "The path must be given as an absolute path: {}",
                location.display()
            )));
        }

        // Collecting the components drops trailing separators and `.` parts.
        let normalized: PathBuf = location.components().collect();
        let metadata = fs::metadata(&normalized).map_err(|_| {
            Error::argument(format!(
                "The given path does not exist on the disk: {}",
                normalized.display()
            ))
        })?;

        let kind = if metadata.is_dir() {
            EntityKind::Folder
        } else if metadata.is_file() {
            EntityKind::File
        } else {
            return Err(Error::argument(
                "Only regular files and directories are supported",
            ));
        };

        let name = match normalized.components().next_back() {
            Some(Component::Normal(name)) => name
                .to_str()
                .ok_or_else(|| {
                    Error::argument(format!(
                        "{} is not valid UTF-8 and cannot be uploaded under its name",
                        normalized.display()
                    ))
                })?
                .to_string(),
            _ => {
                return Err(Error::argument(format!(
                    "{} has no name to upload under",
                    normalized.display()
                )))
            }
        };

        Ok(self.push(Entity {
            kind,
            provenance: Provenance::Disk { source: normalized },
            name,
            description: None,
            created_by: None,
            modified_by: None,
            content_type: None,
            children: Vec::new(),
            parent: None,
            remote_path: None,
            disk_location: None,
        }))
    }

    /// Swap a disk-backed entity for the service record created from it.
    pub(crate) fn promote(
        &mut self,
        id: EntityId,
        record: EntityRecord,
        parent_path: Option<&str>,
    ) -> Result<(), Error> {
        let entity = self.get_mut(id)?;
        entity.provenance = Provenance::Remote { id: record.uuid };
        entity.description = record.description;
        entity.created_by = record.created_by;
        entity.modified_by = record.modified_by;
        entity.content_type = record.content_type;
        entity.remote_path = parent_path.map(|path| join_remote_path(path, &entity.name));
        Ok(())
    }
}

impl Default for EntityTree {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn join_remote_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}
