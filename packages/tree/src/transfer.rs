//! Moving whole subtrees between the local disk and the storage service.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use docstore_gateway::{copy_in_chunks, EntityQuery, EntityRecord, ListOptions, StorageGateway};

use crate::content_type::guess_content_type;
use crate::entity::{EntityId, EntityTree};
use crate::error::Error;

/// The service container an upload goes into, given either by path or by
/// identifier. Exactly one of the two must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destination {
    path: Option<String>,
    uuid: Option<String>,
}

impl Destination {
    pub fn new(path: Option<String>, uuid: Option<String>) -> Self {
        Self { path, uuid }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::new(Some(path.into()), None)
    }

    pub fn uuid(uuid: impl Into<String>) -> Self {
        Self::new(None, Some(uuid.into()))
    }

    /// Checks that exactly one target is set, locally.
    fn validate(&self) -> Result<(), Error> {
        match (&self.path, &self.uuid) {
            (Some(path), None) if path.trim_matches('/').is_empty() => {
                Err(Error::argument("The destination path must name a container"))
            }
            (Some(_), None) => Ok(()),
            (None, Some(uuid)) if uuid::Uuid::parse_str(uuid).is_err() => Err(Error::argument(
                format!("'{}' is not a valid destination UUID", uuid),
            )),
            (None, Some(_)) => Ok(()),
            _ => Err(Error::argument(
                "Exactly one of a destination path or a destination UUID must be given",
            )),
        }
    }

    /// The destination's record, plus its service path when it was given by
    /// path.
    fn resolve(
        &self,
        gateway: &dyn StorageGateway,
    ) -> Result<(EntityRecord, Option<String>), Error> {
        self.validate()?;
        match (&self.path, &self.uuid) {
            (Some(path), _) => {
                let record = gateway.get_entity_by_query(&EntityQuery::Path(path.clone()))?;
                Ok((record, Some(format!("/{}", path.trim_matches('/')))))
            }
            (None, Some(uuid)) => Ok((gateway.get_entity_details(uuid)?, None)),
            (None, None) => Err(Error::argument("No destination given")),
        }
    }
}

impl EntityTree {
    /// Create the disk-backed subtree rooted at `id` inside `destination`.
    ///
    /// Fails with [`Error::Upload`] when the destination already holds an
    /// entity with the same name and kind, before anything is created. Every
    /// uploaded node becomes remote-backed in place. A failure part way
    /// leaves the nodes uploaded so far remote-backed.
    pub fn upload(&mut self, id: EntityId, destination: Destination) -> Result<(), Error> {
        let gateway = self.gateway()?;
        let entity = self.get(id)?;
        if entity.is_remote() {
            return Err(Error::invalid_operation(format!(
                "{} is already stored remotely, cannot re-upload it",
                entity
            )));
        }
        let name = entity.name().to_string();
        let kind = entity.kind();

        let (target, target_path) = destination.resolve(gateway.as_ref())?;
        if !target.entity_type.is_container() {
            return Err(Error::argument(format!(
                "The destination {} is a {}, uploads need a project or a folder",
                target.uuid, target.entity_type
            )));
        }

        let existing = gateway.list_container_content(
            target.entity_type,
            &target.uuid,
            &ListOptions::named(name.as_str(), kind),
        )?;
        if existing.count > 0 || !existing.results.is_empty() {
            return Err(Error::Upload {
                message: format!(
                    "an entity with same name and type already exists: {} {} in {}",
                    kind, name, target.name
                ),
            });
        }

        if kind.is_container() && self.get(id)?.children().is_empty() {
            self.explore_subtree(id)?;
        }

        self.walk(id, |tree, current| {
            let parent = if current == id {
                Some((target.uuid.clone(), target_path.clone()))
            } else {
                None
            };
            tree.upload_node(gateway.as_ref(), current, parent, &target.uuid)
        })?;

        log::info!("uploaded {} into {}", name, target.name);
        Ok(())
    }

    /// Upload one node whose parent, if any, was handled already.
    ///
    /// `root_parent` is set for the upload root only and names the
    /// destination with its path.
    fn upload_node(
        &mut self,
        gateway: &dyn StorageGateway,
        id: EntityId,
        root_parent: Option<(String, Option<String>)>,
        fallback_parent: &str,
    ) -> Result<(), Error> {
        let entity = self.get(id)?;
        if entity.is_remote() {
            return Ok(());
        }

        let (parent_id, parent_path) = match root_parent {
            Some(root_parent) => root_parent,
            None => match entity.parent() {
                Some(parent) => {
                    let parent = self.get(parent)?;
                    (
                        parent.remote_id().unwrap_or(fallback_parent).to_string(),
                        parent.remote_path().map(str::to_string),
                    )
                }
                None => (fallback_parent.to_string(), None),
            },
        };

        let name = entity.name().to_string();
        let source = entity.disk_source().map(Path::to_path_buf);

        if entity.kind().is_container() {
            let record = gateway.create_folder(&name, &parent_id)?;
            log::debug!("created folder {} ({})", name, record.uuid);
            self.promote(id, record, parent_path.as_deref())?;
        } else {
            let source = source.ok_or_else(|| {
                Error::invalid_operation(format!("{} has no local source to upload", name))
            })?;
            let content_type = guess_content_type(&name);
            let record = gateway.create_file(&name, content_type, &parent_id)?;
            let file_id = record.uuid.clone();
            log::debug!("created file {} ({}, {})", name, file_id, content_type);
            self.promote(id, record, parent_path.as_deref())?;
            gateway.upload_file_content(&file_id, &source, None)?;
        }

        Ok(())
    }

    /// Write the remote subtree rooted at `id` below `destination`, the
    /// current directory by default.
    ///
    /// Directories are created as needed and existing files are never
    /// overwritten: a file already present at its target fails with
    /// [`io::ErrorKind::AlreadyExists`].
    pub fn download(&mut self, id: EntityId, destination: Option<&Path>) -> Result<(), Error> {
        let gateway = self.gateway()?;
        let entity = self.get(id)?;
        if !entity.is_remote() {
            return Err(Error::invalid_operation(format!(
                "{} only exists on disk, upload it before downloading",
                entity
            )));
        }
        let name = entity.name().to_string();

        if entity.kind().is_container() && entity.children().is_empty() {
            self.explore_subtree(id)?;
        }

        let destination = match destination {
            Some(destination) => destination.to_path_buf(),
            None => std::env::current_dir()?,
        };

        self.walk(id, |tree, current| {
            tree.write_node(gateway.as_ref(), current, id, &destination)
        })?;

        log::info!("downloaded {} to {}", name, destination.display());
        Ok(())
    }

    fn write_node(
        &mut self,
        gateway: &dyn StorageGateway,
        id: EntityId,
        root: EntityId,
        destination: &Path,
    ) -> Result<(), Error> {
        let entity = self.get(id)?;

        let base: PathBuf = if id == root {
            destination.to_path_buf()
        } else {
            entity
                .parent()
                .map(|parent| self.get(parent))
                .transpose()?
                .and_then(|parent| parent.disk_location())
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    Error::invalid_operation(format!("The parent of {} is not on disk", entity))
                })?
        };

        let mut components = Path::new(entity.name()).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::argument(format!(
                "'{}' cannot be used as a file name",
                entity.name()
            )));
        }
        let target = base.join(entity.name());

        if entity.kind().is_container() {
            fs::create_dir(&target)?;
            log::debug!("created {}", target.display());
        } else {
            if target.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", target.display()),
                )
                .into());
            }
            let file_id = entity.remote_id().ok_or_else(|| {
                Error::invalid_operation(format!("{} is not stored remotely", entity))
            })?;

            let signed_url = gateway.get_signed_url(file_id)?;
            let mut reader = gateway.download_signed_url(&signed_url)?;
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)?;
            let written = copy_in_chunks(&mut reader, &mut file)?;
            log::debug!("wrote {} bytes to {}", written, target.display());
        }

        self.get_mut(id)?.disk_location = Some(target);
        Ok(())
    }
}
