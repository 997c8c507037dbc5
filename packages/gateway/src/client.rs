//! Path based operations over a [`StorageGateway`].
//!
//! Paths are slash-separated and absolute: `/project/folder/file`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::Error;
use crate::gateway::{EntityQuery, ListOptions, StorageGateway};
use crate::record::{EntityKind, EntityRecord};

/// Content is copied from download streams in pieces of this many bytes.
pub const CHUNK_SIZE: usize = 1024;

/// Convenience client addressing entities by path instead of UUID.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use docstore_gateway::{ApiClient, GatewayConfig, StorageClient};
///
/// let api = ApiClient::from_config(GatewayConfig::from_env()?)?;
/// let storage = StorageClient::new(Arc::new(api));
///
/// storage.mkdir("/my_project/results")?;
/// for name in storage.list("/my_project")? {
///     println!("{}", name);
/// }
/// ```
pub struct StorageClient {
    gateway: Arc<dyn StorageGateway>,
}

impl StorageClient {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn StorageGateway> {
        &self.gateway
    }

    fn lookup(&self, path: &str) -> Result<EntityRecord, Error> {
        self.gateway
            .get_entity_by_query(&EntityQuery::Path(path.to_string()))
    }

    /// Names directly under the project or folder at `path`, ordered by
    /// name. Folder names get a leading slash.
    pub fn list(&self, path: &str) -> Result<Vec<String>, Error> {
        validate_storage_path(path, true)?;
        let entity = self.lookup(path)?;
        if !entity.entity_type.is_container() {
            return Err(Error::argument(format!(
                "The entity type \"{}\" cannot be listed",
                entity.entity_type
            )));
        }

        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let partial = self.gateway.list_container_content(
                entity.entity_type,
                &entity.uuid,
                &ListOptions::page_by_name(page),
            )?;
            let more = partial.has_next();
            names.extend(partial.results.into_iter().map(|child| {
                if child.entity_type == EntityKind::Folder {
                    format!("/{}", child.name)
                } else {
                    child.name
                }
            }));
            if !more {
                break;
            }
            page += 1;
        }

        Ok(names)
    }

    /// Whether anything exists at `path`. Only a not-found answer counts
    /// as absent; other failures are returned.
    pub fn exists(&self, path: &str) -> Result<bool, Error> {
        validate_storage_path(path, true)?;
        match self.lookup(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The record of the container holding the entity at `path`.
    pub fn get_parent(&self, path: &str) -> Result<EntityRecord, Error> {
        validate_storage_path(path, false)?;
        let (parent, _) = split_last(path);
        self.lookup(&parent)
    }

    /// The path of the entity with identifier `entity_id`.
    pub fn path_of(&self, entity_id: &str) -> Result<String, Error> {
        self.gateway.get_entity_path(entity_id)
    }

    /// Create the folder at `path`. Its parent must exist.
    pub fn mkdir(&self, path: &str) -> Result<EntityRecord, Error> {
        validate_storage_path(path, false)?;
        let parent = self.get_parent(path)?;
        let (_, name) = split_last(path);
        let record = self.gateway.create_folder(&name, &parent.uuid)?;
        log::debug!("created folder {} ({})", path, record.uuid);
        Ok(record)
    }

    /// Upload the single file `local_file` as `dest_path`, whose last
    /// segment is the new file's name. Returns the created record and the
    /// content ETag.
    pub fn upload_file(
        &self,
        local_file: &Path,
        dest_path: &str,
        content_type: &str,
    ) -> Result<(EntityRecord, String), Error> {
        validate_storage_path(dest_path, false)?;
        if dest_path.ends_with('/') {
            return Err(Error::argument(
                "The destination path must end with the target file name",
            ));
        }
        if !local_file.is_file() {
            return Err(Error::argument(format!(
                "{} is not a regular file, directory upload is not supported here",
                local_file.display()
            )));
        }

        let parent = self.get_parent(dest_path)?;
        let (_, name) = split_last(dest_path);
        let record = self.gateway.create_file(&name, content_type, &parent.uuid)?;
        let etag = self
            .gateway
            .upload_file_content(&record.uuid, local_file, None)?;
        log::info!("uploaded {} to {}", local_file.display(), dest_path);
        Ok((record, etag))
    }

    /// Write the content of the file at `path` to `target`, replacing any
    /// existing file there. Returns the number of bytes written.
    pub fn download_file(&self, path: &str, target: &Path) -> Result<u64, Error> {
        validate_storage_path(path, true)?;
        let entity = self.lookup(path)?;
        if entity.entity_type != EntityKind::File {
            return Err(Error::argument("Only file entities can be downloaded"));
        }

        let signed_url = self.gateway.get_signed_url(&entity.uuid)?;
        let mut reader = self.gateway.download_signed_url(&signed_url)?;
        let mut output = File::create(target)?;
        let written = copy_in_chunks(&mut reader, &mut output)?;
        log::info!("downloaded {} to {}", path, target.display());
        Ok(written)
    }

    /// Delete the file or empty folder at `path`. Projects and non-empty
    /// folders are refused.
    pub fn delete(&self, path: &str) -> Result<(), Error> {
        validate_storage_path(path, false)?;
        let entity = self.lookup(path)?;

        match entity.entity_type {
            EntityKind::File => self.gateway.delete_file(&entity.uuid)?,
            kind => {
                let contents = self.gateway.list_container_content(
                    kind,
                    &entity.uuid,
                    &ListOptions::default(),
                )?;
                if contents.count > 0 || !contents.results.is_empty() {
                    return Err(Error::argument(
                        "Cannot delete a non-empty folder, empty it first",
                    ));
                }
                self.gateway.delete_folder(&entity.uuid)?;
            }
        }

        log::debug!("deleted {}", path);
        Ok(())
    }
}

/// Copy `reader` into `writer` [`CHUNK_SIZE`] bytes at a time, returning
/// the number of bytes copied.
pub fn copy_in_chunks(reader: &mut dyn Read, writer: &mut impl Write) -> io::Result<u64> {
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

fn validate_storage_path(path: &str, projects_allowed: bool) -> Result<(), Error> {
    if !path.starts_with('/') || path == "/" {
        return Err(Error::argument(
            "The path must start with a slash (/) and be longer than 1 character",
        ));
    }
    if !projects_allowed && path.split('/').filter(|s| !s.is_empty()).count() == 1 {
        return Err(Error::argument(
            "This operation does not accept projects in the path",
        ));
    }
    Ok(())
}

/// `/a/b/c` becomes `("/a/b", "c")`.
fn split_last(path: &str) -> (String, String) {
    let mut steps: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let last = steps.pop().unwrap_or_default().to_string();
    (format!("/{}", steps.join("/")), last)
}
