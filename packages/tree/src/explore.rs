//! Lazy discovery of children and search over explored subtrees.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use docstore_gateway::ListOptions;
use regex::Regex;

use crate::entity::{EntityId, EntityTree, Provenance};
use crate::error::Error;

impl EntityTree {
    /// Replace the cached children of a project or folder with its current
    /// direct children.
    ///
    /// Remote containers are listed page by page, ordered by name, until the
    /// service reports no further page. Disk containers list their directory
    /// entries, also ordered by name. Symbolic links are only followed to
    /// regular files; links to directories, dangling links and special files
    /// are left out.
    pub fn explore_children(&mut self, id: EntityId) -> Result<(), Error> {
        let entity = self.get(id)?;
        if !entity.kind().is_container() {
            return Err(Error::invalid_operation(format!(
                "{} is a file, only projects and folders have children",
                entity
            )));
        }
        let kind = entity.kind();
        let provenance = entity.provenance().clone();

        self.get_mut(id)?.children.clear();

        match provenance {
            Provenance::Remote { id: remote_id } => {
                let gateway = self.gateway()?;
                let mut page = 1;
                loop {
                    let partial = gateway.list_container_content(
                        kind,
                        &remote_id,
                        &ListOptions::page_by_name(page),
                    )?;
                    let more = partial.has_next();
                    for record in partial.results {
                        let child = self.from_entity_record(record);
                        self.attach(id, child)?;
                    }
                    if !more {
                        break;
                    }
                    page += 1;
                }
                log::debug!("explored {} remote page(s) below {}", page, remote_id);
            }
            Provenance::Disk { source } => {
                let mut entries: Vec<PathBuf> = fs::read_dir(&source)?
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<Result<_, _>>()?;
                entries.sort();

                for path in entries {
                    if !is_explorable(&path)? {
                        log::debug!("skipping {}", path.display());
                        continue;
                    }
                    let child = self.from_disk(&path)?;
                    self.attach(id, child)?;
                }
                log::debug!("explored {}", source.display());
            }
        }

        Ok(())
    }

    /// Explore every container below `id`, refreshing the whole subtree.
    /// Does nothing on files.
    ///
    /// Containers are taken from a pending list: each newly discovered
    /// container is put at the front and the next one comes from the back.
    pub fn explore_subtree(&mut self, id: EntityId) -> Result<(), Error> {
        if !self.get(id)?.kind().is_container() {
            return Ok(());
        }
        self.get_mut(id)?.children.clear();

        let mut pending = VecDeque::from([id]);
        while let Some(current) = pending.pop_back() {
            self.explore_children(current)?;
            for &child in self.get(current)?.children() {
                if self.get(child)?.kind().is_container() {
                    pending.push_front(child);
                }
            }
        }

        Ok(())
    }

    /// Every entity in the subtree of `id`, `id` included, whose name
    /// matches the regular expression `pattern` anywhere.
    ///
    /// An unexplored container is explored first. Hits are handles into this
    /// tree and keep their parent and children links.
    pub fn search_subtree(&mut self, id: EntityId, pattern: &str) -> Result<Vec<EntityId>, Error> {
        let entity = self.get(id)?;
        if !entity.kind().is_container() {
            return Err(Error::invalid_operation(format!(
                "You can only search in projects and folders, not in {}",
                entity
            )));
        }
        let regex = Regex::new(pattern)
            .map_err(|e| Error::argument(format!("Invalid search pattern: {}", e)))?;

        if entity.children().is_empty() {
            self.explore_subtree(id)?;
        }

        let mut results = Vec::new();
        self.walk(id, |tree, current| {
            if regex.is_match(tree.get(current)?.name()) {
                results.push(current);
            }
            Ok(())
        })?;

        Ok(results)
    }
}

/// Whether a directory entry becomes a child during disk discovery.
fn is_explorable(path: &Path) -> Result<bool, Error> {
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_symlink() {
        return Ok(fs::metadata(path).is_ok_and(|target| target.is_file()));
    }
    Ok(file_type.is_dir() || file_type.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_gateway::{EntityKind, InMemoryGateway};
    use std::sync::Arc;

    fn names(tree: &EntityTree, ids: &[EntityId]) -> Vec<String> {
        ids.iter()
            .map(|id| tree.get(*id).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn explore_children_pages_through_results() {
        let gateway = Arc::new(InMemoryGateway::new().with_page_size(2));
        let project = gateway.add_project("p");
        for name in ["e", "d", "c", "b", "a"] {
            gateway.add_file(&project, name, b"");
        }
        let mut tree = EntityTree::with_gateway(gateway.clone());
        let root = tree.from_uuid(&project).unwrap();

        tree.explore_children(root).unwrap();

        let children = tree.get(root).unwrap().children().to_vec();
        assert_eq!(names(&tree, &children), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(gateway.list_calls(), 3);
    }

    #[test]
    fn explore_children_is_idempotent() {
        let gateway = Arc::new(InMemoryGateway::new());
        let project = gateway.add_project("p");
        gateway.add_folder(&project, "f");
        gateway.add_file(&project, "g", b"");
        let mut tree = EntityTree::with_gateway(gateway);
        let root = tree.from_uuid(&project).unwrap();

        tree.explore_children(root).unwrap();
        let first = names(&tree, tree.get(root).unwrap().children());
        tree.explore_children(root).unwrap();
        let second = names(&tree, tree.get(root).unwrap().children());

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn children_point_back_and_carry_paths() {
        let gateway = Arc::new(InMemoryGateway::new());
        let project = gateway.add_project("p");
        gateway.add_folder(&project, "f");
        let mut tree = EntityTree::with_gateway(gateway);
        let root = tree.from_path("/p/").unwrap();

        tree.explore_children(root).unwrap();

        let child = tree.get(root).unwrap().children()[0];
        let entity = tree.get(child).unwrap();
        assert_eq!(entity.parent(), Some(root));
        assert_eq!(entity.kind(), EntityKind::Folder);
        assert_eq!(entity.remote_path(), Some("/p/f"));
    }

    #[test]
    fn explore_children_rejects_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut tree = EntityTree::new();
        let id = tree.from_disk(file.path()).unwrap();

        assert!(matches!(
            tree.explore_children(id),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(matches!(
            tree.search_subtree(id, "x"),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(tree.explore_subtree(id).is_ok());
    }

    #[test]
    fn remote_exploration_needs_a_gateway() {
        let mut tree = EntityTree::new();
        let root = tree
            .from_record(&serde_json::json!({
                "entity_type": "project",
                "uuid": "2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab",
                "name": "p",
                "description": "",
                "created_by": "1",
                "modified_by": "1"
            }))
            .unwrap();

        assert!(matches!(
            tree.explore_children(root),
            Err(Error::GatewayUnbound)
        ));
    }

    #[test]
    fn explore_subtree_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A");
        fs::create_dir_all(a.join("B")).unwrap();
        fs::write(a.join("B/D"), b"d").unwrap();
        fs::write(a.join("C"), b"c").unwrap();

        let mut tree = EntityTree::new();
        let root = tree.from_disk(&a).unwrap();
        tree.explore_subtree(root).unwrap();

        let children = tree.get(root).unwrap().children().to_vec();
        assert_eq!(names(&tree, &children), vec!["B", "C"]);
        let grandchildren = tree.get(children[0]).unwrap().children();
        assert_eq!(names(&tree, grandchildren), vec!["D"]);
        assert!(tree.get(children[1]).unwrap().children().is_empty());
    }

    #[test]
    fn search_includes_matching_root_and_skips_non_matches() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("folder_A");
        fs::create_dir_all(a.join("folder_B")).unwrap();
        fs::write(a.join("file_C"), b"").unwrap();

        let mut tree = EntityTree::new();
        let root = tree.from_disk(&a).unwrap();
        let hits = tree.search_subtree(root, "folder").unwrap();

        assert_eq!(names(&tree, &hits), vec!["folder_A", "folder_B"]);
        assert_eq!(tree.get(hits[1]).unwrap().parent(), Some(root));
    }

    #[test]
    fn search_rejects_invalid_patterns_before_exploring() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x"), b"").unwrap();
        let mut tree = EntityTree::new();
        let root = tree.from_disk(dir.path()).unwrap();

        assert!(matches!(
            tree.search_subtree(root, "(unclosed"),
            Err(Error::Argument { .. })
        ));
        assert!(tree.get(root).unwrap().children().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn disk_exploration_does_not_follow_directory_links() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("f.txt"), b"f").unwrap();
        symlink(&root, root.join("loop")).unwrap();
        symlink(root.join("f.txt"), root.join("g.txt")).unwrap();
        symlink(root.join("missing"), root.join("dangling")).unwrap();

        let mut tree = EntityTree::new();
        let id = tree.from_disk(&root).unwrap();
        tree.explore_subtree(id).unwrap();

        let children = tree.get(id).unwrap().children().to_vec();
        assert_eq!(names(&tree, &children), vec!["f.txt", "g.txt"]);
        assert_eq!(tree.len(), 3);
    }
}
