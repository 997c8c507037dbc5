//! Records exchanged with the storage service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a stored entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Folder,
    File,
}

impl EntityKind {
    /// Projects and folders own children, files never do.
    pub fn is_container(self) -> bool {
        matches!(self, EntityKind::Project | EntityKind::Folder)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Folder => "folder",
            EntityKind::File => "file",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity as described by the service.
///
/// ```json
/// {
///     "entity_type": "file",
///     "uuid": "e2c25c1b-f6a9-4cf6-b8d2-271e628a9a56",
///     "name": "myfile",
///     "description": "",
///     "created_by": "303447",
///     "modified_by": "303447",
///     "content_type": "plain/text",
///     "parent": "3abd8742-d069-44cf-a66b-2370df74a682"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRecord {
    pub entity_type: EntityKind,
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_parses_service_payload() {
        let record: EntityRecord = serde_json::from_value(json!({
            "created_by": "123456",
            "created_on": "2017-05-04T11:22:01.779536Z",
            "description": "Awesome entity",
            "entity_type": "folder",
            "modified_by": "123457",
            "modified_on": "2017-05-04T11:22:01.779590Z",
            "name": "Foo",
            "parent": "766cde4c-e452-49e0-a517-6ddd15c9494b",
            "uuid": "2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab",
            "collab_id": 2271
        }))
        .unwrap();

        assert_eq!(record.entity_type, EntityKind::Folder);
        assert_eq!(record.name, "Foo");
        assert_eq!(record.description.as_deref(), Some("Awesome entity"));
        assert_eq!(record.content_type, None);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = serde_json::from_value::<EntityRecord>(json!({
            "entity_type": "symlink",
            "uuid": "2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab",
            "name": "Foo"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn page_continuation() {
        let page: Page<EntityRecord> = serde_json::from_value(json!({
            "count": 0,
            "next": "https://service/folder/x/children/?page=2",
            "previous": null,
            "results": []
        }))
        .unwrap();
        assert!(page.has_next());
    }

    #[test]
    fn container_kinds() {
        assert!(EntityKind::Project.is_container());
        assert!(EntityKind::Folder.is_container());
        assert!(!EntityKind::File.is_container());
        assert_eq!(EntityKind::File.to_string(), "file");
    }
}
