//! Entities shared between the backend and its clients.
//!
//! Timestamps are Unix milliseconds. Ids are [`Id`] values; request messages
//! carry raw id bytes instead so that malformed input can be rejected at the
//! boundary.

use serde::{Deserialize, Serialize};

use crate::id::Id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Id,
    pub name: String,
    pub updated_at: i64,
    pub collection_count: i64,
    pub flow_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<Vec<u8>>,
    pub provider_type: ProviderType,
    pub provider_id: Option<String>,
    pub external_id: Option<String>,
    pub name: String,
    pub image: Option<String>,
}

/// How a user authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProviderType {
    #[default]
    Local,
    Magic,
    Google,
}

impl ProviderType {
    pub fn as_i64(self) -> i64 {
        match self {
            ProviderType::Local => 0,
            ProviderType::Magic => 1,
            ProviderType::Google => 2,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ProviderType::Local),
            1 => Some(ProviderType::Magic),
            2 => Some(ProviderType::Google),
            _ => None,
        }
    }
}

/// Membership role, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_i64(self) -> i64 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
            Role::Owner => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Role::User),
            2 => Some(Role::Admin),
            3 => Some(Role::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub id: Id,
    pub workspace_id: Id,
    pub user_id: Id,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub updated_at: i64,
}

/// Legacy folder row. Ordering never lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Id,
    pub collection_id: Id,
    pub parent_id: Option<Id>,
    pub name: String,
}

/// Legacy endpoint row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Id,
    pub collection_id: Id,
    pub folder_id: Option<Id>,
    pub name: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub id: Id,
    pub endpoint_id: Id,
    pub collection_id: Id,
    pub is_default: bool,
    pub name: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleResponse {
    pub id: Id,
    pub example_id: Id,
    pub status: i64,
    pub body: Vec<u8>,
    pub duration_ms: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub description: String,
    pub is_global: bool,
    pub updated_at: i64,
}

/// Discriminator of a collection item.
///
/// `Unspecified` only ever appears in requests; stored rows are always
/// `Folder` or `Endpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemKind {
    #[default]
    Unspecified,
    Folder,
    Endpoint,
}

/// One entry of the ordered collection tree.
///
/// `parent_folder_id` is the id of the parent folder's collection item, not
/// the legacy folder id. Exactly one of `folder_id` / `endpoint_id` is set,
/// matching `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: Id,
    pub collection_id: Id,
    pub parent_folder_id: Option<Id>,
    pub kind: ItemKind,
    pub folder_id: Option<Id>,
    pub endpoint_id: Option<Id>,
    pub name: String,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
}

impl CollectionItem {
    /// Id of the wrapped legacy row.
    pub fn legacy_id(&self) -> Option<Id> {
        self.folder_id.or(self.endpoint_id)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}
