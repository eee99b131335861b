//! Request and response messages of the RPC surface.
//!
//! Request ids are raw bytes exactly as they arrive on the wire; handlers
//! decode them with [`crate::Id::from_bytes`] and reject malformed input with
//! `InvalidArgument`. Mutations answer with minimal acknowledgements, other
//! clients learn about the change through the sync streams.

use serde::{Deserialize, Serialize};

use crate::entity::{
    Collection, CollectionItem, Endpoint, Environment, Example, ExampleResponse, ItemKind, Role,
    User, Workspace, WorkspaceMember,
};
use crate::id::Id;

// ===== Workspace =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceListRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceListResponse {
    pub items: Vec<Workspace>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceCreateRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceCreateResponse {
    pub workspace_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceUpdateRequest {
    pub workspace_id: Vec<u8>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceDeleteRequest {
    pub workspace_id: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceMemberListRequest {
    pub workspace_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMemberListResponse {
    pub items: Vec<WorkspaceMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMemberCreateRequest {
    pub workspace_id: Vec<u8>,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMemberCreateResponse {
    pub member_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceMemberDeleteRequest {
    pub workspace_id: Vec<u8>,
    pub user_id: Vec<u8>,
}

// ===== Collection =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionListRequest {
    pub workspace_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionListResponse {
    pub items: Vec<Collection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionCreateRequest {
    pub workspace_id: Vec<u8>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCreateResponse {
    pub collection_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionUpdateRequest {
    pub collection_id: Vec<u8>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionDeleteRequest {
    pub collection_id: Vec<u8>,
}

// ===== Collection items =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItemListRequest {
    pub collection_id: Vec<u8>,
    /// Collection item id (or legacy folder id) of the parent; root when absent
    pub parent_folder_id: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItemListResponse {
    pub items: Vec<CollectionItem>,
}

/// Where to place a moved item relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MovePosition {
    #[default]
    Unspecified,
    Before,
    After,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItemMoveRequest {
    /// Collection item id or legacy id of the item to move
    pub item_id: Vec<u8>,
    /// Collection the item currently lives in
    pub collection_id: Vec<u8>,
    pub target_collection_id: Option<Vec<u8>>,
    pub target_parent_folder_id: Option<Vec<u8>>,
    pub target_item_id: Option<Vec<u8>>,
    pub position: MovePosition,
    pub kind: ItemKind,
    /// Advisory only; never causes a rejection
    pub target_kind: Option<ItemKind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItemMoveResponse {}

// ===== Folder =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderCreateRequest {
    pub collection_id: Vec<u8>,
    pub parent_folder_id: Option<Vec<u8>>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderCreateResponse {
    pub folder_id: Id,
    pub collection_item_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderUpdateRequest {
    pub folder_id: Vec<u8>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderDeleteRequest {
    pub folder_id: Vec<u8>,
}

// ===== Endpoint =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointGetRequest {
    pub endpoint_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointGetResponse {
    pub endpoint: Endpoint,
    pub default_example_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointCreateRequest {
    pub collection_id: Vec<u8>,
    pub parent_folder_id: Option<Vec<u8>>,
    pub name: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointCreateResponse {
    pub endpoint_id: Id,
    pub collection_item_id: Id,
    pub default_example_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointUpdateRequest {
    pub endpoint_id: Vec<u8>,
    pub name: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointDeleteRequest {
    pub endpoint_id: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointDuplicateRequest {
    pub endpoint_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDuplicateResponse {
    pub endpoint_id: Id,
    pub collection_item_id: Id,
}

// ===== Example & response =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleListRequest {
    pub endpoint_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleListResponse {
    pub items: Vec<Example>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleCreateRequest {
    pub endpoint_id: Vec<u8>,
    pub name: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleCreateResponse {
    pub example_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleUpdateRequest {
    pub example_id: Vec<u8>,
    pub name: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleDeleteRequest {
    pub example_id: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseListRequest {
    pub example_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseListResponse {
    pub items: Vec<ExampleResponse>,
}

// ===== Environment =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentListRequest {
    pub workspace_id: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentListResponse {
    pub items: Vec<Environment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentCreateRequest {
    pub workspace_id: Vec<u8>,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentCreateResponse {
    pub environment_id: Id,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentUpdateRequest {
    pub environment_id: Vec<u8>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDeleteRequest {
    pub environment_id: Vec<u8>,
}

// ===== User =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGetRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGetResponse {
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCreateRequest {
    pub email: String,
    pub name: String,
}

/// Shared empty acknowledgement for mutations without a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

// ===== Sync =====

/// Opens the workspace change stream of the calling user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSyncRequest {}

/// Opens the collection change stream across the caller's workspaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSyncRequest {}

/// Opens the item change stream of one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItemSyncRequest {
    pub collection_id: Vec<u8>,
}

/// Opens the environment change stream across the caller's workspaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSyncRequest {}
