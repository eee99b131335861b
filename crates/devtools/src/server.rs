//! Process-wide wiring of the database, the streamers and every service.
//!
//! The transport in front of the services (socket listener, auth middleware)
//! is mounted by the host; it builds one [`RpcContext`](crate::api::RpcContext)
//! per request and calls the service methods.

use std::path::Path;

use anyhow::{Context, Result};

use crate::api::{
    CollectionItemService, CollectionService, EndpointService, EnvironmentService, ExampleService,
    FolderService, ServiceState, UserService, WorkspaceService,
};
use crate::config::ServerConfig;
use crate::storage::Database;
use crate::sync::SyncStreams;

#[derive(Debug, Clone)]
pub struct DevToolsServer {
    config: ServerConfig,
    state: ServiceState,
    workspace: WorkspaceService,
    collection: CollectionService,
    collection_item: CollectionItemService,
    folder: FolderService,
    endpoint: EndpointService,
    example: ExampleService,
    environment: EnvironmentService,
    user: UserService,
}

impl DevToolsServer {
    /// Open the configured database (in memory when no path is set) and
    /// start the sync dispatchers. Must be called from within a Tokio runtime.
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let db = match &config.database.path {
            Some(path) => Database::open(path, &config.database)
                .await
                .with_context(|| format!("Failed to open database at {}", path.display()))?,
            None => Database::open_in_memory()
                .await
                .context("Failed to open in-memory database")?,
        };
        Ok(Self::with_database(config, db))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open(ServerConfig::default()).await
    }

    /// Wire services around an already opened database.
    pub fn with_database(config: ServerConfig, db: Database) -> Self {
        let streams = SyncStreams::new(&config.sync);
        let state = ServiceState::new(db, streams);
        tracing::info!(
            "[DevToolsServer] Services ready (socket {})",
            config.socket_path.display()
        );
        Self {
            workspace: WorkspaceService::new(state.clone()),
            collection: CollectionService::new(state.clone()),
            collection_item: CollectionItemService::new(state.clone()),
            folder: FolderService::new(state.clone()),
            endpoint: EndpointService::new(state.clone()),
            example: ExampleService::new(state.clone()),
            environment: EnvironmentService::new(state.clone()),
            user: UserService::new(state.clone()),
            state,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Socket the host should listen on.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    pub fn database(&self) -> &Database {
        &self.state.db
    }

    pub fn streams(&self) -> &SyncStreams {
        &self.state.streams
    }

    pub fn workspaces(&self) -> &WorkspaceService {
        &self.workspace
    }

    pub fn collections(&self) -> &CollectionService {
        &self.collection
    }

    pub fn collection_items(&self) -> &CollectionItemService {
        &self.collection_item
    }

    pub fn folders(&self) -> &FolderService {
        &self.folder
    }

    pub fn endpoints(&self) -> &EndpointService {
        &self.endpoint
    }

    pub fn examples(&self) -> &ExampleService {
        &self.example
    }

    pub fn environments(&self) -> &EnvironmentService {
        &self.environment
    }

    pub fn users(&self) -> &UserService {
        &self.user
    }

    /// End every open stream, then close the pool.
    pub async fn shutdown(&self) {
        tracing::info!("[DevToolsServer] Shutting down");
        self.state.streams.shutdown();
        self.state.db.close().await;
    }
}
