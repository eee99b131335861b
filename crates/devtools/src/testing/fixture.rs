//! Seeded databases for tests.

use anyhow::{Context, Result};
use devtools_api::{Collection, Environment, Id, ProviderType, Role, User, Workspace, WorkspaceMember};

use crate::collection_items::create::{self, NewEndpoint};
use crate::collection_items::{Scope, store};
use crate::storage::{Database, collections, environments, now_millis, users, workspaces};

/// Handles of a freshly created folder.
#[derive(Debug, Clone, Copy)]
pub struct FolderHandle {
    pub folder_id: Id,
    pub item_id: Id,
}

/// Handles of a freshly created endpoint.
#[derive(Debug, Clone, Copy)]
pub struct EndpointHandle {
    pub endpoint_id: Id,
    pub item_id: Id,
    pub default_example_id: Id,
}

/// In-memory database seeded with one user owning one workspace that holds
/// one empty collection.
pub struct Fixture {
    pub db: Database,
    pub user_id: Id,
    pub workspace_id: Id,
    pub collection_id: Id,
}

impl Fixture {
    pub async fn try_new() -> Result<Self> {
        let db = Database::open_in_memory()
            .await
            .context("Failed to open in-memory database")?;
        Self::seed(db).await
    }

    pub async fn new() -> Self {
        Self::try_new().await.expect("fixture setup failed")
    }

    /// Seed an already opened database (e.g. file-backed).
    pub async fn seed(db: Database) -> Result<Self> {
        let user_id = insert_user(&db, "owner@example.com").await?;
        let workspace_id = insert_workspace(&db, user_id, "Workspace").await?;
        let collection_id = insert_collection(&db, workspace_id, "Collection").await?;
        Ok(Self {
            db,
            user_id,
            workspace_id,
            collection_id,
        })
    }

    pub async fn add_user(&self, email: &str) -> Id {
        insert_user(&self.db, email).await.expect("add_user failed")
    }

    /// Workspace owned by `owner`, with its global environment.
    pub async fn add_workspace(&self, owner: Id, name: &str) -> Id {
        insert_workspace(&self.db, owner, name)
            .await
            .expect("add_workspace failed")
    }

    pub async fn add_member(&self, workspace_id: Id, user_id: Id, role: Role) {
        let mut tx = self.db.begin_write().await.expect("begin failed");
        let member = WorkspaceMember {
            id: Id::new_now(),
            workspace_id,
            user_id,
            role,
        };
        workspaces::add_member(tx.conn().expect("conn"), &member)
            .await
            .expect("add_member failed");
        tx.commit().await.expect("commit failed");
    }

    /// Collection in the fixture workspace.
    pub async fn add_collection(&self, name: &str) -> Id {
        self.add_collection_in(self.workspace_id, name).await
    }

    pub async fn add_collection_in(&self, workspace_id: Id, name: &str) -> Id {
        insert_collection(&self.db, workspace_id, name)
            .await
            .expect("add_collection failed")
    }

    /// Folder at the tail of `parent` (an item id, root when `None`) in the
    /// fixture collection.
    pub async fn add_folder(&self, parent: Option<Id>, name: &str) -> FolderHandle {
        self.add_folder_in(self.collection_id, parent, name).await
    }

    pub async fn add_folder_in(&self, collection_id: Id, parent: Option<Id>, name: &str) -> FolderHandle {
        let scope = Scope {
            collection_id,
            parent_folder_id: parent,
        };
        let mut tx = self.db.begin_write().await.expect("begin failed");
        let (folder, item) = create::create_folder(tx.conn().expect("conn"), scope, name)
            .await
            .expect("create_folder failed");
        tx.commit().await.expect("commit failed");
        FolderHandle {
            folder_id: folder.id,
            item_id: item.id,
        }
    }

    pub async fn add_endpoint(&self, parent: Option<Id>, name: &str) -> EndpointHandle {
        self.add_endpoint_in(self.collection_id, parent, name).await
    }

    pub async fn add_endpoint_in(
        &self,
        collection_id: Id,
        parent: Option<Id>,
        name: &str,
    ) -> EndpointHandle {
        let scope = Scope {
            collection_id,
            parent_folder_id: parent,
        };
        let new = NewEndpoint {
            name,
            method: "GET",
            url: "https://api.example.com",
        };
        let mut tx = self.db.begin_write().await.expect("begin failed");
        let created = create::create_endpoint(tx.conn().expect("conn"), scope, new)
            .await
            .expect("create_endpoint failed");
        tx.commit().await.expect("commit failed");
        EndpointHandle {
            endpoint_id: created.endpoint.id,
            item_id: created.item.id,
            default_example_id: created.default_example.id,
        }
    }

    /// Item ids of one scope, in list order.
    pub async fn list(&self, collection_id: Id, parent: Option<Id>) -> Vec<Id> {
        let mut conn = self.db.acquire().await.expect("acquire failed");
        let scope = Scope {
            collection_id,
            parent_folder_id: parent,
        };
        store::list_in_order(&mut conn, scope)
            .await
            .expect("list_in_order failed")
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    pub async fn item(&self, id: Id) -> devtools_api::CollectionItem {
        let mut conn = self.db.acquire().await.expect("acquire failed");
        store::get(&mut conn, id).await.expect("item lookup failed")
    }
}

async fn insert_user(db: &Database, email: &str) -> Result<Id> {
    let user = User {
        id: Id::new_now(),
        email: email.to_string(),
        password_hash: None,
        provider_type: ProviderType::Local,
        provider_id: None,
        external_id: None,
        name: email.split('@').next().unwrap_or(email).to_string(),
        image: None,
    };
    let mut tx = db.begin_write().await?;
    users::create(tx.conn()?, &user).await.context("insert user")?;
    tx.commit().await?;
    Ok(user.id)
}

async fn insert_workspace(db: &Database, owner: Id, name: &str) -> Result<Id> {
    let now = now_millis();
    let workspace = Workspace {
        id: Id::new_now(),
        name: name.to_string(),
        updated_at: now,
        collection_count: 0,
        flow_count: 0,
    };
    let mut tx = db.begin_write().await?;
    let conn = tx.conn()?;
    workspaces::create(conn, &workspace).await.context("insert workspace")?;
    workspaces::add_member(
        conn,
        &WorkspaceMember {
            id: Id::new_now(),
            workspace_id: workspace.id,
            user_id: owner,
            role: Role::Owner,
        },
    )
    .await
    .context("insert owner membership")?;
    environments::create(
        conn,
        &Environment {
            id: Id::new_now(),
            workspace_id: workspace.id,
            name: "Global".to_string(),
            description: String::new(),
            is_global: true,
            updated_at: now,
        },
    )
    .await
    .context("insert global environment")?;
    tx.commit().await?;
    Ok(workspace.id)
}

async fn insert_collection(db: &Database, workspace_id: Id, name: &str) -> Result<Id> {
    let collection = Collection {
        id: Id::new_now(),
        workspace_id,
        name: name.to_string(),
        updated_at: now_millis(),
    };
    let mut tx = db.begin_write().await?;
    let conn = tx.conn()?;
    collections::create(conn, &collection).await.context("insert collection")?;
    workspaces::increment_collection_count(conn, workspace_id).await?;
    tx.commit().await?;
    Ok(collection.id)
}
