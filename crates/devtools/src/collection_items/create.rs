use devtools_api::{CollectionItem, Endpoint, Example, Folder, Id, ItemKind};
use sqlx::SqliteConnection;

use crate::collection_items::store::{self, Scope};
use crate::storage::{Result, endpoints, examples, folders};

/// Name given to the example every endpoint is created with.
pub const DEFAULT_EXAMPLE_NAME: &str = "Default";

#[derive(Debug, Clone)]
pub struct NewEndpoint<'a> {
    pub name: &'a str,
    pub method: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone)]
pub struct CreatedEndpoint {
    pub endpoint: Endpoint,
    pub default_example: Example,
    pub item: CollectionItem,
}

/// Legacy folder id wrapped by the parent item of `scope`.
async fn legacy_parent(conn: &mut SqliteConnection, scope: Scope) -> Result<Option<Id>> {
    match scope.parent_folder_id {
        Some(parent_item) => Ok(store::get(conn, parent_item).await?.folder_id),
        None => Ok(None),
    }
}

/// Create a legacy folder and append its item to the tail of `scope`.
pub async fn create_folder(
    conn: &mut SqliteConnection,
    scope: Scope,
    name: &str,
) -> Result<(Folder, CollectionItem)> {
    let folder = Folder {
        id: Id::new_now(),
        collection_id: scope.collection_id,
        parent_id: legacy_parent(conn, scope).await?,
        name: name.to_string(),
    };
    folders::create(conn, &folder).await?;
    let item = store::append_to_scope(conn, scope, ItemKind::Folder, folder.id, name).await?;
    Ok((folder, item))
}

/// Create a legacy endpoint with its default example and append its item to
/// the tail of `scope`.
pub async fn create_endpoint(
    conn: &mut SqliteConnection,
    scope: Scope,
    new: NewEndpoint<'_>,
) -> Result<CreatedEndpoint> {
    let endpoint = Endpoint {
        id: Id::new_now(),
        collection_id: scope.collection_id,
        folder_id: legacy_parent(conn, scope).await?,
        name: new.name.to_string(),
        method: new.method.to_string(),
        url: new.url.to_string(),
    };
    endpoints::create(conn, &endpoint).await?;

    let default_example = Example {
        id: Id::new_now(),
        endpoint_id: endpoint.id,
        collection_id: scope.collection_id,
        is_default: true,
        name: DEFAULT_EXAMPLE_NAME.to_string(),
        body: None,
    };
    examples::create(conn, &default_example).await?;

    let item =
        store::append_to_scope(conn, scope, ItemKind::Endpoint, endpoint.id, new.name).await?;
    Ok(CreatedEndpoint {
        endpoint,
        default_example,
        item,
    })
}

/// Copy an endpoint and its examples; the copy's item lands right after the
/// original's item.
pub async fn duplicate_endpoint(
    conn: &mut SqliteConnection,
    endpoint_id: Id,
) -> Result<CreatedEndpoint> {
    let original = endpoints::get(conn, endpoint_id).await?;
    let original_item = store::get_by_legacy_id(conn, endpoint_id).await?;

    let copy = Endpoint {
        id: Id::new_now(),
        name: format!("{} Copy", original.name),
        ..original.clone()
    };
    endpoints::create(conn, &copy).await?;

    let mut default_example = None;
    for example in examples::list(conn, endpoint_id).await? {
        let cloned = Example {
            id: Id::new_now(),
            endpoint_id: copy.id,
            ..example
        };
        examples::create(conn, &cloned).await?;
        if cloned.is_default && default_example.is_none() {
            default_example = Some(cloned);
        }
    }
    let default_example = match default_example {
        Some(example) => example,
        None => {
            let example = Example {
                id: Id::new_now(),
                endpoint_id: copy.id,
                collection_id: copy.collection_id,
                is_default: true,
                name: DEFAULT_EXAMPLE_NAME.to_string(),
                body: None,
            };
            examples::create(conn, &example).await?;
            example
        }
    };

    let scope = Scope::of(&original_item);
    let appended =
        store::append_to_scope(conn, scope, ItemKind::Endpoint, copy.id, &copy.name).await?;
    store::insert_after(conn, appended.id, original_item.id).await?;
    let item = store::get(conn, appended.id).await?;

    Ok(CreatedEndpoint {
        endpoint: copy,
        default_example,
        item,
    })
}
