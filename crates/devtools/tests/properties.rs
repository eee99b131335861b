//! Structural guarantees that must hold across every mutation: cascades,
//! workspace boundaries, one event per change and rollback on failure.

mod common;

use std::time::Duration;

use anyhow::Result;
use common::{Harness, bytes, drain, move_before};
use devtools::api::RpcContext;
use devtools::storage::{endpoints, examples, folders};
use devtools::testing::{assert_invariants, check_invariants, dump_tables};
use devtools_api::messages::{
    CollectionItemMoveRequest, EndpointCreateRequest, EndpointDeleteRequest,
    EndpointDuplicateRequest, EndpointUpdateRequest, EnvironmentDeleteRequest,
    EnvironmentListRequest, ExampleDeleteRequest, FolderCreateRequest, FolderDeleteRequest,
    FolderUpdateRequest, MovePosition, WorkspaceMemberDeleteRequest,
};
use devtools_api::{Change, Code, Id, ItemKind, Role};
use proptest::prelude::*;

#[tokio::test]
async fn test_folder_delete_cascades_to_legacy_rows() -> Result<()> {
    let h = Harness::new().await;
    let top = h.fx.add_folder(None, "top").await;
    let mid = h.fx.add_folder(Some(top.item_id), "mid").await;
    let leaf = h.fx.add_endpoint(Some(mid.item_id), "leaf").await;
    let sibling = h.fx.add_endpoint(Some(top.item_id), "sibling").await;
    let survivor = h.fx.add_endpoint(None, "survivor").await;

    h.server
        .folders()
        .folder_delete(
            &h.ctx,
            FolderDeleteRequest {
                folder_id: bytes(top.folder_id),
            },
        )
        .await?;

    let mut conn = h.fx.db.acquire().await?;
    for folder_id in [top.folder_id, mid.folder_id] {
        assert!(folders::get(&mut conn, folder_id).await.unwrap_err().is_not_found());
    }
    for endpoint_id in [leaf.endpoint_id, sibling.endpoint_id] {
        assert!(endpoints::get(&mut conn, endpoint_id).await.unwrap_err().is_not_found());
    }
    assert!(examples::get(&mut conn, leaf.default_example_id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(endpoints::get(&mut conn, survivor.endpoint_id).await.is_ok());
    drop(conn);

    assert_eq!(h.fx.list(h.fx.collection_id, None).await, vec![survivor.item_id]);
    assert_invariants(&h.fx.db).await;
    Ok(())
}

#[tokio::test]
async fn test_successful_moves_stay_inside_workspace() -> Result<()> {
    let h = Harness::new().await;
    let other = h.fx.add_collection("Other").await;
    let anchor = h.fx.add_endpoint_in(other, None, "anchor").await;
    let a = h.fx.add_endpoint(None, "a").await;

    // a member of both workspaces still cannot bridge them
    let second_ws = h.fx.add_workspace(h.fx.user_id, "Second").await;
    let foreign = h.fx.add_collection_in(second_ws, "Foreign").await;
    let foreign_item = h.fx.add_endpoint_in(foreign, None, "foreign").await;

    h.server
        .collection_items()
        .collection_item_move(&h.ctx, move_before(a.item_id, h.fx.collection_id, anchor.item_id))
        .await?;
    let moved = h.fx.item(a.item_id).await;
    assert_eq!(moved.collection_id, other);

    let err = h
        .server
        .collection_items()
        .collection_item_move(&h.ctx, move_before(a.item_id, other, foreign_item.item_id))
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::PermissionDenied);
    assert_eq!(h.fx.item(a.item_id).await.collection_id, other);
    assert_invariants(&h.fx.db).await;
    Ok(())
}

#[tokio::test]
async fn test_each_mutation_emits_exactly_one_event() -> Result<()> {
    let h = Harness::new().await;
    let collection = h.fx.collection_id;
    let (mut rx, stream) = h.watch_items(collection).await;

    let folder = h
        .server
        .folders()
        .folder_create(
            &h.ctx,
            FolderCreateRequest {
                collection_id: bytes(collection),
                parent_folder_id: None,
                name: "folder".into(),
            },
        )
        .await?;
    let endpoint = h
        .server
        .endpoints()
        .endpoint_create(
            &h.ctx,
            EndpointCreateRequest {
                collection_id: bytes(collection),
                parent_folder_id: Some(bytes(folder.collection_item_id)),
                name: "endpoint".into(),
                method: "GET".into(),
                url: "https://api.example.com".into(),
            },
        )
        .await?;
    let copy = h
        .server
        .endpoints()
        .endpoint_duplicate(
            &h.ctx,
            EndpointDuplicateRequest {
                endpoint_id: bytes(endpoint.endpoint_id),
            },
        )
        .await?;
    h.server
        .endpoints()
        .endpoint_update(
            &h.ctx,
            EndpointUpdateRequest {
                endpoint_id: bytes(endpoint.endpoint_id),
                method: Some("PUT".into()),
                ..Default::default()
            },
        )
        .await?;
    h.server
        .folders()
        .folder_update(
            &h.ctx,
            FolderUpdateRequest {
                folder_id: bytes(folder.folder_id),
                name: Some("renamed".into()),
            },
        )
        .await?;
    h.server
        .collection_items()
        .collection_item_move(
            &h.ctx,
            move_before(copy.collection_item_id, collection, endpoint.collection_item_id),
        )
        .await?;
    h.server
        .endpoints()
        .endpoint_delete(
            &h.ctx,
            EndpointDeleteRequest {
                endpoint_id: bytes(copy.endpoint_id),
            },
        )
        .await?;
    // one event for the folder, none for the endpoint inside it
    h.server
        .folders()
        .folder_delete(
            &h.ctx,
            FolderDeleteRequest {
                folder_id: bytes(folder.collection_item_id),
            },
        )
        .await?;

    let events = drain(&mut rx, Duration::from_millis(200)).await;
    let kinds: Vec<&str> = events
        .iter()
        .map(|change| match change {
            Change::Insert { .. } => "insert",
            Change::Update { .. } => "update",
            Change::Delete { .. } => "delete",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["insert", "insert", "insert", "update", "update", "update", "delete", "delete"]
    );
    assert_eq!(
        events.last(),
        Some(&Change::Delete {
            id: folder.collection_item_id
        })
    );

    h.ctx.cancel_token().cancel();
    stream.await?;
    Ok(())
}

#[tokio::test]
async fn test_cross_collection_folder_move_announces_only_the_folder() -> Result<()> {
    let h = Harness::new().await;
    let destination = h.fx.add_collection("Destination").await;
    let folder = h.fx.add_folder(None, "folder").await;
    let child = h.fx.add_endpoint(Some(folder.item_id), "child").await;
    let (mut rx, stream) = h.watch_items(destination).await;

    h.server
        .collection_items()
        .collection_item_move(
            &h.ctx,
            CollectionItemMoveRequest {
                item_id: bytes(folder.item_id),
                collection_id: bytes(h.fx.collection_id),
                target_collection_id: Some(bytes(destination)),
                kind: ItemKind::Folder,
                ..Default::default()
            },
        )
        .await?;

    let events = drain(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        Change::Insert { data } if data.id == folder.item_id && data.collection_id == destination
    ));
    // the subtree is reached by listing the folder
    assert_eq!(
        h.fx.list(destination, Some(folder.item_id)).await,
        vec![child.item_id]
    );

    h.ctx.cancel_token().cancel();
    stream.await?;
    Ok(())
}

#[tokio::test]
async fn test_failing_mutations_leave_tables_untouched() -> Result<()> {
    let h = Harness::new().await;
    let folder = h.fx.add_folder(None, "folder").await;
    let inner = h.fx.add_folder(Some(folder.item_id), "inner").await;
    let endpoint = h.fx.add_endpoint(Some(inner.item_id), "endpoint").await;
    let other = h.fx.add_collection("Other").await;
    let outsider = RpcContext::authenticated(h.fx.add_user("eve@example.com").await);
    let before = dump_tables(&h.fx.db).await;

    let items = h.server.collection_items();
    let mut failures = Vec::new();

    // folder into its own descendant
    failures.push(
        items
            .collection_item_move(
                &h.ctx,
                CollectionItemMoveRequest {
                    item_id: bytes(folder.item_id),
                    collection_id: bytes(h.fx.collection_id),
                    target_parent_folder_id: Some(bytes(inner.item_id)),
                    kind: ItemKind::Folder,
                    ..Default::default()
                },
            )
            .await
            .map(|_| ()),
    );
    // target without a position
    failures.push(
        items
            .collection_item_move(
                &h.ctx,
                CollectionItemMoveRequest {
                    item_id: bytes(endpoint.item_id),
                    collection_id: bytes(h.fx.collection_id),
                    target_item_id: Some(bytes(folder.item_id)),
                    position: MovePosition::Unspecified,
                    kind: ItemKind::Endpoint,
                    ..Default::default()
                },
            )
            .await
            .map(|_| ()),
    );
    // unknown target
    failures.push(
        items
            .collection_item_move(
                &h.ctx,
                move_before(endpoint.item_id, h.fx.collection_id, Id::new_now()),
            )
            .await
            .map(|_| ()),
    );
    // parent folder from another collection
    failures.push(
        h.server
            .folders()
            .folder_create(
                &h.ctx,
                FolderCreateRequest {
                    collection_id: bytes(other),
                    parent_folder_id: Some(bytes(folder.item_id)),
                    name: "stray".into(),
                },
            )
            .await
            .map(|_| ()),
    );
    failures.push(
        h.server
            .endpoints()
            .endpoint_delete(
                &outsider,
                EndpointDeleteRequest {
                    endpoint_id: bytes(endpoint.endpoint_id),
                },
            )
            .await
            .map(|_| ()),
    );
    failures.push(
        h.server
            .examples()
            .example_delete(
                &h.ctx,
                ExampleDeleteRequest {
                    example_id: bytes(endpoint.default_example_id),
                },
            )
            .await
            .map(|_| ()),
    );
    let global = h
        .server
        .environments()
        .environment_list(
            &h.ctx,
            EnvironmentListRequest {
                workspace_id: bytes(h.fx.workspace_id),
            },
        )
        .await?
        .items
        .into_iter()
        .find(|env| env.is_global)
        .map(|env| env.id)
        .ok_or_else(|| anyhow::anyhow!("workspace has no global environment"))?;
    failures.push(
        h.server
            .environments()
            .environment_delete(
                &h.ctx,
                EnvironmentDeleteRequest {
                    environment_id: bytes(global),
                },
            )
            .await
            .map(|_| ()),
    );
    failures.push(
        h.server
            .workspaces()
            .workspace_member_delete(
                &h.ctx,
                WorkspaceMemberDeleteRequest {
                    workspace_id: bytes(h.fx.workspace_id),
                    user_id: bytes(h.fx.user_id),
                },
            )
            .await
            .map(|_| ()),
    );

    for (index, result) in failures.iter().enumerate() {
        assert!(result.is_err(), "mutation #{index} unexpectedly succeeded");
    }
    assert_eq!(dump_tables(&h.fx.db).await, before);
    Ok(())
}

#[tokio::test]
async fn test_member_role_is_enough_for_tree_edits() -> Result<()> {
    let h = Harness::new().await;
    let member = h.fx.add_user("member@example.com").await;
    h.fx.add_member(h.fx.workspace_id, member, Role::User).await;
    let a = h.fx.add_endpoint(None, "a").await;
    let b = h.fx.add_endpoint(None, "b").await;

    h.server
        .collection_items()
        .collection_item_move(
            &RpcContext::authenticated(member),
            move_before(b.item_id, h.fx.collection_id, a.item_id),
        )
        .await?;
    assert_eq!(h.fx.list(h.fx.collection_id, None).await, vec![b.item_id, a.item_id]);
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    AddEndpoint { parent: usize },
    AddFolder { parent: usize },
    Move { item: usize, target: usize, before: bool },
    MoveInto { item: usize, folder: usize },
    Delete { item: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(|parent| Op::AddEndpoint { parent }),
        2 => any::<usize>().prop_map(|parent| Op::AddFolder { parent }),
        4 => (any::<usize>(), any::<usize>(), any::<bool>())
            .prop_map(|(item, target, before)| Op::Move { item, target, before }),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(item, folder)| Op::MoveInto { item, folder }),
        1 => any::<usize>().prop_map(|item| Op::Delete { item }),
    ]
}

/// Live items of both collections as `(item id, collection id, kind)`.
async fn live_items(h: &Harness, collections: &[Id]) -> Vec<(Id, Id, ItemKind)> {
    let mut conn = h.fx.db.acquire().await.expect("acquire");
    let mut all = Vec::new();
    for collection in collections {
        for item in devtools::collection_items::store::list_tree(&mut conn, *collection)
            .await
            .expect("list_tree")
        {
            all.push((item.id, item.collection_id, item.kind));
        }
    }
    all
}

async fn apply(h: &Harness, collections: &[Id], op: Op) {
    let items = live_items(h, collections).await;
    let folders: Vec<_> = items.iter().filter(|i| i.2 == ItemKind::Folder).cloned().collect();
    let pick = |list: &[(Id, Id, ItemKind)], n: usize| list.get(n % list.len().max(1)).cloned();

    // errors are part of the game; only the invariants matter
    match op {
        Op::AddEndpoint { parent } => {
            let collection = collections[parent % collections.len()];
            let parent = pick(&folders, parent).filter(|f| f.1 == collection).map(|f| f.0);
            let _ = h
                .server
                .endpoints()
                .endpoint_create(
                    &h.ctx,
                    EndpointCreateRequest {
                        collection_id: bytes(collection),
                        parent_folder_id: parent.map(bytes),
                        name: "e".into(),
                        method: "GET".into(),
                        url: String::new(),
                    },
                )
                .await;
        }
        Op::AddFolder { parent } => {
            let collection = collections[parent % collections.len()];
            let parent = pick(&folders, parent).filter(|f| f.1 == collection).map(|f| f.0);
            let _ = h
                .server
                .folders()
                .folder_create(
                    &h.ctx,
                    FolderCreateRequest {
                        collection_id: bytes(collection),
                        parent_folder_id: parent.map(bytes),
                        name: "f".into(),
                    },
                )
                .await;
        }
        Op::Move { item, target, before } => {
            if let (Some(item), Some(target)) = (pick(&items, item), pick(&items, target)) {
                let _ = h
                    .server
                    .collection_items()
                    .collection_item_move(
                        &h.ctx,
                        CollectionItemMoveRequest {
                            item_id: bytes(item.0),
                            collection_id: bytes(item.1),
                            target_item_id: Some(bytes(target.0)),
                            position: if before {
                                MovePosition::Before
                            } else {
                                MovePosition::After
                            },
                            kind: item.2,
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
        Op::MoveInto { item, folder } => {
            if let (Some(item), Some(folder)) = (pick(&items, item), pick(&folders, folder)) {
                let _ = h
                    .server
                    .collection_items()
                    .collection_item_move(
                        &h.ctx,
                        CollectionItemMoveRequest {
                            item_id: bytes(item.0),
                            collection_id: bytes(item.1),
                            target_parent_folder_id: Some(bytes(folder.0)),
                            kind: item.2,
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
        Op::Delete { item } => {
            if let Some(item) = pick(&items, item) {
                if item.2 == ItemKind::Folder {
                    let _ = h
                        .server
                        .folders()
                        .folder_delete(&h.ctx, FolderDeleteRequest { folder_id: bytes(item.0) })
                        .await;
                } else {
                    let _ = h
                        .server
                        .endpoints()
                        .endpoint_delete(
                            &h.ctx,
                            EndpointDeleteRequest {
                                endpoint_id: bytes(item.0),
                            },
                        )
                        .await;
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_random_edits_keep_tree_well_formed(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let violation = runtime.block_on(async {
            let h = Harness::new().await;
            let second = h.fx.add_collection("Second").await;
            let collections = [h.fx.collection_id, second];
            for op in ops {
                apply(&h, &collections, op).await;
                if let Err(violation) = check_invariants(&h.fx.db).await {
                    return Some(violation);
                }
            }
            None
        });
        prop_assert!(violation.is_none(), "{:?}", violation);
    }
}
