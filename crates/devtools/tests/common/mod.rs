#![allow(dead_code)]

use std::time::Duration;

use devtools::api::RpcContext;
use devtools::config::{ServerConfig, SyncConfig};
use devtools::testing::Fixture;
use devtools::DevToolsServer;
use devtools_api::messages::{CollectionItemMoveRequest, CollectionItemSyncRequest, MovePosition};
use devtools_api::{CollectionItemSyncResponse, Id, ItemKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Seeded fixture plus a server wired around the same database.
pub struct Harness {
    pub fx: Fixture,
    pub server: DevToolsServer,
    pub ctx: RpcContext,
}

impl Harness {
    pub async fn new() -> Self {
        let fx = Fixture::new().await;
        let config = ServerConfig {
            sync: SyncConfig {
                flush_interval_ms: 10,
                ..SyncConfig::default()
            },
            ..ServerConfig::default()
        };
        let server = DevToolsServer::with_database(config, fx.db.clone());
        let ctx = RpcContext::authenticated(fx.user_id);
        Self { fx, server, ctx }
    }

    /// Attach an item stream to `collection_id` and wait for it to register.
    pub async fn watch_items(
        &self,
        collection_id: Id,
    ) -> (mpsc::Receiver<CollectionItemSyncResponse>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let service = self.server.collection_items().clone();
        let ctx = self.ctx.clone();
        let before = self.server.streams().collection_item.subscriber_count();
        let handle = tokio::spawn(async move {
            let request = CollectionItemSyncRequest {
                collection_id: bytes(collection_id),
            };
            let _ = service.collection_item_sync(&ctx, request, tx).await;
        });
        for _ in 0..200 {
            if self.server.streams().collection_item.subscriber_count() > before {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        (rx, handle)
    }
}

pub fn bytes(id: Id) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub fn move_before(item: Id, collection: Id, target: Id) -> CollectionItemMoveRequest {
    CollectionItemMoveRequest {
        item_id: bytes(item),
        collection_id: bytes(collection),
        target_item_id: Some(bytes(target)),
        position: MovePosition::Before,
        kind: ItemKind::Endpoint,
        ..Default::default()
    }
}

/// Every payload received until the stream stays quiet for `quiet`.
pub async fn drain<T>(rx: &mut mpsc::Receiver<devtools_api::Batch<T>>, quiet: Duration) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(Some(batch)) = tokio::time::timeout(quiet, rx.recv()).await {
        items.extend(batch.items);
    }
    items
}
