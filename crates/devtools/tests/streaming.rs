//! Sync streams as a client sees them: snapshot, batching and shutdown.

mod common;

use std::time::Duration;

use anyhow::Result;
use common::{bytes, drain};
use devtools::api::RpcContext;
use devtools::config::{ServerConfig, SyncConfig};
use devtools::testing::Fixture;
use devtools::DevToolsServer;
use devtools_api::messages::{CollectionItemSyncRequest, EndpointCreateRequest};
use devtools_api::{Change, CollectionItemSyncResponse};
use tokio::sync::mpsc;

async fn server_with(fx: &Fixture, max_batch_size: usize, flush_interval_ms: u64) -> DevToolsServer {
    let config = ServerConfig {
        sync: SyncConfig {
            max_batch_size,
            flush_interval_ms,
            ..SyncConfig::default()
        },
        ..ServerConfig::default()
    };
    DevToolsServer::with_database(config, fx.db.clone())
}

async fn create_endpoint(server: &DevToolsServer, ctx: &RpcContext, fx: &Fixture, name: &str) -> Result<()> {
    server
        .endpoints()
        .endpoint_create(
            ctx,
            EndpointCreateRequest {
                collection_id: bytes(fx.collection_id),
                name: name.into(),
                method: "GET".into(),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

fn names(changes: &[Change<devtools_api::CollectionItem>]) -> Vec<String> {
    changes
        .iter()
        .filter_map(|change| match change {
            Change::Insert { data } | Change::Update { data } => Some(data.name.clone()),
            Change::Delete { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_snapshot_then_live_in_batches() -> Result<()> {
    let fx = Fixture::new().await;
    fx.add_endpoint(None, "existing-a").await;
    fx.add_endpoint(None, "existing-b").await;
    let server = server_with(&fx, 2, 20).await;
    let ctx = RpcContext::authenticated(fx.user_id);

    let (tx, mut rx) = mpsc::channel::<CollectionItemSyncResponse>(64);
    let service = server.collection_items().clone();
    let stream_ctx = ctx.clone();
    let request = CollectionItemSyncRequest {
        collection_id: bytes(fx.collection_id),
    };
    let stream = tokio::spawn(async move { service.collection_item_sync(&stream_ctx, request, tx).await });

    // the snapshot fills exactly one full frame
    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("stream closed before the snapshot"))?;
    assert_eq!(names(&first.items), vec!["existing-a", "existing-b"]);

    for name in ["live-1", "live-2", "live-3"] {
        create_endpoint(&server, &ctx, &fx, name).await?;
    }

    let mut frames = Vec::new();
    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        assert!(!frame.items.is_empty());
        assert!(frame.items.len() <= 2);
        frames.push(frame);
    }
    let live: Vec<_> = frames.into_iter().flat_map(|frame| frame.items).collect();
    assert_eq!(names(&live), vec!["live-1", "live-2", "live-3"]);

    ctx.cancel_token().cancel();
    stream.await??;
    Ok(())
}

#[tokio::test]
async fn test_partial_batch_flushes_after_interval() -> Result<()> {
    let fx = Fixture::new().await;
    let server = server_with(&fx, 100, 30).await;
    let ctx = RpcContext::authenticated(fx.user_id);

    let (tx, mut rx) = mpsc::channel::<CollectionItemSyncResponse>(64);
    let service = server.collection_items().clone();
    let stream_ctx = ctx.clone();
    let request = CollectionItemSyncRequest {
        collection_id: bytes(fx.collection_id),
    };
    let stream = tokio::spawn(async move { service.collection_item_sync(&stream_ctx, request, tx).await });
    for _ in 0..200 {
        if server.streams().collection_item.subscriber_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    create_endpoint(&server, &ctx, &fx, "lonely").await?;

    // far below the batch size, so only the flush interval can release it
    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("stream closed"))?;
    assert_eq!(names(&frame.items), vec!["lonely"]);

    ctx.cancel_token().cancel();
    stream.await??;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_ends_open_streams() -> Result<()> {
    let fx = Fixture::new().await;
    let server = server_with(&fx, 100, 10).await;
    let ctx = RpcContext::authenticated(fx.user_id);

    let (tx, mut rx) = mpsc::channel::<CollectionItemSyncResponse>(64);
    let service = server.collection_items().clone();
    let request = CollectionItemSyncRequest {
        collection_id: bytes(fx.collection_id),
    };
    let stream = tokio::spawn(async move { service.collection_item_sync(&ctx, request, tx).await });
    for _ in 0..200 {
        if server.streams().collection_item.subscriber_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    server.streams().shutdown();
    tokio::time::timeout(Duration::from_secs(1), stream).await???;
    assert!(drain(&mut rx, Duration::from_millis(50)).await.is_empty());
    assert_eq!(server.streams().collection_item.subscriber_count(), 0);
    Ok(())
}
