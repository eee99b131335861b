//! In-process change streams.
//!
//! - `streamer`: topic-filtered publish/subscribe with snapshots
//! - `bridge`: micro-batching of a subscription into response frames
//! - `topics`: the topic keys and streamer aliases of each entity family

pub mod bridge;
pub mod streamer;
pub mod topics;

pub use bridge::{BatchOptions, BridgeStats, ResponseSink, stream_to_client};
pub use streamer::{
    DEFAULT_SUBSCRIBER_BUFFER, Event, MIN_SUBSCRIBER_BUFFER, SubscribeOptions, Subscription,
    SyncError, SyncStreamer,
};
pub use topics::{
    CollectionItemStreamer, CollectionItemTopic, CollectionStreamer, EnvironmentStreamer,
    UserTopic, WorkspaceStreamer, WorkspaceTopic,
};

use crate::config::SyncConfig;

/// The process-wide streamers, one per entity family.
#[derive(Debug, Clone)]
pub struct SyncStreams {
    pub workspace: WorkspaceStreamer,
    pub collection: CollectionStreamer,
    pub collection_item: CollectionItemStreamer,
    pub environment: EnvironmentStreamer,
    batch: BatchOptions,
}

impl SyncStreams {
    /// Spawn every dispatcher. Must be called from within a Tokio runtime.
    pub fn new(config: &SyncConfig) -> Self {
        let buffer = config.subscriber_buffer;
        Self {
            workspace: SyncStreamer::new("workspace", buffer),
            collection: SyncStreamer::new("collection", buffer),
            collection_item: SyncStreamer::new("collection_item", buffer),
            environment: SyncStreamer::new("environment", buffer),
            batch: BatchOptions::from(config),
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        self.batch
    }

    pub fn shutdown(&self) {
        self.workspace.shutdown();
        self.collection.shutdown();
        self.collection_item.shutdown();
        self.environment.shutdown();
    }
}
