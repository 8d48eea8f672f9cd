//! Cross-instance invalidation.
//!
//! Every local `clear`, `invalidate_by_content_type` and `bump_version` is
//! published as an [`InvalidationEvent`]. Other instances apply the same
//! mutation when they receive an event whose origin differs from their own.
//! All actions are idempotent, so duplicate or reordered delivery converges.

use crate::error::CacheResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use petshield_policy::ContentType;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// Invalidation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvalidationAction {
    Clear,
    InvalidateByContentType,
    BumpVersion,
}

impl InvalidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationAction::Clear => "clear",
            InvalidationAction::InvalidateByContentType => "invalidateByContentType",
            InvalidationAction::BumpVersion => "bumpVersion",
        }
    }
}

/// Action parameters. Absent for `clear`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

/// Event exchanged on the invalidation bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    pub action: InvalidationAction,
    #[serde(default)]
    pub params: InvalidationParams,
    pub origin_instance_id: String,
    pub issued_at: DateTime<Utc>,
}

impl InvalidationEvent {
    fn new(
        action: InvalidationAction,
        params: InvalidationParams,
        origin_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            action,
            params,
            origin_instance_id: origin_instance_id.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn clear(origin_instance_id: impl Into<String>) -> Self {
        Self::new(
            InvalidationAction::Clear,
            InvalidationParams::default(),
            origin_instance_id,
        )
    }

    pub fn content_type(origin_instance_id: impl Into<String>, content_type: ContentType) -> Self {
        Self::new(
            InvalidationAction::InvalidateByContentType,
            InvalidationParams {
                content_type: Some(content_type),
                version: None,
            },
            origin_instance_id,
        )
    }

    pub fn bump_version(origin_instance_id: impl Into<String>, version: u64) -> Self {
        Self::new(
            InvalidationAction::BumpVersion,
            InvalidationParams {
                content_type: None,
                version: Some(version),
            },
            origin_instance_id,
        )
    }

    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(payload: &str) -> CacheResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Shared channel between cache instances.
#[async_trait]
pub trait InvalidationBus: Send + Sync {
    /// Publish an event to every subscriber, including other processes.
    async fn publish(&self, event: &InvalidationEvent) -> CacheResult<()>;

    /// Stream of events published from now on.
    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationEvent>>;
}

/// In-process bus backed by a tokio broadcast channel.
///
/// Clones share the same channel, so several caches in one process (or in
/// one test) can be wired together.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<InvalidationEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl InvalidationBus for LocalBus {
    async fn publish(&self, event: &InvalidationEvent) -> CacheResult<()> {
        // No subscribers is not an error
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationEvent>> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Invalidation subscriber lagged");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_bus::RedisBus;

#[cfg(feature = "redis")]
mod redis_bus {
    use super::*;
    use redis::Client;
    use redis::aio::ConnectionManager;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;
    use tracing::{debug, info};

    /// Bus publishing JSON events on a Redis pub/sub channel.
    ///
    /// Publishes share one managed connection; each subscription opens its
    /// own pub/sub connection.
    pub struct RedisBus {
        client: Client,
        conn: ConnectionManager,
        channel: String,
    }

    impl RedisBus {
        pub async fn new(url: &str, channel: impl Into<String>) -> CacheResult<Self> {
            let client = Client::open(url)?;
            let conn = ConnectionManager::new(client.clone()).await?;
            Ok(Self {
                client,
                conn,
                channel: channel.into(),
            })
        }

        pub fn channel(&self) -> &str {
            &self.channel
        }
    }

    #[async_trait]
    impl InvalidationBus for RedisBus {
        async fn publish(&self, event: &InvalidationEvent) -> CacheResult<()> {
            let payload = event.to_json()?;
            let mut conn = self.conn.clone();

            let receivers: u32 = redis::cmd("PUBLISH")
                .arg(&self.channel)
                .arg(payload)
                .query_async(&mut conn)
                .await?;

            debug!(
                channel = %self.channel,
                action = event.action.as_str(),
                receivers = receivers,
                "Published invalidation event"
            );
            Ok(())
        }

        async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationEvent>> {
            let (tx, rx) = mpsc::channel(100);
            let mut pubsub = self.client.get_async_pubsub().await?;
            pubsub.subscribe(&self.channel).await?;

            info!(channel = %self.channel, "Subscribed to invalidation channel");

            let channel = self.channel.clone();
            tokio::spawn(async move {
                while let Some(msg) = pubsub.on_message().next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "Failed to read invalidation payload");
                            continue;
                        }
                    };

                    let event = match InvalidationEvent::from_json(&payload) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed invalidation event");
                            continue;
                        }
                    };

                    if tx.send(event).await.is_err() {
                        debug!(channel = %channel, "Invalidation subscriber dropped");
                        break;
                    }
                }
            });

            Ok(ReceiverStream::new(rx).boxed())
        }
    }
}
