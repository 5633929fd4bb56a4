//! In-memory transport.
//!
//! An in-process broker with point-to-point queues and publish/subscribe
//! topics, plus the channels and adapters that connect it to the [`Bus`] and
//! the [`Router`]. Destinations are keyed by connection string and path.
//!
//! Delivery is a non-blocking push onto tokio unbounded channels, so the
//! synchronous bus never waits on a consumer.
//!
//! [`Bus`]: crate::outbound::Bus
//! [`Router`]: crate::inbound::Router

use crate::capability::CapabilityResolver;
use crate::inbound::{BodyAdapter, MetadataAdapter};
use crate::model::{MessageContext, Origin, OutboundMessageContext};
use crate::outbound::{PointToPointChannel, PublishSubscribeChannel};
use crate::types::{Error, Result, SagaId, TRANSPORT_IDENTIFIER};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

// =============================================================================
// Message Types
// =============================================================================

/// Queue or topic address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub connection_string: String,
    pub path: String,
}

impl Address {
    pub fn new(connection_string: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection_string, self.path)
    }
}

/// Message as carried by the in-memory broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    pub id: String,
    pub content_type: String,
    pub body: serde_json::Value, // JSON content
    pub to: Address,
    pub reply_to: Option<Address>,
    pub origin: Origin,
    pub headers: HashMap<String, String>,
    pub version: String,
    pub retry_count: u32,
    pub saga_id: Option<SagaId>,
    pub scheduled_enqueue_at: Option<DateTime<Utc>>,
    pub sent_at: DateTime<Utc>,
}

impl From<&OutboundMessageContext> for TransportMessage {
    fn from(context: &OutboundMessageContext) -> Self {
        let reply_to = (!context.reply_to_connection_string.trim().is_empty()
            && !context.reply_to_path.trim().is_empty())
        .then(|| {
            Address::new(
                context.reply_to_connection_string.clone(),
                context.reply_to_path.clone(),
            )
        });

        Self {
            id: context.id.clone(),
            content_type: context.content_type.clone(),
            body: context.content.clone(),
            to: Address::new(
                context.to_connection_string.clone(),
                context.to_path.clone(),
            ),
            reply_to,
            origin: context.origin.clone(),
            headers: context.headers.clone(),
            version: context.version.clone(),
            retry_count: context.retry_count,
            saga_id: context.saga_id.clone(),
            scheduled_enqueue_at: context.scheduled_enqueue_at,
            sent_at: Utc::now(),
        }
    }
}

// =============================================================================
// Subscriber Management
// =============================================================================

#[derive(Debug)]
struct Subscriber {
    id: String,
    tx: mpsc::UnboundedSender<TransportMessage>,
}

/// Subscription receipt for managing subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub topic: Address,
}

/// Statistics about broker usage.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStats {
    pub messages_enqueued: u64,
    pub messages_published: u64,
    pub deliveries: u64,
    pub active_subscribers: usize,
    pub registered_queues: usize,
}

// =============================================================================
// InMemoryBroker
// =============================================================================

/// In-process broker shared by the bus channels and the consumers.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    /// Queue address -> single consumer
    queues: RwLock<HashMap<Address, mpsc::UnboundedSender<TransportMessage>>>,

    /// Topic address -> subscribers
    topics: RwLock<HashMap<Address, Vec<Subscriber>>>,

    stats: RwLock<BrokerStats>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Register the consumer of a queue.
    pub fn register_queue(
        &self,
        address: Address,
    ) -> Result<mpsc::UnboundedReceiver<TransportMessage>> {
        let mut queues = self.queues.write();
        if queues.contains_key(&address) {
            return Err(Error::validation(format!(
                "Queue already registered: {}",
                address
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tracing::debug!(queue = %address, "queue registered");
        queues.insert(address, tx);
        self.stats.write().registered_queues = queues.len();

        Ok(rx)
    }

    pub fn unregister_queue(&self, address: &Address) {
        let mut queues = self.queues.write();
        queues.remove(address);
        self.stats.write().registered_queues = queues.len();
        tracing::debug!(queue = %address, "queue unregistered");
    }

    /// Deliver to the queue's consumer.
    pub fn enqueue(&self, message: TransportMessage) -> Result<()> {
        let queues = self.queues.read();
        let tx = queues.get(&message.to).ok_or_else(|| {
            Error::channel(
                TRANSPORT_IDENTIFIER,
                format!("no queue registered at {}", message.to),
            )
        })?;

        let address = message.to.clone();
        tx.send(message).map_err(|_| {
            Error::channel(
                TRANSPORT_IDENTIFIER,
                format!("consumer of {} has disconnected", address),
            )
        })?;

        let mut stats = self.stats.write();
        stats.messages_enqueued += 1;
        stats.deliveries += 1;

        tracing::debug!(queue = %address, "message enqueued");
        Ok(())
    }

    // =========================================================================
    // Topics
    // =========================================================================

    /// Subscribe to a topic.
    pub fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        topic: Address,
    ) -> (Subscription, mpsc::UnboundedReceiver<TransportMessage>) {
        let id = subscriber_id.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut topics = self.topics.write();
        topics.entry(topic.clone()).or_default().push(Subscriber {
            id: id.clone(),
            tx,
        });
        self.stats.write().active_subscribers = topics.values().map(Vec::len).sum();

        tracing::debug!(subscriber = %id, topic = %topic, "subscribed");
        (Subscription { id, topic }, rx)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut topics = self.topics.write();
        if let Some(subscribers) = topics.get_mut(&subscription.topic) {
            subscribers.retain(|s| s.id != subscription.id);
        }
        self.stats.write().active_subscribers = topics.values().map(Vec::len).sum();

        tracing::debug!(subscriber = %subscription.id, "unsubscribed");
    }

    /// Fan out to every live subscriber of the topic. Returns the number of
    /// deliveries; zero subscribers is not an error.
    pub fn publish(&self, message: TransportMessage) -> usize {
        let topics = self.topics.read();
        let delivered = topics
            .get(&message.to)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|s| s.tx.send(message.clone()).is_ok())
                    .count()
            })
            .unwrap_or(0);

        let mut stats = self.stats.write();
        stats.messages_published += 1;
        stats.deliveries += delivered as u64;

        tracing::debug!(topic = %message.to, delivered, "message published");
        delivered
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> BrokerStats {
        self.stats.read().clone()
    }

    /// Reset message counters. Registration gauges are kept.
    pub fn reset_stats(&self) {
        let mut stats = self.stats.write();
        stats.messages_enqueued = 0;
        stats.messages_published = 0;
        stats.deliveries = 0;
    }

    // =========================================================================
    // Wiring
    // =========================================================================

    /// Register this broker's channels and the transport adapters under
    /// `"transport"`.
    pub fn register_channels(self: &Arc<Self>, resolver: &mut CapabilityResolver) {
        resolver
            .register_instance::<dyn PointToPointChannel>(
                TRANSPORT_IDENTIFIER,
                Arc::new(InMemoryPointToPointChannel::new(self.clone())),
            )
            .register_instance::<dyn PublishSubscribeChannel>(
                TRANSPORT_IDENTIFIER,
                Arc::new(InMemoryPublishSubscribeChannel::new(self.clone())),
            )
            .register_instance::<dyn BodyAdapter<TransportMessage>>(
                TRANSPORT_IDENTIFIER,
                Arc::new(TransportBodyAdapter),
            )
            .register_instance::<dyn MetadataAdapter<TransportMessage>>(
                TRANSPORT_IDENTIFIER,
                Arc::new(TransportMetadataAdapter),
            );
    }
}

// =============================================================================
// Channels and adapters
// =============================================================================

/// Point-to-point channel backed by an [`InMemoryBroker`] queue.
#[derive(Debug, Clone)]
pub struct InMemoryPointToPointChannel {
    broker: Arc<InMemoryBroker>,
}

impl InMemoryPointToPointChannel {
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self { broker }
    }
}

impl PointToPointChannel for InMemoryPointToPointChannel {
    fn send(&self, context: &OutboundMessageContext) -> Result<()> {
        self.broker.enqueue(TransportMessage::from(context))
    }
}

/// Publish/subscribe channel backed by an [`InMemoryBroker`] topic.
#[derive(Debug, Clone)]
pub struct InMemoryPublishSubscribeChannel {
    broker: Arc<InMemoryBroker>,
}

impl InMemoryPublishSubscribeChannel {
    pub fn new(broker: Arc<InMemoryBroker>) -> Self {
        Self { broker }
    }
}

impl PublishSubscribeChannel for InMemoryPublishSubscribeChannel {
    fn send(&self, context: &OutboundMessageContext) -> Result<()> {
        self.broker.publish(TransportMessage::from(context));
        Ok(())
    }
}

/// Reads the JSON body of a [`TransportMessage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportBodyAdapter;

impl BodyAdapter<TransportMessage> for TransportBodyAdapter {
    fn read(&self, message: &TransportMessage) -> Result<serde_json::Value> {
        Ok(message.body.clone())
    }
}

/// Builds a [`MessageContext`] from a [`TransportMessage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TransportMetadataAdapter;

impl MetadataAdapter<TransportMessage> for TransportMetadataAdapter {
    fn create(&self, message: &TransportMessage) -> Result<MessageContext> {
        if message.id.trim().is_empty() {
            return Err(Error::adapter("transport message has no id"));
        }

        let mut context = MessageContext::new(message.id.clone());
        context.headers = message.headers.clone();
        context.origin = message.origin.clone();
        context.saga_id = message.saga_id.clone();
        context.version = message.version.clone();
        context.retry_count = message.retry_count;
        context.sent_at = Some(message.sent_at);
        Ok(context)
    }
}
