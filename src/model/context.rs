//! Per-invocation contexts: inbound metadata, outbound envelopes, tracks.

use super::ContentType;
use crate::types::{MessageId, SagaId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Origin
// =============================================================================

/// Logical producer identity attached to messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub name: String,
    pub key: String,
}

impl Origin {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Fill a blank name or key from `defaults`.
    pub fn or_defaults(mut self, defaults: &Origin) -> Self {
        if self.name.trim().is_empty() {
            self.name = defaults.name.clone();
        }
        if self.key.trim().is_empty() {
            self.key = defaults.key.clone();
        }
        self
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Metadata of one inbound invocation.
///
/// Built by the metadata adapter, stamped with the declared content type by
/// the router, and enriched by the storage stage (`track`, `saga_id`).
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub id: String,
    pub content_type: Option<ContentType>,
    pub headers: HashMap<String, String>,
    pub origin: Origin,
    pub saga_id: Option<SagaId>,
    pub version: String,
    pub retry_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub track: Option<Track>,
}

impl MessageContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type: None,
            headers: HashMap::new(),
            origin: Origin::default(),
            saga_id: None,
            version: String::new(),
            retry_count: 0,
            sent_at: None,
            track: None,
        }
    }

    pub fn content_type_name(&self) -> &'static str {
        self.content_type.map(|c| c.name()).unwrap_or("<unknown>")
    }
}

/// Metadata plus the deserialized content, as seen by middleware.
///
/// The content is shared by every route matched in one call; the metadata is
/// owned per route execution.
pub struct InboundMessageContext<'a> {
    pub metadata: MessageContext,
    content: &'a (dyn Any + Send + Sync),
}

impl<'a> InboundMessageContext<'a> {
    pub fn new<C: Send + Sync + 'static>(metadata: MessageContext, content: &'a C) -> Self {
        Self { metadata, content }
    }

    /// Typed access to the content. `None` when `C` is not the routed type.
    pub fn content<C: 'static>(&self) -> Option<&'a C> {
        self.content.downcast_ref::<C>()
    }

    pub fn raw_content(&self) -> &'a (dyn Any + Send + Sync) {
        self.content
    }
}

impl fmt::Debug for InboundMessageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessageContext")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Correlation record handed to storage for idempotency and auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Message id.
    pub id: String,
    pub saga_id: Option<String>,
    /// Sender (origin name).
    pub from: String,
    /// Partition key (origin key).
    pub key: String,
    pub route: String,
    pub saga: Option<String>,
}

impl Track {
    pub fn new(context: &MessageContext, route: &str, saga: Option<&str>) -> Self {
        Self {
            id: context.id.clone(),
            saga_id: context.saga_id.as_ref().map(|s| s.to_string()),
            from: context.origin.name.clone(),
            key: context.origin.key.clone(),
            route: route.to_string(),
            saga: saga.map(str::to_string),
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Caller-chosen send options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub id: MessageId,
    /// Restrict dispatch to endpoints with this name. Empty matches all.
    pub end_point_name: String,
    pub headers: HashMap<String, String>,
    pub version: String,
    pub scheduled_enqueue_at: Option<DateTime<Utc>>,
    /// Passed through to the channel; never enforced by the bus.
    pub retry_count: u32,
    pub saga_id: Option<SagaId>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            id: MessageId::new(),
            end_point_name: String::new(),
            headers: HashMap::new(),
            version: "1".to_string(),
            scheduled_enqueue_at: None,
            retry_count: 0,
            saga_id: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_end_point(mut self, name: impl Into<String>) -> Self {
        self.end_point_name = name.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_saga(mut self, saga_id: SagaId) -> Self {
        self.saga_id = Some(saga_id);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_enqueue_at = Some(at);
        self
    }
}

/// Transport-neutral envelope built per destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessageContext {
    pub id: String,
    pub content_type: String,
    pub content: serde_json::Value,
    pub to_connection_string: String,
    pub to_path: String,
    pub reply_to_connection_string: String,
    pub reply_to_path: String,
    pub origin: Origin,
    pub headers: HashMap<String, String>,
    pub version: String,
    pub scheduled_enqueue_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub saga_id: Option<SagaId>,
}

impl OutboundMessageContext {
    /// Both connection string and path are non-blank.
    pub fn has_destination(&self) -> bool {
        !self.to_connection_string.trim().is_empty() && !self.to_path.trim().is_empty()
    }
}
