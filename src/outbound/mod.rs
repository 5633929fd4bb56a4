//! Outbound dispatch: endpoint catalog and bus.
//!
//! Collaborator contracts consumed by the [`Bus`]:
//!   - **PointToPointChannel**: delivers send and fire-and-forget envelopes
//!   - **PublishSubscribeChannel**: delivers published envelopes
//!   - **BusLogger / BusInterceptor**: send/publish entry, success, error and exit hooks
//!   - **SettingFinder**: configuration lookups for endpoint extractors

mod bus;
mod catalog;
mod settings;

pub use bus::{Bus, DispatchMode};
pub use catalog::EndPointCatalog;
pub use settings::{EnvSettingFinder, StaticSettingFinder, STATIC_SETTING_FINDER};

use crate::model::{Options, OutboundMessageContext};
use crate::types::{Error, Result};
use std::time::Duration;

/// Delivers one envelope to a queue.
#[cfg_attr(test, mockall::automock)]
pub trait PointToPointChannel: Send + Sync {
    fn send(&self, context: &OutboundMessageContext) -> Result<()>;
}

/// Delivers one envelope to every subscriber of a topic.
#[cfg_attr(test, mockall::automock)]
pub trait PublishSubscribeChannel: Send + Sync {
    fn send(&self, context: &OutboundMessageContext) -> Result<()>;
}

/// Logger hooks around every outbound dispatch.
pub trait BusLogger: Send + Sync {
    fn on_send_entry(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_send_success(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_send_error(&self, _context: &OutboundMessageContext, _options: &Options, _error: &Error) {}

    fn on_send_exit(&self, _context: &OutboundMessageContext, _options: &Options, _elapsed: Duration) {}

    fn on_publish_entry(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_publish_success(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_publish_error(
        &self,
        _context: &OutboundMessageContext,
        _options: &Options,
        _error: &Error,
    ) {
    }

    fn on_publish_exit(
        &self,
        _context: &OutboundMessageContext,
        _options: &Options,
        _elapsed: Duration,
    ) {
    }
}

/// Interceptor hooks, invoked after all bus loggers.
pub trait BusInterceptor: Send + Sync {
    fn on_send_entry(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_send_success(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_send_error(&self, _context: &OutboundMessageContext, _options: &Options, _error: &Error) {}

    fn on_send_exit(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_publish_entry(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_publish_success(&self, _context: &OutboundMessageContext, _options: &Options) {}

    fn on_publish_error(
        &self,
        _context: &OutboundMessageContext,
        _options: &Options,
        _error: &Error,
    ) {
    }

    fn on_publish_exit(&self, _context: &OutboundMessageContext, _options: &Options) {}
}

/// Source of configuration values read by endpoint extractors.
pub trait SettingFinder: Send + Sync {
    fn find(&self, key: &str) -> Option<String>;
}

/// Bus interceptor that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBusInterceptor;

impl BusInterceptor for NullBusInterceptor {}

/// Channel that accepts and drops every envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPointToPointChannel;

impl PointToPointChannel for NullPointToPointChannel {
    fn send(&self, context: &OutboundMessageContext) -> Result<()> {
        tracing::trace!(message_id = %context.id, "null channel dropped envelope");
        Ok(())
    }
}

/// Channel that accepts and drops every envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublishSubscribeChannel;

impl PublishSubscribeChannel for NullPublishSubscribeChannel {
    fn send(&self, context: &OutboundMessageContext) -> Result<()> {
        tracing::trace!(message_id = %context.id, "null channel dropped envelope");
        Ok(())
    }
}
