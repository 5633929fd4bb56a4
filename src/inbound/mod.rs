//! Inbound routing: catalog, pipeline and router.
//!
//! Collaborator contracts consumed by the [`Router`]:
//!   - **BodyAdapter**: raw message -> content (as a serde value)
//!   - **MetadataAdapter**: raw message -> [`MessageContext`]
//!   - **RouterLogger / RouterInterceptor**: entry/success/exception/exit hooks
//!   - **Storage**: receives the Track written by the terminal stage
//!
//! Loggers and interceptors are shared across concurrent calls and must not
//! keep call-scoped state between hook invocations.

mod catalog;
mod pipeline;
mod router;
mod stages;

pub use catalog::RouteCatalog;
pub use pipeline::{Middleware, MiddlewareParameter, Next, Pipeline};
pub use router::Router;
pub use stages::{
    DuplicateFilter, ExceptionHandler, TerminalKind, TerminalStage, DEFAULT_DUPLICATE_WINDOW,
};

use crate::model::{MessageContext, Route};
use crate::types::{Error, Result};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::time::Duration;

/// Reads the content of a raw message of type `M`.
pub trait BodyAdapter<M>: Send + Sync {
    fn read(&self, message: &M) -> Result<serde_json::Value>;
}

/// Read and deserialize the content as `C`.
pub fn read_content<C, M>(adapter: &dyn BodyAdapter<M>, message: &M) -> Result<C>
where
    C: DeserializeOwned,
{
    let value = adapter.read(message)?;
    serde_json::from_value(value).map_err(|e| {
        Error::adapter(format!(
            "cannot read {} from message body: {}",
            std::any::type_name::<C>(),
            e
        ))
    })
}

/// Builds the metadata of a raw message of type `M`.
pub trait MetadataAdapter<M>: Send + Sync {
    fn create(&self, message: &M) -> Result<MessageContext>;
}

/// Logger hooks around every inbound call.
pub trait RouterLogger: Send + Sync {
    fn on_entry(&self, _context: &MessageContext) {}

    fn on_success(&self, _context: &MessageContext, _content: &(dyn Any + Send + Sync)) {}

    fn on_exception(&self, _context: &MessageContext, _error: &Error) {}

    fn on_exit(&self, _context: &MessageContext, _elapsed: Duration) {}
}

/// Interceptor hooks, invoked after all loggers.
pub trait RouterInterceptor: Send + Sync {
    fn on_entry(&self, _context: &MessageContext) {}

    fn on_success(&self, _context: &MessageContext, _content: &(dyn Any + Send + Sync)) {}

    fn on_exception(&self, _context: &MessageContext, _error: &Error) {}

    fn on_exit(&self, _context: &MessageContext) {}
}

/// Idempotency/audit store written before a handler runs.
///
/// `context.track` is populated when `create` is called.
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync {
    fn create(&self, context: &MessageContext, route: &Route) -> Result<()>;
}

/// Interceptor that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRouterInterceptor;

impl RouterInterceptor for NullRouterInterceptor {}

/// Storage that accepts and discards every track.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn create(&self, _context: &MessageContext, _route: &Route) -> Result<()> {
        Ok(())
    }
}
