//! Core types for the router.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (MessageId, SagaId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Collaborator type identifiers and observability settings

mod config;
mod errors;
mod ids;

pub use config::{
    Config, InboundConfig, ObservabilityConfig, OutboundConfig, NULL_IDENTIFIER,
    TRACING_IDENTIFIER, TRANSPORT_IDENTIFIER,
};
pub use errors::{BoxError, Error, Result};
pub use ids::{MessageId, SagaId};
