//! # Switchyard - Message Routing and Saga Orchestration
//!
//! Transport-agnostic routing core providing:
//! - Route and saga resolution by content type and name
//! - An ordered middleware pipeline with short-circuiting and failure capture
//! - An inbound [`Router`] and an outbound [`Bus`] with entry/success/failure/exit hooks
//! - Capability resolution from configured type identifiers
//! - An in-memory broker for in-process delivery and tests
//!
//! ## Architecture
//!
//! ```text
//!   raw message ─→ Router ─→ RouteCatalog ─→ Pipeline per matched route
//!                    │                         [exception handler, middleware…, terminal]
//!                    └── CapabilityResolver (adapters, loggers, interceptor, storage)
//!
//!   content ─────→ Bus ────→ EndPointCatalog ─→ envelope per endpoint ─→ channel
//! ```
//!
//! Catalogs and the resolver are populated once and read-only afterwards;
//! every entry point runs synchronously on the caller's thread.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod capability;
pub mod inbound;
pub mod logging;
pub mod model;
pub mod outbound;
pub mod table;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;

pub use capability::{CapabilityResolver, Lifetime};
pub use inbound::{RouteCatalog, Router};
pub use model::{ContentType, EndPoint, EndPointSetting, MessageContext, Options, Origin, Route, Saga};
pub use outbound::{Bus, EndPointCatalog};
pub use table::{RoutingTable, RoutingTableBuilder};
pub use types::{Config, Error, Result};
