//! Data model shared by the router and the bus.
//!
//! - **Route / Saga**: inbound processing units, immutable once configured
//! - **EndPoint / EndPointSetting**: outbound bindings and their resolved destinations
//! - **Contexts**: per-call metadata, envelopes and correlation tracks

mod content_type;
mod context;
mod endpoint;
mod route;

pub use content_type::ContentType;
pub use context::{
    InboundMessageContext, MessageContext, Options, Origin, OutboundMessageContext, Track,
};
pub use endpoint::{EndPoint, EndPointBuilder, EndPointSetting, DEFAULT_SETTING_FINDER};
pub use route::{MessageHandler, Route, Saga, SagaBuilder};
