//! Configuration structures.
//!
//! Every collaborator is named by a type identifier; the
//! [`CapabilityResolver`](crate::capability::CapabilityResolver) turns those
//! identifiers into live instances.

use super::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifier of the do-nothing collaborators.
pub const NULL_IDENTIFIER: &str = "null";
/// Identifier of the in-memory transport adapters and channels.
pub const TRANSPORT_IDENTIFIER: &str = "transport";
/// Identifier of the `tracing` backed loggers.
pub const TRACING_IDENTIFIER: &str = "tracing";

/// Global router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logical name of the running application.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Inbound (router) collaborators.
    #[serde(default)]
    pub inbound: InboundConfig,

    /// Outbound (bus) collaborators.
    #[serde(default)]
    pub outbound: OutboundConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_application_name() -> String {
    "[Empty]".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            inbound: InboundConfig::default(),
            outbound: OutboundConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Parse a JSON document. Missing sections take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject blank type identifiers.
    pub fn validate(&self) -> Result<()> {
        let single = [
            ("inbound.body_adapter", &self.inbound.body_adapter),
            ("inbound.metadata_adapter", &self.inbound.metadata_adapter),
            ("inbound.interceptor", &self.inbound.interceptor),
            ("inbound.storage", &self.inbound.storage),
            (
                "outbound.point_to_point_channel",
                &self.outbound.point_to_point_channel,
            ),
            (
                "outbound.publish_subscribe_channel",
                &self.outbound.publish_subscribe_channel,
            ),
            ("outbound.interceptor", &self.outbound.interceptor),
        ];
        for (field, value) in single {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{} cannot be empty", field)));
            }
        }

        let lists = [
            ("inbound.loggers", &self.inbound.loggers),
            ("inbound.middleware", &self.inbound.middleware),
            ("outbound.loggers", &self.outbound.loggers),
        ];
        for (field, values) in lists {
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(Error::validation(format!(
                    "{} contains an empty identifier",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Inbound collaborators, by type identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Turns a raw message into content.
    pub body_adapter: String,

    /// Turns a raw message into a `MessageContext`.
    pub metadata_adapter: String,

    /// Router loggers, invoked in order.
    pub loggers: Vec<String>,

    /// Router interceptor, invoked after the loggers.
    pub interceptor: String,

    /// Storage written by the terminal stage.
    pub storage: String,

    /// Middleware run before every route's own middleware.
    pub middleware: Vec<String>,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            body_adapter: TRANSPORT_IDENTIFIER.to_string(),
            metadata_adapter: TRANSPORT_IDENTIFIER.to_string(),
            loggers: Vec::new(),
            interceptor: NULL_IDENTIFIER.to_string(),
            storage: NULL_IDENTIFIER.to_string(),
            middleware: Vec::new(),
        }
    }
}

/// Outbound collaborators, by type identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Channel used by send and fire-and-forget.
    pub point_to_point_channel: String,

    /// Channel used by publish.
    pub publish_subscribe_channel: String,

    /// Bus loggers, invoked in order.
    pub loggers: Vec<String>,

    /// Bus interceptor, invoked after the loggers.
    pub interceptor: String,

    /// When true an endpoint without connection string or path is skipped
    /// silently. When false the dispatch fails with `MissingDestination`.
    pub skip_empty_destination: bool,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            point_to_point_channel: NULL_IDENTIFIER.to_string(),
            publish_subscribe_channel: NULL_IDENTIFIER.to_string(),
            loggers: Vec::new(),
            interceptor: NULL_IDENTIFIER.to_string(),
            skip_empty_destination: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
