//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as the source of handler faults.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error enum for the router and bus.
#[derive(Error, Debug)]
pub enum Error {
    /// `route()` found no route for the content type and route name.
    #[error(
        "no route to handle the message {message_type} with content {content_type} and route name '{route_name}'"
    )]
    NoRouteFound {
        message_type: String,
        content_type: String,
        route_name: String,
    },

    /// `route_to_saga()` could not resolve the saga by name.
    #[error(
        "no saga to handle the message {message_type} with content {content_type} and saga name '{saga_name}'"
    )]
    NoSagaFound {
        message_type: String,
        content_type: String,
        saga_name: String,
    },

    /// The saga exists but neither its starting route nor any next route applies.
    #[error(
        "no continuation in saga '{saga_name}' to handle the message {message_type} with content {content_type} and route name '{route_name}'"
    )]
    NoContinuationFound {
        message_type: String,
        content_type: String,
        saga_name: String,
        route_name: String,
    },

    /// Fault raised by a middleware stage or a terminal handler.
    #[error("handler fault: {message}")]
    Handler {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Fault raised by an outbound channel.
    #[error("channel fault ({channel}): {message}")]
    Channel { channel: String, message: String },

    /// Outer wrapper around a root cause.
    #[error("{context}: {inner}")]
    Wrapped {
        context: String,
        #[source]
        inner: Box<Error>,
    },

    /// A type identifier could not be turned into a collaborator.
    #[error("capability error: {0}")]
    Capability(String),

    /// Body or metadata adapter failure.
    #[error("adapter error: {0}")]
    Adapter(String),

    /// Dispatch refused because the endpoint resolved to no destination.
    #[error("no destination configured for endpoint '{end_point}' (content {content_type})")]
    MissingDestination {
        end_point: String,
        content_type: String,
    },

    /// Validation errors (configuration, builders).
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler {
            message: msg.into(),
            source: None,
        }
    }

    /// Handler fault carrying an arbitrary underlying error.
    pub fn handler_from<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn channel(channel: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Channel {
            channel: channel.into(),
            message: msg.into(),
        }
    }

    /// Wrap `inner` with an outer context message.
    pub fn wrap(context: impl Into<String>, inner: Error) -> Self {
        Self::Wrapped {
            context: context.into(),
            inner: Box::new(inner),
        }
    }

    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Strip every `Wrapped` layer.
    ///
    /// Returns the innermost error and the outer context messages that were
    /// removed, outermost first.
    pub fn into_root_cause(self) -> (Error, Vec<String>) {
        let mut contexts = Vec::new();
        let mut current = self;
        while let Error::Wrapped { context, inner } = current {
            contexts.push(context);
            current = *inner;
        }
        (current, contexts)
    }

    /// True for the three "nothing matched" kinds.
    pub fn is_routing_error(&self) -> bool {
        matches!(
            self,
            Error::NoRouteFound { .. } | Error::NoSagaFound { .. } | Error::NoContinuationFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_of_plain_error_is_itself() {
        let (root, contexts) = Error::handler("boom").into_root_cause();
        assert!(matches!(root, Error::Handler { .. }));
        assert!(contexts.is_empty());
    }

    #[test]
    fn test_root_cause_strips_nested_wrappers() {
        let err = Error::wrap(
            "pipeline",
            Error::wrap("stage", Error::channel("queue", "refused")),
        );
        let (root, contexts) = err.into_root_cause();
        assert!(matches!(root, Error::Channel { .. }));
        assert_eq!(contexts, vec!["pipeline".to_string(), "stage".to_string()]);
    }

    #[test]
    fn test_handler_from_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = Error::handler_from(io);
        assert_eq!(err.to_string(), "handler fault: disk");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_routing_error_messages() {
        let err = Error::NoRouteFound {
            message_type: "Raw".to_string(),
            content_type: "Order".to_string(),
            route_name: "orders".to_string(),
        };
        assert!(err.is_routing_error());
        assert!(err.to_string().contains("no route to handle the message Raw"));
        assert!(!Error::validation("x").is_routing_error());
    }
}
