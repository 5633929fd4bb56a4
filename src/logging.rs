//! `tracing` backed router and bus loggers, registered as `"tracing"`.

use crate::inbound::RouterLogger;
use crate::model::{MessageContext, Options, OutboundMessageContext};
use crate::outbound::BusLogger;
use crate::types::Error;
use std::any::Any;
use std::time::Duration;

/// Emits one structured event per inbound hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRouterLogger;

impl RouterLogger for TracingRouterLogger {
    fn on_entry(&self, context: &MessageContext) {
        tracing::debug!(
            message_id = %context.id,
            content_type = context.content_type_name(),
            origin = %context.origin.name,
            "message received"
        );
    }

    fn on_success(&self, context: &MessageContext, _content: &(dyn Any + Send + Sync)) {
        tracing::info!(
            message_id = %context.id,
            content_type = context.content_type_name(),
            "message handled"
        );
    }

    fn on_exception(&self, context: &MessageContext, error: &Error) {
        tracing::error!(
            message_id = %context.id,
            content_type = context.content_type_name(),
            error = %error,
            "message failed"
        );
    }

    fn on_exit(&self, context: &MessageContext, elapsed: Duration) {
        tracing::debug!(
            message_id = %context.id,
            elapsed_ms = elapsed.as_millis() as u64,
            "message done"
        );
    }
}

/// Emits one structured event per outbound hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBusLogger;

impl TracingBusLogger {
    fn success(&self, mode: &str, context: &OutboundMessageContext) {
        let to = format!("{}/{}", context.to_connection_string, context.to_path);
        tracing::info!(
            mode,
            message_id = %context.id,
            content_type = %context.content_type,
            to = %to,
            "message dispatched"
        );
    }

    fn error(&self, mode: &str, context: &OutboundMessageContext, error: &Error) {
        tracing::error!(
            mode,
            message_id = %context.id,
            content_type = %context.content_type,
            error = %error,
            "dispatch failed"
        );
    }

    fn exit(&self, mode: &str, context: &OutboundMessageContext, elapsed: Duration) {
        tracing::debug!(
            mode,
            message_id = %context.id,
            elapsed_ms = elapsed.as_millis() as u64,
            "dispatch done"
        );
    }
}

impl BusLogger for TracingBusLogger {
    fn on_send_entry(&self, context: &OutboundMessageContext, options: &Options) {
        tracing::debug!(
            message_id = %context.id,
            end_point = %options.end_point_name,
            "sending"
        );
    }

    fn on_send_success(&self, context: &OutboundMessageContext, _options: &Options) {
        self.success("send", context);
    }

    fn on_send_error(&self, context: &OutboundMessageContext, _options: &Options, error: &Error) {
        self.error("send", context, error);
    }

    fn on_send_exit(&self, context: &OutboundMessageContext, _options: &Options, elapsed: Duration) {
        self.exit("send", context, elapsed);
    }

    fn on_publish_entry(&self, context: &OutboundMessageContext, options: &Options) {
        tracing::debug!(
            message_id = %context.id,
            end_point = %options.end_point_name,
            "publishing"
        );
    }

    fn on_publish_success(&self, context: &OutboundMessageContext, _options: &Options) {
        self.success("publish", context);
    }

    fn on_publish_error(&self, context: &OutboundMessageContext, _options: &Options, error: &Error) {
        self.error("publish", context, error);
    }

    fn on_publish_exit(&self, context: &OutboundMessageContext, _options: &Options, elapsed: Duration) {
        self.exit("publish", context, elapsed);
    }
}
