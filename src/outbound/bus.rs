//! Outbound bus.
//!
//! Every mode has three entry points: by content type (`send`), by content
//! type with a caller origin (`send_from`), and to an explicit setting
//! (`send_to`). The first two fan out one dispatch per resolved endpoint.

use super::catalog::EndPointCatalog;
use super::{BusInterceptor, BusLogger, PointToPointChannel, PublishSubscribeChannel};
use crate::capability::CapabilityResolver;
use crate::model::{ContentType, EndPointSetting, Options, Origin, OutboundMessageContext};
use crate::types::{Error, OutboundConfig, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Delivery mode of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Point-to-point.
    Send,
    /// Broadcast to every subscriber.
    Publish,
    /// Point-to-point with an empty origin key: no reply is expected.
    ///
    /// Still synchronous; returns once the channel has accepted the envelope.
    FireAndForget,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Send => f.write_str("send"),
            DispatchMode::Publish => f.write_str("publish"),
            DispatchMode::FireAndForget => f.write_str("fire_and_forget"),
        }
    }
}

/// Sends, publishes and fires-and-forgets content through the configured channels.
#[derive(Debug, Clone)]
pub struct Bus {
    catalog: Arc<EndPointCatalog>,
    resolver: Arc<CapabilityResolver>,
    config: OutboundConfig,
}

impl Bus {
    pub fn new(
        catalog: Arc<EndPointCatalog>,
        resolver: Arc<CapabilityResolver>,
        config: OutboundConfig,
    ) -> Self {
        Self {
            catalog,
            resolver,
            config,
        }
    }

    pub fn catalog(&self) -> &EndPointCatalog {
        &self.catalog
    }

    // =========================================================================
    // Send
    // =========================================================================

    pub fn send<C>(&self, content: &C, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(DispatchMode::Send, content, &Origin::default(), options)
    }

    pub fn send_from<C>(&self, content: &C, origin: &Origin, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(DispatchMode::Send, content, origin, options)
    }

    pub fn send_to<C>(
        &self,
        content: &C,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch(DispatchMode::Send, content, setting, origin, options)
    }

    // =========================================================================
    // Publish
    // =========================================================================

    pub fn publish<C>(&self, content: &C, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(DispatchMode::Publish, content, &Origin::default(), options)
    }

    pub fn publish_from<C>(&self, content: &C, origin: &Origin, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(DispatchMode::Publish, content, origin, options)
    }

    pub fn publish_to<C>(
        &self,
        content: &C,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch(DispatchMode::Publish, content, setting, origin, options)
    }

    // =========================================================================
    // Fire and forget
    // =========================================================================

    pub fn fire_and_forget<C>(&self, content: &C, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(
            DispatchMode::FireAndForget,
            content,
            &Origin::default(),
            options,
        )
    }

    pub fn fire_and_forget_from<C>(&self, content: &C, origin: &Origin, options: &Options) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch_by_type(DispatchMode::FireAndForget, content, origin, options)
    }

    pub fn fire_and_forget_to<C>(
        &self,
        content: &C,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        self.dispatch(DispatchMode::FireAndForget, content, setting, origin, options)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// One dispatch per endpoint of `C` named `options.end_point_name`.
    /// Stops at the first failing endpoint.
    fn dispatch_by_type<C>(
        &self,
        mode: DispatchMode,
        content: &C,
        origin: &Origin,
        options: &Options,
    ) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        let content_type = ContentType::of::<C>();
        let end_points = self
            .catalog
            .resolve_end_points(&content_type, &options.end_point_name);

        if end_points.is_empty() {
            tracing::debug!(
                %mode,
                content_type = %content_type,
                end_point = %options.end_point_name,
                "no endpoint configured, nothing dispatched"
            );
        }

        for end_point in end_points {
            // The setting's origin already holds the endpoint defaults and the
            // `from` extractor's name.
            match self.catalog.resolve_setting(end_point, content) {
                Ok(setting) => self.dispatch(mode, content, &setting, origin, options)?,
                Err(err) => {
                    let setting = EndPointSetting {
                        end_point: end_point.name().to_string(),
                        origin: end_point.origin().clone(),
                        ..EndPointSetting::default()
                    };
                    self.deliver(mode, content_type, Err(err), &setting, origin, options)?;
                }
            }
        }
        Ok(())
    }

    fn dispatch<C>(
        &self,
        mode: DispatchMode,
        content: &C,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> Result<()>
    where
        C: Serialize + Send + Sync + 'static,
    {
        let value = serde_json::to_value(content).map_err(Error::from);
        self.deliver(mode, ContentType::of::<C>(), value, setting, origin, options)
    }

    /// Hook template around one channel send.
    ///
    /// Only the logger and interceptor lookups fail before the entry hooks.
    /// A content or setting failure arrives as `Err` in `content` and goes
    /// through the error and exit hooks with a null body.
    fn deliver(
        &self,
        mode: DispatchMode,
        content_type: ContentType,
        content: Result<serde_json::Value>,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> Result<()> {
        let span = tracing::info_span!(
            "bus_dispatch",
            %mode,
            message_id = %options.id,
            end_point = %setting.end_point
        );
        let _guard = span.enter();

        let started = Instant::now();

        let hooks = Hooks {
            mode,
            loggers: self
                .resolver
                .create_all::<dyn BusLogger>(&self.config.loggers)?,
            interceptor: self
                .resolver
                .create::<dyn BusInterceptor>(&self.config.interceptor)?,
        };

        let (value, failure) = match content {
            Ok(value) => (value, None),
            Err(err) => (serde_json::Value::Null, Some(err)),
        };
        let envelope = self.envelope(mode, content_type, value, setting, origin, options);

        hooks.entry(&envelope, options);

        let result = match failure {
            Some(err) => Err(err),
            None => self.transmit(mode, &hooks, &envelope, setting, options),
        };
        if let Err(err) = &result {
            hooks.error(&envelope, options, err);
        }

        hooks.exit(&envelope, options, started.elapsed());
        result
    }

    /// Hand `envelope` to the mode's channel, or apply the empty-destination rule.
    fn transmit(
        &self,
        mode: DispatchMode,
        hooks: &Hooks,
        envelope: &OutboundMessageContext,
        setting: &EndPointSetting,
        options: &Options,
    ) -> Result<()> {
        let channel = self.channel(mode)?;

        if envelope.has_destination() {
            channel.send(envelope)?;
            hooks.success(envelope, options);
            Ok(())
        } else if self.config.skip_empty_destination {
            tracing::debug!(
                message_id = %envelope.id,
                end_point = %setting.end_point,
                "empty destination, dispatch skipped"
            );
            Ok(())
        } else {
            Err(Error::MissingDestination {
                end_point: setting.end_point.clone(),
                content_type: envelope.content_type.clone(),
            })
        }
    }

    fn channel(&self, mode: DispatchMode) -> Result<Channel> {
        Ok(match mode {
            DispatchMode::Publish => Channel::PublishSubscribe(
                self.resolver
                    .create::<dyn PublishSubscribeChannel>(&self.config.publish_subscribe_channel)?,
            ),
            DispatchMode::Send | DispatchMode::FireAndForget => Channel::PointToPoint(
                self.resolver
                    .create::<dyn PointToPointChannel>(&self.config.point_to_point_channel)?,
            ),
        })
    }

    fn envelope(
        &self,
        mode: DispatchMode,
        content_type: ContentType,
        content: serde_json::Value,
        setting: &EndPointSetting,
        origin: &Origin,
        options: &Options,
    ) -> OutboundMessageContext {
        let mut origin = origin.clone().or_defaults(&setting.origin);
        if mode == DispatchMode::FireAndForget {
            origin.key.clear();
        }

        OutboundMessageContext {
            id: options.id.to_string(),
            content_type: content_type.name().to_string(),
            content,
            to_connection_string: setting.to_connection_string.clone(),
            to_path: setting.to_path.clone(),
            reply_to_connection_string: setting.reply_to_connection_string.clone(),
            reply_to_path: setting.reply_to_path.clone(),
            origin,
            headers: options.headers.clone(),
            version: options.version.clone(),
            scheduled_enqueue_at: options.scheduled_enqueue_at,
            retry_count: options.retry_count,
            saga_id: options.saga_id.clone(),
        }
    }
}

enum Channel {
    PointToPoint(Arc<dyn PointToPointChannel>),
    PublishSubscribe(Arc<dyn PublishSubscribeChannel>),
}

impl Channel {
    fn send(&self, envelope: &OutboundMessageContext) -> Result<()> {
        match self {
            Channel::PointToPoint(channel) => channel.send(envelope),
            Channel::PublishSubscribe(channel) => channel.send(envelope),
        }
    }
}

/// Mode-aware hook fan-out: loggers first, interceptor last.
struct Hooks {
    mode: DispatchMode,
    loggers: Vec<Arc<dyn BusLogger>>,
    interceptor: Arc<dyn BusInterceptor>,
}

impl Hooks {
    fn publishing(&self) -> bool {
        self.mode == DispatchMode::Publish
    }

    fn entry(&self, envelope: &OutboundMessageContext, options: &Options) {
        if self.publishing() {
            self.loggers
                .iter()
                .for_each(|l| l.on_publish_entry(envelope, options));
            self.interceptor.on_publish_entry(envelope, options);
        } else {
            self.loggers
                .iter()
                .for_each(|l| l.on_send_entry(envelope, options));
            self.interceptor.on_send_entry(envelope, options);
        }
    }

    fn success(&self, envelope: &OutboundMessageContext, options: &Options) {
        if self.publishing() {
            self.loggers
                .iter()
                .for_each(|l| l.on_publish_success(envelope, options));
            self.interceptor.on_publish_success(envelope, options);
        } else {
            self.loggers
                .iter()
                .for_each(|l| l.on_send_success(envelope, options));
            self.interceptor.on_send_success(envelope, options);
        }
    }

    fn error(&self, envelope: &OutboundMessageContext, options: &Options, error: &Error) {
        if self.publishing() {
            self.loggers
                .iter()
                .for_each(|l| l.on_publish_error(envelope, options, error));
            self.interceptor.on_publish_error(envelope, options, error);
        } else {
            self.loggers
                .iter()
                .for_each(|l| l.on_send_error(envelope, options, error));
            self.interceptor.on_send_error(envelope, options, error);
        }
    }

    fn exit(&self, envelope: &OutboundMessageContext, options: &Options, elapsed: Duration) {
        if self.publishing() {
            self.loggers
                .iter()
                .for_each(|l| l.on_publish_exit(envelope, options, elapsed));
            self.interceptor.on_publish_exit(envelope, options);
        } else {
            self.loggers
                .iter()
                .for_each(|l| l.on_send_exit(envelope, options, elapsed));
            self.interceptor.on_send_exit(envelope, options);
        }
    }
}
