//! Capability resolution - turns configured type identifiers into collaborators.
//!
//! The resolver is an explicit registry: each capability slot maps type
//! identifiers to factories. It is populated during configuration and only
//! read afterwards, so a shared `Arc<CapabilityResolver>` needs no locking.
//! Singleton registrations construct their instance on first use.

use crate::inbound::{
    BodyAdapter, DuplicateFilter, MetadataAdapter, Middleware, NullRouterInterceptor,
    NullStorage, RouterInterceptor, RouterLogger, Storage,
};
use crate::logging::{TracingBusLogger, TracingRouterLogger};
use crate::model::DEFAULT_SETTING_FINDER;
use crate::outbound::{
    BusInterceptor, BusLogger, EnvSettingFinder, NullBusInterceptor, NullPointToPointChannel,
    NullPublishSubscribeChannel, PointToPointChannel, PublishSubscribeChannel, SettingFinder,
};
use crate::transport::{TransportBodyAdapter, TransportMessage, TransportMetadataAdapter};
use crate::types::{Error, Result, NULL_IDENTIFIER, TRACING_IDENTIFIER, TRANSPORT_IDENTIFIER};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Identifier of the built-in duplicate filter middleware.
pub const DUPLICATE_FILTER_IDENTIFIER: &str = "duplicate_filter";

// =============================================================================
// Slots
// =============================================================================

/// Collaborator slot named by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilitySlot {
    BodyAdapter,
    MetadataAdapter,
    PointToPointChannel,
    PublishSubscribeChannel,
    RouterLogger,
    RouterInterceptor,
    BusLogger,
    BusInterceptor,
    Storage,
    Middleware,
    SettingFinder,
}

impl fmt::Display for CapabilitySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilitySlot::BodyAdapter => "body adapter",
            CapabilitySlot::MetadataAdapter => "metadata adapter",
            CapabilitySlot::PointToPointChannel => "point-to-point channel",
            CapabilitySlot::PublishSubscribeChannel => "publish-subscribe channel",
            CapabilitySlot::RouterLogger => "router logger",
            CapabilitySlot::RouterInterceptor => "router interceptor",
            CapabilitySlot::BusLogger => "bus logger",
            CapabilitySlot::BusInterceptor => "bus interceptor",
            CapabilitySlot::Storage => "storage",
            CapabilitySlot::Middleware => "middleware",
            CapabilitySlot::SettingFinder => "setting finder",
        };
        f.write_str(name)
    }
}

/// A trait object type that can be resolved, tied to its slot.
pub trait Capability: Send + Sync + 'static {
    const SLOT: CapabilitySlot;
}

impl<M: 'static> Capability for dyn BodyAdapter<M> {
    const SLOT: CapabilitySlot = CapabilitySlot::BodyAdapter;
}

impl<M: 'static> Capability for dyn MetadataAdapter<M> {
    const SLOT: CapabilitySlot = CapabilitySlot::MetadataAdapter;
}

impl Capability for dyn PointToPointChannel {
    const SLOT: CapabilitySlot = CapabilitySlot::PointToPointChannel;
}

impl Capability for dyn PublishSubscribeChannel {
    const SLOT: CapabilitySlot = CapabilitySlot::PublishSubscribeChannel;
}

impl Capability for dyn RouterLogger {
    const SLOT: CapabilitySlot = CapabilitySlot::RouterLogger;
}

impl Capability for dyn RouterInterceptor {
    const SLOT: CapabilitySlot = CapabilitySlot::RouterInterceptor;
}

impl Capability for dyn BusLogger {
    const SLOT: CapabilitySlot = CapabilitySlot::BusLogger;
}

impl Capability for dyn BusInterceptor {
    const SLOT: CapabilitySlot = CapabilitySlot::BusInterceptor;
}

impl Capability for dyn Storage {
    const SLOT: CapabilitySlot = CapabilitySlot::Storage;
}

impl Capability for dyn Middleware {
    const SLOT: CapabilitySlot = CapabilitySlot::Middleware;
}

impl Capability for dyn SettingFinder {
    const SLOT: CapabilitySlot = CapabilitySlot::SettingFinder;
}

// =============================================================================
// Registry
// =============================================================================

/// Instance lifetime of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One shared instance, built on first resolution.
    Singleton,
    /// A fresh instance per resolution.
    Transient,
}

struct Factory<T: ?Sized>(Arc<dyn Fn() -> Arc<T> + Send + Sync>);

struct Registration {
    lifetime: Lifetime,
    /// Holds a `Factory<T>` for the slot's trait object type.
    factory: Box<dyn Any + Send + Sync>,
    /// Holds an `Arc<T>` once a singleton has been built.
    instance: OnceLock<Box<dyn Any + Send + Sync>>,
}

/// Registry of collaborator factories keyed by slot and type identifier.
#[derive(Default)]
pub struct CapabilityResolver {
    registrations: HashMap<CapabilitySlot, HashMap<String, Registration>>,
}

impl CapabilityResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver pre-populated with the built-in collaborators:
    /// null interceptors/storage/channels, tracing loggers, the transport
    /// adapters, the env setting finder and the duplicate filter.
    pub fn with_defaults() -> Self {
        let mut resolver = Self::new();
        resolver
            .register_instance::<dyn RouterInterceptor>(NULL_IDENTIFIER, Arc::new(NullRouterInterceptor))
            .register_instance::<dyn BusInterceptor>(NULL_IDENTIFIER, Arc::new(NullBusInterceptor))
            .register_instance::<dyn Storage>(NULL_IDENTIFIER, Arc::new(NullStorage))
            .register_instance::<dyn PointToPointChannel>(
                NULL_IDENTIFIER,
                Arc::new(NullPointToPointChannel),
            )
            .register_instance::<dyn PublishSubscribeChannel>(
                NULL_IDENTIFIER,
                Arc::new(NullPublishSubscribeChannel),
            )
            .register_instance::<dyn RouterLogger>(TRACING_IDENTIFIER, Arc::new(TracingRouterLogger))
            .register_instance::<dyn BusLogger>(TRACING_IDENTIFIER, Arc::new(TracingBusLogger))
            .register_instance::<dyn BodyAdapter<TransportMessage>>(
                TRANSPORT_IDENTIFIER,
                Arc::new(TransportBodyAdapter),
            )
            .register_instance::<dyn MetadataAdapter<TransportMessage>>(
                TRANSPORT_IDENTIFIER,
                Arc::new(TransportMetadataAdapter),
            )
            .register_instance::<dyn SettingFinder>(DEFAULT_SETTING_FINDER, Arc::new(EnvSettingFinder))
            .register::<dyn Middleware, _>(DUPLICATE_FILTER_IDENTIFIER, Lifetime::Singleton, || {
                Arc::new(DuplicateFilter::new())
            });
        resolver
    }

    /// Register a factory for `identifier` in `T`'s slot.
    ///
    /// A later registration under the same identifier replaces the earlier one.
    pub fn register<T, F>(&mut self, identifier: impl Into<String>, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Capability,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        tracing::debug!(slot = %T::SLOT, identifier = %identifier, ?lifetime, "capability registered");

        let factory: Factory<T> = Factory(Arc::new(factory));
        self.registrations.entry(T::SLOT).or_default().insert(
            identifier,
            Registration {
                lifetime,
                factory: Box::new(factory),
                instance: OnceLock::new(),
            },
        );
        self
    }

    /// Register an already-built shared instance.
    pub fn register_instance<T>(&mut self, identifier: impl Into<String>, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Capability,
    {
        self.register::<T, _>(identifier, Lifetime::Singleton, move || instance.clone())
    }

    /// Check if an identifier is registered in `T`'s slot.
    pub fn contains<T: ?Sized + Capability>(&self, identifier: &str) -> bool {
        self.registrations
            .get(&T::SLOT)
            .is_some_and(|slot| slot.contains_key(identifier))
    }

    /// Resolve `identifier` to a live collaborator.
    pub fn create<T: ?Sized + Capability>(&self, identifier: &str) -> Result<Arc<T>> {
        let registration = self
            .registrations
            .get(&T::SLOT)
            .and_then(|slot| slot.get(identifier))
            .ok_or_else(|| {
                Error::capability(format!("no {} registered as '{}'", T::SLOT, identifier))
            })?;

        let factory = registration
            .factory
            .downcast_ref::<Factory<T>>()
            .ok_or_else(|| mismatch::<T>(identifier))?;

        match registration.lifetime {
            Lifetime::Transient => Ok((factory.0)()),
            Lifetime::Singleton => registration
                .instance
                .get_or_init(|| Box::new((factory.0)()) as Box<dyn Any + Send + Sync>)
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or_else(|| mismatch::<T>(identifier)),
        }
    }

    /// Resolve every identifier in order.
    pub fn create_all<T: ?Sized + Capability>(&self, identifiers: &[String]) -> Result<Vec<Arc<T>>> {
        identifiers.iter().map(|id| self.create::<T>(id)).collect()
    }

    /// Registered identifiers of a slot, sorted.
    pub fn identifiers(&self, slot: CapabilitySlot) -> Vec<String> {
        let mut ids: Vec<String> = self
            .registrations
            .get(&slot)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

fn mismatch<T: ?Sized + Capability>(identifier: &str) -> Error {
    Error::capability(format!(
        "'{}' is registered as a {} but does not provide {}",
        identifier,
        T::SLOT,
        std::any::type_name::<T>()
    ))
}

impl fmt::Debug for CapabilityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (slot, registrations) in &self.registrations {
            let mut ids: Vec<&String> = registrations.keys().collect();
            ids.sort();
            map.entry(slot, &ids);
        }
        map.finish()
    }
}
