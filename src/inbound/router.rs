//! Inbound router.
//!
//! Both entry points share one template: resolve collaborators, build the
//! context, fire entry hooks, dispatch, fire success or exception hooks, and
//! always fire exit hooks. Loggers run before the interceptor in every phase.

use super::catalog::RouteCatalog;
use super::pipeline::{Middleware, MiddlewareParameter, Pipeline};
use super::stages::{ExceptionHandler, TerminalKind, TerminalStage};
use super::{read_content, BodyAdapter, MetadataAdapter, RouterInterceptor, RouterLogger, Storage};
use crate::capability::CapabilityResolver;
use crate::model::{ContentType, InboundMessageContext, MessageContext, Route, Saga};
use crate::types::{Error, InboundConfig, Result};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::sync::Arc;
use std::time::Instant;

/// What an entry point asks the router to dispatch to.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Route { route_name: &'a str },
    Saga { saga_name: &'a str, route_name: &'a str },
}

/// Routes inbound messages to their handlers.
///
/// Cheap to share: the catalog and resolver are read-only after construction.
#[derive(Debug, Clone)]
pub struct Router {
    catalog: Arc<RouteCatalog>,
    resolver: Arc<CapabilityResolver>,
    config: InboundConfig,
}

impl Router {
    pub fn new(
        catalog: Arc<RouteCatalog>,
        resolver: Arc<CapabilityResolver>,
        config: InboundConfig,
    ) -> Self {
        Self {
            catalog,
            resolver,
            config,
        }
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    /// Dispatch `message` as content `C` to every route matching `route_name`
    /// (all routes of `C` when empty).
    ///
    /// # Errors
    ///
    /// `NoRouteFound` when nothing matches; otherwise the root cause of any
    /// collaborator or handler failure.
    pub fn route<C, M>(&self, message: &M, route_name: &str) -> Result<()>
    where
        C: DeserializeOwned + Send + Sync + 'static,
        M: 'static,
    {
        let span = tracing::info_span!(
            "route",
            content_type = ContentType::of::<C>().name(),
            route_name
        );
        let _guard = span.enter();
        self.run::<C, M>(message, Target::Route { route_name })
    }

    /// Dispatch `message` as content `C` to the saga named `saga_name`.
    ///
    /// The starting route runs when its content type is `C`, whatever
    /// `route_name` says. Otherwise the matching next routes run.
    pub fn route_to_saga<C, M>(&self, message: &M, saga_name: &str, route_name: &str) -> Result<()>
    where
        C: DeserializeOwned + Send + Sync + 'static,
        M: 'static,
    {
        let span = tracing::info_span!(
            "route_to_saga",
            content_type = ContentType::of::<C>().name(),
            saga_name,
            route_name
        );
        let _guard = span.enter();
        self.run::<C, M>(
            message,
            Target::Saga {
                saga_name,
                route_name,
            },
        )
    }

    fn run<C, M>(&self, message: &M, target: Target<'_>) -> Result<()>
    where
        C: DeserializeOwned + Send + Sync + 'static,
        M: 'static,
    {
        let started = Instant::now();

        let body = self
            .resolver
            .create::<dyn BodyAdapter<M>>(&self.config.body_adapter)?;
        let metadata_adapter = self
            .resolver
            .create::<dyn MetadataAdapter<M>>(&self.config.metadata_adapter)?;
        let loggers = self
            .resolver
            .create_all::<dyn RouterLogger>(&self.config.loggers)?;
        let interceptor = self
            .resolver
            .create::<dyn RouterInterceptor>(&self.config.interceptor)?;

        let mut metadata = metadata_adapter.create(message)?;
        metadata.content_type = Some(ContentType::of::<C>());

        for logger in &loggers {
            logger.on_entry(&metadata);
        }
        interceptor.on_entry(&metadata);

        let result = match self.dispatch::<C, M>(body.as_ref(), message, &mut metadata, target) {
            Ok(content) => {
                for logger in &loggers {
                    logger.on_success(&metadata, &content);
                }
                interceptor.on_success(&metadata, &content);
                Ok(())
            }
            Err(err) => {
                let (root, outer) = err.into_root_cause();
                if !outer.is_empty() {
                    tracing::warn!(
                        message_id = %metadata.id,
                        outer = ?outer,
                        root = %root,
                        "reporting root cause of wrapped failure"
                    );
                }
                for logger in &loggers {
                    logger.on_exception(&metadata, &root);
                }
                interceptor.on_exception(&metadata, &root);
                Err(root)
            }
        };

        let elapsed = started.elapsed();
        for logger in &loggers {
            logger.on_exit(&metadata, elapsed);
        }
        interceptor.on_exit(&metadata);

        result
    }

    /// Resolve the matching routes, read the content and run one pipeline per
    /// route. Returns the content for the success hooks.
    ///
    /// Every pipeline shares one context; its enriched metadata (saga id,
    /// track) is written back to `metadata`, on failure too.
    fn dispatch<C, M>(
        &self,
        body: &dyn BodyAdapter<M>,
        message: &M,
        metadata: &mut MessageContext,
        target: Target<'_>,
    ) -> Result<C>
    where
        C: DeserializeOwned + Send + Sync + 'static,
        M: 'static,
    {
        let content_type = ContentType::of::<C>();
        let (routes, saga, kind) = self.resolve::<M>(&content_type, target)?;

        let content: C = read_content(body, message)?;
        let storage = self.resolver.create::<dyn Storage>(&self.config.storage)?;
        let global = self
            .resolver
            .create_all::<dyn Middleware>(&self.config.middleware)?;

        let mut context = InboundMessageContext::new(metadata.clone(), &content);
        let outcome = routes.into_iter().try_for_each(|route| -> Result<()> {
            let own = self.resolver.create_all::<dyn Middleware>(route.middleware())?;

            let mut stages: Vec<Arc<dyn Middleware>> = Vec::with_capacity(global.len() + own.len() + 2);
            stages.push(Arc::new(ExceptionHandler));
            stages.extend(global.iter().cloned());
            stages.extend(own);
            stages.push(Arc::new(TerminalStage::new(kind, storage.clone())));

            let parameter = MiddlewareParameter { route, saga };
            Pipeline::new(&stages).execute(&mut context, &parameter)
        });
        *metadata = context.metadata;

        outcome.map(|()| content)
    }

    fn resolve<M>(
        &self,
        content_type: &ContentType,
        target: Target<'_>,
    ) -> Result<(Vec<&Route>, Option<&Saga>, TerminalKind)> {
        match target {
            Target::Route { route_name } => {
                let routes = self.catalog.resolve_routes(content_type, route_name);
                if routes.is_empty() {
                    return Err(Error::NoRouteFound {
                        message_type: type_name::<M>().to_string(),
                        content_type: content_type.name().to_string(),
                        route_name: route_name.to_string(),
                    });
                }
                Ok((routes, None, TerminalKind::Message))
            }
            Target::Saga {
                saga_name,
                route_name,
            } => {
                let saga = self
                    .catalog
                    .resolve_saga(saga_name)
                    .ok_or_else(|| Error::NoSagaFound {
                        message_type: type_name::<M>().to_string(),
                        content_type: content_type.name().to_string(),
                        saga_name: saga_name.to_string(),
                    })?;

                if saga.starting_route().content_type() == *content_type {
                    return Ok((
                        vec![saga.starting_route()],
                        Some(saga),
                        TerminalKind::StartingMessage,
                    ));
                }

                let routes =
                    self.catalog
                        .resolve_continuations(saga.next_routes(), content_type, route_name);
                if routes.is_empty() {
                    return Err(Error::NoContinuationFound {
                        message_type: type_name::<M>().to_string(),
                        content_type: content_type.name().to_string(),
                        saga_name: saga_name.to_string(),
                        route_name: route_name.to_string(),
                    });
                }
                Ok((routes, Some(saga), TerminalKind::NextMessage))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::Next;
    use crate::types::NULL_IDENTIFIER;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    struct Raw {
        id: &'static str,
        body: serde_json::Value,
    }

    struct RawBody;

    impl BodyAdapter<Raw> for RawBody {
        fn read(&self, message: &Raw) -> Result<serde_json::Value> {
            Ok(message.body.clone())
        }
    }

    struct RawMetadata;

    impl MetadataAdapter<Raw> for RawMetadata {
        fn create(&self, message: &Raw) -> Result<MessageContext> {
            Ok(MessageContext::new(message.id))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Message {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Message1 {
        #[allow(dead_code)]
        name: String,
    }

    type Events = Arc<Mutex<Vec<String>>>;

    /// Records every hook as `<tag>:<hook>`.
    struct Recorder {
        tag: &'static str,
        events: Events,
    }

    impl Recorder {
        fn push(&self, hook: &str) {
            self.events.lock().push(format!("{}:{}", self.tag, hook));
        }
    }

    impl RouterLogger for Recorder {
        fn on_entry(&self, _context: &MessageContext) {
            self.push("entry");
        }

        fn on_success(&self, _context: &MessageContext, _content: &(dyn Any + Send + Sync)) {
            self.push("success");
        }

        fn on_exception(&self, _context: &MessageContext, error: &Error) {
            self.push(&format!("exception({})", error));
        }

        fn on_exit(&self, _context: &MessageContext, _elapsed: Duration) {
            self.push("exit");
        }
    }

    impl RouterInterceptor for Recorder {
        fn on_entry(&self, _context: &MessageContext) {
            self.push("entry");
        }

        fn on_success(&self, _context: &MessageContext, _content: &(dyn Any + Send + Sync)) {
            self.push("success");
        }

        fn on_exception(&self, _context: &MessageContext, error: &Error) {
            self.push(&format!("exception({})", error));
        }

        fn on_exit(&self, _context: &MessageContext) {
            self.push("exit");
        }
    }

    /// Never runs the rest of the chain.
    struct Veto;

    impl Middleware for Veto {
        fn execute(
            &self,
            _context: &mut InboundMessageContext<'_>,
            _next: Next<'_>,
            _parameter: &MiddlewareParameter<'_>,
        ) -> Result<()> {
            Ok(())
        }
    }

    /// Keeps the context handed to the success and exit hooks.
    #[derive(Default)]
    struct Snapshot {
        success: Mutex<Option<MessageContext>>,
        exit: Mutex<Option<MessageContext>>,
    }

    impl RouterInterceptor for Snapshot {
        fn on_success(&self, context: &MessageContext, _content: &(dyn Any + Send + Sync)) {
            *self.success.lock() = Some(context.clone());
        }

        fn on_exit(&self, context: &MessageContext) {
            *self.exit.lock() = Some(context.clone());
        }
    }

    fn router(routes: Vec<Route>, sagas: Vec<Saga>, events: &Events) -> Router {
        let interceptor = Arc::new(Recorder {
            tag: "interceptor",
            events: events.clone(),
        });
        router_with(routes, sagas, events, interceptor)
    }

    fn router_with(
        routes: Vec<Route>,
        sagas: Vec<Saga>,
        events: &Events,
        interceptor: Arc<dyn RouterInterceptor>,
    ) -> Router {
        let mut resolver = CapabilityResolver::with_defaults();
        resolver
            .register_instance::<dyn BodyAdapter<Raw>>("raw", Arc::new(RawBody))
            .register_instance::<dyn MetadataAdapter<Raw>>("raw", Arc::new(RawMetadata))
            .register_instance::<dyn RouterLogger>(
                "recorder",
                Arc::new(Recorder {
                    tag: "logger",
                    events: events.clone(),
                }),
            )
            .register_instance::<dyn RouterInterceptor>("recorder", interceptor)
            .register_instance::<dyn Middleware>("veto", Arc::new(Veto));

        let config = InboundConfig {
            body_adapter: "raw".to_string(),
            metadata_adapter: "raw".to_string(),
            loggers: vec!["recorder".to_string()],
            interceptor: "recorder".to_string(),
            storage: NULL_IDENTIFIER.to_string(),
            middleware: Vec::new(),
        };
        Router::new(
            Arc::new(RouteCatalog::new(routes, sagas)),
            Arc::new(resolver),
            config,
        )
    }

    fn raw(name: &str) -> Raw {
        Raw {
            id: "m-1",
            body: serde_json::json!({ "name": name }),
        }
    }

    fn counting<C: Send + Sync + 'static>(name: &str, calls: &Arc<AtomicUsize>) -> Route {
        let calls = calls.clone();
        Route::new::<C, _>(name, move |_: &C, _: &MessageContext| -> Result<()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn count(events: &Events, event: &str) -> usize {
        events.lock().iter().filter(|e| e.as_str() == event).count()
    }

    // =========================================================================
    // route()
    // =========================================================================

    #[test]
    fn test_route_runs_every_match_once() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = router(
            vec![
                counting::<Message>("a", &calls),
                counting::<Message>("b", &calls),
                counting::<Message1>("c", &calls),
            ],
            Vec::new(),
            &events,
        );

        router.route::<Message, _>(&raw("x"), "").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *events.lock(),
            vec![
                "logger:entry",
                "interceptor:entry",
                "logger:success",
                "interceptor:success",
                "logger:exit",
                "interceptor:exit",
            ]
        );
    }

    #[test]
    fn test_route_passes_typed_content() {
        let events = Events::default();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let route = Route::new::<Message, _>("", move |m: &Message, c: &MessageContext| -> Result<()> {
            assert_eq!(c.content_type, Some(ContentType::of::<Message>()));
            *sink.lock() = m.name.clone();
            Ok(())
        });

        router(vec![route], Vec::new(), &events)
            .route::<Message, _>(&raw("hello"), "")
            .unwrap();
        assert_eq!(*seen.lock(), "hello");
    }

    #[test]
    fn test_no_route_found_skips_success() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = router(vec![counting::<Message>("a", &calls)], Vec::new(), &events);

        let err = router.route::<Message, _>(&raw("x"), "missing").unwrap_err();

        assert!(matches!(err, Error::NoRouteFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, "logger:success"), 0);
        assert_eq!(count(&events, "logger:exit"), 1);
        assert_eq!(count(&events, "interceptor:exit"), 1);
    }

    #[test]
    fn test_exception_hooks_receive_root_cause() {
        let events = Events::default();
        let route = Route::new::<Message, _>("", |_: &Message, _: &MessageContext| -> Result<()> {
            Err(Error::wrap("outer", Error::handler("inner")))
        });
        let router = router(vec![route], Vec::new(), &events);

        let err = router.route::<Message, _>(&raw("x"), "").unwrap_err();

        assert_eq!(err.to_string(), "handler fault: inner");
        assert_eq!(count(&events, "logger:exception(handler fault: inner)"), 1);
        assert_eq!(count(&events, "interceptor:exception(handler fault: inner)"), 1);
        assert_eq!(count(&events, "logger:exit"), 1);
    }

    #[test]
    fn test_short_circuit_is_success() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = router(
            vec![counting::<Message>("a", &calls).with_middleware("veto")],
            Vec::new(),
            &events,
        );

        router.route::<Message, _>(&raw("x"), "").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, "logger:success"), 1);
        assert_eq!(count(&events, "logger:exit"), 1);
    }

    #[test]
    fn test_unreadable_body_reports_adapter_error() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = router(vec![counting::<Message>("a", &calls)], Vec::new(), &events);

        let message = Raw {
            id: "m-1",
            body: serde_json::json!({ "other": 1 }),
        };
        let err = router.route::<Message, _>(&message, "").unwrap_err();

        assert!(matches!(err, Error::Adapter(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, "interceptor:exit"), 1);
    }

    #[test]
    fn test_unknown_middleware_is_capability_error() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let router = router(
            vec![counting::<Message>("a", &calls).with_middleware("nope")],
            Vec::new(),
            &events,
        );

        let err = router.route::<Message, _>(&raw("x"), "").unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
        assert_eq!(count(&events, "logger:exit"), 1);
    }

    // =========================================================================
    // route_to_saga()
    // =========================================================================

    #[test]
    fn test_saga_starting_route_wins() {
        let events = Events::default();
        let started = Arc::new(AtomicUsize::new(0));
        let continued = Arc::new(AtomicUsize::new(0));
        let saga = Saga::builder("saga", counting::<Message>("saga", &started))
            .next(counting::<Message1>("", &continued))
            .build()
            .unwrap();
        let router = router(Vec::new(), vec![saga], &events);

        router.route_to_saga::<Message, _>(&raw("x"), "saga", "").unwrap();
        router
            .route_to_saga::<Message, _>(&raw("x"), "saga", "some-other-name")
            .unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(continued.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, "logger:success"), 2);
    }

    #[test]
    fn test_hooks_see_saga_id_assigned_by_starting_route() {
        let events = Events::default();
        let started = Arc::new(AtomicUsize::new(0));
        let saga = Saga::builder("saga", counting::<Message>("", &started))
            .build()
            .unwrap();
        let snapshot = Arc::new(Snapshot::default());
        let router = router_with(Vec::new(), vec![saga], &events, snapshot.clone());

        router.route_to_saga::<Message, _>(&raw("x"), "saga", "").unwrap();

        let success = snapshot.success.lock().clone().unwrap();
        assert!(success.saga_id.is_some());
        let track = success.track.clone().unwrap();
        assert_eq!(track.saga.as_deref(), Some("saga"));
        assert_eq!(track.saga_id, success.saga_id.as_ref().map(|id| id.to_string()));

        let exit = snapshot.exit.lock().clone().unwrap();
        assert_eq!(exit.saga_id, success.saga_id);
    }

    #[test]
    fn test_hooks_see_track_after_failed_handler() {
        let events = Events::default();
        let route = Route::new::<Message, _>("orders", |_: &Message, _: &MessageContext| -> Result<()> {
            Err(Error::handler("boom"))
        });
        let snapshot = Arc::new(Snapshot::default());
        let router = router_with(vec![route], Vec::new(), &events, snapshot.clone());

        router.route::<Message, _>(&raw("x"), "").unwrap_err();

        assert!(snapshot.success.lock().is_none());
        let exit = snapshot.exit.lock().clone().unwrap();
        assert_eq!(exit.track.map(|t| t.route), Some("orders".to_string()));
    }

    #[test]
    fn test_saga_continuation_runs_next_route() {
        let events = Events::default();
        let started = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let next = Route::new::<Message1, _>("", move |_: &Message1, c: &MessageContext| -> Result<()> {
            *sink.lock() = c.content_type;
            Ok(())
        });
        let saga = Saga::builder("saga", counting::<Message>("", &started))
            .next(next)
            .build()
            .unwrap();
        let router = router(Vec::new(), vec![saga], &events);

        router.route_to_saga::<Message1, _>(&raw("x"), "saga", "").unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(*seen.lock(), Some(ContentType::of::<Message1>()));
        assert_eq!(count(&events, "logger:success"), 1);
    }

    #[test]
    fn test_saga_without_continuation_fails() {
        let events = Events::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let saga = Saga::builder("saga", counting::<Message>("", &calls))
            .next(counting::<Message1>("paid", &calls))
            .build()
            .unwrap();
        let router = router(Vec::new(), vec![saga], &events);

        let err = router
            .route_to_saga::<Message1, _>(&raw("x"), "saga", "refunded")
            .unwrap_err();

        assert!(matches!(err, Error::NoContinuationFound { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(count(&events, "logger:exit"), 1);
    }

    #[test]
    fn test_unknown_saga_fails() {
        let events = Events::default();
        let router = router(Vec::new(), Vec::new(), &events);

        let err = router
            .route_to_saga::<Message, _>(&raw("x"), "saga", "")
            .unwrap_err();

        assert!(matches!(err, Error::NoSagaFound { .. }));
        assert!(err.is_routing_error());
        assert_eq!(count(&events, "interceptor:exit"), 1);
    }
}
