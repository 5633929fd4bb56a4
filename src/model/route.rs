//! Routes and sagas.

use super::{ContentType, InboundMessageContext, MessageContext};
use crate::types::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Application handler for content of type `C`.
pub trait MessageHandler<C>: Send + Sync {
    fn handle(&self, content: &C, context: &MessageContext) -> Result<()>;
}

impl<C, F> MessageHandler<C> for F
where
    F: Fn(&C, &MessageContext) -> Result<()> + Send + Sync,
{
    fn handle(&self, content: &C, context: &MessageContext) -> Result<()> {
        self(content, context)
    }
}

type ErasedHandler = Arc<dyn Fn(&InboundMessageContext<'_>) -> Result<()> + Send + Sync>;

// =============================================================================
// Route
// =============================================================================

/// A named processing unit bound to one content type.
#[derive(Clone)]
pub struct Route {
    name: String,
    content_type: ContentType,
    middleware: Vec<String>,
    handler: ErasedHandler,
}

impl Route {
    /// Bind `handler` to content type `C`.
    ///
    /// An unnamed route is only selected by a request without a route name;
    /// such a request selects every route of `C`, named or not.
    pub fn new<C, H>(name: impl Into<String>, handler: H) -> Self
    where
        C: Send + Sync + 'static,
        H: MessageHandler<C> + 'static,
    {
        let content_type = ContentType::of::<C>();
        let handler: ErasedHandler = Arc::new(move |context: &InboundMessageContext<'_>| {
            let content = context.content::<C>().ok_or_else(|| {
                Error::handler(format!(
                    "route bound to {} received different content",
                    content_type
                ))
            })?;
            handler.handle(content, &context.metadata)
        });

        Self {
            name: name.into(),
            content_type,
            middleware: Vec::new(),
            handler,
        }
    }

    /// Append a middleware type identifier, run after the global middleware.
    pub fn with_middleware(mut self, identifier: impl Into<String>) -> Self {
        self.middleware.push(identifier.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// Run the bound handler against the context's content.
    pub fn handle(&self, context: &InboundMessageContext<'_>) -> Result<()> {
        (self.handler)(context)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Saga
// =============================================================================

/// A named workflow: one starting route and its continuations.
///
/// The starting route is never part of `next_routes`, so the two resolution
/// paths cannot select the same route.
#[derive(Debug, Clone)]
pub struct Saga {
    name: String,
    starting_route: Route,
    next_routes: Vec<Route>,
}

impl Saga {
    pub fn builder(name: impl Into<String>, starting_route: Route) -> SagaBuilder {
        SagaBuilder {
            name: name.into(),
            starting_route,
            next_routes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn starting_route(&self) -> &Route {
        &self.starting_route
    }

    pub fn next_routes(&self) -> &[Route] {
        &self.next_routes
    }
}

/// Accumulates the continuation routes of a saga.
#[derive(Debug)]
pub struct SagaBuilder {
    name: String,
    starting_route: Route,
    next_routes: Vec<Route>,
}

impl SagaBuilder {
    pub fn next(mut self, route: Route) -> Self {
        self.next_routes.push(route);
        self
    }

    /// Validate and freeze the saga.
    ///
    /// A continuation bound to the starting route's content type could never
    /// be selected, so it is rejected.
    pub fn build(self) -> Result<Saga> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Saga name cannot be empty"));
        }

        let starting = self.starting_route.content_type();
        if let Some(shadowed) = self
            .next_routes
            .iter()
            .find(|r| r.content_type() == starting)
        {
            return Err(Error::validation(format!(
                "Saga '{}': next route '{}' is bound to the starting content type {}",
                self.name,
                shadowed.name(),
                starting
            )));
        }

        Ok(Saga {
            name: self.name,
            starting_route: self.starting_route,
            next_routes: self.next_routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Order;
    struct Payment;

    fn noop<C>(_: &C, _: &MessageContext) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_route_dispatches_typed_content() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let route = Route::new::<u32, _>("numbers", move |n: &u32, _: &MessageContext| -> Result<()> {
            seen.fetch_add(*n as usize, Ordering::SeqCst);
            Ok(())
        })
        .with_middleware("duplicate_filter");

        let value = 5u32;
        route
            .handle(&InboundMessageContext::new(MessageContext::new("m"), &value))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(route.middleware(), ["duplicate_filter".to_string()]);
        assert_eq!(route.content_type(), ContentType::of::<u32>());
    }

    #[test]
    fn test_route_rejects_foreign_content() {
        let route = Route::new::<u32, _>("numbers", noop::<u32>);
        let text = "not a number".to_string();
        let err = route
            .handle(&InboundMessageContext::new(MessageContext::new("m"), &text))
            .unwrap_err();
        assert!(matches!(err, Error::Handler { .. }));
    }

    #[test]
    fn test_saga_rejects_shadowed_continuation() {
        let result = Saga::builder("checkout", Route::new::<Order, _>("", noop::<Order>))
            .next(Route::new::<Order, _>("again", noop::<Order>))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_saga_keeps_declaration_order() {
        let saga = Saga::builder("checkout", Route::new::<Order, _>("", noop::<Order>))
            .next(Route::new::<Payment, _>("first", noop::<Payment>))
            .next(Route::new::<Payment, _>("second", noop::<Payment>))
            .build()
            .unwrap();

        let names: Vec<&str> = saga.next_routes().iter().map(Route::name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(saga.starting_route().content_type(), ContentType::of::<Order>());
    }
}
