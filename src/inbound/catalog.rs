//! Route catalog - resolves routes and sagas by content type and name.
//!
//! Populated once from the routing table and read-only afterwards.

use crate::model::{ContentType, Route, Saga};
use crate::table::RoutingTable;

/// Read-only index over configured routes and sagas.
#[derive(Debug, Default)]
pub struct RouteCatalog {
    routes: Vec<Route>,
    sagas: Vec<Saga>,
}

impl RouteCatalog {
    pub fn new(routes: Vec<Route>, sagas: Vec<Saga>) -> Self {
        Self { routes, sagas }
    }

    pub fn from_table(table: &RoutingTable) -> Self {
        Self::new(table.routes().to_vec(), table.sagas().to_vec())
    }

    /// Routes bound to `content_type` whose name equals `route_name`, or all of
    /// them when `route_name` is empty. Declaration order is preserved; an
    /// empty result is a normal outcome.
    pub fn resolve_routes(&self, content_type: &ContentType, route_name: &str) -> Vec<&Route> {
        let routes = matching(&self.routes, content_type, route_name);
        tracing::debug!(
            content_type = %content_type,
            route_name,
            matched = routes.len(),
            "resolved routes"
        );
        routes
    }

    /// Saga by exact name.
    pub fn resolve_saga(&self, saga_name: &str) -> Option<&Saga> {
        self.sagas.iter().find(|s| s.name() == saga_name)
    }

    /// Same matching rule as [`resolve_routes`](Self::resolve_routes), applied
    /// to an explicit candidate list (a saga's next routes).
    pub fn resolve_continuations<'a>(
        &self,
        candidates: &'a [Route],
        content_type: &ContentType,
        route_name: &str,
    ) -> Vec<&'a Route> {
        matching(candidates, content_type, route_name)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn sagas(&self) -> &[Saga] {
        &self.sagas
    }
}

fn matching<'a>(routes: &'a [Route], content_type: &ContentType, route_name: &str) -> Vec<&'a Route> {
    routes
        .iter()
        .filter(|route| {
            route.content_type() == *content_type
                && (route_name.is_empty() || route.name() == route_name)
        })
        .collect()
}
