//! Routing table - the routes, sagas and endpoints produced at configuration time.
//!
//! The builder is the only writer. Once built, the table is handed to the
//! route and endpoint catalogs and never changes.

use crate::model::{EndPoint, Origin, Route, Saga};
use crate::types::{Error, Result};
use std::collections::HashSet;

/// Immutable output of [`RoutingTableBuilder`].
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
    sagas: Vec<Saga>,
    end_points: Vec<EndPoint>,
}

impl RoutingTable {
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn sagas(&self) -> &[Saga] {
        &self.sagas
    }

    pub fn end_points(&self) -> &[EndPoint] {
        &self.end_points
    }
}

/// Accumulates routes, sagas and endpoints in declaration order.
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    routes: Vec<Route>,
    sagas: Vec<Saga>,
    end_points: Vec<EndPoint>,
    origin: Option<Origin>,
}

impl RoutingTableBuilder {
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn saga(mut self, saga: Saga) -> Self {
        self.sagas.push(saga);
        self
    }

    pub fn end_point(mut self, end_point: EndPoint) -> Self {
        self.end_points.push(end_point);
        self
    }

    /// Origin stamped on every endpoint when the table is built.
    pub fn origin(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.origin = Some(Origin::new(name, key));
        self
    }

    pub fn build(self) -> Result<RoutingTable> {
        let mut names = HashSet::new();
        for saga in &self.sagas {
            if !names.insert(saga.name()) {
                return Err(Error::validation(format!(
                    "Saga '{}' is declared more than once",
                    saga.name()
                )));
            }
        }

        let mut end_points = self.end_points;
        if let Some(origin) = self.origin {
            for end_point in &mut end_points {
                end_point.set_origin(origin.clone());
            }
        }

        tracing::debug!(
            routes = self.routes.len(),
            sagas = self.sagas.len(),
            end_points = end_points.len(),
            "routing table built"
        );

        Ok(RoutingTable {
            routes: self.routes,
            sagas: self.sagas,
            end_points,
        })
    }
}
