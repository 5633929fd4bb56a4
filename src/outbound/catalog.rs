//! Endpoint catalog - resolves endpoints and their per-send settings.

use super::SettingFinder;
use crate::capability::CapabilityResolver;
use crate::model::{ContentType, EndPoint, EndPointSetting};
use crate::table::RoutingTable;
use crate::types::Result;
use std::sync::Arc;

/// Read-only index over configured endpoints.
#[derive(Debug)]
pub struct EndPointCatalog {
    end_points: Vec<EndPoint>,
    resolver: Arc<CapabilityResolver>,
}

impl EndPointCatalog {
    pub fn new(end_points: Vec<EndPoint>, resolver: Arc<CapabilityResolver>) -> Self {
        Self {
            end_points,
            resolver,
        }
    }

    pub fn from_table(table: &RoutingTable, resolver: Arc<CapabilityResolver>) -> Self {
        Self::new(table.end_points().to_vec(), resolver)
    }

    /// Endpoints bound to `content_type` whose name equals `name`, or all of
    /// them when `name` is empty, in declaration order.
    pub fn resolve_end_points(&self, content_type: &ContentType, name: &str) -> Vec<&EndPoint> {
        let end_points: Vec<&EndPoint> = self
            .end_points
            .iter()
            .filter(|e| e.content_type() == *content_type && (name.is_empty() || e.name() == name))
            .collect();
        tracing::debug!(
            content_type = %content_type,
            end_point = name,
            matched = end_points.len(),
            "resolved endpoints"
        );
        end_points
    }

    /// Evaluate `end_point`'s extractors against `content`.
    ///
    /// The setting finder is resolved here, at send time, never when the
    /// endpoint is configured.
    pub fn resolve_setting<C>(&self, end_point: &EndPoint, content: &C) -> Result<EndPointSetting>
    where
        C: Send + Sync + 'static,
    {
        let finder = self
            .resolver
            .create::<dyn SettingFinder>(end_point.setting_finder())?;
        Ok(end_point.evaluate(finder.as_ref(), content))
    }

    pub fn end_points(&self) -> &[EndPoint] {
        &self.end_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::{StaticSettingFinder, STATIC_SETTING_FINDER};
    use crate::types::Error;

    struct Order {
        id: u32,
    }
    struct Invoice;

    fn catalog() -> EndPointCatalog {
        let mut resolver = CapabilityResolver::with_defaults();
        resolver.register_instance::<dyn SettingFinder>(
            STATIC_SETTING_FINDER,
            Arc::new(StaticSettingFinder::from_pairs([("orders", "memory://bus")])),
        );

        let end_points = vec![
            EndPoint::builder::<Order>("orders")
                .using_finder(STATIC_SETTING_FINDER)
                .to(
                    |f, _| f.find("orders").unwrap_or_default(),
                    |_, o: &Order| format!("orders/{}", o.id % 2),
                )
                .build()
                .unwrap(),
            EndPoint::builder::<Invoice>("invoices")
                .to(|_, _| "memory://bus".to_string(), |_, _| "invoices".to_string())
                .build()
                .unwrap(),
            EndPoint::builder::<Order>("audit")
                .using_finder("missing")
                .to(|_, _| "memory://bus".to_string(), |_, _| "audit".to_string())
                .build()
                .unwrap(),
        ];
        EndPointCatalog::new(end_points, Arc::new(resolver))
    }

    #[test]
    fn test_resolve_by_content_type_and_name() {
        let catalog = catalog();
        let all: Vec<&str> = catalog
            .resolve_end_points(&ContentType::of::<Order>(), "")
            .into_iter()
            .map(EndPoint::name)
            .collect();
        assert_eq!(all, vec!["orders", "audit"]);

        let named = catalog.resolve_end_points(&ContentType::of::<Order>(), "audit");
        assert_eq!(named.len(), 1);
        assert!(catalog
            .resolve_end_points(&ContentType::of::<Order>(), "invoices")
            .is_empty());
    }

    #[test]
    fn test_setting_depends_on_content() {
        let catalog = catalog();
        let end_point = catalog.resolve_end_points(&ContentType::of::<Order>(), "orders")[0];

        let even = catalog.resolve_setting(end_point, &Order { id: 4 }).unwrap();
        let odd = catalog.resolve_setting(end_point, &Order { id: 7 }).unwrap();
        assert_eq!(even.to_connection_string, "memory://bus");
        assert_eq!(even.to_path, "orders/0");
        assert_eq!(odd.to_path, "orders/1");
    }

    #[test]
    fn test_unregistered_finder_fails_at_send_time() {
        let catalog = catalog();
        let end_point = catalog.resolve_end_points(&ContentType::of::<Order>(), "audit")[0];
        let err = catalog
            .resolve_setting(end_point, &Order { id: 1 })
            .unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
    }
}
