//! Router and bus throughput benchmark.
//!
//! Measures the full inbound template (adapters, hooks, pipeline) against a
//! growing number of configured middleware stages, and outbound dispatch
//! through the in-memory broker.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use switchyard::inbound::{Middleware, MiddlewareParameter, Next};
use switchyard::model::InboundMessageContext;
use switchyard::transport::{Address, InMemoryBroker, TransportMessage};
use switchyard::types::{InboundConfig, OutboundConfig, TRANSPORT_IDENTIFIER};
use switchyard::{
    Bus, CapabilityResolver, EndPoint, EndPointCatalog, MessageContext, Options, Origin, Route,
    RouteCatalog, Router, RoutingTable,
};

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    number: u32,
}

/// Pass-through stage.
struct Forward;

impl Middleware for Forward {
    fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        next: Next<'_>,
        _parameter: &MiddlewareParameter<'_>,
    ) -> switchyard::Result<()> {
        next.run(context)
    }
}

fn order_message() -> TransportMessage {
    TransportMessage {
        id: "bench".to_string(),
        content_type: String::new(),
        body: serde_json::json!({ "number": 1 }),
        to: Address::new("memory://bus", "orders"),
        reply_to: None,
        origin: Origin::default(),
        headers: HashMap::new(),
        version: "1".to_string(),
        retry_count: 0,
        saga_id: None,
        scheduled_enqueue_at: None,
        sent_at: chrono::Utc::now(),
    }
}

fn bench_route(c: &mut Criterion) {
    let table = RoutingTable::builder()
        .route(Route::new::<Order, _>(
            "orders",
            |order: &Order, _: &MessageContext| -> switchyard::Result<()> {
                black_box(order.number);
                Ok(())
            },
        ))
        .build()
        .unwrap();

    let mut group = c.benchmark_group("route");
    for &stages in &[0usize, 4, 16] {
        let mut resolver = CapabilityResolver::with_defaults();
        resolver.register_instance::<dyn Middleware>("forward", Arc::new(Forward));
        let config = InboundConfig {
            middleware: vec!["forward".to_string(); stages],
            ..InboundConfig::default()
        };
        let router = Router::new(
            Arc::new(RouteCatalog::from_table(&table)),
            Arc::new(resolver),
            config,
        );
        let message = order_message();

        group.bench_with_input(BenchmarkId::from_parameter(stages), &message, |b, m| {
            b.iter(|| router.route::<Order, _>(black_box(m), "orders").unwrap());
        });
    }
    group.finish();
}

fn bench_send(c: &mut Criterion) {
    let broker = Arc::new(InMemoryBroker::new());
    let mut resolver = CapabilityResolver::with_defaults();
    broker.register_channels(&mut resolver);
    let resolver = Arc::new(resolver);

    let table = RoutingTable::builder()
        .end_point(
            EndPoint::builder::<Order>("orders")
                .to(|_, _| "memory://bus".to_string(), |_, _| "orders".to_string())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let bus = Bus::new(
        Arc::new(EndPointCatalog::from_table(&table, resolver.clone())),
        resolver,
        OutboundConfig {
            point_to_point_channel: TRANSPORT_IDENTIFIER.to_string(),
            ..OutboundConfig::default()
        },
    );
    let mut inbox = broker
        .register_queue(Address::new("memory://bus", "orders"))
        .unwrap();
    let options = Options::new();

    c.bench_function("send", |b| {
        b.iter(|| {
            bus.send(black_box(&Order { number: 1 }), &options).unwrap();
            inbox.try_recv().unwrap()
        });
    });
}

criterion_group!(benches, bench_route, bench_send);
criterion_main!(benches);
