//! Built-in pipeline stages.
//!
//! The router always installs [`ExceptionHandler`] first and a
//! [`TerminalStage`] last; [`DuplicateFilter`] is an optional configured stage.

use super::pipeline::{Middleware, MiddlewareParameter, Next};
use super::Storage;
use crate::model::{InboundMessageContext, Track};
use crate::types::{Result, SagaId};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// First stage of every chain: records a failure, then re-raises it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExceptionHandler;

impl Middleware for ExceptionHandler {
    fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        next: Next<'_>,
        parameter: &MiddlewareParameter<'_>,
    ) -> Result<()> {
        let result = next.run(context);
        if let Err(e) = &result {
            tracing::error!(
                route = parameter.route.name(),
                saga = parameter.saga.map(|s| s.name()),
                message_id = %context.metadata.id,
                error = %e,
                "pipeline failed"
            );
        }
        result
    }
}

/// Which terminal handler closes the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// Plain route.
    Message,
    /// First step of a saga: a new saga id is assigned.
    StartingMessage,
    /// Saga continuation: the inbound saga id is kept.
    NextMessage,
}

/// Last stage of every chain: writes the track, then runs the route handler.
pub struct TerminalStage {
    kind: TerminalKind,
    storage: Arc<dyn Storage>,
}

impl TerminalStage {
    pub fn new(kind: TerminalKind, storage: Arc<dyn Storage>) -> Self {
        Self { kind, storage }
    }

    pub fn kind(&self) -> TerminalKind {
        self.kind
    }
}

impl std::fmt::Debug for TerminalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalStage")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Middleware for TerminalStage {
    fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        next: Next<'_>,
        parameter: &MiddlewareParameter<'_>,
    ) -> Result<()> {
        match self.kind {
            TerminalKind::StartingMessage => {
                context.metadata.saga_id = Some(SagaId::new());
            }
            TerminalKind::NextMessage if context.metadata.saga_id.is_none() => {
                tracing::warn!(
                    message_id = %context.metadata.id,
                    route = parameter.route.name(),
                    "continuation received without a saga id"
                );
            }
            _ => {}
        }

        let saga = match self.kind {
            TerminalKind::Message => None,
            _ => parameter.saga.map(|s| s.name()),
        };
        context.metadata.track = Some(Track::new(&context.metadata, parameter.route.name(), saga));

        self.storage.create(&context.metadata, parameter.route)?;
        parameter.route.handle(context)?;

        next.run(context)
    }
}

/// Number of recent `(route, message id)` pairs a [`DuplicateFilter`] remembers.
pub const DEFAULT_DUPLICATE_WINDOW: usize = 10_000;

type SeenKey = (String, String);

/// Skips a message whose id was already handled by the same route.
///
/// Only the most recent `capacity` pairs are remembered; older ones are
/// evicted first-in first-out. A failed execution releases the id so that a
/// redelivery is processed again.
#[derive(Debug)]
pub struct DuplicateFilter {
    capacity: usize,
    seen: Mutex<SeenWindow>,
}

#[derive(Debug, Default)]
struct SeenWindow {
    keys: HashSet<SeenKey>,
    order: VecDeque<SeenKey>,
}

impl SeenWindow {
    /// `false` when `key` is already present.
    fn insert(&mut self, key: SeenKey, capacity: usize) -> bool {
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }

    fn remove(&mut self, key: &SeenKey) {
        if self.keys.remove(key) {
            self.order.retain(|k| k != key);
        }
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DUPLICATE_WINDOW)
    }
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember at most `capacity` pairs (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: Mutex::new(SeenWindow::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.seen.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().keys.is_empty()
    }
}

impl Middleware for DuplicateFilter {
    fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        next: Next<'_>,
        parameter: &MiddlewareParameter<'_>,
    ) -> Result<()> {
        let key = (
            parameter.route.name().to_string(),
            context.metadata.id.clone(),
        );

        if !self.seen.lock().insert(key.clone(), self.capacity) {
            tracing::debug!(
                route = parameter.route.name(),
                message_id = %context.metadata.id,
                "duplicate message skipped"
            );
            return Ok(());
        }

        let result = next.run(context);
        if result.is_err() {
            self.seen.lock().remove(&key);
        }
        result
    }
}
