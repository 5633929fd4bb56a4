//! Ordered middleware chain executor.
//!
//! Each stage receives the context, a [`Next`] continuation and the matched
//! route/saga. A stage that returns without running `next` short-circuits the
//! rest of the chain, the terminal handler included; that is not an error.
//! Errors propagate back through every enclosing stage.

use crate::model::{InboundMessageContext, Route, Saga};
use crate::types::Result;
use std::sync::Arc;

/// One stage of the inbound pipeline.
pub trait Middleware: Send + Sync {
    fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        next: Next<'_>,
        parameter: &MiddlewareParameter<'_>,
    ) -> Result<()>;
}

/// Route and saga matched for the current execution.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareParameter<'a> {
    pub route: &'a Route,
    pub saga: Option<&'a Saga>,
}

/// Continuation running the remainder of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    parameter: &'a MiddlewareParameter<'a>,
}

impl<'a> Next<'a> {
    /// Run the remaining stages. A no-op at the end of the chain.
    pub fn run(self, context: &mut InboundMessageContext<'_>) -> Result<()> {
        match self.remaining.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    remaining: rest,
                    parameter: self.parameter,
                };
                stage.execute(context, next, self.parameter)
            }
            None => Ok(()),
        }
    }

    /// Number of stages still to run.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining.len())
            .finish()
    }
}

/// Executes one ordered middleware list for one route match.
pub struct Pipeline<'a> {
    middleware: &'a [Arc<dyn Middleware>],
}

impl<'a> Pipeline<'a> {
    pub fn new(middleware: &'a [Arc<dyn Middleware>]) -> Self {
        Self { middleware }
    }

    pub fn execute(
        &self,
        context: &mut InboundMessageContext<'_>,
        parameter: &MiddlewareParameter<'_>,
    ) -> Result<()> {
        Next {
            remaining: self.middleware,
            parameter,
        }
        .run(context)
    }
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageContext;
    use crate::types::Error;
    use parking_lot::Mutex;

    /// Records its name, then either continues, stops or fails.
    struct Probe {
        name: &'static str,
        action: Action,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[derive(Clone, Copy)]
    enum Action {
        Continue,
        Stop,
        Fail,
    }

    impl Middleware for Probe {
        fn execute(
            &self,
            context: &mut InboundMessageContext<'_>,
            next: Next<'_>,
            _parameter: &MiddlewareParameter<'_>,
        ) -> Result<()> {
            self.log.lock().push(self.name);
            match self.action {
                Action::Continue => {
                    let result = next.run(context);
                    self.log.lock().push("unwind");
                    result
                }
                Action::Stop => Ok(()),
                Action::Fail => Err(Error::handler(format!("{} failed", self.name))),
            }
        }
    }

    fn chain(
        actions: &[(&'static str, Action)],
    ) -> (Vec<Arc<dyn Middleware>>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages = actions
            .iter()
            .map(|&(name, action)| {
                Arc::new(Probe {
                    name,
                    action,
                    log: log.clone(),
                }) as Arc<dyn Middleware>
            })
            .collect();
        (stages, log)
    }

    fn run(stages: &[Arc<dyn Middleware>]) -> Result<()> {
        let route = Route::new::<u32, _>("numbers", |_: &u32, _: &MessageContext| -> Result<()> {
            Ok(())
        });
        let parameter = MiddlewareParameter {
            route: &route,
            saga: None,
        };
        let content = 1u32;
        let mut context = InboundMessageContext::new(MessageContext::new("m-1"), &content);
        Pipeline::new(stages).execute(&mut context, &parameter)
    }

    #[test]
    fn test_runs_in_order_and_unwinds() {
        let (stages, log) = chain(&[("a", Action::Continue), ("b", Action::Continue)]);
        run(&stages).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b", "unwind", "unwind"]);
    }

    #[test]
    fn test_stage_without_next_short_circuits() {
        let (stages, log) = chain(&[
            ("a", Action::Continue),
            ("b", Action::Stop),
            ("c", Action::Continue),
        ]);
        assert!(run(&stages).is_ok());
        assert_eq!(*log.lock(), vec!["a", "b", "unwind"]);
    }

    #[test]
    fn test_error_propagates_through_enclosing_stages() {
        let (stages, log) = chain(&[
            ("a", Action::Continue),
            ("b", Action::Fail),
            ("c", Action::Continue),
        ]);
        let err = run(&stages).unwrap_err();
        assert_eq!(err.to_string(), "handler fault: b failed");
        assert_eq!(*log.lock(), vec!["a", "b", "unwind"]);
    }

    #[test]
    fn test_empty_pipeline_is_ok() {
        assert!(run(&[]).is_ok());
    }
}
