//! Event dispatch for verified webhook deliveries.
//!
//! The dispatcher owns a fixed table from event-type strings to handlers. It
//! is built once at startup and only ever read afterwards. Payloads reach it
//! only after signature verification has accepted them.

use anyhow::Result;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Side effect for one event type.
pub trait EventHandler: Send + Sync {
    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { event: String },
    Ignored { event: String },
    Failed { event: String, error: String },
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Handled { .. } => "handled",
            DispatchOutcome::Ignored { .. } => "ignored",
            DispatchOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HashMap<String, Arc<dyn EventHandler>>>,
    timeout: Duration,
}

pub struct DispatcherBuilder {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    timeout: Duration,
}

impl DispatcherBuilder {
    pub fn on(mut self, event_type: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(event_type.to_string(), handler);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: Arc::new(self.handlers),
            timeout: self.timeout,
        }
    }
}

impl Dispatcher {
    pub fn builder(timeout: Duration) -> DispatcherBuilder {
        DispatcherBuilder {
            handlers: HashMap::new(),
            timeout,
        }
    }

    /// Runs the handler registered for `event_type` at most once.
    ///
    /// Handler errors, panics and timeouts all come back as
    /// [`DispatchOutcome::Failed`]; nothing escapes to the caller.
    pub async fn dispatch(&self, event_type: &str, payload: &[u8]) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(event_type) else {
            info!(event = event_type, "no handler for webhook event; ignoring");
            return DispatchOutcome::Ignored {
                event: event_type.to_string(),
            };
        };

        // Building the handler future happens inside the guarded block too.
        let run = AssertUnwindSafe(async move { handler.handle(payload).await }).catch_unwind();
        let failure = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(Ok(()))) => {
                info!(event = event_type, "webhook event handled");
                return DispatchOutcome::Handled {
                    event: event_type.to_string(),
                };
            }
            Ok(Ok(Err(error))) => format!("{error:#}"),
            Ok(Err(_panic)) => "handler panicked".to_string(),
            Err(_elapsed) => format!("handler timed out after {}ms", self.timeout.as_millis()),
        };

        error!(event = event_type, error = %failure, "webhook event handler failed");
        DispatchOutcome::Failed {
            event: event_type.to_string(),
            error: failure,
        }
    }
}
