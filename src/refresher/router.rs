//! Dispatches fired events to their invalidation routine.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, instrument};

use crate::cache::DistributedCache;
use crate::events::EventDefinition;

use super::error::RefreshError;
use super::registry::HandlerRegistry;
use super::routes::Route;

const METRIC_DISPATCH_TOTAL: &str = "cache_refresher_dispatch_total";
const METRIC_DISPATCH_MS: &str = "cache_refresher_dispatch_ms";

/// What happened to a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(Route),
    /// No routine answers the event's signature; nothing was invalidated.
    Unresolved,
}

/// Stateless translation of events into calls on the injected cache facility.
pub struct InvalidationRouter {
    cache: Arc<dyn DistributedCache>,
    registry: Arc<HandlerRegistry>,
}

impl InvalidationRouter {
    /// Router backed by the process-wide registry.
    pub fn new(cache: Arc<dyn DistributedCache>) -> Self {
        Self::with_registry(cache, HandlerRegistry::global())
    }

    pub fn with_registry(cache: Arc<dyn DistributedCache>, registry: Arc<HandlerRegistry>) -> Self {
        Self { cache, registry }
    }

    /// Run the routine for `event`, if any.
    ///
    /// Unknown signatures are skipped. Routine failures propagate.
    #[instrument(skip_all, fields(event_id = %event.id, signature = %event.signature()))]
    pub fn dispatch(&self, event: &EventDefinition) -> Result<DispatchOutcome, RefreshError> {
        let started_at = Instant::now();
        let signature = event.signature();

        let Some(route) = self.registry.resolve(event) else {
            debug!("Event ignored: no invalidation routine");
            counter!(
                METRIC_DISPATCH_TOTAL,
                "signature" => signature.to_string(),
                "outcome" => "unresolved"
            )
            .increment(1);
            return Ok(DispatchOutcome::Unresolved);
        };

        let result = route.invoke(self.cache.as_ref(), event);
        let outcome = match &result {
            Ok(()) => {
                debug!(route = route.name(), "Event dispatched");
                "handled"
            }
            Err(err) => {
                error!(route = route.name(), error = %err, "Invalidation routine failed");
                "failed"
            }
        };

        counter!(
            METRIC_DISPATCH_TOTAL,
            "signature" => signature.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!(METRIC_DISPATCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        result.map(|()| DispatchOutcome::Handled(route))
    }

    /// Dispatch a sequence of events in order, stopping at the first failure.
    ///
    /// Returns how many events had a routine.
    pub fn handle_events<I>(&self, events: I) -> Result<usize, RefreshError>
    where
        I: IntoIterator<Item = EventDefinition>,
    {
        let mut handled = 0;
        for event in events {
            if let DispatchOutcome::Handled(_) = self.dispatch(&event)? {
                handled += 1;
            }
        }
        Ok(handled)
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }
}
