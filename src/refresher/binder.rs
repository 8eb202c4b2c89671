//! Attaches the router to every producer event it cares about.

use std::sync::Arc;

use metrics::gauge;
use tracing::{debug, error, info};

use crate::events::{
    EventHandler, EventSource, EventSources, HandlerSignature, SubscriptionHandle,
};

use super::error::BindError;
use super::router::InvalidationRouter;
use super::routes::is_exempt;

const METRIC_BOUND_SUBSCRIPTIONS: &str = "cache_refresher_bound_subscriptions";

/// Whether a binder keeps what it needs to detach again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Bind once for the life of the process; no detach bookkeeping.
    Production,
    /// Record every subscription so [`SubscriptionBinder::unbind`] can undo it.
    Unbindable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinderState {
    Unbound,
    Bound,
    TornDown,
}

struct Unbinder {
    source: Arc<dyn EventSource>,
    handle: SubscriptionHandle,
}

/// Every signature the binder subscribes to: all declared events except the
/// exempt ones.
pub fn bindings() -> impl Iterator<Item = HandlerSignature> {
    HandlerSignature::declared().filter(|signature| !is_exempt(*signature))
}

/// Owns the subscriptions that wire producers to the router.
///
/// Subscriptions are all attached or all detached; a failure part way through
/// `initialize` detaches whatever was already attached.
pub struct SubscriptionBinder {
    router: Arc<InvalidationRouter>,
    mode: BindMode,
    state: BinderState,
    unbinders: Option<Vec<Unbinder>>,
}

impl SubscriptionBinder {
    pub fn new(router: Arc<InvalidationRouter>, mode: BindMode) -> Self {
        let unbinders = match mode {
            BindMode::Production => None,
            BindMode::Unbindable => Some(Vec::new()),
        };
        Self {
            router,
            mode,
            state: BinderState::Unbound,
            unbinders,
        }
    }

    pub fn mode(&self) -> BindMode {
        self.mode
    }

    pub fn is_bound(&self) -> bool {
        self.state == BinderState::Bound
    }

    /// Subscribe the router to every bound signature.
    ///
    /// Returns the number of subscriptions made. Every producer must already
    /// be wired into `sources`.
    pub fn initialize(&mut self, sources: &EventSources) -> Result<usize, BindError> {
        if self.state != BinderState::Unbound {
            return Err(BindError::AlreadyInitialized);
        }

        let plan: Vec<(HandlerSignature, Arc<dyn EventSource>)> = bindings()
            .map(|signature| {
                sources
                    .get(signature.producer)
                    .map(|source| (signature, Arc::clone(source)))
                    .ok_or(BindError::MissingProducer {
                        producer: signature.producer,
                    })
            })
            .collect::<Result<_, _>>()?;

        let mut attached = Vec::with_capacity(plan.len());
        for (signature, source) in plan {
            match source.subscribe(signature.event, self.handler()) {
                Ok(handle) => {
                    debug!(signature = %signature, "Bound cache refresh handler");
                    attached.push(Unbinder { source, handle });
                }
                Err(err) => {
                    error!(signature = %signature, error = %err, "Binding failed, rolling back");
                    for unbinder in attached {
                        unbinder.source.unsubscribe(unbinder.handle);
                    }
                    return Err(err);
                }
            }
        }

        let count = attached.len();
        if let Some(unbinders) = self.unbinders.as_mut() {
            unbinders.extend(attached);
        }
        self.state = BinderState::Bound;
        gauge!(METRIC_BOUND_SUBSCRIPTIONS).increment(count as f64);
        info!(subscriptions = count, mode = ?self.mode, "Cache refresh handlers bound");
        Ok(count)
    }

    /// Detach every recorded subscription.
    ///
    /// Only valid for [`BindMode::Unbindable`] binders, and only once.
    pub fn unbind(&mut self) -> Result<usize, BindError> {
        if self.mode == BindMode::Production {
            error!("Unbind requested on a binder built without unbinding support");
            return Err(BindError::UnbindNotSupported);
        }
        if self.state != BinderState::Bound {
            return Err(BindError::NotBound);
        }

        let unbinders = self.unbinders.take().unwrap_or_default();
        let count = unbinders.len();
        for unbinder in unbinders {
            if !unbinder.source.unsubscribe(unbinder.handle) {
                debug!(
                    signature = %unbinder.handle.signature(),
                    "Subscription was already detached"
                );
            }
        }

        self.state = BinderState::TornDown;
        gauge!(METRIC_BOUND_SUBSCRIPTIONS).decrement(count as f64);
        info!(subscriptions = count, "Cache refresh handlers unbound");
        Ok(count)
    }

    fn handler(&self) -> EventHandler {
        let router = Arc::clone(&self.router);
        Arc::new(move |event| router.dispatch(event).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RecordingCache;
    use crate::events::{EventName, InMemoryServices, Producer, ServiceEvents};
    use crate::refresher::registry::HandlerRegistry;

    fn binder(mode: BindMode) -> SubscriptionBinder {
        let router = InvalidationRouter::with_registry(
            Arc::new(RecordingCache::new()),
            Arc::new(HandlerRegistry::new()),
        );
        SubscriptionBinder::new(Arc::new(router), mode)
    }

    #[test]
    fn bindings_skip_exempt_stylesheet_events() {
        let all: Vec<_> = bindings().collect();
        assert!(!all.contains(&HandlerSignature::new(
            Producer::FileService,
            EventName::SavedStylesheet
        )));
        assert!(all.contains(&HandlerSignature::new(
            Producer::FileService,
            EventName::SavedTemplate
        )));
    }

    #[test]
    fn initialize_binds_every_signature_once() {
        let services = InMemoryServices::new();
        let mut binder = binder(BindMode::Production);

        let count = binder.initialize(&services.sources()).expect("bind succeeds");

        assert_eq!(count, bindings().count());
        assert_eq!(services.subscriber_count(), count);
        assert!(binder.is_bound());
    }

    #[test]
    fn second_initialize_is_rejected() {
        let services = InMemoryServices::new();
        let mut binder = binder(BindMode::Production);
        binder.initialize(&services.sources()).expect("bind succeeds");

        let result = binder.initialize(&services.sources());
        assert!(matches!(result, Err(BindError::AlreadyInitialized)));
        assert_eq!(services.subscriber_count(), bindings().count());
    }

    #[test]
    fn missing_producer_fails_without_binding_anything() {
        let services = InMemoryServices::new();
        let mut sources = EventSources::new();
        for producer in [Producer::ContentService, Producer::MediaService] {
            sources.insert(services.service(producer).clone());
        }

        let mut binder = binder(BindMode::Unbindable);
        let result = binder.initialize(&sources);

        assert!(matches!(result, Err(BindError::MissingProducer { .. })));
        assert_eq!(services.subscriber_count(), 0);
        assert!(!binder.is_bound());
    }

    #[test]
    fn failed_subscribe_rolls_back() {
        struct Refusing(ServiceEvents);

        impl EventSource for Refusing {
            fn producer(&self) -> Producer {
                self.0.producer()
            }

            fn subscribe(
                &self,
                event: EventName,
                _handler: EventHandler,
            ) -> Result<SubscriptionHandle, BindError> {
                Err(BindError::UndeclaredEvent {
                    signature: HandlerSignature::new(self.producer(), event),
                })
            }

            fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
                self.0.unsubscribe(handle)
            }
        }

        let services = InMemoryServices::new();
        let mut sources = services.sources();
        sources.insert(Arc::new(Refusing(ServiceEvents::new(
            Producer::RelationService,
        ))));

        let mut binder = binder(BindMode::Unbindable);
        let result = binder.initialize(&sources);

        assert!(matches!(result, Err(BindError::UndeclaredEvent { .. })));
        assert_eq!(services.subscriber_count(), 0);
    }

    #[test]
    fn unbind_detaches_everything_once() {
        let services = InMemoryServices::new();
        let mut binder = binder(BindMode::Unbindable);
        let bound = binder.initialize(&services.sources()).expect("bind succeeds");

        assert_eq!(binder.unbind().expect("unbind succeeds"), bound);
        assert_eq!(services.subscriber_count(), 0);
        assert!(matches!(binder.unbind(), Err(BindError::NotBound)));
    }

    #[test]
    fn unbind_requires_unbindable_mode() {
        let services = InMemoryServices::new();
        let mut binder = binder(BindMode::Production);
        binder.initialize(&services.sources()).expect("bind succeeds");

        assert!(matches!(binder.unbind(), Err(BindError::UnbindNotSupported)));
        assert_eq!(services.subscriber_count(), bindings().count());
    }

    #[test]
    fn unbind_before_initialize_fails() {
        let mut binder = binder(BindMode::Unbindable);
        assert!(matches!(binder.unbind(), Err(BindError::NotBound)));
    }

    #[test]
    fn torn_down_binder_cannot_rebind() {
        let services = InMemoryServices::new();
        let mut binder = binder(BindMode::Unbindable);
        binder.initialize(&services.sources()).expect("bind succeeds");
        binder.unbind().expect("unbind succeeds");

        assert!(matches!(
            binder.initialize(&services.sources()),
            Err(BindError::AlreadyInitialized)
        ));
    }
}
