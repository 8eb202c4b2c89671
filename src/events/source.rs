//! Explicit publish/subscribe registration against event producers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use strum::IntoEnumIterator;
use tracing::trace;

use crate::refresher::error::{BindError, RefreshError};
use crate::util::lock::{Guarded, rw_read, rw_write};

use super::definition::{EventArgs, EventDefinition};
use super::signature::{EventName, HandlerSignature, Producer};

const HANDLERS: Guarded = Guarded {
    owner: "events::source",
    state: "subscribed handlers",
};

/// Callback attached to a producer event; runs on the raising thread.
pub type EventHandler = Arc<dyn Fn(&EventDefinition) -> Result<(), RefreshError> + Send + Sync>;

/// Opaque token returned by [`EventSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    signature: HandlerSignature,
    id: u64,
}

impl SubscriptionHandle {
    pub fn signature(&self) -> HandlerSignature {
        self.signature
    }
}

/// A producer's subscription surface.
pub trait EventSource: Send + Sync {
    fn producer(&self) -> Producer;

    /// Attach `handler` to `event`. Undeclared events are rejected.
    fn subscribe(
        &self,
        event: EventName,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle, BindError>;

    /// Detach a previous subscription. Returns false when the handle is unknown.
    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool;
}

/// In-process event source that raises synchronously on the caller's thread.
pub struct ServiceEvents {
    producer: Producer,
    handlers: RwLock<Vec<(SubscriptionHandle, EventHandler)>>,
    next_id: AtomicU64,
}

impl ServiceEvents {
    pub fn new(producer: Producer) -> Self {
        Self {
            producer,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Raise `event` and run every attached handler in subscription order.
    ///
    /// Returns how many handlers ran. The first handler error stops the
    /// remaining handlers and is returned to the raiser.
    pub fn raise(&self, event: EventName, args: EventArgs) -> Result<usize, RefreshError> {
        let signature = HandlerSignature::new(self.producer, event);
        if !signature.is_declared() {
            return Err(RefreshError::UndeclaredEvent { signature });
        }

        // Handlers are cloned out so they can subscribe or unsubscribe freely.
        let handlers: Vec<EventHandler> = rw_read(&self.handlers, &HANDLERS, "raise")
            .iter()
            .filter(|(handle, _)| handle.signature.event == event)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let definition = EventDefinition::new(self.producer, event, args);
        trace!(
            event_id = %definition.id,
            signature = %signature,
            handlers = handlers.len(),
            "Raising service event"
        );

        for handler in &handlers {
            handler(&definition)?;
        }
        Ok(handlers.len())
    }

    pub fn subscriber_count(&self) -> usize {
        rw_read(&self.handlers, &HANDLERS, "subscriber_count").len()
    }

    pub fn subscriber_count_for(&self, event: EventName) -> usize {
        rw_read(&self.handlers, &HANDLERS, "subscriber_count_for")
            .iter()
            .filter(|(handle, _)| handle.signature.event == event)
            .count()
    }
}

impl fmt::Debug for ServiceEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEvents")
            .field("producer", &self.producer)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventSource for ServiceEvents {
    fn producer(&self) -> Producer {
        self.producer
    }

    fn subscribe(
        &self,
        event: EventName,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle, BindError> {
        let signature = HandlerSignature::new(self.producer, event);
        if !signature.is_declared() {
            return Err(BindError::UndeclaredEvent { signature });
        }

        let handle = SubscriptionHandle {
            signature,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        rw_write(&self.handlers, &HANDLERS, "subscribe").push((handle, handler));
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut handlers = rw_write(&self.handlers, &HANDLERS, "unsubscribe");
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != handle);
        handlers.len() != before
    }
}

/// The producers wired into this process, keyed by kind.
#[derive(Clone, Default)]
pub struct EventSources {
    sources: HashMap<Producer, Arc<dyn EventSource>>,
}

impl EventSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire a producer, replacing any source previously wired for the same kind.
    pub fn insert(&mut self, source: Arc<dyn EventSource>) {
        self.sources.insert(source.producer(), source);
    }

    pub fn get(&self, producer: Producer) -> Option<&Arc<dyn EventSource>> {
        self.sources.get(&producer)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Debug for EventSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut producers: Vec<_> = self.sources.keys().collect();
        producers.sort();
        f.debug_struct("EventSources")
            .field("producers", &producers)
            .finish()
    }
}

/// One [`ServiceEvents`] per producer kind, for tests and dry runs.
#[derive(Debug)]
pub struct InMemoryServices {
    services: HashMap<Producer, Arc<ServiceEvents>>,
}

impl InMemoryServices {
    pub fn new() -> Self {
        let services = Producer::iter()
            .map(|producer| (producer, Arc::new(ServiceEvents::new(producer))))
            .collect();
        Self { services }
    }

    pub fn service(&self, producer: Producer) -> &Arc<ServiceEvents> {
        // Every producer kind is populated in `new`.
        &self.services[&producer]
    }

    pub fn raise(
        &self,
        producer: Producer,
        event: EventName,
        args: EventArgs,
    ) -> Result<usize, RefreshError> {
        self.service(producer).raise(event, args)
    }

    /// Total subscriptions across every producer.
    pub fn subscriber_count(&self) -> usize {
        self.services
            .values()
            .map(|service| service.subscriber_count())
            .sum()
    }

    pub fn sources(&self) -> EventSources {
        let mut sources = EventSources::new();
        for service in self.services.values() {
            sources.insert(Arc::clone(service) as Arc<dyn EventSource>);
        }
        sources
    }
}

impl Default for InMemoryServices {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn raise_runs_only_handlers_for_that_event() {
        let service = ServiceEvents::new(Producer::DomainService);
        let saved = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));

        service
            .subscribe(EventName::Saved, counting_handler(saved.clone()))
            .expect("declared event");
        service
            .subscribe(EventName::Deleted, counting_handler(deleted.clone()))
            .expect("declared event");

        let ran = service
            .raise(EventName::Saved, EventArgs::Entities(Vec::new()))
            .expect("raise succeeds");

        assert_eq!(ran, 1);
        assert_eq!(saved.load(Ordering::SeqCst), 1);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribe_rejects_undeclared_events() {
        let service = ServiceEvents::new(Producer::SectionService);
        let result = service.subscribe(
            EventName::Updated,
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );
        assert!(matches!(result, Err(BindError::UndeclaredEvent { .. })));
    }

    #[test]
    fn raise_rejects_undeclared_events() {
        let service = ServiceEvents::new(Producer::SectionService);
        let result = service.raise(EventName::Updated, EventArgs::Empty);
        assert!(matches!(result, Err(RefreshError::UndeclaredEvent { .. })));
    }

    #[test]
    fn unsubscribe_detaches_once() {
        let service = ServiceEvents::new(Producer::MacroService);
        let handle = service
            .subscribe(
                EventName::Saved,
                counting_handler(Arc::new(AtomicUsize::new(0))),
            )
            .expect("declared event");

        assert_eq!(service.subscriber_count(), 1);
        assert!(service.unsubscribe(handle));
        assert!(!service.unsubscribe(handle));
        assert_eq!(service.subscriber_count(), 0);
    }

    #[test]
    fn handler_errors_reach_the_raiser() {
        let service = ServiceEvents::new(Producer::MediaService);
        let signature = HandlerSignature::new(Producer::MediaService, EventName::TreeChanged);
        service
            .subscribe(
                EventName::TreeChanged,
                Arc::new(move |_| Err(RefreshError::UndeclaredEvent { signature })),
            )
            .expect("declared event");

        let result = service.raise(EventName::TreeChanged, EventArgs::TreeChanges(Vec::new()));
        assert!(result.is_err());
    }

    #[test]
    fn in_memory_services_wire_every_producer() {
        let services = InMemoryServices::new();
        let sources = services.sources();

        for producer in Producer::iter() {
            let source = sources.get(producer).expect("producer wired");
            assert_eq!(source.producer(), producer);
        }
        assert_eq!(sources.len(), Producer::iter().count());
    }
}
