//! Cache refresher: listens to service-layer events and issues targeted
//! invalidations to the distributed cache.
//!
//! ```text
//! producer raises event
//!   -> binder's handler wraps it in an EventDefinition
//!   -> HandlerRegistry resolves the signature to a Route (memoised)
//!   -> Route::invoke inspects the payload and calls DistributedCache
//! ```
//!
//! The refresher must be started before anything that depends on cache
//! freshness.

mod binder;
pub mod error;
mod registry;
mod router;
mod routes;

use std::sync::Arc;

use tracing::info;

pub use binder::{BindMode, SubscriptionBinder, bindings};
pub use error::{BindError, RefreshError};
pub use registry::HandlerRegistry;
pub use router::{DispatchOutcome, InvalidationRouter};
pub use routes::{EXEMPT_SIGNATURES, Route, is_exempt};

use crate::cache::DistributedCache;
use crate::config::RefresherSettings;
use crate::events::EventSources;

impl From<&RefresherSettings> for BindMode {
    fn from(settings: &RefresherSettings) -> Self {
        if settings.support_unbinding {
            BindMode::Unbindable
        } else {
            BindMode::Production
        }
    }
}

/// Router plus the subscriptions that feed it.
pub struct CacheRefresher {
    router: Arc<InvalidationRouter>,
    binder: SubscriptionBinder,
}

impl CacheRefresher {
    /// Build a refresher without binding it.
    pub fn new(settings: &RefresherSettings, cache: Arc<dyn DistributedCache>) -> Self {
        let router = Arc::new(InvalidationRouter::new(cache));
        let binder = SubscriptionBinder::new(Arc::clone(&router), BindMode::from(settings));
        Self { router, binder }
    }

    /// Build a refresher and bind it to every wired producer.
    pub fn start(
        settings: &RefresherSettings,
        cache: Arc<dyn DistributedCache>,
        sources: &EventSources,
    ) -> Result<Self, BindError> {
        info!("Initializing internal event handlers for cache refreshing");
        let mut refresher = Self::new(settings, cache);
        refresher.binder.initialize(sources)?;
        Ok(refresher)
    }

    pub fn initialize(&mut self, sources: &EventSources) -> Result<usize, BindError> {
        self.binder.initialize(sources)
    }

    pub fn unbind(&mut self) -> Result<usize, BindError> {
        self.binder.unbind()
    }

    pub fn is_bound(&self) -> bool {
        self.binder.is_bound()
    }

    pub fn router(&self) -> &Arc<InvalidationRouter> {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheRegion, RecordingCache};
    use crate::events::{EventArgs, EventName, InMemoryServices, Producer};

    #[test]
    fn settings_select_bind_mode() {
        let production = RefresherSettings {
            support_unbinding: false,
        };
        let unbindable = RefresherSettings {
            support_unbinding: true,
        };

        assert_eq!(BindMode::from(&production), BindMode::Production);
        assert_eq!(BindMode::from(&unbindable), BindMode::Unbindable);
    }

    #[test]
    fn started_refresher_reacts_to_raised_events() {
        let services = InMemoryServices::new();
        let cache = Arc::new(RecordingCache::new());
        let settings = RefresherSettings {
            support_unbinding: true,
        };

        let mut refresher =
            CacheRefresher::start(&settings, cache.clone(), &services.sources()).expect("starts");
        assert!(refresher.is_bound());

        services
            .raise(
                Producer::PublicAccessService,
                EventName::Deleted,
                EventArgs::Entities(Vec::new()),
            )
            .expect("raise succeeds");
        assert_eq!(cache.calls_for(CacheRegion::PublicAccess), 1);

        refresher.unbind().expect("unbind succeeds");
        services
            .raise(
                Producer::PublicAccessService,
                EventName::Saved,
                EventArgs::Entities(Vec::new()),
            )
            .expect("raise succeeds");
        assert_eq!(cache.calls_for(CacheRegion::PublicAccess), 1);
    }
}
