//! Signature to routine lookup, built once and memoised per signature.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::events::{EventDefinition, HandlerSignature, PayloadShape};

use super::routes::Route;

static GLOBAL: Lazy<Arc<HandlerRegistry>> = Lazy::new(|| Arc::new(HandlerRegistry::new()));

/// Resolves an event's signature to the routine registered for it.
///
/// The candidate table is scanned from [`Route`] exactly once, on first use,
/// even under concurrent first use. Every resolution, including misses, is
/// memoised so later events with the same signature skip the table.
pub struct HandlerRegistry {
    candidates: OnceCell<HashMap<HandlerSignature, Route>>,
    resolved: DashMap<HandlerSignature, Option<Route>>,
    scans: AtomicUsize,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            candidates: OnceCell::new(),
            resolved: DashMap::new(),
            scans: AtomicUsize::new(0),
        }
    }

    /// Process-wide registry shared by every router that does not bring its own.
    pub fn global() -> Arc<HandlerRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Routine for the event, or `None` when nothing handles its signature.
    pub fn resolve(&self, event: &EventDefinition) -> Option<Route> {
        self.resolve_signature(event.signature())
    }

    pub fn resolve_signature(&self, signature: HandlerSignature) -> Option<Route> {
        if let Some(hit) = self.resolved.get(&signature) {
            return *hit;
        }

        let route = self.candidates().get(&signature).copied();
        if route.is_none() {
            debug!(signature = %signature, "No invalidation routine for signature");
        }
        *self.resolved.entry(signature).or_insert(route)
    }

    /// How many times the candidate table has been built. Never exceeds one.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of memoised resolutions, hits and misses alike.
    pub fn cached_len(&self) -> usize {
        self.resolved.len()
    }

    /// The full routing table, sorted by signature.
    pub fn table(&self) -> Vec<(HandlerSignature, Route)> {
        let mut table: Vec<_> = self
            .candidates()
            .iter()
            .map(|(signature, route)| (*signature, *route))
            .collect();
        table.sort_by_key(|(signature, _)| *signature);
        table
    }

    fn candidates(&self) -> &HashMap<HandlerSignature, Route> {
        self.candidates.get_or_init(|| {
            self.scans.fetch_add(1, Ordering::SeqCst);
            build_candidates(
                Route::iter().map(|route| (route, route.signatures(), route.expects())),
            )
        })
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep routes whose signatures are all declared and whose expected payload
/// matches what those events carry. Duplicate signatures keep the first route.
fn build_candidates(
    routes: impl Iterator<Item = (Route, &'static [HandlerSignature], PayloadShape)>,
) -> HashMap<HandlerSignature, Route> {
    let mut table = HashMap::new();

    for (route, signatures, expects) in routes {
        let malformed = signatures
            .iter()
            .find(|signature| !signature.is_declared() || signature.payload_shape() != expects);
        if let Some(signature) = malformed {
            warn!(
                route = route.name(),
                signature = %signature,
                expects = ?expects,
                "Excluding invalidation routine that does not fit its event"
            );
            continue;
        }

        for signature in signatures {
            match table.entry(*signature) {
                Entry::Vacant(slot) => {
                    slot.insert(route);
                }
                Entry::Occupied(existing) => {
                    warn!(
                        signature = %signature,
                        kept = existing.get().name(),
                        ignored = route.name(),
                        "Duplicate invalidation routine for signature"
                    );
                }
            }
        }
    }

    table
}
