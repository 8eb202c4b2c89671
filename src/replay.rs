//! Dry-run replay of recorded events through in-memory producers.
//!
//! A replay file is a JSON array of events:
//!
//! ```json
//! [
//!   { "producer": "FileService", "event": "SavedTemplate",
//!     "payload": { "kind": "entities", "items": [{ "id": 4 }] } },
//!   { "producer": "SectionService", "event": "New" }
//! ]
//! ```
//!
//! Each event is raised through a fully bound [`InMemoryServices`] and the
//! invalidations it causes are collected instead of reaching a cluster.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{InvalidationAction, LoggingCache, RecordingCache};
use crate::config::RefresherSettings;
use crate::domain::entities::{ContentTypeChange, EntityPermission, EntityRecord, TreeChange};
use crate::domain::error::DomainError;
use crate::events::{EventArgs, EventName, HandlerSignature, InMemoryServices, Producer};
use crate::infra::error::InfraError;
use crate::refresher::{BindError, CacheRefresher, RefreshError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to parse replay file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("event #{index} is invalid: {source}")]
    Invalid {
        index: usize,
        #[source]
        source: DomainError,
    },
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("event #{index} failed: {source}")]
    Refresh {
        index: usize,
        #[source]
        source: RefreshError,
    },
}

/// One event as written in a replay file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEvent {
    pub producer: Producer,
    pub event: EventName,
    #[serde(default)]
    pub payload: ReplayPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayPayload {
    #[default]
    Empty,
    Entities {
        items: Vec<EntityRecord>,
    },
    Copied {
        original: EntityRecord,
        copy: EntityRecord,
    },
    TreeChanges {
        changes: Vec<TreeChange>,
    },
    ContentTypeChanges {
        changes: Vec<ContentTypeChange>,
    },
    Permissions {
        rows: Vec<EntityPermission>,
    },
}

impl ReplayEvent {
    /// Check the event is one its producer raises and that the payload has
    /// the shape that event carries.
    pub fn validate(&self) -> Result<(), DomainError> {
        let signature = HandlerSignature::new(self.producer, self.event);
        if !signature.is_declared() {
            return Err(DomainError::validation(format!(
                "{} does not raise {}",
                self.producer, self.event
            )));
        }

        let args = self.payload.clone().into_args();
        if args.shape() != signature.payload_shape() {
            return Err(DomainError::validation(format!(
                "{signature} carries {:?}, got {:?}",
                signature.payload_shape(),
                args.shape()
            )));
        }
        Ok(())
    }
}

impl ReplayPayload {
    pub fn into_args(self) -> EventArgs {
        match self {
            ReplayPayload::Empty => EventArgs::Empty,
            ReplayPayload::Entities { items } => {
                EventArgs::Entities(items.into_iter().map(EntityRecord::into_ref).collect())
            }
            ReplayPayload::Copied { original, copy } => EventArgs::Copied {
                original: original.into_ref(),
                copy: copy.into_ref(),
            },
            ReplayPayload::TreeChanges { changes } => EventArgs::TreeChanges(changes),
            ReplayPayload::ContentTypeChanges { changes } => EventArgs::ContentTypeChanges(changes),
            ReplayPayload::Permissions { rows } => EventArgs::Permissions(rows),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub actions: Vec<InvalidationAction>,
}

pub fn parse_events(input: &str) -> Result<Vec<ReplayEvent>, ReplayError> {
    let events: Vec<ReplayEvent> = serde_json::from_str(input)?;
    for (index, event) in events.iter().enumerate() {
        event
            .validate()
            .map_err(|source| ReplayError::Invalid { index, source })?;
    }
    Ok(events)
}

pub fn load_events(path: &Path) -> Result<Vec<ReplayEvent>, ReplayError> {
    let input = std::fs::read_to_string(path).map_err(InfraError::from)?;
    parse_events(&input)
}

/// Raise `events` in order and return every invalidation they caused.
///
/// Stops at the first event whose routine fails.
pub fn replay(
    settings: &RefresherSettings,
    events: Vec<ReplayEvent>,
) -> Result<ReplayReport, ReplayError> {
    let services = InMemoryServices::new();
    let recording = Arc::new(RecordingCache::new());
    let cache = Arc::new(LoggingCache::new(Arc::clone(&recording)));

    let mut refresher = CacheRefresher::start(settings, cache, &services.sources())?;

    let count = events.len();
    for (index, event) in events.into_iter().enumerate() {
        let ReplayEvent {
            producer,
            event,
            payload,
        } = event;
        let handlers = services
            .raise(producer, event, payload.into_args())
            .map_err(|source| ReplayError::Refresh { index, source })?;
        debug!(index, producer = %producer, event = %event, handlers, "Replayed event");
    }

    if settings.support_unbinding {
        refresher.unbind()?;
    }

    let actions = recording.take();
    info!(events = count, actions = actions.len(), "Replay finished");
    Ok(ReplayReport {
        events: count,
        actions,
    })
}
