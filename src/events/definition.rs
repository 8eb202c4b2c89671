//! Fired event records and their payloads.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{ContentTypeChange, EntityPermission, EntityRef, TreeChange};

use super::signature::{EventName, HandlerSignature, PayloadShape, Producer};

/// Payload delivered with an event.
#[derive(Debug, Clone)]
pub enum EventArgs {
    /// Notification-only events (application trees and sections).
    Empty,
    /// Entities affected by a save or delete, in the order the producer reported them.
    Entities(Vec<EntityRef>),
    Copied { original: EntityRef, copy: EntityRef },
    /// Ordered tree change set for content or media.
    TreeChanges(Vec<TreeChange>),
    ContentTypeChanges(Vec<ContentTypeChange>),
    Permissions(Vec<EntityPermission>),
}

impl EventArgs {
    pub fn shape(&self) -> PayloadShape {
        match self {
            EventArgs::Empty => PayloadShape::Empty,
            EventArgs::Entities(_) => PayloadShape::Entities,
            EventArgs::Copied { .. } => PayloadShape::Copy,
            EventArgs::TreeChanges(_) => PayloadShape::TreeChanges,
            EventArgs::ContentTypeChanges(_) => PayloadShape::ContentTypeChanges,
            EventArgs::Permissions(_) => PayloadShape::Permissions,
        }
    }
}

/// One fired domain event.
///
/// Immutable once built; dispatched synchronously and dropped afterwards.
#[derive(Debug, Clone)]
pub struct EventDefinition {
    /// Correlation id for logs.
    pub id: Uuid,
    pub raised_at: OffsetDateTime,
    pub sender: Producer,
    pub event: EventName,
    pub args: EventArgs,
}

impl EventDefinition {
    pub fn new(sender: Producer, event: EventName, args: EventArgs) -> Self {
        Self {
            id: Uuid::new_v4(),
            raised_at: OffsetDateTime::now_utc(),
            sender,
            event,
            args,
        }
    }

    pub fn signature(&self) -> HandlerSignature {
        HandlerSignature::new(self.sender, self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EntityRecord;

    #[test]
    fn events_with_same_shape_share_a_signature() {
        let first = EventDefinition::new(
            Producer::DomainService,
            EventName::Saved,
            EventArgs::Entities(vec![EntityRecord::new(1).into_ref()]),
        );
        let second = EventDefinition::new(
            Producer::DomainService,
            EventName::Saved,
            EventArgs::Entities(Vec::new()),
        );

        assert_ne!(first.id, second.id);
        assert_eq!(first.signature(), second.signature());
    }

    #[test]
    fn args_report_their_shape() {
        assert_eq!(EventArgs::Empty.shape(), PayloadShape::Empty);
        assert_eq!(
            EventArgs::TreeChanges(Vec::new()).shape(),
            PayloadShape::TreeChanges
        );
        let copied = EventArgs::Copied {
            original: EntityRecord::new(1).into_ref(),
            copy: EntityRecord::new(2).into_ref(),
        };
        assert_eq!(copied.shape(), PayloadShape::Copy);
    }
}
