//! Producer kinds, event names and the signatures routines are keyed by.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// Every service or repository that raises events the refresher listens to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum Producer {
    ApplicationTreeService,
    SectionService,
    UserService,
    LocalizationService,
    DataTypeService,
    FileService,
    DomainService,
    ContentTypeService,
    MediaTypeService,
    MemberTypeService,
    PermissionRepository,
    MacroService,
    MemberService,
    MemberGroupService,
    MediaService,
    ContentService,
    PublicAccessService,
    RelationService,
}

impl Producer {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// The fixed set of events this producer raises.
    pub fn events(self) -> &'static [EventName] {
        use EventName::*;

        match self {
            Producer::ApplicationTreeService => &[New, Updated, Deleted],
            Producer::SectionService => &[New, Deleted],
            Producer::UserService => &[SavedUser, DeletedUser, SavedUserType, DeletedUserType],
            Producer::LocalizationService => &[
                SavedDictionaryItem,
                DeletedDictionaryItem,
                SavedLanguage,
                DeletedLanguage,
            ],
            Producer::FileService => &[
                SavedTemplate,
                DeletedTemplate,
                SavedStylesheet,
                DeletedStylesheet,
            ],
            Producer::ContentTypeService
            | Producer::MediaTypeService
            | Producer::MemberTypeService => &[Changed],
            Producer::PermissionRepository => &[AssignedPermissions],
            Producer::MediaService => &[TreeChanged],
            Producer::ContentService => &[Saved, Copied, TreeChanged],
            Producer::RelationService => &[SavedRelationType, DeletedRelationType],
            Producer::DataTypeService
            | Producer::DomainService
            | Producer::MacroService
            | Producer::MemberService
            | Producer::MemberGroupService
            | Producer::PublicAccessService => &[Saved, Deleted],
        }
    }

    pub fn raises(self, event: EventName) -> bool {
        self.events().contains(&event)
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum EventName {
    New,
    Updated,
    Saved,
    Deleted,
    Copied,
    Changed,
    TreeChanged,
    SavedUser,
    DeletedUser,
    SavedUserType,
    DeletedUserType,
    SavedDictionaryItem,
    DeletedDictionaryItem,
    SavedLanguage,
    DeletedLanguage,
    SavedTemplate,
    DeletedTemplate,
    SavedStylesheet,
    DeletedStylesheet,
    AssignedPermissions,
    SavedRelationType,
    DeletedRelationType,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of payload an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    Empty,
    Entities,
    Copy,
    TreeChanges,
    ContentTypeChanges,
    Permissions,
}

/// Lookup key for invalidation routines: which producer raised which event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerSignature {
    pub producer: Producer,
    pub event: EventName,
}

impl HandlerSignature {
    pub const fn new(producer: Producer, event: EventName) -> Self {
        Self { producer, event }
    }

    /// Payload shape this event is declared to carry.
    pub fn payload_shape(self) -> PayloadShape {
        match (self.producer, self.event) {
            (Producer::ApplicationTreeService | Producer::SectionService, _) => PayloadShape::Empty,
            (_, EventName::Copied) => PayloadShape::Copy,
            (_, EventName::TreeChanged) => PayloadShape::TreeChanges,
            (_, EventName::Changed) => PayloadShape::ContentTypeChanges,
            (_, EventName::AssignedPermissions) => PayloadShape::Permissions,
            _ => PayloadShape::Entities,
        }
    }

    /// True when the producer actually raises this event.
    pub fn is_declared(self) -> bool {
        self.producer.raises(self.event)
    }

    /// Every signature some producer declares, in producer order.
    pub fn declared() -> impl Iterator<Item = HandlerSignature> {
        Producer::iter().flat_map(|producer| {
            producer
                .events()
                .iter()
                .map(move |event| HandlerSignature::new(producer, *event))
        })
    }
}

impl fmt::Display for HandlerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.producer, self.event)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn signature_display_joins_with_underscore() {
        let signature = HandlerSignature::new(Producer::ContentService, EventName::TreeChanged);
        assert_eq!(signature.to_string(), "ContentService_TreeChanged");
    }

    #[test]
    fn declared_signatures_are_unique() {
        let all: Vec<_> = HandlerSignature::declared().collect();
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
    }

    #[test]
    fn every_event_name_is_raised_by_someone() {
        for event in EventName::iter() {
            assert!(
                Producer::iter().any(|producer| producer.raises(event)),
                "{event} is not raised by any producer"
            );
        }
    }

    #[test]
    fn payload_shapes_follow_producer_and_event() {
        let shape = |producer, event| HandlerSignature::new(producer, event).payload_shape();

        assert_eq!(
            shape(Producer::ApplicationTreeService, EventName::Deleted),
            PayloadShape::Empty
        );
        assert_eq!(shape(Producer::DomainService, EventName::Deleted), PayloadShape::Entities);
        assert_eq!(shape(Producer::ContentService, EventName::Copied), PayloadShape::Copy);
        assert_eq!(
            shape(Producer::MediaService, EventName::TreeChanged),
            PayloadShape::TreeChanges
        );
        assert_eq!(
            shape(Producer::MemberTypeService, EventName::Changed),
            PayloadShape::ContentTypeChanges
        );
        assert_eq!(
            shape(Producer::PermissionRepository, EventName::AssignedPermissions),
            PayloadShape::Permissions
        );
    }
}
