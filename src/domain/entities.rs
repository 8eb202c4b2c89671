//! Entities and change descriptors mirrored from the service layer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::types::{ContentTypeChangeKind, ContentTypeItem, EntityId, TreeChangeKind};

/// Read-only view of an entity reported by a save, delete or copy event.
///
/// Invalidation only ever needs the id and a couple of flags, so producers
/// hand out whatever concrete type they persist behind this trait.
pub trait Entity: fmt::Debug + Send + Sync {
    fn id(&self) -> EntityId;

    /// True when the entity was created by the operation that raised the event.
    fn is_new(&self) -> bool {
        false
    }

    /// Entities whose permissions can be reassigned as a side effect of a
    /// save or copy expose that through this capability.
    fn permission_tracking(&self) -> Option<&dyn PermissionTracking> {
        None
    }
}

/// Capability of entities that record whether their permissions were
/// reassigned during the current operation.
pub trait PermissionTracking {
    fn permissions_changed(&self) -> bool;
}

/// Returns true when the entity exposes permission tracking and reports a change.
pub fn permissions_changed(entity: &dyn Entity) -> bool {
    entity
        .permission_tracking()
        .is_some_and(|tracking| tracking.permissions_changed())
}

pub type EntityRef = Arc<dyn Entity>;

/// Plain entity snapshot used by fixtures and replayed event files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(default)]
    pub is_new: bool,
    /// `None` means the entity does not track permission changes at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions_changed: Option<bool>,
}

impl EntityRecord {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            is_new: false,
            permissions_changed: None,
        }
    }

    pub fn created(mut self) -> Self {
        self.is_new = true;
        self
    }

    pub fn with_permissions_changed(mut self, changed: bool) -> Self {
        self.permissions_changed = Some(changed);
        self
    }

    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }
}

impl Entity for EntityRecord {
    fn id(&self) -> EntityId {
        self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn permission_tracking(&self) -> Option<&dyn PermissionTracking> {
        self.permissions_changed
            .is_some()
            .then_some(self as &dyn PermissionTracking)
    }
}

impl PermissionTracking for EntityRecord {
    fn permissions_changed(&self) -> bool {
        self.permissions_changed.unwrap_or(false)
    }
}

/// One node's entry in an ordered content or media tree change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeChange {
    pub id: EntityId,
    pub kind: TreeChangeKind,
}

impl TreeChange {
    pub fn new(id: impl Into<EntityId>, kind: TreeChangeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeChange {
    pub id: EntityId,
    pub item: ContentTypeItem,
    pub kind: ContentTypeChangeKind,
}

impl ContentTypeChange {
    pub fn new(
        id: impl Into<EntityId>,
        item: ContentTypeItem,
        kind: ContentTypeChangeKind,
    ) -> Self {
        Self {
            id: id.into(),
            item,
            kind,
        }
    }
}

/// A permission grant row as reported by the permission repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPermission {
    pub user_id: EntityId,
    pub entity_id: EntityId,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl EntityPermission {
    pub fn new(user_id: impl Into<EntityId>, entity_id: impl Into<EntityId>) -> Self {
        Self {
            user_id: user_id.into(),
            entity_id: entity_id.into(),
            permissions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Untracked(EntityId);

    impl Entity for Untracked {
        fn id(&self) -> EntityId {
            self.0
        }
    }

    #[test]
    fn untracked_entities_never_report_permission_changes() {
        let entity = Untracked(EntityId(7));
        assert!(!permissions_changed(&entity));
        assert!(!entity.is_new());
    }

    #[test]
    fn record_exposes_tracking_only_when_flag_present() {
        let plain = EntityRecord::new(1);
        assert!(plain.permission_tracking().is_none());

        let unchanged = EntityRecord::new(2).with_permissions_changed(false);
        assert!(unchanged.permission_tracking().is_some());
        assert!(!permissions_changed(&unchanged));

        let changed = EntityRecord::new(3).with_permissions_changed(true);
        assert!(permissions_changed(&changed));
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let record: EntityRecord = serde_json::from_str(r#"{"id": 42}"#).expect("valid record");
        assert_eq!(record, EntityRecord::new(42));
    }
}
