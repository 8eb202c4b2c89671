//! Cache regions and the invalidation calls made against them.

use std::fmt;

use serde::Serialize;
use strum::{EnumIter, IntoStaticStr};

use crate::domain::entities::{ContentTypeChange, TreeChange};
use crate::domain::types::EntityId;

/// A named partition of the distributed cache, one per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheRegion {
    Content,
    Media,
    Member,
    MemberGroup,
    ContentType,
    DataType,
    Template,
    Macro,
    Domain,
    Language,
    Dictionary,
    User,
    UserType,
    UserPermissions,
    RelationType,
    PublicAccess,
    ApplicationTree,
    ApplicationSection,
}

impl CacheRegion {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one call made to the distributed cache facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InvalidationAction {
    Refresh {
        region: CacheRegion,
        ids: Vec<EntityId>,
    },
    Remove {
        region: CacheRegion,
        ids: Vec<EntityId>,
    },
    RefreshAll {
        region: CacheRegion,
    },
    RemoveAll {
        region: CacheRegion,
    },
    RefreshContent {
        changes: Vec<TreeChange>,
    },
    RefreshMedia {
        changes: Vec<TreeChange>,
    },
    RefreshContentTypes {
        changes: Vec<ContentTypeChange>,
    },
}

impl InvalidationAction {
    /// Region the call targets.
    pub fn region(&self) -> CacheRegion {
        match self {
            InvalidationAction::Refresh { region, .. }
            | InvalidationAction::Remove { region, .. }
            | InvalidationAction::RefreshAll { region }
            | InvalidationAction::RemoveAll { region } => *region,
            InvalidationAction::RefreshContent { .. } => CacheRegion::Content,
            InvalidationAction::RefreshMedia { .. } => CacheRegion::Media,
            InvalidationAction::RefreshContentTypes { .. } => CacheRegion::ContentType,
        }
    }

    /// Short verb used for log fields and metric labels.
    pub fn verb(&self) -> &'static str {
        match self {
            InvalidationAction::Refresh { .. } => "refresh",
            InvalidationAction::Remove { .. } => "remove",
            InvalidationAction::RefreshAll { .. } => "refresh_all",
            InvalidationAction::RemoveAll { .. } => "remove_all",
            InvalidationAction::RefreshContent { .. } => "refresh_content",
            InvalidationAction::RefreshMedia { .. } => "refresh_media",
            InvalidationAction::RefreshContentTypes { .. } => "refresh_content_types",
        }
    }
}

impl fmt::Display for InvalidationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationAction::Refresh { region, ids }
            | InvalidationAction::Remove { region, ids } => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, "{} {} [{}]", self.verb(), region, ids.join(", "))
            }
            InvalidationAction::RefreshAll { region }
            | InvalidationAction::RemoveAll { region } => write!(f, "{} {}", self.verb(), region),
            InvalidationAction::RefreshContent { changes }
            | InvalidationAction::RefreshMedia { changes } => {
                write!(f, "{} ({} changes)", self.verb(), changes.len())
            }
            InvalidationAction::RefreshContentTypes { changes } => {
                write!(f, "{} ({} changes)", self.verb(), changes.len())
            }
        }
    }
}
