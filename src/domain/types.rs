//! Shared domain enumerations and identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier handed out by the persistence layer for every stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i32);

impl EntityId {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Effect of a content or media tree operation on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeChangeKind {
    /// Only the node itself changed.
    RefreshNode,
    /// The node and all of its descendants changed.
    RefreshBranch,
    /// The whole tree must be reloaded.
    RefreshAll,
    /// The node was removed.
    Remove,
}

impl TreeChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TreeChangeKind::RefreshNode => "refresh_node",
            TreeChangeKind::RefreshBranch => "refresh_branch",
            TreeChangeKind::RefreshAll => "refresh_all",
            TreeChangeKind::Remove => "remove",
        }
    }
}

/// Which family of content type a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeItem {
    Content,
    Media,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeChangeKind {
    Create,
    /// The type's own properties or composition changed.
    RefreshMain,
    /// Something the type depends on changed.
    RefreshOther,
    Remove,
}
