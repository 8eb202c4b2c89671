//! The routing table: one routine per producer event, each translating the
//! event payload into calls on the distributed cache.
//!
//! Adding a route means adding a `Route` variant; the exhaustive matches in
//! [`Route::signatures`], [`Route::expects`] and [`Route::invoke`] then refuse
//! to compile until the new route is fully described.

use std::collections::HashSet;

use strum::{EnumIter, IntoStaticStr};

use crate::cache::{CacheRegion, DistributedCache};
use crate::domain::entities::{
    ContentTypeChange, EntityPermission, EntityRef, TreeChange, permissions_changed,
};
use crate::domain::types::EntityId;
use crate::events::{
    EventArgs, EventDefinition, EventName, HandlerSignature, PayloadShape, Producer,
};

use super::error::RefreshError;

macro_rules! signatures {
    ($($producer:ident _ $event:ident),+ $(,)?) => {{
        const SIGNATURES: &[HandlerSignature] = &[
            $(HandlerSignature::new(Producer::$producer, EventName::$event)),+
        ];
        SIGNATURES
    }};
}

/// Declared events that are deliberately never bound or routed.
///
/// Stylesheet saves and deletes do not refresh any cache while templates,
/// macros and the other file-backed entities do. Kept explicit so the
/// asymmetry is visible rather than implied by a missing route.
pub const EXEMPT_SIGNATURES: &[HandlerSignature] = &[
    HandlerSignature::new(Producer::FileService, EventName::SavedStylesheet),
    HandlerSignature::new(Producer::FileService, EventName::DeletedStylesheet),
];

pub fn is_exempt(signature: HandlerSignature) -> bool {
    EXEMPT_SIGNATURES.contains(&signature)
}

/// Every invalidation routine the refresher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Route {
    ApplicationTreeChanged,
    SectionChanged,
    UserTypeSaved,
    UserTypeDeleted,
    UserSaved,
    UserDeleted,
    DictionaryItemSaved,
    DictionaryItemDeleted,
    LanguageSaved,
    LanguageDeleted,
    DataTypeSaved,
    DataTypeDeleted,
    DomainSaved,
    DomainDeleted,
    ContentTypeChanged,
    PermissionsAssigned,
    TemplateSaved,
    TemplateDeleted,
    MacroSaved,
    MacroDeleted,
    MemberSaved,
    MemberDeleted,
    MemberGroupSaved,
    MemberGroupDeleted,
    MediaTreeChanged,
    ContentSaved,
    ContentCopied,
    ContentTreeChanged,
    PublicAccessChanged,
    RelationTypeSaved,
    RelationTypeDeleted,
}

impl Route {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Signatures this routine answers.
    pub fn signatures(self) -> &'static [HandlerSignature] {
        match self {
            Route::ApplicationTreeChanged => signatures![
                ApplicationTreeService _ New,
                ApplicationTreeService _ Updated,
                ApplicationTreeService _ Deleted,
            ],
            Route::SectionChanged => signatures![SectionService _ New, SectionService _ Deleted],
            Route::UserTypeSaved => signatures![UserService _ SavedUserType],
            Route::UserTypeDeleted => signatures![UserService _ DeletedUserType],
            Route::UserSaved => signatures![UserService _ SavedUser],
            Route::UserDeleted => signatures![UserService _ DeletedUser],
            Route::DictionaryItemSaved => signatures![LocalizationService _ SavedDictionaryItem],
            Route::DictionaryItemDeleted => {
                signatures![LocalizationService _ DeletedDictionaryItem]
            }
            Route::LanguageSaved => signatures![LocalizationService _ SavedLanguage],
            Route::LanguageDeleted => signatures![LocalizationService _ DeletedLanguage],
            Route::DataTypeSaved => signatures![DataTypeService _ Saved],
            Route::DataTypeDeleted => signatures![DataTypeService _ Deleted],
            Route::DomainSaved => signatures![DomainService _ Saved],
            Route::DomainDeleted => signatures![DomainService _ Deleted],
            Route::ContentTypeChanged => signatures![
                ContentTypeService _ Changed,
                MediaTypeService _ Changed,
                MemberTypeService _ Changed,
            ],
            Route::PermissionsAssigned => signatures![PermissionRepository _ AssignedPermissions],
            Route::TemplateSaved => signatures![FileService _ SavedTemplate],
            Route::TemplateDeleted => signatures![FileService _ DeletedTemplate],
            Route::MacroSaved => signatures![MacroService _ Saved],
            Route::MacroDeleted => signatures![MacroService _ Deleted],
            Route::MemberSaved => signatures![MemberService _ Saved],
            Route::MemberDeleted => signatures![MemberService _ Deleted],
            Route::MemberGroupSaved => signatures![MemberGroupService _ Saved],
            Route::MemberGroupDeleted => signatures![MemberGroupService _ Deleted],
            Route::MediaTreeChanged => signatures![MediaService _ TreeChanged],
            Route::ContentSaved => signatures![ContentService _ Saved],
            Route::ContentCopied => signatures![ContentService _ Copied],
            Route::ContentTreeChanged => signatures![ContentService _ TreeChanged],
            Route::PublicAccessChanged => {
                signatures![PublicAccessService _ Saved, PublicAccessService _ Deleted]
            }
            Route::RelationTypeSaved => signatures![RelationService _ SavedRelationType],
            Route::RelationTypeDeleted => signatures![RelationService _ DeletedRelationType],
        }
    }

    /// Payload shape the routine reads.
    pub fn expects(self) -> PayloadShape {
        match self {
            Route::ApplicationTreeChanged | Route::SectionChanged => PayloadShape::Empty,
            Route::ContentTypeChanged => PayloadShape::ContentTypeChanges,
            Route::PermissionsAssigned => PayloadShape::Permissions,
            Route::MediaTreeChanged | Route::ContentTreeChanged => PayloadShape::TreeChanges,
            Route::ContentCopied => PayloadShape::Copy,
            Route::UserTypeSaved
            | Route::UserTypeDeleted
            | Route::UserSaved
            | Route::UserDeleted
            | Route::DictionaryItemSaved
            | Route::DictionaryItemDeleted
            | Route::LanguageSaved
            | Route::LanguageDeleted
            | Route::DataTypeSaved
            | Route::DataTypeDeleted
            | Route::DomainSaved
            | Route::DomainDeleted
            | Route::TemplateSaved
            | Route::TemplateDeleted
            | Route::MacroSaved
            | Route::MacroDeleted
            | Route::MemberSaved
            | Route::MemberDeleted
            | Route::MemberGroupSaved
            | Route::MemberGroupDeleted
            | Route::ContentSaved
            | Route::PublicAccessChanged
            | Route::RelationTypeSaved
            | Route::RelationTypeDeleted => PayloadShape::Entities,
        }
    }

    /// Run the routine for `event` against `cache`.
    pub fn invoke(
        self,
        cache: &dyn DistributedCache,
        event: &EventDefinition,
    ) -> Result<(), RefreshError> {
        match self {
            Route::ApplicationTreeChanged => {
                expect_empty(event)?;
                cache.refresh_all(CacheRegion::ApplicationTree);
            }
            Route::SectionChanged => {
                expect_empty(event)?;
                cache.refresh_all(CacheRegion::ApplicationSection);
            }
            Route::UserTypeSaved => refresh_each(cache, CacheRegion::UserType, entities(event)?),
            Route::UserTypeDeleted => remove_each(cache, CacheRegion::UserType, entities(event)?),
            Route::UserSaved => refresh_each(cache, CacheRegion::User, entities(event)?),
            Route::UserDeleted => remove_each(cache, CacheRegion::User, entities(event)?),
            Route::DictionaryItemSaved => {
                refresh_each(cache, CacheRegion::Dictionary, entities(event)?)
            }
            Route::DictionaryItemDeleted => {
                remove_each(cache, CacheRegion::Dictionary, entities(event)?)
            }
            Route::LanguageSaved => refresh_each(cache, CacheRegion::Language, entities(event)?),
            Route::LanguageDeleted => remove_each(cache, CacheRegion::Language, entities(event)?),
            Route::DataTypeSaved => refresh_each(cache, CacheRegion::DataType, entities(event)?),
            Route::DataTypeDeleted => remove_each(cache, CacheRegion::DataType, entities(event)?),
            Route::DomainSaved => refresh_each(cache, CacheRegion::Domain, entities(event)?),
            Route::DomainDeleted => remove_each(cache, CacheRegion::Domain, entities(event)?),
            Route::ContentTypeChanged => {
                cache.refresh_content_type_cache(content_type_changes(event)?);
            }
            Route::PermissionsAssigned => {
                for user_id in distinct_user_ids(permissions(event)?) {
                    cache.refresh_by_ids(CacheRegion::UserPermissions, &[user_id]);
                }
            }
            Route::TemplateSaved => refresh_each(cache, CacheRegion::Template, entities(event)?),
            Route::TemplateDeleted => remove_each(cache, CacheRegion::Template, entities(event)?),
            Route::MacroSaved => refresh_each(cache, CacheRegion::Macro, entities(event)?),
            Route::MacroDeleted => remove_each(cache, CacheRegion::Macro, entities(event)?),
            Route::MemberSaved => {
                cache.refresh_by_ids(CacheRegion::Member, &ids_of(entities(event)?));
            }
            Route::MemberDeleted => {
                cache.remove_by_ids(CacheRegion::Member, &ids_of(entities(event)?));
            }
            // Saving a member group drops it as well; it is reloaded on next read.
            Route::MemberGroupSaved | Route::MemberGroupDeleted => {
                remove_each(cache, CacheRegion::MemberGroup, entities(event)?)
            }
            Route::MediaTreeChanged => {
                cache.refresh_media_cache(tree_changes(event)?);
            }
            Route::ContentSaved => {
                let reassigned = entities(event)?
                    .iter()
                    .any(|entity| entity.is_new() && permissions_changed(entity.as_ref()));
                if reassigned {
                    cache.refresh_all(CacheRegion::UserPermissions);
                }
            }
            Route::ContentCopied => {
                let copy = copied(event)?;
                if permissions_changed(copy.as_ref()) {
                    cache.refresh_all(CacheRegion::UserPermissions);
                }
            }
            Route::ContentTreeChanged => {
                cache.refresh_content_cache(tree_changes(event)?);
            }
            Route::PublicAccessChanged => {
                entities(event)?;
                cache.refresh_all(CacheRegion::PublicAccess);
            }
            Route::RelationTypeSaved => {
                refresh_each(cache, CacheRegion::RelationType, entities(event)?)
            }
            Route::RelationTypeDeleted => {
                remove_each(cache, CacheRegion::RelationType, entities(event)?)
            }
        }
        Ok(())
    }
}

fn mismatch(event: &EventDefinition, expected: PayloadShape) -> RefreshError {
    RefreshError::unexpected_payload(event.signature(), expected, event.args.shape())
}

fn expect_empty(event: &EventDefinition) -> Result<(), RefreshError> {
    match &event.args {
        EventArgs::Empty => Ok(()),
        _ => Err(mismatch(event, PayloadShape::Empty)),
    }
}

fn entities(event: &EventDefinition) -> Result<&[EntityRef], RefreshError> {
    match &event.args {
        EventArgs::Entities(entities) => Ok(entities),
        _ => Err(mismatch(event, PayloadShape::Entities)),
    }
}

fn copied(event: &EventDefinition) -> Result<&EntityRef, RefreshError> {
    match &event.args {
        EventArgs::Copied { copy, .. } => Ok(copy),
        _ => Err(mismatch(event, PayloadShape::Copy)),
    }
}

fn tree_changes(event: &EventDefinition) -> Result<&[TreeChange], RefreshError> {
    match &event.args {
        EventArgs::TreeChanges(changes) => Ok(changes),
        _ => Err(mismatch(event, PayloadShape::TreeChanges)),
    }
}

fn content_type_changes(event: &EventDefinition) -> Result<&[ContentTypeChange], RefreshError> {
    match &event.args {
        EventArgs::ContentTypeChanges(changes) => Ok(changes),
        _ => Err(mismatch(event, PayloadShape::ContentTypeChanges)),
    }
}

fn permissions(event: &EventDefinition) -> Result<&[EntityPermission], RefreshError> {
    match &event.args {
        EventArgs::Permissions(rows) => Ok(rows),
        _ => Err(mismatch(event, PayloadShape::Permissions)),
    }
}

fn ids_of(entities: &[EntityRef]) -> Vec<EntityId> {
    entities.iter().map(|entity| entity.id()).collect()
}

fn refresh_each(cache: &dyn DistributedCache, region: CacheRegion, entities: &[EntityRef]) {
    for entity in entities {
        cache.refresh_by_ids(region, &[entity.id()]);
    }
}

fn remove_each(cache: &dyn DistributedCache, region: CacheRegion, entities: &[EntityRef]) {
    for entity in entities {
        cache.remove_by_ids(region, &[entity.id()]);
    }
}

/// User ids of the grant rows, first occurrence order, without repeats.
fn distinct_user_ids(rows: &[EntityPermission]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|row| row.user_id)
        .filter(|id| seen.insert(*id))
        .collect()
}
