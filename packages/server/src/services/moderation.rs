//! The approval state machine and the rules for who may change a document.

use chrono::Utc;
use common::{ApprovalState, Role};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::info;
use uuid::Uuid;

use super::documents::DocumentRepository;
use super::scope::Scope;
use crate::config::DownloadPolicy;
use crate::entity::{document, profile};
use crate::error::AppError;

/// State a new document starts in, by author role.
///
/// Professors and directors publish directly; everyone else waits for review.
pub fn initial_state(author_role: Role) -> ApprovalState {
    if author_role.auto_publishes() {
        ApprovalState::Approved
    } else {
        ApprovalState::Pending
    }
}

/// Whether `scope` may delete `document`, whose author currently has
/// `author_role` (`None` when the author profile is gone).
///
/// Authors may always delete their own documents. Directors may delete
/// student submissions of their own university, never professors' work.
pub fn authorize_delete(
    scope: &Scope,
    document: &document::Model,
    author_role: Option<Role>,
) -> Result<(), AppError> {
    if document.author_id == scope.principal_id {
        return Ok(());
    }
    if !scope.is_director() {
        return Err(AppError::NotAuthorized(
            "Only the author can delete this document".into(),
        ));
    }
    scope.require_director_of(document.university_id)?;
    match author_role {
        Some(Role::Student) => Ok(()),
        _ => Err(AppError::NotAuthorized(
            "Directors can only delete student submissions".into(),
        )),
    }
}

/// Whether a document may be viewed, rated or downloaded.
///
/// Approved documents are open to everyone. Other states depend on the
/// configured policy: the author and directors of the document's university
/// always keep access.
pub fn may_access(
    document: &document::Model,
    scope: Option<&Scope>,
    policy: DownloadPolicy,
) -> bool {
    if document.approval_state.is_public() {
        return true;
    }
    let Some(scope) = scope else {
        return false;
    };
    match policy {
        DownloadPolicy::AnyAuthenticated => true,
        DownloadPolicy::ApprovedOrPrivileged => {
            document.author_id == scope.principal_id || scope.directs(document.university_id)
        }
    }
}

pub struct ModerationEngine<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ModerationEngine<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Approve or reject a document.
    ///
    /// Any state may move to either target; re-applying the current state
    /// refreshes approver and timestamp.
    pub async fn moderate(
        &self,
        scope: &Scope,
        document_id: Uuid,
        approve: bool,
    ) -> Result<document::Model, AppError> {
        let university_id = scope.director_university()?;
        let repo = DocumentRepository::new(self.conn);

        let doc = repo
            .find(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
        if doc.university_id != university_id {
            return Err(AppError::ScopeMismatch);
        }

        let target = ApprovalState::from_decision(approve);
        let updated = repo
            .set_state(
                document_id,
                university_id,
                target,
                scope.principal_id,
                Utc::now(),
            )
            .await?;

        if !updated {
            // Deleted between the read and the write.
            return Err(AppError::NotFound("Document not found".into()));
        }

        info!(
            document_id = %document_id,
            director_id = %scope.principal_id,
            from = %doc.approval_state,
            to = %target,
            "Document moderated"
        );

        repo.find(document_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))
    }

    /// Every document of the director's university, optionally in one state.
    pub async fn university_documents(
        &self,
        scope: &Scope,
        state: Option<ApprovalState>,
    ) -> Result<Vec<document::Model>, AppError> {
        let university_id = scope.director_university()?;
        Ok(DocumentRepository::new(self.conn)
            .by_university(university_id, state)
            .await?)
    }

    /// Professors of the director's university, by name.
    pub async fn university_professors(
        &self,
        scope: &Scope,
    ) -> Result<Vec<profile::Model>, AppError> {
        let university_id = scope.director_university()?;
        Ok(profile::Entity::find()
            .filter(profile::Column::UniversityId.eq(university_id))
            .filter(profile::Column::Role.eq(Role::Professor))
            .order_by_asc(profile::Column::FullName)
            .all(self.conn)
            .await?)
    }
}
