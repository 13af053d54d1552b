//! Access scope resolution: who a principal is on the platform and which
//! university they may act on.

use chrono::Utc;
use common::Role;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Set};
use tracing::info;
use uuid::Uuid;

use crate::config::ProfileDefaults;
use crate::entity::profile;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;

/// Role and university/course scope of a principal, read once per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub principal_id: Uuid,
    pub role: Role,
    pub university_id: Option<i32>,
    pub course_id: Option<i32>,
}

impl Scope {
    /// Scope of a principal without a profile yet.
    pub fn unprovisioned(principal_id: Uuid) -> Self {
        Self {
            principal_id,
            role: Role::Generic,
            university_id: None,
            course_id: None,
        }
    }

    pub fn is_director(&self) -> bool {
        self.role == Role::Director
    }

    /// The university a director moderates.
    pub fn director_university(&self) -> Result<i32, AppError> {
        if !self.is_director() {
            return Err(AppError::NotAuthorized(
                "Only directors can perform this action".into(),
            ));
        }
        self.university_id.ok_or_else(|| {
            AppError::ProfileIncomplete("Director has no associated university".into())
        })
    }

    /// Director check plus the object-level university match.
    pub fn require_director_of(&self, university_id: i32) -> Result<(), AppError> {
        if self.director_university()? != university_id {
            return Err(AppError::ScopeMismatch);
        }
        Ok(())
    }

    /// Whether this principal directs `university_id`, without erroring.
    pub fn directs(&self, university_id: i32) -> bool {
        self.is_director() && self.university_id == Some(university_id)
    }
}

impl TryFrom<&profile::Model> for Scope {
    type Error = AppError;

    fn try_from(profile: &profile::Model) -> Result<Self, Self::Error> {
        if !profile.active {
            return Err(AppError::NotAuthorized("Account is deactivated".into()));
        }
        if profile.role == Role::Director && profile.university_id.is_none() {
            return Err(AppError::ProfileIncomplete(
                "Director has no associated university".into(),
            ));
        }
        Ok(Self {
            principal_id: profile.id,
            role: profile.role,
            university_id: profile.university_id,
            course_id: profile.course_id,
        })
    }
}

/// Resolve the scope of `principal_id` from their profile.
///
/// A principal without a profile gets the unprovisioned generic scope; no
/// row is written.
pub async fn resolve_scope<C: ConnectionTrait>(
    db: &C,
    principal_id: Uuid,
) -> Result<Scope, AppError> {
    match profile::Entity::find_by_id(principal_id).one(db).await? {
        Some(profile) => Scope::try_from(&profile),
        None => Ok(Scope::unprovisioned(principal_id)),
    }
}

/// Make sure the principal has a profile, creating one from `defaults`.
///
/// Idempotent: concurrent first calls race on the primary key and the loser
/// reads the winner's row.
pub async fn ensure_profile<C: ConnectionTrait>(
    db: &C,
    principal: &AuthUser,
    defaults: &ProfileDefaults,
) -> Result<profile::Model, AppError> {
    if let Some(existing) = profile::Entity::find_by_id(principal.principal_id)
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let model = profile::ActiveModel {
        id: Set(principal.principal_id),
        email: Set(principal.email.clone()),
        full_name: Set(display_name(&principal.email)),
        role: Set(defaults.role),
        university_id: Set(None),
        course_id: Set(None),
        points: Set(defaults.points),
        level: Set(defaults.level),
        active: Set(true),
        created_at: Set(Utc::now()),
    };

    let result = profile::Entity::insert(model)
        .on_conflict(
            OnConflict::column(profile::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(_) => info!(principal_id = %principal.principal_id, "Provisioned profile"),
        Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e.into()),
    }

    profile::Entity::find_by_id(principal.principal_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("profile missing after provisioning".into()))
}

/// Name shown for freshly provisioned profiles: the email's local part.
fn display_name(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.trim().is_empty() => local.trim().to_string(),
        _ => "User".to_string(),
    }
}
