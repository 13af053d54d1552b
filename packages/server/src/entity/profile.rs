use common::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Platform profile of a principal. The primary key is the identity
/// provider's subject id.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub email: String,
    pub full_name: String,

    #[sea_orm(indexed)]
    pub role: Role,

    /// NULL for generic accounts.
    #[sea_orm(indexed)]
    pub university_id: Option<i32>,
    #[sea_orm(belongs_to, from = "university_id", to = "id")]
    pub university: HasOne<super::university::Entity>,

    pub course_id: Option<i32>,

    pub points: i32,
    pub level: i32,

    #[sea_orm(default_value = true)]
    pub active: bool,

    #[sea_orm(has_many)]
    pub documents: HasMany<super::document::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
