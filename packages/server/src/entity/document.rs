use common::ApprovalState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub file_type: String,
    /// Subject name the document is filed under.
    #[sea_orm(indexed)]
    pub category: String,
    /// JSON array of distinct tag strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    /// Original upload filename.
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    /// Object store key of the uploaded file.
    #[sea_orm(unique)]
    pub storage_key: String,
    pub public_url: String,

    pub university_id: i32,
    #[sea_orm(belongs_to, from = "university_id", to = "id")]
    pub university: HasOne<super::university::Entity>,
    pub course_id: Option<i32>,
    pub subject_id: Option<i32>,

    pub author_id: Uuid,
    #[sea_orm(belongs_to, from = "author_id", to = "id")]
    pub author: HasOne<super::profile::Entity>,

    #[sea_orm(indexed)]
    pub approval_state: ApprovalState,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeUtc>,

    /// Only ever changed by `SET downloads = downloads + 1`.
    #[sea_orm(default_value = 0)]
    pub downloads: i64,
    /// Only ever changed by `SET views = views + 1`.
    #[sea_orm(default_value = 0)]
    pub views: i64,

    pub publication_year: i32,

    #[sea_orm(has_many)]
    pub ratings: HasMany<super::rating::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
