use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One star rating per (document, rater); the composite key makes a second
/// rating by the same rater an update.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rating")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub document_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub rater_id: Uuid,

    #[sea_orm(belongs_to, from = "document_id", to = "id")]
    pub document: HasOne<super::document::Entity>,

    /// 1 to 5.
    pub stars: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
