use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reference data, administered outside the core.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "university")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,
    /// Short code shown on leaderboards (e.g. "UL").
    pub code: String,

    #[sea_orm(has_many)]
    pub courses: HasMany<super::course::Entity>,

    #[sea_orm(has_many)]
    pub profiles: HasMany<super::profile::Entity>,

    #[sea_orm(has_many)]
    pub documents: HasMany<super::document::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
