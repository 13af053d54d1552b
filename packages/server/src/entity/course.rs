use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub code: String,

    pub university_id: i32,
    #[sea_orm(belongs_to, from = "university_id", to = "id")]
    pub university: HasOne<super::university::Entity>,

    #[sea_orm(has_many)]
    pub subjects: HasMany<super::subject::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
