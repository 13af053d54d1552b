use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A compensating action that failed and awaits offline reconciliation.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compensation_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// What has to be undone, e.g. `remove_object`.
    #[sea_orm(indexed)]
    pub action: String,

    pub object_key: String,

    /// Document the action belonged to, if a row was ever written.
    pub document_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub error: String,

    pub attempts: i32,

    pub created_at: DateTimeUtc,
    pub last_attempt_at: DateTimeUtc,

    #[sea_orm(default_value = false, indexed)]
    pub resolved: bool,

    pub resolved_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
