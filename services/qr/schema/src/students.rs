use sea_orm::entity::prelude::*;

/// Student photographed at an event. `metadata` mirrors the current QR state
/// (`qr_token`, `qr_code_value`, `qr_type`) for readers that predate `codes`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub event_id: Uuid,
    pub course_id: Option<Uuid>,
    pub metadata: Json,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::access_tokens::Entity")]
    AccessTokens,
    #[sea_orm(has_many = "super::codes::Entity")]
    Codes,
}

impl Related<super::access_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessTokens.def()
    }
}

impl Related<super::codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Codes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
