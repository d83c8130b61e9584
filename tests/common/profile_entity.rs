use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crudquery::{AuditColumns, MergeIntoActiveModel, Record};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_entity::Entity",
        from = "Column::UserId",
        to = "super::user_entity::Column::Id"
    )]
    User,
}

impl Related<super::user_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub struct ProfileCreate {
    pub user_id: Uuid,
    pub bio: String,
    pub city: String,
}

impl From<ProfileCreate> for ActiveModel {
    fn from(create: ProfileCreate) -> Self {
        Self {
            id: ActiveValue::NotSet,
            user_id: ActiveValue::Set(create.user_id),
            bio: ActiveValue::Set(create.bio),
            city: ActiveValue::Set(create.city),
            created_at: ActiveValue::NotSet,
            updated_at: ActiveValue::NotSet,
            created_by: ActiveValue::NotSet,
            updated_by: ActiveValue::NotSet,
        }
    }
}

pub struct ProfileUpdate {
    pub city: Option<String>,
}

impl MergeIntoActiveModel<ActiveModel> for ProfileUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, DbErr> {
        if let Some(city) = self.city {
            existing.city = ActiveValue::Set(city);
        }
        Ok(existing)
    }
}

// Profiles are maintained by the platform, not by the users they belong to.
#[async_trait]
impl Record for Model {
    type EntityType = Entity;
    type ColumnType = Column;
    type Model = Model;
    type ActiveModelType = ActiveModel;
    type CreateModel = ProfileCreate;
    type UpdateModel = ProfileUpdate;

    const RESOURCE_NAME_SINGULAR: &str = "profile";
    const RESOURCE_NAME_PLURAL: &str = "profiles";
    const SYSTEM_OWNED: bool = true;

    fn audit_columns() -> AuditColumns<Column> {
        AuditColumns {
            id: Column::Id,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
            created_by: Column::CreatedBy,
            updated_by: Column::UpdatedBy,
            log: None,
        }
    }

    fn relations() -> Vec<(&'static str, RelationDef)> {
        vec![("user", Relation::User.def())]
    }
}
