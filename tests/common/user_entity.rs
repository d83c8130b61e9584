use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crudquery::{AuditColumns, MergeIntoActiveModel, Record};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::profile_entity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: i32,
    #[sea_orm(column_type = "Json", nullable)]
    pub meta: Option<JsonValue>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub log_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::profile_entity::Entity")]
    Profile,
}

impl Related<profile_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// API shape of a user, with its profile loaded on request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub age: i32,
    pub meta: Option<JsonValue>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub log_id: Option<Uuid>,
    pub profile: Option<profile_entity::Model>,
}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            age: model.age,
            meta: model.meta,
            deleted_at: model.deleted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
            created_by: model.created_by,
            updated_by: model.updated_by,
            log_id: model.log_id,
            profile: None,
        }
    }
}

pub struct UserCreate {
    pub email: String,
    pub name: String,
    pub age: i32,
    pub meta: Option<JsonValue>,
}

impl UserCreate {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            age,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: JsonValue) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl From<UserCreate> for ActiveModel {
    fn from(create: UserCreate) -> Self {
        Self {
            id: ActiveValue::NotSet,
            email: ActiveValue::Set(create.email),
            name: ActiveValue::Set(create.name),
            age: ActiveValue::Set(create.age),
            meta: ActiveValue::Set(create.meta),
            deleted_at: ActiveValue::Set(None),
            created_at: ActiveValue::NotSet,
            updated_at: ActiveValue::NotSet,
            created_by: ActiveValue::NotSet,
            updated_by: ActiveValue::NotSet,
            log_id: ActiveValue::NotSet,
        }
    }
}

#[derive(Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl MergeIntoActiveModel<ActiveModel> for UserUpdate {
    fn merge_into_activemodel(self, mut existing: ActiveModel) -> Result<ActiveModel, DbErr> {
        if let Some(name) = self.name {
            existing.name = ActiveValue::Set(name);
        }
        if let Some(age) = self.age {
            existing.age = ActiveValue::Set(age);
        }
        if let Some(deleted_at) = self.deleted_at {
            existing.deleted_at = ActiveValue::Set(deleted_at);
        }
        Ok(existing)
    }
}

#[async_trait]
impl Record for User {
    type EntityType = Entity;
    type ColumnType = Column;
    type Model = Model;
    type ActiveModelType = ActiveModel;
    type CreateModel = UserCreate;
    type UpdateModel = UserUpdate;

    const RESOURCE_NAME_SINGULAR: &str = "user";
    const RESOURCE_NAME_PLURAL: &str = "users";
    const DELETION_MARKER: Option<&'static str> = Some("deleted_at");

    fn audit_columns() -> AuditColumns<Column> {
        AuditColumns {
            id: Column::Id,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
            created_by: Column::CreatedBy,
            updated_by: Column::UpdatedBy,
            log: Some(Column::LogId),
        }
    }

    fn relations() -> Vec<(&'static str, RelationDef)> {
        vec![("profile", Relation::Profile.def())]
    }

    async fn load_relations(
        db: &DatabaseConnection,
        records: &mut [Self],
        relations: &[String],
    ) -> Result<(), DbErr> {
        if !relations.iter().any(|r| r == "profile") {
            return Ok(());
        }
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let profiles = profile_entity::Entity::find()
            .filter(profile_entity::Column::UserId.is_in(ids))
            .all(db)
            .await?;
        for record in records.iter_mut() {
            record.profile = profiles.iter().find(|p| p.user_id == record.id).cloned();
        }
        Ok(())
    }
}
