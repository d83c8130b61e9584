use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, IdenStatic, IntoActiveModel, Iterable, ModelTrait, QueryFilter, RelationDef,
};
use uuid::Uuid;

use crate::audit::{AuditColumns, AuditContext, AuditStamper};

pub trait MergeIntoActiveModel<ActiveModelType> {
    fn merge_into_activemodel(self, existing: ActiveModelType) -> Result<ActiveModelType, DbErr>;
}

/// A persisted entity the engine can filter, page and stamp.
///
/// Implement it on the API-facing type (or on the `Model` itself). Everything
/// except the associated types, names and [`Record::audit_columns`] has a
/// default.
#[async_trait]
pub trait Record: Sized + Send + Sync {
    type EntityType: EntityTrait<Model = Self::Model, Column = Self::ColumnType> + Sync;
    type ColumnType: ColumnTrait;
    type Model: ModelTrait<Entity = Self::EntityType>
        + FromQueryResult
        + IntoActiveModel<Self::ActiveModelType>
        + Into<Self>
        + Send
        + Sync;
    type ActiveModelType: ActiveModelTrait<Entity = Self::EntityType>
        + ActiveModelBehavior
        + From<Self::Model>
        + Send
        + Sync;
    type CreateModel: Into<Self::ActiveModelType> + Send;
    type UpdateModel: Send + Sync + MergeIntoActiveModel<Self::ActiveModelType>;

    const RESOURCE_NAME_SINGULAR: &str;
    const RESOURCE_NAME_PLURAL: &str;
    /// Records written by the platform itself; audited as the system actor
    /// when no user is in context.
    const SYSTEM_OWNED: bool = false;
    /// Soft-delete column. Rows with it set are hidden from paging unless the
    /// filter mentions the column.
    const DELETION_MARKER: Option<&'static str> = None;

    fn audit_columns() -> AuditColumns<Self::ColumnType>;

    /// Logical field names and the columns they map to.
    #[must_use]
    fn field_names() -> Vec<(String, Self::ColumnType)> {
        Self::ColumnType::iter()
            .map(|c| (c.as_str().to_string(), c))
            .collect()
    }

    /// Named relations usable in dot paths, sorting and joins.
    #[must_use]
    fn relations() -> Vec<(&'static str, RelationDef)> {
        Vec::new()
    }

    /// Eager-load `relations` onto freshly fetched records.
    async fn load_relations(
        _db: &DatabaseConnection,
        _records: &mut [Self],
        _relations: &[String],
    ) -> Result<(), DbErr> {
        Ok(())
    }

    async fn get_one(db: &DatabaseConnection, id: Uuid) -> Result<Self, DbErr> {
        let id_column = Self::audit_columns().id;
        let model = Self::EntityType::find()
            .filter(id_column.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(format!(
                "{} not found",
                Self::RESOURCE_NAME_SINGULAR
            )))?;
        Ok(model.into())
    }

    async fn create(
        db: &DatabaseConnection,
        stamper: &AuditStamper,
        create_model: Self::CreateModel,
    ) -> Result<Self, DbErr> {
        let mut active_model: Self::ActiveModelType = create_model.into();
        stamper.stamp_create(
            &mut active_model,
            &Self::audit_columns(),
            &AuditContext::current(),
            Self::SYSTEM_OWNED,
        );
        let model = active_model.insert(db).await?;
        Ok(model.into())
    }

    async fn update(
        db: &DatabaseConnection,
        stamper: &AuditStamper,
        id: Uuid,
        update_model: Self::UpdateModel,
    ) -> Result<Self, DbErr> {
        let id_column = Self::audit_columns().id;
        let model = Self::EntityType::find()
            .filter(id_column.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(format!(
                "{} not found",
                Self::RESOURCE_NAME_SINGULAR
            )))?;
        let existing: Self::ActiveModelType = model.into_active_model();
        let mut updated_model = update_model.merge_into_activemodel(existing)?;
        stamper.stamp_update(
            &mut updated_model,
            &Self::audit_columns(),
            &AuditContext::current(),
            Self::SYSTEM_OWNED,
        );
        let updated = updated_model.update(db).await?;
        Ok(updated.into())
    }

    async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<Uuid, DbErr> {
        let id_column = Self::audit_columns().id;
        let res = Self::EntityType::delete_many()
            .filter(id_column.eq(id))
            .exec(db)
            .await?;
        match res.rows_affected {
            0 => Err(DbErr::RecordNotFound(format!(
                "{} not found",
                Self::RESOURCE_NAME_SINGULAR
            ))),
            _ => Ok(id),
        }
    }

    async fn delete_many(db: &DatabaseConnection, ids: Vec<Uuid>) -> Result<Vec<Uuid>, DbErr> {
        let id_column = Self::audit_columns().id;
        Self::EntityType::delete_many()
            .filter(id_column.is_in(ids.clone()))
            .exec(db)
            .await?;
        Ok(ids)
    }
}
