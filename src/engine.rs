//! The query engine: compiles filters and runs them for a [`Record`] type.

use std::sync::Arc;

use sea_orm::{
    Condition as SqlCondition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect,
    sea_query::Expr,
};
use serde_json::Value as JsonValue;

use crate::{
    audit::AuditStamper,
    config::EngineConfig,
    errors::ApiError,
    filtering::{
        CompiledWhere, Condition, Filter, FilterError, Pagination, apply_orders,
        compile_permission_where, compile_where, lower, lowering::column_expr, resolve_orders,
    },
    models::PageResult,
    query_builder::build_search,
    resolver::FieldNameRegistry,
    traits::Record,
};

/// Stateless apart from the shared [`FieldNameRegistry`]; clone it freely.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    registry: Arc<FieldNameRegistry>,
    config: EngineConfig,
    stamper: AuditStamper,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl QueryEngine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(Arc::new(FieldNameRegistry::new()), config)
    }

    #[must_use]
    pub fn with_registry(registry: Arc<FieldNameRegistry>, config: EngineConfig) -> Self {
        let stamper = AuditStamper::new(config.system_actor_id);
        Self {
            registry,
            config,
            stamper,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FieldNameRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stamper configured with this engine's system actor.
    #[must_use]
    pub fn stamper(&self) -> &AuditStamper {
        &self.stamper
    }

    /// Compile `conditions` into a native condition on `R`'s table.
    ///
    /// An empty list matches everything.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] when a condition names an unknown field or
    /// relation.
    pub fn compile<R: Record>(
        &self,
        backend: DbBackend,
        conditions: &[Condition],
    ) -> Result<SqlCondition, FilterError> {
        self.lower_for::<R>(&compile_where(conditions), backend)
    }

    /// Like [`QueryEngine::compile`], with the flat alternative strategy and
    /// `jsonContains` support used by permission checks.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::compile`].
    pub fn compile_permission<R: Record>(
        &self,
        backend: DbBackend,
        conditions: &[Condition],
    ) -> Result<SqlCondition, FilterError> {
        self.lower_for::<R>(&compile_permission_where(conditions), backend)
    }

    fn lower_for<R: Record>(
        &self,
        compiled: &CompiledWhere,
        backend: DbBackend,
    ) -> Result<SqlCondition, FilterError> {
        tracing::debug!(
            resource = R::RESOURCE_NAME_PLURAL,
            groups = compiled.len(),
            "Compiled filter"
        );
        if compiled.len() > self.config.or_group_warn_threshold {
            tracing::warn!(
                resource = R::RESOURCE_NAME_PLURAL,
                groups = compiled.len(),
                threshold = self.config.or_group_warn_threshold,
                "Filter expands to many alternative groups"
            );
        }
        lower(compiled, &self.registry.resolve::<R>(), &self.registry, backend)
    }

    /// The condition every read of `filter` uses: the compiled `where`, plus
    /// the soft-delete rule when `R` has a deletion marker the filter does not
    /// mention.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::compile`].
    pub fn read_condition<R: Record>(
        &self,
        backend: DbBackend,
        filter: &Filter,
    ) -> Result<SqlCondition, FilterError> {
        let mut condition = SqlCondition::all().add(self.compile::<R>(backend, &filter.conditions)?);
        if let Some(marker) = R::DELETION_MARKER {
            if !filter.mentions_field(marker) {
                let names = self.registry.resolve::<R>();
                let column = column_expr(names.table(), names.physical(marker)?);
                condition = condition.add(Expr::expr(column).is_null());
            }
        }
        Ok(condition)
    }

    /// One page of `R` matching `filter`.
    ///
    /// Runs the fetch and, unless `ignorePaginationCount` is set, a count of all
    /// matches. With `count` set only the count runs and `data` is empty.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for an invalid filter and
    /// `ApiError::Database` when the store fails.
    pub async fn page<R: Record>(
        &self,
        db: &DatabaseConnection,
        filter: &Filter,
    ) -> Result<PageResult<R>, ApiError> {
        let backend = db.get_database_backend();
        let condition = self.read_condition::<R>(backend, filter)?;

        if filter.count {
            let count = R::EntityType::find().filter(condition).count(db).await?;
            return Ok(PageResult::new(Vec::new(), count));
        }

        let names = self.registry.resolve::<R>();
        let orders = resolve_orders(&filter.order_by, &names, &self.registry, backend)?;
        let pagination = Pagination::from_filter(filter, &self.config);
        tracing::debug!(
            resource = R::RESOURCE_NAME_PLURAL,
            skip = pagination.skip,
            take = pagination.take,
            "Fetching page"
        );

        let select = apply_orders(
            R::EntityType::find().filter(condition.clone()),
            orders,
            names.table(),
        );
        let models = select
            .offset(pagination.skip)
            .limit(pagination.take)
            .all(db)
            .await?;
        let mut data: Vec<R> = models.into_iter().map(Into::into).collect();

        if !filter.relations.is_empty() {
            R::load_relations(db, &mut data, &filter.relations).await?;
        }

        let count = if filter.ignore_pagination_count {
            0
        } else {
            R::EntityType::find().filter(condition).count(db).await?
        };

        Ok(PageResult::new(data, count))
    }

    /// Flat rows for `filter`, with relations joined instead of eager-loaded.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::page`].
    pub async fn search<R: Record>(
        &self,
        db: &DatabaseConnection,
        filter: &Filter,
    ) -> Result<Vec<JsonValue>, ApiError> {
        let backend = db.get_database_backend();
        let condition = self.read_condition::<R>(backend, filter)?;
        let select = build_search::<R>(&self.registry, backend, filter, condition, &self.config)?;
        Ok(select.into_json().all(db).await?)
    }

    /// The first `R` matching every condition in `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` when `criteria` is empty, since an empty
    /// condition list would match any record.
    pub async fn find_one_by<R: Record>(
        &self,
        db: &DatabaseConnection,
        criteria: Vec<Condition>,
    ) -> Result<Option<R>, ApiError> {
        if criteria.is_empty() {
            return Err(ApiError::bad_request(format!(
                "Criteria required to look up a {}",
                R::RESOURCE_NAME_SINGULAR
            )));
        }

        let filter = Filter {
            conditions: criteria,
            ..Filter::default()
        };
        let condition = self.read_condition::<R>(db.get_database_backend(), &filter)?;
        let model = R::EntityType::find().filter(condition).one(db).await?;
        Ok(model.map(Into::into))
    }
}
