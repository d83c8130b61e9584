//! Counts and aggregates built on the condition compiler.

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect,
    sea_query::{Alias, Func, SimpleExpr},
};
use serde_json::Value as JsonValue;

use crate::{
    engine::QueryEngine,
    errors::ApiError,
    filtering::{Condition, FieldPath, Filter, Operator, field_expr, lowering::float_type},
    traits::Record,
};

/// Narrowing applied by [`QueryEngine::count_distinct_on_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMatch {
    IsNull,
    IsNotNull,
    Equals(JsonValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    /// `CAST(<fn>(expr) AS <float>)`, so integer columns average and sum as floats.
    fn apply(self, expr: SimpleExpr, backend: DbBackend) -> SimpleExpr {
        let call = match self {
            Self::Sum => Func::sum(expr),
            Self::Avg => Func::avg(expr),
            Self::Min => Func::min(expr),
            Self::Max => Func::max(expr),
        };
        Func::cast_as(call, Alias::new(float_type(backend))).into()
    }
}

impl QueryEngine {
    /// Number of `R` matching `filter`. Paging fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for an invalid filter and
    /// `ApiError::Database` when the store fails.
    pub async fn count<R: Record>(
        &self,
        db: &DatabaseConnection,
        filter: &Filter,
    ) -> Result<u64, ApiError> {
        let condition = self.read_condition::<R>(db.get_database_backend(), filter)?;
        Ok(R::EntityType::find().filter(condition).count(db).await?)
    }

    /// With a matcher, the number of `R` whose `field` matches it. Without one,
    /// the number of distinct non-null values of `field`.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::count`].
    pub async fn count_distinct_on_field<R: Record>(
        &self,
        db: &DatabaseConnection,
        field: &str,
        matcher: Option<FieldMatch>,
    ) -> Result<u64, ApiError> {
        let Some(matcher) = matcher else {
            let distinct = |expr: SimpleExpr| SimpleExpr::from(Func::count_distinct(expr));
            let count = self
                .scalar::<R, i64>(db, &Filter::default(), field, distinct)
                .await?;
            return Ok(count.map_or(0, |n| u64::try_from(n).unwrap_or(0)));
        };

        let (operator, value) = match matcher {
            FieldMatch::IsNull => (Operator::IsNull, JsonValue::Null),
            FieldMatch::IsNotNull => (Operator::IsNotNull, JsonValue::Null),
            FieldMatch::Equals(value) => (Operator::Eq, value),
        };
        let filter = Filter::new().condition(Condition::new(field, operator, value)?);
        self.count::<R>(db, &filter).await
    }

    /// SUM/AVG/MIN/MAX of `field` over `R` matching `filter`, as a float.
    /// `None` when no row has a value.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::count`].
    pub async fn aggregate<R: Record>(
        &self,
        db: &DatabaseConnection,
        filter: &Filter,
        aggregate: Aggregate,
        field: &str,
    ) -> Result<Option<f64>, ApiError> {
        let backend = db.get_database_backend();
        let aggregated = |expr: SimpleExpr| aggregate.apply(expr, backend);
        self.scalar::<R, f64>(db, filter, field, aggregated).await
    }

    /// Run `SELECT wrap(field) FROM R WHERE filter` and read the single value.
    async fn scalar<R, T>(
        &self,
        db: &DatabaseConnection,
        filter: &Filter,
        field: &str,
        wrap: impl Fn(SimpleExpr) -> SimpleExpr,
    ) -> Result<Option<T>, ApiError>
    where
        R: Record,
        T: sea_orm::TryGetable + Send + Sync,
    {
        let backend = db.get_database_backend();
        let path = FieldPath::parse(field)?;
        let names = self.registry().resolve::<R>();
        let (expr, join) = field_expr(&path, &names, self.registry(), backend)?;
        if join.is_some() {
            return Err(ApiError::bad_request(format!(
                "Statistics are only available on fields of {}",
                R::RESOURCE_NAME_PLURAL
            )));
        }

        let condition = self.read_condition::<R>(backend, filter)?;
        let value: Option<Option<T>> = R::EntityType::find()
            .select_only()
            .column_as(wrap(expr), "value")
            .filter(condition)
            .into_tuple()
            .one(db)
            .await?;
        Ok(value.flatten())
    }
}
