//! Logical to physical field names, per record type.
//!
//! Filters address fields by their logical (API) names. The registry keeps, for
//! each table, the mapping to physical column names and the join keys of every
//! named relation. Entries are built on first use and never change afterwards.
//!
//! The registry is an explicit object shared through an `Arc`; concurrent first
//! use of the same type builds the entry more than once at worst, and every
//! caller ends up holding the same stored value.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use sea_orm::{
    EntityName, IdenStatic, Identity, RelationDef, RelationType,
    sea_query::{Iden, TableRef},
};

use crate::{errors::FilterError, traits::Record};

/// Join keys of a single-column relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLink {
    pub from_col: String,
    pub to_table: String,
    pub to_col: String,
    /// `has_many`: joining it yields one row per related record
    pub to_many: bool,
}

impl RelationLink {
    /// # Errors
    ///
    /// Returns `FilterError::UnsupportedRelationKey` for composite keys or
    /// targets that are not plain tables.
    pub fn from_def(name: &str, def: &RelationDef) -> Result<Self, FilterError> {
        let unsupported = || FilterError::UnsupportedRelationKey {
            relation: name.to_string(),
        };
        let (Identity::Unary(from_col), Identity::Unary(to_col)) = (&def.from_col, &def.to_col) else {
            return Err(unsupported());
        };
        let to_table = match &def.to_tbl {
            TableRef::Table(table) | TableRef::SchemaTable(_, table) => Iden::to_string(&**table),
            _ => return Err(unsupported()),
        };
        Ok(Self {
            from_col: Iden::to_string(&**from_col),
            to_table,
            to_col: Iden::to_string(&**to_col),
            to_many: def.rel_type == RelationType::HasMany,
        })
    }
}

/// Field names of one table.
#[derive(Debug, Clone, Default)]
pub struct FieldNames {
    table: String,
    columns: Vec<(String, String)>,
    to_physical: HashMap<String, String>,
    to_logical: HashMap<String, String>,
    relations: HashMap<String, RelationLink>,
    identity: bool,
}

impl FieldNames {
    /// Build the names of `R` from its declared fields and relations.
    ///
    /// Relations with composite keys are skipped with a warning; filtering on
    /// them reports `UnknownRelation`.
    #[must_use]
    pub fn for_record<R: Record>() -> Self {
        let table = R::EntityType::default().table_name().to_string();
        let columns: Vec<(String, String)> = R::field_names()
            .into_iter()
            .map(|(logical, column)| (logical, column.as_str().to_string()))
            .collect();

        let mut relations = HashMap::new();
        for (name, def) in R::relations() {
            match RelationLink::from_def(name, &def) {
                Ok(link) => {
                    relations.insert(name.to_string(), link);
                }
                Err(err) => tracing::warn!(table = %table, error = %err, "Skipping relation"),
            }
        }

        Self::new(table, columns, relations)
    }

    #[must_use]
    pub fn new(
        table: impl Into<String>,
        columns: Vec<(String, String)>,
        relations: HashMap<String, RelationLink>,
    ) -> Self {
        let to_physical = columns.iter().cloned().collect();
        let to_logical = columns.iter().map(|(l, p)| (p.clone(), l.clone())).collect();
        Self {
            table: table.into(),
            columns,
            to_physical,
            to_logical,
            relations,
            identity: false,
        }
    }

    /// Names for a table nobody registered: every name maps to itself and no
    /// relations are known.
    #[must_use]
    pub fn identity(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            identity: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// `(logical, physical)` pairs in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    /// # Errors
    ///
    /// Returns `FilterError::UnknownField` when `logical` is not a field of a
    /// registered table.
    pub fn physical<'a>(&'a self, logical: &'a str) -> Result<&'a str, FilterError> {
        if self.identity {
            return Ok(logical);
        }
        self.to_physical
            .get(logical)
            .map(String::as_str)
            .ok_or_else(|| FilterError::unknown_field(logical, &self.table))
    }

    #[must_use]
    pub fn logical<'a>(&'a self, physical: &'a str) -> Option<&'a str> {
        if self.identity {
            return Some(physical);
        }
        self.to_logical.get(physical).map(String::as_str)
    }

    /// # Errors
    ///
    /// Returns `FilterError::UnknownRelation` when no relation of that name is
    /// declared.
    pub fn relation(&self, name: &str) -> Result<&RelationLink, FilterError> {
        self.relations
            .get(name)
            .ok_or_else(|| FilterError::unknown_relation(name, &self.table))
    }
}

#[derive(Debug, Default)]
pub struct FieldNameRegistry {
    tables: RwLock<HashMap<String, Arc<FieldNames>>>,
}

impl FieldNameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names for `R`, built on first use.
    pub fn resolve<R: Record>(&self) -> Arc<FieldNames> {
        let table = R::EntityType::default().table_name().to_string();
        if let Some(names) = self.read().get(&table) {
            return Arc::clone(names);
        }

        let built = Arc::new(FieldNames::for_record::<R>());
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let stored = tables.entry(table).or_insert_with(|| {
            tracing::debug!(table = %built.table(), columns = built.columns().len(), "Registered field names");
            Arc::clone(&built)
        });
        Arc::clone(stored)
    }

    /// Build the names of `R` eagerly, so relation paths can reach it by table.
    pub fn register<R: Record>(&self) -> Arc<FieldNames> {
        self.resolve::<R>()
    }

    /// Names for a table reached through a relation. Unregistered tables get
    /// identity names.
    #[must_use]
    pub fn by_table(&self, table: &str) -> Arc<FieldNames> {
        self.read()
            .get(table)
            .map_or_else(|| Arc::new(FieldNames::identity(table)), Arc::clone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<FieldNames>>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }
}
