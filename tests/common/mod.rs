#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
};
use crudquery::{ApiError, AuditContext, FilterQuery, PageResult, QueryEngine, Record};
use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;
use serde_json::json;
use uuid::Uuid;

pub mod profile_entity;
pub mod user_entity;

use profile_entity::ProfileCreate;
use user_entity::{User, UserCreate};

/// Route the engine's `tracing` events to the test output. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_test_logging();
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub engine: QueryEngine,
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<PageResult<User>>, ApiError> {
    let filter = query.decode()?;
    let page = state.engine.page::<User>(&state.db, &filter).await?;
    Ok(Json(page))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(User::get_one(&state.db, id).await?))
}

pub fn setup_test_app(db: DatabaseConnection, engine: QueryEngine) -> Router {
    let api = Router::new()
        .route("/users", axum::routing::get(list_users))
        .route("/users/{id}", axum::routing::get(get_user))
        .with_state(AppState { db, engine });

    Router::new().nest("/api/v1", api)
}

/// Five users (two with profiles, one soft-deleted), created as `actor`.
///
/// | name  | age | meta.plan.tier | profile.city |
/// |-------|-----|----------------|--------------|
/// | Alice | 31  | gold           | Oslo         |
/// | Bob   | 25  | silver         | Bergen       |
/// | Carol | 42  | gold           |              |
/// | Dave  | 19  |                |              |
/// | Erin  | 55  | (deleted)      |              |
pub async fn seed_users(
    db: &DatabaseConnection,
    engine: &QueryEngine,
    actor: Uuid,
) -> Result<Vec<User>, DbErr> {
    AuditContext::new(Some(actor))
        .scope(async {
            let stamper = engine.stamper();
            let tier = |t: &str| json!({ "plan": { "tier": t } });

            let alice = User::create(db, stamper, UserCreate::new("Alice", 31).with_meta(tier("gold"))).await?;
            let bob = User::create(db, stamper, UserCreate::new("Bob", 25).with_meta(tier("silver"))).await?;
            let carol = User::create(db, stamper, UserCreate::new("Carol", 42).with_meta(tier("gold"))).await?;
            let dave = User::create(db, stamper, UserCreate::new("Dave", 19)).await?;
            let erin = User::create(db, stamper, UserCreate::new("Erin", 55)).await?;
            let erin = User::update(
                db,
                stamper,
                erin.id,
                user_entity::UserUpdate {
                    deleted_at: Some(Some(chrono::Utc::now())),
                    ..Default::default()
                },
            )
            .await?;

            for (user, city) in [(&alice, "Oslo"), (&bob, "Bergen")] {
                profile_entity::Model::create(
                    db,
                    stamper,
                    ProfileCreate {
                        user_id: user.id,
                        bio: format!("{} writes Rust", user.name),
                        city: city.to_string(),
                    },
                )
                .await?;
            }

            Ok::<_, DbErr>(vec![alice, bob, carol, dave, erin])
        })
        .await
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateUserTable), Box::new(CreateProfileTable)]
    }
}

pub struct CreateUserTable;

#[async_trait::async_trait]
impl MigrationName for CreateUserTable {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_user_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateUserTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(UserEntity)
            .if_not_exists()
            .col(ColumnDef::new(UserColumn::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(UserColumn::Email).string().not_null())
            .col(ColumnDef::new(UserColumn::Name).string().not_null())
            .col(ColumnDef::new(UserColumn::Age).integer().not_null())
            .col(ColumnDef::new(UserColumn::Meta).json().null())
            .col(ColumnDef::new(UserColumn::DeletedAt).timestamp_with_time_zone().null())
            .col(ColumnDef::new(UserColumn::CreatedAt).timestamp_with_time_zone().not_null())
            .col(ColumnDef::new(UserColumn::UpdatedAt).timestamp_with_time_zone().not_null())
            .col(ColumnDef::new(UserColumn::CreatedBy).uuid().null())
            .col(ColumnDef::new(UserColumn::UpdatedBy).uuid().null())
            .col(ColumnDef::new(UserColumn::LogId).uuid().null())
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserEntity).to_owned())
            .await
    }
}

pub struct CreateProfileTable;

#[async_trait::async_trait]
impl MigrationName for CreateProfileTable {
    fn name(&self) -> &'static str {
        "m20240101_000002_create_profile_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateProfileTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(ProfileEntity)
            .if_not_exists()
            .col(ColumnDef::new(ProfileColumn::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(ProfileColumn::UserId).uuid().not_null())
            .col(ColumnDef::new(ProfileColumn::Bio).string().not_null())
            .col(ColumnDef::new(ProfileColumn::City).string().not_null())
            .col(ColumnDef::new(ProfileColumn::CreatedAt).timestamp_with_time_zone().not_null())
            .col(ColumnDef::new(ProfileColumn::UpdatedAt).timestamp_with_time_zone().not_null())
            .col(ColumnDef::new(ProfileColumn::CreatedBy).uuid().null())
            .col(ColumnDef::new(ProfileColumn::UpdatedBy).uuid().null())
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfileEntity).to_owned())
            .await
    }
}

#[derive(Debug)]
pub enum UserColumn {
    Id,
    Email,
    Name,
    Age,
    Meta,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
    LogId,
}

impl Iden for UserColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Id => "id",
                Self::Email => "email",
                Self::Name => "name",
                Self::Age => "age",
                Self::Meta => "meta",
                Self::DeletedAt => "deleted_at",
                Self::CreatedAt => "created_at",
                Self::UpdatedAt => "updated_at",
                Self::CreatedBy => "created_by",
                Self::UpdatedBy => "updated_by",
                Self::LogId => "log_id",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub struct UserEntity;

impl Iden for UserEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "users").unwrap();
    }
}

#[derive(Debug)]
pub enum ProfileColumn {
    Id,
    UserId,
    Bio,
    City,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}

impl Iden for ProfileColumn {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Id => "id",
                Self::UserId => "user_id",
                Self::Bio => "bio",
                Self::City => "city",
                Self::CreatedAt => "created_at",
                Self::UpdatedAt => "updated_at",
                Self::CreatedBy => "created_by",
                Self::UpdatedBy => "updated_by",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub struct ProfileEntity;

impl Iden for ProfileEntity {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "profiles").unwrap();
    }
}
