//! Identity and audit columns.
//!
//! [`AuditStamper`] fills `id`, `created_at`/`updated_at`, `created_by`/`updated_by`
//! and the optional `log` correlation column on an `ActiveModel` before it is
//! persisted. The acting user comes from the ambient [`AuditContext`], set once
//! per request by the host:
//!
//! ```rust,ignore
//! AuditContext::new(Some(user_id))
//!     .scope(async move { User::create(&db, &stamper, payload).await })
//!     .await
//! ```

use std::future::Future;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, EntityTrait, Value};
use uuid::Uuid;

tokio::task_local! {
    static AUDIT_CONTEXT: AuditContext;
}

/// Who is writing, and under which operation log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Option<Uuid>,
    pub log: Option<Uuid>,
}

impl AuditContext {
    #[must_use]
    pub const fn new(actor: Option<Uuid>) -> Self {
        Self { actor, log: None }
    }

    #[must_use]
    pub const fn with_log(mut self, log: Uuid) -> Self {
        self.log = Some(log);
        self
    }

    /// Run `future` with this context as the ambient one.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        AUDIT_CONTEXT.scope(self, future).await
    }

    /// The ambient context, or an empty one outside [`AuditContext::scope`].
    #[must_use]
    pub fn current() -> Self {
        AUDIT_CONTEXT.try_with(|ctx| *ctx).unwrap_or_default()
    }
}

/// Audit columns of a record type.
#[derive(Debug, Clone, Copy)]
pub struct AuditColumns<C> {
    pub id: C,
    pub created_at: C,
    pub updated_at: C,
    pub created_by: C,
    pub updated_by: C,
    pub log: Option<C>,
}

type ColumnOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Column;

#[derive(Debug, Clone, Copy)]
pub struct AuditStamper {
    system_actor: Uuid,
}

impl AuditStamper {
    #[must_use]
    pub const fn new(system_actor: Uuid) -> Self {
        Self { system_actor }
    }

    #[must_use]
    pub const fn system_actor(&self) -> Uuid {
        self.system_actor
    }

    /// The ambient user, else the system id for system-owned types.
    #[must_use]
    pub fn actor_for(&self, ctx: &AuditContext, system_owned: bool) -> Option<Uuid> {
        ctx.actor.or_else(|| system_owned.then_some(self.system_actor))
    }

    /// Stamp a model about to be inserted.
    ///
    /// Values already present in the payload are kept, except `updated_at`
    /// which is always refreshed. Without an actor the `*_by` columns stay
    /// unset.
    pub fn stamp_create<A>(
        &self,
        model: &mut A,
        columns: &AuditColumns<ColumnOf<A>>,
        ctx: &AuditContext,
        system_owned: bool,
    ) where
        A: ActiveModelTrait,
    {
        if is_absent(&model.get(columns.id)) {
            model.set(columns.id, Uuid::now_v7().into());
        }

        let now = Utc::now();
        if is_absent(&model.get(columns.created_at)) {
            model.set(columns.created_at, now.into());
        }
        model.set(columns.updated_at, now.into());

        match self.actor_for(ctx, system_owned) {
            Some(actor) => {
                if is_absent(&model.get(columns.created_by)) {
                    model.set(columns.created_by, actor.into());
                }
                if is_absent(&model.get(columns.updated_by)) {
                    model.set(columns.updated_by, actor.into());
                }
            }
            None => tracing::debug!("No actor available, audit columns left unset"),
        }

        attach_log(model, columns, ctx);
    }

    /// Stamp a model about to be updated.
    ///
    /// `created_at` and `created_by` are dropped from the write so they can
    /// never be overwritten.
    pub fn stamp_update<A>(
        &self,
        model: &mut A,
        columns: &AuditColumns<ColumnOf<A>>,
        ctx: &AuditContext,
        system_owned: bool,
    ) where
        A: ActiveModelTrait,
    {
        model.not_set(columns.created_at);
        model.not_set(columns.created_by);
        model.set(columns.updated_at, Utc::now().into());

        if let Some(actor) = self.actor_for(ctx, system_owned) {
            model.set(columns.updated_by, actor.into());
        }

        attach_log(model, columns, ctx);
    }
}

impl Default for AuditStamper {
    fn default() -> Self {
        Self::new(Uuid::nil())
    }
}

fn attach_log<A: ActiveModelTrait>(model: &mut A, columns: &AuditColumns<ColumnOf<A>>, ctx: &AuditContext) {
    if let (Some(log), Some(column)) = (ctx.log, columns.log) {
        model.set(column, log.into());
    }
}

fn is_absent(value: &ActiveValue<Value>) -> bool {
    match value {
        ActiveValue::NotSet => true,
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => matches!(
            v,
            Value::Uuid(None) | Value::ChronoDateTimeUtc(None) | Value::ChronoDateTime(None)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_prefers_ambient_user() {
        let stamper = AuditStamper::new(Uuid::from_u128(1));
        let user = Uuid::from_u128(7);

        assert_eq!(stamper.actor_for(&AuditContext::new(Some(user)), true), Some(user));
        assert_eq!(
            stamper.actor_for(&AuditContext::default(), true),
            Some(Uuid::from_u128(1))
        );
        assert_eq!(stamper.actor_for(&AuditContext::default(), false), None);
    }

    #[test]
    fn test_absent_values() {
        assert!(is_absent(&ActiveValue::NotSet));
        assert!(is_absent(&ActiveValue::Set(Value::Uuid(None))));
        assert!(!is_absent(&ActiveValue::Set(Uuid::nil().into())));
        assert!(!is_absent(&ActiveValue::Unchanged(Utc::now().into())));
    }

    #[tokio::test]
    async fn test_context_is_scoped_to_the_task() {
        assert_eq!(AuditContext::current(), AuditContext::default());

        let ctx = AuditContext::new(Some(Uuid::from_u128(3))).with_log(Uuid::from_u128(4));
        let seen = ctx.scope(async { AuditContext::current() }).await;
        assert_eq!(seen, ctx);

        assert_eq!(AuditContext::current().actor, None);
    }
}
