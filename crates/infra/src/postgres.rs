//! Postgres-backed store for users, tenants and refresh tokens.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate email, tenant slug/name or token value |
//! | Database (foreign key violation) | `23503` | `NotFound` | Row references a missing tenant or user |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` | Database unreachable |
//! | Other | N/A | `Backend` | Decoding failures etc. |
//!
//! ## Signup
//!
//! `create_user_with_refresh_token` inserts the user and its first refresh
//! token in one transaction; a failure on either insert persists neither.
//!
//! ## Refresh Token Replacement
//!
//! `replace_refresh_tokens_for_user` runs in one transaction that first locks
//! the owning user row (`SELECT ... FOR UPDATE`). Concurrent replacements for
//! the same user therefore serialize, and exactly one token survives.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use warden_auth::{
    Entity, RefreshToken, RefreshTokenStore, Role, StoreError, Tenant, TenantStore, User, UserStore,
};
use warden_core::{RefreshTokenId, Slug, TenantId, UserId};

/// DDL applied by [`PostgresAuthStore::migrate`]. Every statement is idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenants (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    slug        TEXT NOT NULL UNIQUE,
    active      BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id             UUID PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    password_hash  TEXT NOT NULL,
    name           TEXT NOT NULL,
    tenant_id      UUID NOT NULL REFERENCES tenants (id),
    roles          TEXT[] NOT NULL DEFAULT '{}',
    enabled        BOOLEAN NOT NULL DEFAULT TRUE,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS refresh_tokens (
    id          UUID PRIMARY KEY,
    token       TEXT NOT NULL UNIQUE,
    user_id     UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    expires_at  TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS refresh_tokens_user_id_idx ON refresh_tokens (user_id);
"#;

#[derive(Debug, Clone)]
pub struct PostgresAuthStore {
    pool: Arc<PgPool>,
}

impl PostgresAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresAuthStore {
    #[instrument(skip_all, err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, name, tenant_id, roles, enabled, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, name, tenant_id, roles, enabled, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_id", e))?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip_all, err)]
    async fn exists_user_with_email(&self, email: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) AS present")
            .bind(email)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_user_with_email", e))?;

        row.try_get::<bool, _>("present")
            .map_err(|e| map_sqlx_error("exists_user_with_email", e))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn save_user(&self, user: User) -> Result<User, StoreError> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, name, tenant_id, roles, enabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id)
            DO UPDATE SET
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                name = EXCLUDED.name,
                tenant_id = EXCLUDED.tenant_id,
                roles = EXCLUDED.roles,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.tenant_id.as_uuid())
        .bind(&roles)
        .bind(user.enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_user", e))?;

        Ok(user)
    }

    #[instrument(skip_all, fields(user_id = %user.id), err)]
    async fn create_user_with_refresh_token(
        &self,
        user: User,
        token: RefreshToken,
    ) -> Result<(User, RefreshToken), StoreError> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();

        // Dropping `tx` on any early return rolls both inserts back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, name, tenant_id, roles, enabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.tenant_id.as_uuid())
        .bind(&roles)
        .bind(user.enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        insert_refresh_token(&mut *tx, &token)
            .await
            .map_err(|e| map_sqlx_error("insert_refresh_token", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok((user, token))
    }
}

#[async_trait::async_trait]
impl TenantStore for PostgresAuthStore {
    #[instrument(skip(self), fields(slug = %slug), err)]
    async fn find_tenant_by_slug(&self, slug: &Slug) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, slug, active, created_at, updated_at
            FROM tenants
            WHERE slug = $1
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_tenant_by_slug", e))?;

        row.map(|r| tenant_from_row(&r)).transpose()
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), err)]
    async fn save_tenant(&self, tenant: Tenant) -> Result<Tenant, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, slug, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.name)
        .bind(tenant.slug().as_str())
        .bind(tenant.active)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_tenant", e))?;

        Ok(tenant)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for PostgresAuthStore {
    #[instrument(skip_all, err)]
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, token, user_id, expires_at, created_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_refresh_token", e))?;

        row.map(|r| refresh_token_from_row(&r)).transpose()
    }

    #[instrument(skip_all, fields(user_id = %token.user_id), err)]
    async fn save_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken, StoreError> {
        insert_refresh_token(&*self.pool, &token)
            .await
            .map_err(|e| map_sqlx_error("save_refresh_token", e))?;
        Ok(token)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn delete_refresh_tokens_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_refresh_tokens_for_user", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip_all, fields(user_id = %token.user_id), err)]
    async fn delete_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(token.id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_refresh_token", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %token.user_id), err)]
    async fn replace_refresh_tokens_for_user(
        &self,
        token: RefreshToken,
    ) -> Result<(RefreshToken, u64), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Serialize replacements per user on the owning row.
        let owner = sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(token.user_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_user", e))?;
        if owner.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound(Entity::User));
        }

        let superseded = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(token.user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_refresh_tokens_for_user", e))?
            .rows_affected();

        insert_refresh_token(&mut *tx, &token)
            .await
            .map_err(|e| map_sqlx_error("insert_refresh_token", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok((token, superseded))
    }
}

async fn insert_refresh_token<'e, E>(executor: E, token: &RefreshToken) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token, user_id, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(token.id.as_uuid())
    .bind(&token.token)
    .bind(token.user_id.as_uuid())
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let decode = |e| map_sqlx_error("decode_user", e);
    let roles: Vec<String> = row.try_get("roles").map_err(decode)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        email: row.try_get("email").map_err(decode)?,
        password_hash: row.try_get("password_hash").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        tenant_id: TenantId::from_uuid(row.try_get::<Uuid, _>("tenant_id").map_err(decode)?),
        roles: roles.into_iter().map(Role::from).collect::<BTreeSet<_>>(),
        enabled: row.try_get("enabled").map_err(decode)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(decode)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(decode)?,
    })
}

fn tenant_from_row(row: &sqlx::postgres::PgRow) -> Result<Tenant, StoreError> {
    let decode = |e| map_sqlx_error("decode_tenant", e);
    let slug: String = row.try_get("slug").map_err(decode)?;
    let slug = Slug::parse(slug).map_err(|e| StoreError::Backend(format!("stored tenant slug: {e}")))?;
    Ok(Tenant::from_parts(
        TenantId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        row.try_get("name").map_err(decode)?,
        slug,
        row.try_get("active").map_err(decode)?,
        row.try_get("created_at").map_err(decode)?,
        row.try_get("updated_at").map_err(decode)?,
    ))
}

fn refresh_token_from_row(row: &sqlx::postgres::PgRow) -> Result<RefreshToken, StoreError> {
    let decode = |e| map_sqlx_error("decode_refresh_token", e);
    Ok(RefreshToken {
        id: RefreshTokenId::from_uuid(row.try_get::<Uuid, _>("id").map_err(decode)?),
        token: row.try_get("token").map_err(decode)?,
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(decode)?),
        expires_at: row.try_get("expires_at").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") if db_err.constraint() == Some("refresh_tokens_user_id_fkey") => {
                    StoreError::NotFound(Entity::User)
                }
                Some("23503") => StoreError::NotFound(Entity::Tenant),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("database unavailable in {}: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
