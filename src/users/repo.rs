use async_trait::async_trait;
use sqlx::{migrate::Migrator, PgPool};

use crate::error::{AppError, AppResult};
use crate::users::repo_types::{NewUser, User};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Persistence seam for user records.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn list(&self, skip: i64, limit: i64) -> AppResult<Vec<User>>;
    /// Fails with `DuplicateEmail` when the email is already taken.
    async fn insert(&self, new_user: NewUser) -> AppResult<User>;
    /// Returns false when no user has this id.
    async fn set_password_hash(&self, id: i64, password_hash: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self, skip: i64, limit: i64) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, new_user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, role
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            // users_email_key lost a race with a concurrent insert
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::DuplicateEmail,
            other => other.into(),
        })?;
        Ok(user)
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        let done = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $1
             WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if done.rows_affected() != 1 {
            // dropping the transaction rolls it back
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }
}
