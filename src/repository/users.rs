//! Users repository for database operations

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::{unique_violation, AppResult, Entity, LendingError},
    models::user::{Role, User, UserLoanCounts, UserRow},
};

use super::{contains_pattern, search_text};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, roll_number, created_at";

#[derive(Clone)]
pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user; the password must already be hashed
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        roll_number: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, roll_number, created_at,
                               search_text)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(roll_number)
        .bind(created_at)
        .bind(search_text(&[
            username,
            email,
            roll_number.unwrap_or_default(),
            role.as_str(),
        ]))
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation)?;

        row.try_into()
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LendingError::UserNotFound(id))?
            .try_into()
    }

    /// Get user by username (login)
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// All users ordered by username
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    /// Case-insensitive substring search over username, email, roll number and role
    pub async fn search(&self, query: &str) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {} FROM users
            WHERE search_text LIKE ? ESCAPE '\'
            ORDER BY username
            "#,
            USER_COLUMNS
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Historical, open and overdue loan counts for one user
    pub async fn loan_counts(&self, id: i64, now: DateTime<Utc>) -> AppResult<UserLoanCounts> {
        let counts = sqlx::query_as::<_, UserLoanCounts>(
            r#"
            SELECT COUNT(*) AS total_loans,
                   COUNT(CASE WHEN return_date IS NULL THEN 1 END) AS open_loans,
                   COUNT(CASE WHEN return_date IS NULL AND due_date < ? THEN 1 END) AS overdue_loans
            FROM issued_books
            WHERE user_id = ?
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Delete a user and their closed loan history in one transaction.
    ///
    /// Refused while the user still holds a book.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(LendingError::UserNotFound(id).into());
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM issued_books WHERE user_id = ? AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open > 0 {
            return Err(LendingError::HasActiveLoans {
                entity: Entity::User,
                id,
            }
            .into());
        }

        sqlx::query("DELETE FROM issued_books WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
