//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, AppResult, LendingError},
    models::loan::{
        days_overdue, is_overdue, IssuedBook, Loan, LoanActivity, LoanDetails, OverdueLoan,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT ib.id, ib.book_id, b.title, b.author, b.isbn, ib.user_id, u.username, u.email,
           ib.issue_date, ib.due_date, ib.return_date
    FROM issued_books ib
    JOIN books b ON b.id = ib.book_id
    JOIN users u ON u.id = ib.user_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: SqlitePool,
}

impl LoansRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get(&self, id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM issued_books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LendingError::LoanNotFound(id).into())
    }

    /// Open a loan and mark the book issued, atomically.
    ///
    /// The availability flag is flipped with a conditional update, so of two
    /// concurrent issuers of the same book only one can succeed.
    pub async fn issue(
        &self,
        book_id: i64,
        user_id: i64,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let available: Option<bool> = sqlx::query_scalar("SELECT available FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(available) = available else {
            return Err(LendingError::BookNotFound(book_id).into());
        };

        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if !user_exists {
            return Err(LendingError::UserNotFound(user_id).into());
        }

        let already_held: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM issued_books
                WHERE book_id = ? AND user_id = ? AND return_date IS NULL
            )
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_held {
            return Err(LendingError::DuplicateActiveLoan { book_id, user_id }.into());
        }
        if !available {
            return Err(LendingError::BookUnavailable(book_id).into());
        }

        let flipped = sqlx::query(
            "UPDATE books SET available = 0, updated_at = ? WHERE id = ? AND available = 1",
        )
        .bind(issue_date)
        .bind(book_id)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() != 1 {
            return Err(LendingError::BookUnavailable(book_id).into());
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO issued_books (book_id, user_id, issue_date, due_date)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(issue_date)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                LendingError::BookUnavailable(book_id).into()
            }
            other => AppError::from(other),
        })?;

        tx.commit().await?;
        Ok(loan)
    }

    /// Close an open loan and release the book, atomically
    pub async fn return_loan(&self, id: i64, return_date: DateTime<Utc>) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM issued_books WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LendingError::LoanNotFound(id))?;
        if !loan.is_open() {
            return Err(LendingError::LoanAlreadyClosed(id).into());
        }

        let closed = sqlx::query_as::<_, Loan>(
            "UPDATE issued_books SET return_date = ? WHERE id = ? AND return_date IS NULL RETURNING *",
        )
        .bind(return_date)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LendingError::LoanAlreadyClosed(id))?;

        sqlx::query("UPDATE books SET available = 1, updated_at = ? WHERE id = ?")
            .bind(return_date)
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(closed)
    }

    /// Remove a returned loan from history
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM issued_books WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LendingError::LoanNotFound(id))?;
        if loan.is_open() {
            return Err(LendingError::LoanStillOpen(id).into());
        }

        sqlx::query("DELETE FROM issued_books WHERE id = ? AND return_date IS NOT NULL")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Open loans with `start <= due_date < end`
    pub async fn due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE ib.return_date IS NULL AND ib.due_date >= ? AND ib.due_date < ? ORDER BY ib.due_date, ib.id",
            DETAILS_SELECT
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Open loans past due, most overdue first; optionally for one user
    pub async fn overdue(
        &self,
        now: DateTime<Utc>,
        user_id: Option<i64>,
    ) -> AppResult<Vec<OverdueLoan>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            r#"{}
            WHERE ib.return_date IS NULL AND ib.due_date < ?
              AND (? IS NULL OR ib.user_id = ?)
            ORDER BY ib.due_date, ib.id
            "#,
            DETAILS_SELECT
        ))
        .bind(now)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans
            .into_iter()
            .map(|loan| OverdueLoan {
                days_overdue: days_overdue(loan.due_date, now),
                loan,
            })
            .collect())
    }

    /// Every loan of a user, newest first
    pub async fn user_history(&self, user_id: i64) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE ib.user_id = ? ORDER BY ib.issue_date DESC, ib.id DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Books a user currently holds, with their overdue flag
    pub async fn user_issued(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<IssuedBook>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE ib.user_id = ? AND ib.return_date IS NULL ORDER BY ib.due_date, ib.id",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans
            .into_iter()
            .map(|loan| IssuedBook {
                is_overdue: is_overdue(loan.due_date, loan.return_date, now),
                loan,
            })
            .collect())
    }

    /// All open loans, earliest due first
    pub async fn open(&self) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE ib.return_date IS NULL ORDER BY ib.due_date, ib.id",
            DETAILS_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    pub async fn recent_issues(&self, limit: i64) -> AppResult<Vec<LoanActivity>> {
        let activity = sqlx::query_as::<_, LoanActivity>(
            r#"
            SELECT ib.id AS loan_id, b.title, u.username, ib.issue_date AS date
            FROM issued_books ib
            JOIN books b ON b.id = ib.book_id
            JOIN users u ON u.id = ib.user_id
            ORDER BY ib.issue_date DESC, ib.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(activity)
    }

    pub async fn recent_returns(&self, limit: i64) -> AppResult<Vec<LoanActivity>> {
        let activity = sqlx::query_as::<_, LoanActivity>(
            r#"
            SELECT ib.id AS loan_id, b.title, u.username, ib.return_date AS date
            FROM issued_books ib
            JOIN books b ON b.id = ib.book_id
            JOIN users u ON u.id = ib.user_id
            WHERE ib.return_date IS NOT NULL
            ORDER BY ib.return_date DESC, ib.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(activity)
    }
}
