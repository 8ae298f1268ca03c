//! Aggregate reporting queries

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{error::AppResult, models::report::LibrarySummary};

#[derive(Clone)]
pub struct ReportsRepository {
    pool: SqlitePool,
}

impl ReportsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Dashboard counters as of `now`
    pub async fn summary(&self, now: DateTime<Utc>) -> AppResult<LibrarySummary> {
        let summary = sqlx::query_as::<_, LibrarySummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books) AS total_books,
                (SELECT COUNT(*) FROM books WHERE available = 1) AS available_books,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM issued_books WHERE return_date IS NULL) AS open_loans,
                (SELECT COUNT(*) FROM issued_books
                 WHERE return_date IS NULL AND due_date < ?) AS overdue_loans
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::repository::{now, testing};

    #[tokio::test]
    async fn test_summary_counts() {
        let repo = testing::repository().await;
        let empty = repo.reports.summary(now()).await.unwrap();
        assert_eq!(empty.total_books, 0);
        assert_eq!(empty.overdue_loans, 0);

        let user = testing::add_student(&repo, "alice").await;
        let a = testing::add_book(&repo, "A", "1000000001").await;
        let b = testing::add_book(&repo, "B", "1000000002").await;
        testing::add_book(&repo, "C", "1000000003").await;
        let now = now();
        testing::add_loan(&repo, a, user.id, now, 10, now - Duration::days(2)).await;
        testing::add_loan(&repo, b, user.id, now, 1, now + Duration::days(2)).await;

        let summary = repo.reports.summary(now).await.unwrap();
        assert_eq!(
            summary,
            LibrarySummary {
                total_books: 3,
                available_books: 1,
                total_users: 1,
                open_loans: 2,
                overdue_loans: 1,
            }
        );
    }
}
