//! Loan (issued book) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Loan model from database (issued_books)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Unset while the book is still out
    pub return_date: Option<DateTime<Utc>>,
}

/// Loan lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Open,
    Closed,
}

impl Loan {
    pub fn status(&self) -> LoanStatus {
        if self.return_date.is_some() {
            LoanStatus::Closed
        } else {
            LoanStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.status() == LoanStatus::Open
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        is_overdue(self.due_date, self.return_date, now)
    }

    /// Whole days past due, zero unless overdue
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        if self.is_overdue(now) {
            days_overdue(self.due_date, now)
        } else {
            0
        }
    }
}

/// Open and past its due date
pub fn is_overdue(
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    return_date.is_none() && due_date < now
}

/// Whole days elapsed since the due date, floored and never negative
pub fn days_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due_date).num_days().max(0)
}

/// Issue book request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueLoan {
    pub book_id: i64,
    pub user_id: i64,
    /// Loan period in days; the configured default applies when absent
    pub period_days: Option<i64>,
}

/// Loan joined to its book and borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

/// Open loan that is past due
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OverdueLoan {
    #[serde(flatten)]
    pub loan: LoanDetails,
    pub days_overdue: i64,
}

/// Open loan with its overdue flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IssuedBook {
    #[serde(flatten)]
    pub loan: LoanDetails,
    pub is_overdue: bool,
}

/// Recent issue or return, for activity feeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanActivity {
    pub loan_id: i64,
    pub title: String,
    pub username: String,
    /// Issue date for issues, return date for returns
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(due_in: Duration, returned: bool, now: DateTime<Utc>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            user_id: 1,
            issue_date: now - Duration::days(30),
            due_date: now + due_in,
            return_date: returned.then_some(now),
        }
    }

    #[test]
    fn test_overdue_derivation() {
        let now = Utc::now();

        let late = loan(-Duration::days(2) - Duration::hours(3), false, now);
        assert!(late.is_overdue(now));
        assert_eq!(late.days_overdue(now), 2);

        let returned_late = loan(-Duration::days(2), true, now);
        assert_eq!(returned_late.status(), LoanStatus::Closed);
        assert!(!returned_late.is_overdue(now));
        assert_eq!(returned_late.days_overdue(now), 0);

        let on_time = loan(Duration::days(3), false, now);
        assert!(on_time.is_open());
        assert!(!on_time.is_overdue(now));
        assert_eq!(on_time.days_overdue(now), 0);
    }

    #[test]
    fn test_days_overdue_floors_partial_days() {
        let now = Utc::now();
        assert_eq!(days_overdue(now - Duration::hours(23), now), 0);
        assert_eq!(days_overdue(now - Duration::hours(49), now), 2);
        assert_eq!(days_overdue(now + Duration::hours(5), now), 0);
    }
}
