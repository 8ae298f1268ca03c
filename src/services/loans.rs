//! Loan management service

use chrono::Duration;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::loan::{IssueLoan, IssuedBook, Loan, LoanDetails, OverdueLoan},
    repository::{self, retry_on_busy, Repository},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LendingConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LendingConfig) -> Self {
        Self { repository, config }
    }

    /// Issue a book; the due date is `period_days` (or the default) from now
    #[tracing::instrument(skip(self))]
    pub async fn issue(&self, request: &IssueLoan) -> AppResult<Loan> {
        let period = self.loan_period(request.period_days)?;
        let issue_date = repository::now();
        let due_date = issue_date + Duration::days(period);

        let loans = &self.repository.loans;
        let loan = retry_on_busy(self.repository.retry, || {
            loans.issue(request.book_id, request.user_id, issue_date, due_date)
        })
        .await?;

        tracing::info!(loan_id = loan.id, due_date = %loan.due_date, "book issued");
        Ok(loan)
    }

    /// Close an open loan and make the book available again
    #[tracing::instrument(skip(self))]
    pub async fn return_loan(&self, loan_id: i64) -> AppResult<Loan> {
        let now = repository::now();
        let loans = &self.repository.loans;
        let loan = retry_on_busy(self.repository.retry, || loans.return_loan(loan_id, now)).await?;

        tracing::info!(loan_id, book_id = loan.book_id, "book returned");
        Ok(loan)
    }

    /// Remove a closed loan from history
    pub async fn delete_loan(&self, loan_id: i64) -> AppResult<()> {
        let loans = &self.repository.loans;
        retry_on_busy(self.repository.retry, || loans.delete(loan_id)).await?;
        tracing::info!(loan_id, "loan deleted");
        Ok(())
    }

    pub async fn get(&self, loan_id: i64) -> AppResult<Loan> {
        self.repository.loans.get(loan_id).await
    }

    /// Return desk list: every open loan, earliest due first
    pub async fn open_loans(&self) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.open().await
    }

    /// All loans of a user, newest first
    pub async fn user_history(&self, user_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.user_history(user_id).await
    }

    /// Books a user holds now
    pub async fn user_issued(&self, user_id: i64) -> AppResult<Vec<IssuedBook>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository
            .loans
            .user_issued(user_id, repository::now())
            .await
    }

    pub async fn user_overdue(&self, user_id: i64) -> AppResult<Vec<OverdueLoan>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository
            .loans
            .overdue(repository::now(), Some(user_id))
            .await
    }

    fn loan_period(&self, requested: Option<i64>) -> AppResult<i64> {
        let max = self.config.max_loan_days.max(1);
        let period = requested.unwrap_or(self.config.default_loan_days.clamp(1, max));
        if !(1..=max).contains(&period) {
            return Err(AppError::Validation(format!(
                "Loan period must be between 1 and {} days",
                max
            )));
        }
        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::LendingError, repository::testing};

    async fn setup() -> (LoansService, i64, i64) {
        let repo = testing::repository().await;
        let book = testing::add_book(&repo, "Book", "1111111111").await;
        let user = testing::add_student(&repo, "alice").await;
        (LoansService::new(repo, LendingConfig::default()), book, user.id)
    }

    #[tokio::test]
    async fn test_default_period_is_thirty_days() {
        let (service, book_id, user_id) = setup().await;
        let loan = service
            .issue(&IssueLoan {
                book_id,
                user_id,
                period_days: None,
            })
            .await
            .unwrap();
        assert_eq!(loan.due_date - loan.issue_date, Duration::days(30));
    }

    #[tokio::test]
    async fn test_period_bounds() {
        let (service, book_id, user_id) = setup().await;
        for period in [0, 31, -3] {
            let err = service
                .issue(&IssueLoan {
                    book_id,
                    user_id,
                    period_days: Some(period),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(service.open_loans().await.unwrap().len(), 0);

        let loan = service
            .issue(&IssueLoan {
                book_id,
                user_id,
                period_days: Some(7),
            })
            .await
            .unwrap();
        assert_eq!(loan.due_date - loan.issue_date, Duration::days(7));
    }

    #[tokio::test]
    async fn test_user_views_require_existing_user() {
        let (service, _, _) = setup().await;
        let err = service.user_history(99).await.unwrap_err();
        assert_eq!(err.lending(), Some(&LendingError::UserNotFound(99)));
    }
}
