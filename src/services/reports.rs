//! Read-only reporting service

use crate::{
    error::AppResult,
    models::{
        loan::{LoanActivity, OverdueLoan},
        report::LibrarySummary,
    },
    repository::{self, Repository},
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Every overdue loan, most overdue first
    pub async fn overdue(&self) -> AppResult<Vec<OverdueLoan>> {
        self.repository.loans.overdue(repository::now(), None).await
    }

    pub async fn recent_issues(&self, limit: i64) -> AppResult<Vec<LoanActivity>> {
        self.repository.loans.recent_issues(limit).await
    }

    pub async fn recent_returns(&self, limit: i64) -> AppResult<Vec<LoanActivity>> {
        self.repository.loans.recent_returns(limit).await
    }

    pub async fn summary(&self) -> AppResult<LibrarySummary> {
        self.repository.reports.summary(repository::now()).await
    }
}
