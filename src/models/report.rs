//! Reporting projections

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Dashboard counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LibrarySummary {
    pub total_books: i64,
    pub available_books: i64,
    pub total_users: i64,
    pub open_loans: i64,
    pub overdue_loans: i64,
}

/// Limit for activity feeds
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ActivityQuery {
    /// Defaults to 10
    pub limit: Option<i64>,
}

impl ActivityQuery {
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 500)
    }
}
