//! Reporting endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan::{LoanActivity, OverdueLoan},
        report::{ActivityQuery, LibrarySummary},
    },
};

use super::AuthenticatedUser;

/// All overdue loans
#[utoipa::path(
    get,
    path = "/reports/overdue",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans, most overdue first", body = Vec<OverdueLoan>)
    )
)]
pub async fn overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<OverdueLoan>>> {
    claims.require_admin()?;

    let loans = state.services.reports.overdue().await?;
    Ok(Json(loans))
}

/// Latest issues
#[utoipa::path(
    get,
    path = "/reports/recent-issues",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "Most recent issues first", body = Vec<LoanActivity>)
    )
)]
pub async fn recent_issues(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<LoanActivity>>> {
    claims.require_admin()?;

    let activity = state.services.reports.recent_issues(query.limit()).await?;
    Ok(Json(activity))
}

/// Latest returns
#[utoipa::path(
    get,
    path = "/reports/recent-returns",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "Most recent returns first", body = Vec<LoanActivity>)
    )
)]
pub async fn recent_returns(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<LoanActivity>>> {
    claims.require_admin()?;

    let activity = state.services.reports.recent_returns(query.limit()).await?;
    Ok(Json(activity))
}

/// Library counters
#[utoipa::path(
    get,
    path = "/reports/summary",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library summary", body = LibrarySummary)
    )
)]
pub async fn summary(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<LibrarySummary>> {
    claims.require_admin()?;

    let summary = state.services.reports.summary().await?;
    Ok(Json(summary))
}
