//! Loan management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{IssueLoan, IssuedBook, Loan, LoanDetails, OverdueLoan},
};

use super::AuthenticatedUser;

/// Return response with the closed loan
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    pub loan: Loan,
}

/// Issue a book to a user
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Book issued", body = Loan),
        (status = 400, description = "Loan period out of range"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Book not available or already held by the user")
    )
)]
pub async fn issue_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    claims.require_admin()?;

    let loan = state.services.loans.issue(&request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return an issued book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<ReturnResponse>> {
    claims.require_admin()?;

    let loan = state.services.loans.return_loan(loan_id).await?;
    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan,
    }))
}

/// Delete a returned loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Book not yet returned")
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.loans.delete_loan(loan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every open loan
#[utoipa::path(
    get,
    path = "/loans/open",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans, earliest due first", body = Vec<LoanDetails>)
    )
)]
pub async fn open_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.loans.open_loans().await?;
    Ok(Json(loans))
}

/// Loan history of a user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans, newest first", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_self_or_admin(user_id)?;

    let loans = state.services.loans.user_history(user_id).await?;
    Ok(Json(loans))
}

/// Books a user currently holds
#[utoipa::path(
    get,
    path = "/users/{id}/issued",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Issued books with overdue flag", body = Vec<IssuedBook>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_issued(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<IssuedBook>>> {
    claims.require_self_or_admin(user_id)?;

    let loans = state.services.loans.user_issued(user_id).await?;
    Ok(Json(loans))
}

/// Overdue books of a user
#[utoipa::path(
    get,
    path = "/users/{id}/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Overdue loans, most overdue first", body = Vec<OverdueLoan>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_overdue(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<OverdueLoan>>> {
    claims.require_self_or_admin(user_id)?;

    let loans = state.services.loans.user_overdue(user_id).await?;
    Ok(Json(loans))
}
