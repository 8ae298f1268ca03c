//! Error types for Shelfkeeper server

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error codes returned in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchLoan = 6,
    BookNotAvailable = 7,
    Duplicate = 8,
    DuplicateActiveLoan = 9,
    LoanAlreadyClosed = 10,
    LoanStillOpen = 11,
    HasActiveLoans = 12,
    BadValue = 13,
    StoreBusy = 14,
    MailFailure = 15,
    NoSuchData = 16,
}

/// Broad classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape, rejected before reaching the store
    Validation,
    /// Uniqueness violation
    Conflict,
    /// Illegal lending transition
    State,
    NotFound,
    /// Lock contention that outlived the retry budget
    TransientStore,
    FatalStore,
    Auth,
    Mail,
    Internal,
}

/// Entity guarded by the active-loan deletion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Book,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => write!(f, "user"),
            Entity::Book => write!(f, "book"),
        }
    }
}

/// Expected failures of the lending rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("Book with id {0} not found")]
    BookNotFound(i64),

    #[error("User with id {0} not found")]
    UserNotFound(i64),

    #[error("Book with id {0} is not available: it is currently issued")]
    BookUnavailable(i64),

    #[error("User {user_id} already has an open loan for book {book_id}")]
    DuplicateActiveLoan { book_id: i64, user_id: i64 },

    #[error("Loan with id {0} not found")]
    LoanNotFound(i64),

    #[error("Loan with id {0} has already been returned")]
    LoanAlreadyClosed(i64),

    #[error("Cannot delete loan {0}: book is still issued")]
    LoanStillOpen(i64),

    #[error("Cannot delete {entity}: active loans exist")]
    HasActiveLoans { entity: Entity, id: i64 },

    #[error("ISBN {0} already exists")]
    DuplicateIsbn(String),
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::BookNotFound(_)
            | LendingError::UserNotFound(_)
            | LendingError::LoanNotFound(_) => ErrorKind::NotFound,
            LendingError::DuplicateIsbn(_) => ErrorKind::Conflict,
            LendingError::BookUnavailable(_)
            | LendingError::DuplicateActiveLoan { .. }
            | LendingError::LoanAlreadyClosed(_)
            | LendingError::LoanStillOpen(_)
            | LendingError::HasActiveLoans { .. } => ErrorKind::State,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LendingError::BookNotFound(_) => ErrorCode::NoSuchBook,
            LendingError::UserNotFound(_) => ErrorCode::NoSuchUser,
            LendingError::BookUnavailable(_) => ErrorCode::BookNotAvailable,
            LendingError::DuplicateActiveLoan { .. } => ErrorCode::DuplicateActiveLoan,
            LendingError::LoanNotFound(_) => ErrorCode::NoSuchLoan,
            LendingError::LoanAlreadyClosed(_) => ErrorCode::LoanAlreadyClosed,
            LendingError::LoanStillOpen(_) => ErrorCode::LoanStillOpen,
            LendingError::HasActiveLoans { .. } => ErrorCode::HasActiveLoans,
            LendingError::DuplicateIsbn(_) => ErrorCode::Duplicate,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Lending(#[from] LendingError),

    #[error("Store is busy: {0}")]
    StoreBusy(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorKind::Auth,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Lending(e) => e.kind(),
            AppError::StoreBusy(_) => ErrorKind::TransientStore,
            AppError::Database(e) if is_busy(e) => ErrorKind::TransientStore,
            AppError::Database(_) | AppError::Migration(_) => ErrorKind::FatalStore,
            AppError::Mail(_) => ErrorKind::Mail,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Lock contention reported by the store, worth another attempt
    pub fn is_busy(&self) -> bool {
        match self {
            AppError::Database(e) => is_busy(e),
            _ => false,
        }
    }

    /// Lending rule that rejected the operation, if any
    pub fn lending(&self) -> Option<&LendingError> {
        match self {
            AppError::Lending(e) => Some(e),
            _ => None,
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let busy_code = db
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| matches!(c & 0xff, 5 | 6))
                .unwrap_or(false);
            busy_code || db.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Translate a unique-constraint failure into a readable conflict
pub(crate) fn unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            let message = db.message();
            let field = ["username", "email", "roll_number", "isbn"]
                .into_iter()
                .find(|field| message.contains(&format!(".{}", field)));
            return match field {
                Some("username") => AppError::Conflict("Username already exists".to_string()),
                Some("email") => AppError::Conflict("Email already exists".to_string()),
                Some("roll_number") => AppError::Conflict("Roll number already exists".to_string()),
                Some("isbn") => AppError::Conflict("ISBN already exists".to_string()),
                _ => AppError::Conflict(message.to_string()),
            };
        }
    }
    AppError::Database(err)
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value for {}", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::Lending(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    _ => StatusCode::CONFLICT,
                };
                (status, e.code(), e.to_string())
            }
            AppError::StoreBusy(msg) => {
                tracing::warn!("Store busy: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::StoreBusy,
                    "Library database is busy, try again".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Migration(e) => {
                tracing::error!("Migration error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Mail(msg) => (StatusCode::BAD_GATEWAY, ErrorCode::MailFailure, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
