//! Book model and related types

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::error::AppError;

/// Categories accepted by the catalog
pub const CATEGORIES: &[&str] = &[
    "Fiction",
    "Non-Fiction",
    "Science",
    "Technology",
    "History",
    "Biography",
    "Self-Help",
    "Reference",
];

/// Book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub category: String,
    pub isbn: String,
    pub publication_year: i32,
    pub description: Option<String>,
    /// False while an open loan references the book
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book with its current holder, if issued
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub current_holder: Option<BookHolder>,
}

/// Holder of an issued book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookHolder {
    pub loan_id: i64,
    pub user_id: i64,
    pub username: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Create or replace book details
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 2, message = "Title must be at least 2 characters"))]
    pub title: String,
    #[validate(length(min = 2, message = "Author must be at least 2 characters"))]
    pub author: String,
    #[validate(custom(function = "validate_category"))]
    pub category: String,
    #[validate(custom(function = "validate_isbn"))]
    pub isbn: String,
    #[validate(range(min = 1900, message = "Publication year must be 1900 or later"))]
    pub publication_year: i32,
    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,
}

impl BookInput {
    /// Field validation plus the rules that depend on the current date
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        let current_year = Utc::now().year();
        if self.publication_year > current_year {
            return Err(AppError::Validation(format!(
                "Publication year must be between 1900 and {}",
                current_year
            )));
        }
        Ok(())
    }

    /// ISBN as stored: digits only
    pub fn normalized_isbn(&self) -> String {
        normalize_isbn(&self.isbn)
    }
}

/// Conjunctive catalog filter; absent fields match everything
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct BookFilter {
    pub category: Option<String>,
    pub available: Option<bool>,
    pub publication_year: Option<i32>,
}

/// Free-text catalog search
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Substring matched against title, author, ISBN and category
    pub q: String,
}

/// Strip the separators people type into ISBNs
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect()
}

fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    let digits = normalize_isbn(isbn);
    if (digits.len() == 10 || digits.len() == 13) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("isbn");
        err.message = Some("Invalid ISBN format: expected 10 or 13 digits".into());
        Err(err)
    }
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        let mut err = ValidationError::new("category");
        err.message = Some(format!("Category must be one of: {}", CATEGORIES.join(", ")).into());
        Err(err)
    }
}
