//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use shelfkeeper_server::{
    config::{AppConfig, DatabaseConfig},
    models::{
        book::{Book, BookInput},
        user::{CreateUser, Role, User},
    },
    repository::Repository,
    services::{email::MailTransport, Services},
    AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Mail transport that keeps every message in memory
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html_body.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub config: AppConfig,
    pub repository: Repository,
    pub services: Services,
    pub mailer: Arc<RecordingMailer>,
}

pub async fn spawn() -> TestApp {
    let config = AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            retry_delay_ms: 1,
            ..DatabaseConfig::default()
        },
        ..AppConfig::default()
    };
    let repository = Repository::connect(&config.database)
        .await
        .expect("Failed to open test database");
    let mailer = Arc::new(RecordingMailer::default());
    let services = Services::new(repository.clone(), &config, mailer.clone());

    TestApp {
        config,
        repository,
        services,
        mailer,
    }
}

pub const PASSWORD: &str = "Passw0rd!";

impl TestApp {
    pub async fn student(&self, username: &str) -> User {
        self.services
            .users
            .register(&CreateUser {
                username: username.to_string(),
                email: format!("{}@example.org", username),
                password: PASSWORD.to_string(),
                role: Role::Student,
                roll_number: Some(format!("R-{}", username)),
            })
            .await
            .expect("Failed to register student")
    }

    pub async fn admin(&self, username: &str) -> User {
        self.services
            .users
            .register(&CreateUser {
                username: username.to_string(),
                email: format!("{}@library.local", username),
                password: PASSWORD.to_string(),
                role: Role::Admin,
                roll_number: None,
            })
            .await
            .expect("Failed to register admin")
    }

    pub async fn book(&self, title: &str, isbn: &str) -> Book {
        self.services
            .catalog
            .create_book(&book_input(title, isbn))
            .await
            .expect("Failed to create book")
    }

    /// Loan with a due date relative to `now`, bypassing the period rules
    pub async fn loan_due(
        &self,
        book_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
        due_in: Duration,
    ) -> i64 {
        self.repository
            .loans
            .issue(book_id, user_id, now - Duration::days(40), now + due_in)
            .await
            .expect("Failed to issue book")
            .id
    }

    pub async fn open_loan_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM issued_books WHERE return_date IS NULL")
            .fetch_one(&self.repository.pool)
            .await
            .unwrap()
    }

    /// Rows in (users, books, issued_books)
    pub async fn row_counts(&self) -> (i64, i64, i64) {
        (
            self.count_rows("users").await,
            self.count_rows("books").await,
            self.count_rows("issued_books").await,
        )
    }

    async fn count_rows(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.repository.pool)
            .await
            .unwrap()
    }

    /// Every column of every row, ordered by id
    pub async fn snapshot(&self) -> Snapshot {
        let pool = &self.repository.pool;
        Snapshot {
            users: sqlx::query_as(
                "SELECT id, username, email, password_hash, role, roll_number, created_at, \
                 search_text FROM users ORDER BY id",
            )
            .fetch_all(pool)
            .await
            .unwrap(),
            books: sqlx::query_as(
                "SELECT id, title, author, category, isbn, publication_year, description, \
                 available, created_at, updated_at, search_text FROM books ORDER BY id",
            )
            .fetch_all(pool)
            .await
            .unwrap(),
            loans: sqlx::query_as(
                "SELECT id, book_id, user_id, issue_date, due_date, return_date \
                 FROM issued_books ORDER BY id",
            )
            .fetch_all(pool)
            .await
            .unwrap(),
        }
    }
}

type UserRecord = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);
type BookRecord = (
    i64,
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    bool,
    String,
    String,
    String,
);
type LoanRecord = (i64, i64, i64, String, String, Option<String>);

/// Raw contents of the three tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub users: Vec<UserRecord>,
    pub books: Vec<BookRecord>,
    pub loans: Vec<LoanRecord>,
}

pub fn book_input(title: &str, isbn: &str) -> BookInput {
    BookInput {
        title: title.to_string(),
        author: "Octavia E. Butler".to_string(),
        category: "Fiction".to_string(),
        isbn: isbn.to_string(),
        publication_year: 1993,
        description: Some("A novel".to_string()),
    }
}
