//! Books repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    error::{unique_violation, AppError, AppResult, Entity, LendingError},
    models::book::{Book, BookFilter, BookHolder, BookInput},
};

use super::{contains_pattern, search_text};

#[derive(Clone)]
pub struct BooksRepository {
    pool: SqlitePool,
}

impl BooksRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Add a book to the catalog; new books are available
    pub async fn create(&self, input: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let isbn = input.normalized_isbn();
        let mut tx = self.pool.begin().await?;

        ensure_isbn_free(&mut tx, &isbn, None).await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, category, isbn, publication_year, description,
                               available, created_at, updated_at, search_text)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(input.author.trim())
        .bind(&input.category)
        .bind(&isbn)
        .bind(input.publication_year)
        .bind(&input.description)
        .bind(now)
        .bind(now)
        .bind(book_search_text(input, &isbn))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| isbn_conflict(e, &isbn))?;

        tx.commit().await?;
        Ok(book)
    }

    /// Get book by ID
    pub async fn get(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LendingError::BookNotFound(id).into())
    }

    /// Whole catalog, by title
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Books not currently issued, by title
    pub async fn available(&self) -> AppResult<Vec<Book>> {
        let books =
            sqlx::query_as::<_, Book>("SELECT * FROM books WHERE available = 1 ORDER BY title, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(books)
    }

    /// Replace a book's details.
    ///
    /// The ISBN is checked against every other book inside the same
    /// transaction as the write.
    pub async fn update(&self, id: i64, input: &BookInput, now: DateTime<Utc>) -> AppResult<Book> {
        let isbn = input.normalized_isbn();
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(LendingError::BookNotFound(id).into());
        }

        ensure_isbn_free(&mut tx, &isbn, Some(id)).await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = ?, author = ?, category = ?, isbn = ?, publication_year = ?,
                description = ?, updated_at = ?, search_text = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(input.author.trim())
        .bind(&input.category)
        .bind(&isbn)
        .bind(input.publication_year)
        .bind(&input.description)
        .bind(now)
        .bind(book_search_text(input, &isbn))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| isbn_conflict(e, &isbn))?;

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book and its closed loan history in one transaction.
    ///
    /// Refused while the book is issued.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(LendingError::BookNotFound(id).into());
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM issued_books WHERE book_id = ? AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if open > 0 {
            return Err(LendingError::HasActiveLoans {
                entity: Entity::Book,
                id,
            }
            .into());
        }

        sqlx::query("DELETE FROM issued_books WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Case-insensitive substring search over title, author, ISBN and category
    pub async fn search(&self, query: &str) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE search_text LIKE ? ESCAPE '\'
            ORDER BY title, id
            "#,
        )
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Conjunctive filter; unset fields match everything
    pub async fn filter(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM books WHERE 1 = 1");

        if let Some(ref category) = filter.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(available) = filter.available {
            builder.push(" AND available = ").push_bind(available);
        }
        if let Some(year) = filter.publication_year {
            builder.push(" AND publication_year = ").push_bind(year);
        }
        builder.push(" ORDER BY title, id");

        let books = builder
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Borrower of the book's open loan, if any
    pub async fn holder(&self, book_id: i64) -> AppResult<Option<BookHolder>> {
        let holder = sqlx::query_as::<_, BookHolder>(
            r#"
            SELECT ib.id AS loan_id, u.id AS user_id, u.username, ib.issue_date, ib.due_date
            FROM issued_books ib
            JOIN users u ON u.id = ib.user_id
            WHERE ib.book_id = ? AND ib.return_date IS NULL
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holder)
    }
}

async fn ensure_isbn_free(
    conn: &mut SqliteConnection,
    isbn: &str,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = ? AND id != COALESCE(?, -1))",
    )
    .bind(isbn)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        return Err(LendingError::DuplicateIsbn(isbn.to_string()).into());
    }
    Ok(())
}

fn book_search_text(input: &BookInput, isbn: &str) -> String {
    search_text(&[
        input.title.trim(),
        input.author.trim(),
        isbn,
        &input.category,
    ])
}

fn isbn_conflict(err: sqlx::Error, isbn: &str) -> AppError {
    match unique_violation(err) {
        AppError::Conflict(_) => LendingError::DuplicateIsbn(isbn.to_string()).into(),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::repository::{now, testing};

    #[tokio::test]
    async fn test_create_normalizes_isbn() {
        let repo = testing::repository().await;
        let book = repo
            .books
            .create(&testing::book_input("The Dispossessed", "978-0-06-051275-0"), now())
            .await
            .unwrap();

        assert_eq!(book.isbn, "9780060512750");
        assert!(book.available);

        let err = repo
            .books
            .create(&testing::book_input("Copy", "978 0 06 051275 0"), now())
            .await
            .unwrap_err();
        assert_eq!(
            err.lending(),
            Some(&LendingError::DuplicateIsbn("9780060512750".to_string()))
        );
    }

    #[tokio::test]
    async fn test_update_rejects_duplicate_isbn() {
        let repo = testing::repository().await;
        let first = testing::add_book(&repo, "First", "1111111111").await;
        let second = testing::add_book(&repo, "Second", "2222222222").await;
        let before_first = repo.books.get(first).await.unwrap();
        let before_second = repo.books.get(second).await.unwrap();

        let err = repo
            .books
            .update(second, &testing::book_input("Second", "1111111111"), now())
            .await
            .unwrap_err();
        assert_eq!(
            err.lending(),
            Some(&LendingError::DuplicateIsbn("1111111111".to_string()))
        );
        assert_eq!(repo.books.get(first).await.unwrap(), before_first);
        assert_eq!(repo.books.get(second).await.unwrap(), before_second);

        // Keeping its own ISBN is not a conflict
        let updated = repo
            .books
            .update(second, &testing::book_input("Second Edition", "2222222222"), now())
            .await
            .unwrap();
        assert_eq!(updated.title, "Second Edition");
    }

    #[tokio::test]
    async fn test_search_and_filter() {
        let repo = testing::repository().await;
        testing::add_book(&repo, "The Left Hand of Darkness", "1111111111").await;
        testing::add_book(&repo, "A Wizard of Earthsea", "2222222222").await;
        let mut science = testing::book_input("Cosmos", "3333333333");
        science.category = "Science".to_string();
        science.author = "Carl Sagan".to_string();
        science.publication_year = 1980;
        repo.books.create(&science, now()).await.unwrap();

        let titles = |books: Vec<Book>| books.into_iter().map(|b| b.title).collect::<Vec<_>>();

        assert_eq!(
            titles(repo.books.search("le guin").await.unwrap()),
            vec!["A Wizard of Earthsea", "The Left Hand of Darkness"]
        );
        assert_eq!(titles(repo.books.search("SCIENCE").await.unwrap()), vec!["Cosmos"]);
        assert_eq!(titles(repo.books.search("33333").await.unwrap()), vec!["Cosmos"]);

        let filter = BookFilter {
            category: Some("Fiction".to_string()),
            available: Some(true),
            publication_year: Some(1969),
        };
        assert_eq!(repo.books.filter(&filter).await.unwrap().len(), 2);

        let filter = BookFilter {
            publication_year: Some(1980),
            ..BookFilter::default()
        };
        assert_eq!(titles(repo.books.filter(&filter).await.unwrap()), vec!["Cosmos"]);
        assert_eq!(repo.books.filter(&BookFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let repo = testing::repository().await;
        let mut input = testing::book_input("Über Wasser", "1111111111");
        input.author = "Ødegård Brænne".to_string();
        let id = repo.books.create(&input, now()).await.unwrap().id;
        testing::add_book(&repo, "Unrelated", "2222222222").await;

        for query in ["Über", "über", "ÜBER WASSER", "ødegård", "BRÆNNE"] {
            let found = repo.books.search(query).await.unwrap();
            assert_eq!(found.len(), 1, "query {:?}", query);
            assert_eq!(found[0].id, id);
        }

        // Search text follows updates
        let renamed = testing::book_input("Äpfel und Birnen", "1111111111");
        repo.books.update(id, &renamed, now()).await.unwrap();
        assert!(repo.books.search("über").await.unwrap().is_empty());
        assert_eq!(repo.books.search("ÄPFEL").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_holder_and_delete_guard() {
        let repo = testing::repository().await;
        let book = testing::add_book(&repo, "Book", "1111111111").await;
        let user = testing::add_student(&repo, "alice").await;
        assert!(repo.books.holder(book).await.unwrap().is_none());

        let now = now();
        let loan = testing::add_loan(&repo, book, user.id, now, 0, now + Duration::days(7)).await;
        let holder = repo.books.holder(book).await.unwrap().unwrap();
        assert_eq!(holder.loan_id, loan);
        assert_eq!(holder.username, "alice");
        assert!(repo.books.available().await.unwrap().is_empty());

        let err = repo.books.delete(book).await.unwrap_err();
        assert_eq!(
            err.lending(),
            Some(&LendingError::HasActiveLoans {
                entity: Entity::Book,
                id: book
            })
        );
        assert!(!repo.books.get(book).await.unwrap().available);

        repo.loans.return_loan(loan, now).await.unwrap();
        repo.books.delete(book).await.unwrap();
        assert_eq!(
            repo.books.get(book).await.unwrap_err().lending(),
            Some(&LendingError::BookNotFound(book))
        );
    }
}
