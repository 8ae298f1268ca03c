//! Catalog management service

use crate::{
    error::AppResult,
    models::book::{Book, BookDetails, BookFilter, BookInput},
    repository::{self, retry_on_busy, Repository},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Add a book after validating its fields
    pub async fn create_book(&self, input: &BookInput) -> AppResult<Book> {
        input.check()?;
        let now = repository::now();
        let books = &self.repository.books;
        let book = retry_on_busy(self.repository.retry, || books.create(input, now)).await?;

        tracing::info!(book_id = book.id, isbn = %book.isbn, "book added");
        Ok(book)
    }

    /// Replace a book's details; the ISBN must stay unique
    pub async fn update_book(&self, id: i64, input: &BookInput) -> AppResult<Book> {
        input.check()?;
        let now = repository::now();
        let books = &self.repository.books;
        let book = retry_on_busy(self.repository.retry, || books.update(id, input, now)).await?;

        tracing::info!(book_id = id, "book updated");
        Ok(book)
    }

    /// Remove a book that is not issued, with its loan history
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let books = &self.repository.books;
        retry_on_busy(self.repository.retry, || books.delete(id)).await?;
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get(id).await
    }

    /// Book with the borrower currently holding it
    pub async fn book_details(&self, id: i64) -> AppResult<BookDetails> {
        let book = self.repository.books.get(id).await?;
        let current_holder = if book.available {
            None
        } else {
            self.repository.books.holder(id).await?
        };
        Ok(BookDetails {
            book,
            current_holder,
        })
    }

    /// Catalog listing; any set filter field narrows the result
    pub async fn list_books(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        if filter.category.is_none()
            && filter.available.is_none()
            && filter.publication_year.is_none()
        {
            return self.repository.books.list().await;
        }
        self.repository.books.filter(filter).await
    }

    pub async fn available_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.available().await
    }

    pub async fn search_books(&self, query: &str) -> AppResult<Vec<Book>> {
        if query.trim().is_empty() {
            return self.repository.books.list().await;
        }
        self.repository.books.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, repository::testing};

    #[tokio::test]
    async fn test_create_validates_input() {
        let service = CatalogService::new(testing::repository().await);

        let mut bad = testing::book_input("Dune", "978-0-441-17271-9");
        bad.category = "Poetry".to_string();
        assert!(matches!(service.create_book(&bad).await, Err(AppError::Validation(_))));

        let book = service
            .create_book(&testing::book_input("Dune", "978-0-441-17271-9"))
            .await
            .unwrap();
        let details = service.book_details(book.id).await.unwrap();
        assert!(details.current_holder.is_none());
        assert_eq!(service.search_books("  ").await.unwrap().len(), 1);
    }
}
