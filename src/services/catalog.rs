//! Catalog management service: books, categories and the copy-count protocol

use std::sync::Arc;

use sqlx::PgConnection;
use validator::Validate;

use super::notifications::{dispatch_new_book, NotificationSink};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{check_lent_copies, validate_copies, Book, BookFiles, BookQuery, CreateBook, UpdateBook},
        category::{Category, CreateCategory},
        Pagination,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    notifier: Arc<dyn NotificationSink>,
    admin_recipient: String,
}

impl CatalogService {
    pub fn new(
        repository: Repository,
        notifier: Arc<dyn NotificationSink>,
        admin_recipient: String,
    ) -> Self {
        Self {
            repository,
            notifier,
            admin_recipient,
        }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn is_available(&self, id: i64) -> AppResult<bool> {
        Ok(self.repository.books.get_by_id(id).await?.is_available())
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.list(query).await
    }

    pub async fn search_books(&self, term: &str, pagination: Pagination) -> AppResult<(Vec<Book>, i64)> {
        if term.trim().is_empty() {
            return Err(AppError::BadRequest("Search term must not be empty".to_string()));
        }
        self.repository.books.search(term, pagination).await
    }

    /// Books with at least one copy on the shelf
    pub async fn available_books(&self, pagination: Pagination) -> AppResult<(Vec<Book>, i64)> {
        let query = BookQuery {
            available: Some(true),
            page: Some(pagination.page),
            per_page: Some(pagination.per_page),
            ..Default::default()
        };
        self.repository.books.list(&query).await
    }

    pub async fn popular_books(&self, limit: i64) -> AppResult<Vec<Book>> {
        self.repository.books.popular(limit).await
    }

    /// Recommended books mirror the popular list
    pub async fn recommended_books(&self, limit: i64) -> AppResult<Vec<Book>> {
        self.popular_books(limit).await
    }

    /// Books of one category; unlike the filtered list, an unknown category is NotFound
    pub async fn books_in_category(
        &self,
        category_id: i64,
        pagination: Pagination,
    ) -> AppResult<(Vec<Book>, i64)> {
        self.repository.categories.get_by_id(category_id).await?;
        let query = BookQuery {
            category_id: Some(category_id),
            page: Some(pagination.page),
            per_page: Some(pagination.per_page),
            ..Default::default()
        };
        self.repository.books.list(&query).await
    }

    pub async fn new_books(&self, limit: i64) -> AppResult<Vec<Book>> {
        self.repository.books.newest(limit).await
    }

    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        self.create_book_with_files(data, BookFiles::default()).await
    }

    /// Checks a new book must pass before anything is stored for it:
    /// field validation, unique ISBN, existing category and the copy invariant.
    pub async fn check_new_book(&self, data: &CreateBook) -> AppResult<()> {
        data.validate()?;

        let mut conn = self.repository.pool.acquire().await?;
        if let Some(ref isbn) = data.isbn {
            if self.repository.books.find_id_by_isbn(&mut *conn, isbn).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }
        self.repository.categories.get_in(&mut *conn, data.category_id).await?;

        validate_copies(data.total_copies, data.available_copies())
    }

    /// Create a book, then notify the library admin once the row is committed
    pub async fn create_book_with_files(&self, data: CreateBook, files: BookFiles) -> AppResult<Book> {
        self.check_new_book(&data).await?;

        let id = self.repository.books.create(&data, &files).await?;
        let book = self.repository.books.get_by_id(id).await?;
        tracing::info!(book_id = book.id, title = %book.name, "Book created");

        dispatch_new_book(self.notifier.as_ref(), &self.admin_recipient, &book.name).await;

        Ok(book)
    }

    pub async fn update_book(&self, id: i64, data: UpdateBook) -> AppResult<Book> {
        data.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut book = self.repository.books.lock_by_id(&mut *tx, id).await?;

        if let Some(ref isbn) = data.isbn {
            if book.isbn.as_deref() != Some(isbn.as_str()) {
                if let Some(other) = self.repository.books.find_id_by_isbn(&mut *tx, isbn).await? {
                    if other != id {
                        return Err(AppError::Conflict(format!(
                            "A book with ISBN {} already exists",
                            isbn
                        )));
                    }
                }
            }
        }
        if let Some(category_id) = data.category_id {
            if category_id != book.category_id {
                self.repository.categories.get_in(&mut *tx, category_id).await?;
            }
        }

        data.apply(&mut book)?;
        if data.total_copies.is_some() || data.available_copies.is_some() {
            let lent = self
                .repository
                .borrows
                .unreturned_count_for_book(&mut *tx, id)
                .await?;
            check_lent_copies(book.total_copies, book.available_copies, lent)?;
        }

        self.repository.books.update(&mut *tx, &book).await?;
        tx.commit().await?;

        self.repository.books.get_by_id(id).await
    }

    /// Administrative overwrite of the available count
    pub async fn update_availability(&self, id: i64, available_copies: i32) -> AppResult<Book> {
        let mut tx = self.repository.begin().await?;
        let book = self.repository.books.lock_by_id(&mut *tx, id).await?;

        validate_copies(book.total_copies, available_copies)?;
        self.repository
            .books
            .set_available_copies(&mut *tx, id, available_copies)
            .await?;
        tx.commit().await?;

        tracing::info!(
            book_id = id,
            from = book.available_copies,
            to = available_copies,
            "Available copies edited"
        );
        self.repository.books.get_by_id(id).await
    }

    /// Delete a book; refused while any copy is lent out
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let mut tx = self.repository.begin().await?;
        let book = self.repository.books.lock_by_id(&mut *tx, id).await?;

        if book.borrowed_copies() > 0 {
            return Err(AppError::BusinessRule(format!(
                "Cannot delete book {}: {} copies are currently borrowed",
                id,
                book.borrowed_copies()
            )));
        }

        self.repository.books.delete(&mut *tx, id).await?;
        tx.commit().await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    // =========================================================================
    // COPY-COUNT PROTOCOL (used by the borrow ledger)
    // =========================================================================

    /// Lock the book row for the rest of the caller's transaction
    pub async fn lock_book(&self, conn: &mut PgConnection, id: i64) -> AppResult<Book> {
        self.repository.books.lock_by_id(conn, id).await
    }

    pub async fn decrease_available_copies(&self, conn: &mut PgConnection, id: i64) -> AppResult<i32> {
        self.repository.books.decrease_available_copies(conn, id).await
    }

    pub async fn increase_available_copies(&self, conn: &mut PgConnection, id: i64) -> AppResult<i32> {
        self.repository.books.increase_available_copies(conn, id).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, data: CreateCategory) -> AppResult<Category> {
        data.validate()?;
        self.repository.categories.create(&data).await
    }
}
