//! Books repository, including the copy-count protocol.
//!
//! `decrease_available_copies` and `increase_available_copies` are the only
//! borrow-related writers of `available_copies`. Both run a single conditional
//! UPDATE on the caller's transaction, so the invariant is checked against the
//! row as it is at write time, never against an earlier read.

use sqlx::{PgConnection, Pool, Postgres};

use super::map_constraint_error;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFiles, BookQuery, CreateBook},
        Pagination,
    },
};

const BOOK_SELECT: &str = r#"
    SELECT b.id, b.name, b.short_details, b.author, b.about, b.category_id,
           c.name AS category_name, b.format, b.total_copies, b.available_copies,
           b.isbn, b.publication_year, b.book_cover_url, b.pdf_file_url,
           b.audio_file_url, b.created_at, b.updated_at
    FROM books b
    JOIN categories c ON c.id = b.category_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get book by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = $1", BOOK_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ID and hold its row lock until the transaction ends
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = $1 FOR UPDATE OF b", BOOK_SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// ID of the book carrying this ISBN, if any
    pub async fn find_id_by_isbn(&self, conn: &mut PgConnection, isbn: &str) -> AppResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    /// List books with optional category / availability filters
    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);

        let mut conditions = Vec::new();
        if query.category_id.is_some() {
            conditions.push("b.category_id = $1".to_string());
        }
        if query.available == Some(true) {
            conditions.push("b.available_copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM books b {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(category_id) = query.category_id {
            count_builder = count_builder.bind(category_id);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY b.name, b.id LIMIT {} OFFSET {}",
            BOOK_SELECT,
            where_clause,
            pagination.per_page,
            pagination.offset()
        );
        let mut builder = sqlx::query_as::<_, Book>(&select_q);
        if let Some(category_id) = query.category_id {
            builder = builder.bind(category_id);
        }
        let books = builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Case-insensitive search in name, author and ISBN
    pub async fn search(&self, term: &str, pagination: Pagination) -> AppResult<(Vec<Book>, i64)> {
        let pattern = format!("%{}%", term.trim());
        let filter = "WHERE b.name ILIKE $1 OR b.author ILIKE $1 OR b.isbn ILIKE $1";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books b {}", filter))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            "{} {} ORDER BY b.name, b.id LIMIT $2 OFFSET $3",
            BOOK_SELECT, filter
        ))
        .bind(&pattern)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Most borrowed books first
    pub async fn popular(&self, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            r#"{}
            ORDER BY (SELECT COUNT(*) FROM borrows br WHERE br.book_id = b.id) DESC, b.id
            LIMIT $1"#,
            BOOK_SELECT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Most recently added books first
    pub async fn newest(&self, limit: i64) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "{} ORDER BY b.created_at DESC, b.id DESC LIMIT $1",
            BOOK_SELECT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Insert a book, returns its ID
    pub async fn create(&self, data: &CreateBook, files: &BookFiles) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO books (
                name, short_details, author, about, category_id, format,
                total_copies, available_copies, isbn, publication_year,
                book_cover_url, pdf_file_url, audio_file_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&data.name)
        .bind(&data.short_details)
        .bind(&data.author)
        .bind(&data.about)
        .bind(data.category_id)
        .bind(data.format)
        .bind(data.total_copies)
        .bind(data.available_copies())
        .bind(&data.isbn)
        .bind(data.publication_year)
        .bind(&files.book_cover_url)
        .bind(&files.pdf_file_url)
        .bind(&files.audio_file_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "A book with this ISBN already exists"))?;

        Ok(id)
    }

    /// Persist every editable column of a locked book
    pub async fn update(&self, conn: &mut PgConnection, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                name = $2, short_details = $3, author = $4, about = $5,
                category_id = $6, format = $7, total_copies = $8,
                available_copies = $9, isbn = $10, publication_year = $11,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(book.id)
        .bind(&book.name)
        .bind(&book.short_details)
        .bind(&book.author)
        .bind(&book.about)
        .bind(book.category_id)
        .bind(book.format)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(&book.isbn)
        .bind(book.publication_year)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_constraint_error(e, "A book with this ISBN already exists"))?;

        Ok(())
    }

    /// Administrative overwrite of the available count (row must be locked)
    pub async fn set_available_copies(
        &self,
        conn: &mut PgConnection,
        id: i64,
        available_copies: i32,
    ) -> AppResult<()> {
        sqlx::query("UPDATE books SET available_copies = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(available_copies)
            .execute(&mut *conn)
            .await
            .map_err(|e| map_constraint_error(e, "Conflicting book update"))?;
        Ok(())
    }

    /// Delete a book together with its (returned) borrow history
    pub async fn delete(&self, conn: &mut PgConnection, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM borrows WHERE book_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // COPY-COUNT PROTOCOL
    // =========================================================================

    /// Take one copy off the shelf. Returns the new available count.
    pub async fn decrease_available_copies(&self, conn: &mut PgConnection, id: i64) -> AppResult<i32> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(available) = updated {
            return Ok(available);
        }

        if self.exists(conn, id).await? {
            Err(AppError::BusinessRule(
                "No available copies to borrow".to_string(),
            ))
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", id)))
        }
    }

    /// Put one copy back on the shelf. Returns the new available count.
    ///
    /// Hitting the ceiling means a copy came back that was never lent out.
    pub async fn increase_available_copies(&self, conn: &mut PgConnection, id: i64) -> AppResult<i32> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1 AND available_copies < total_copies
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(available) = updated {
            return Ok(available);
        }

        if self.exists(conn, id).await? {
            Err(AppError::Corruption(format!(
                "Cannot increase available copies beyond total copies for book {}",
                id
            )))
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", id)))
        }
    }

    async fn exists(&self, conn: &mut PgConnection, id: i64) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }
}
