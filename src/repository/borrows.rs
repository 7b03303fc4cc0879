//! Borrows repository for database operations

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{Borrow, BorrowQuery, BorrowRow},
        Pagination,
    },
};

const BORROW_COLUMNS: &str = r#"
    br.id, br.user_id, br.book_id, br.borrow_date, br.due_date, br.return_date,
    br.extension_count, br.status, br.created_at, br.updated_at
"#;

const BORROW_SELECT: &str = r#"
    SELECT br.id, br.user_id, br.book_id, br.borrow_date, br.due_date, br.return_date,
           br.extension_count, br.status, br.created_at, br.updated_at,
           b.name AS book_name, u.name AS user_name
    FROM borrows br
    JOIN books b ON b.id = br.book_id
    JOIN users u ON u.id = br.user_id
"#;

/// SQL condition matching late borrows, whether or not the sweep has flagged them yet.
/// `param` is the placeholder index bound to today's date; the table alias must be `br`.
pub(crate) fn overdue_predicate(param: usize) -> String {
    format!(
        "(br.status = 'OVERDUE' OR (br.status = 'ACTIVE' AND br.due_date < ${}))",
        param
    )
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Get borrow by ID with book and user names
    pub async fn get_by_id(&self, id: i64) -> AppResult<BorrowRow> {
        sqlx::query_as::<_, BorrowRow>(&format!("{} WHERE br.id = $1", BORROW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Same as `get_by_id`, inside the caller's transaction
    pub async fn get_row(&self, conn: &mut PgConnection, id: i64) -> AppResult<BorrowRow> {
        sqlx::query_as::<_, BorrowRow>(&format!("{} WHERE br.id = $1", BORROW_SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Lock a borrow row until the transaction ends
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i64) -> AppResult<Borrow> {
        sqlx::query_as::<_, Borrow>(&format!(
            "SELECT {} FROM borrows br WHERE br.id = $1 FOR UPDATE",
            BORROW_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", id)))
    }

    /// Whether the user still holds an unreturned copy of this book
    pub async fn has_active_borrow(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        book_id: i64,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrows
                WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Copies of a book that are lent out and not yet returned
    pub async fn unreturned_count_for_book(&self, conn: &mut PgConnection, book_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE book_id = $1 AND return_date IS NULL",
        )
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// List borrows; every filter given is combined with AND
    pub async fn list(&self, query: &BorrowQuery, today: NaiveDate) -> AppResult<(Vec<BorrowRow>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.user_id.is_some() {
            conditions.push(format!("br.user_id = ${}", idx));
            idx += 1;
        }
        if query.book_id.is_some() {
            conditions.push(format!("br.book_id = ${}", idx));
            idx += 1;
        }
        match query.active {
            Some(true) => conditions.push("br.return_date IS NULL".to_string()),
            Some(false) => conditions.push("br.return_date IS NOT NULL".to_string()),
            None => {}
        }
        match query.overdue {
            Some(true) => conditions.push(overdue_predicate(idx)),
            Some(false) => conditions.push(format!("NOT {}", overdue_predicate(idx))),
            None => {}
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!(
            "SELECT COUNT(*) FROM borrows br {}",
            where_clause
        );
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(user_id) = query.user_id { count_builder = count_builder.bind(user_id); }
        if let Some(book_id) = query.book_id { count_builder = count_builder.bind(book_id); }
        if query.overdue.is_some() { count_builder = count_builder.bind(today); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY br.borrow_date DESC, br.id DESC LIMIT {} OFFSET {}",
            BORROW_SELECT,
            where_clause,
            pagination.per_page,
            pagination.offset()
        );
        let mut builder = sqlx::query_as::<_, BorrowRow>(&select_q);
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }
        if let Some(book_id) = query.book_id { builder = builder.bind(book_id); }
        if query.overdue.is_some() { builder = builder.bind(today); }
        let rows = builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    /// Every late borrow, oldest due date first
    pub async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<BorrowRow>> {
        let rows = sqlx::query_as::<_, BorrowRow>(&format!(
            "{} WHERE {} ORDER BY br.due_date, br.id",
            BORROW_SELECT,
            overdue_predicate(1)
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Borrowing history of a user, most recent first
    pub async fn list_by_user(
        &self,
        user_id: i64,
        active: Option<bool>,
        pagination: Pagination,
    ) -> AppResult<(Vec<BorrowRow>, i64)> {
        let filter = match active {
            Some(true) => "AND br.return_date IS NULL",
            Some(false) => "AND br.return_date IS NOT NULL",
            None => "",
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM borrows br WHERE br.user_id = $1 {}",
            filter
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BorrowRow>(&format!(
            "{} WHERE br.user_id = $1 {} ORDER BY br.borrow_date DESC, br.id DESC LIMIT $2 OFFSET $3",
            BORROW_SELECT, filter
        ))
        .bind(user_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows, total))
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Record a new ACTIVE borrow, returns its ID
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        book_id: i64,
        borrow_date: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO borrows (user_id, book_id, borrow_date, due_date, extension_count, status)
            VALUES ($1, $2, $3, $4, 0, 'ACTIVE')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(borrow_date)
        .bind(due_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    pub async fn mark_returned(&self, conn: &mut PgConnection, id: i64, return_date: NaiveDate) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE borrows
            SET return_date = $2, status = 'RETURNED', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(return_date)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn extend(&self, conn: &mut PgConnection, id: i64, due_date: NaiveDate) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE borrows
            SET due_date = $2, extension_count = extension_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(due_date)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Flag lapsed ACTIVE borrows as OVERDUE. Returns the number of rows changed.
    pub async fn sweep_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE borrows
            SET status = 'OVERDUE', updated_at = NOW()
            WHERE status = 'ACTIVE' AND due_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
