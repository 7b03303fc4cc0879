//! Repository layer for database operations

pub mod books;
pub mod borrows;
pub mod categories;
pub mod notifications;
pub mod users;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::{AppError, AppResult};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub categories: categories::CategoriesRepository,
    pub users: users::UsersRepository,
    pub borrows: borrows::BorrowsRepository,
    pub notifications: notifications::NotificationsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Start a read-committed transaction
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Round-trip to the database (readiness probe)
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Translate constraint violations into domain errors, pass everything else through
pub(crate) fn map_constraint_error(e: sqlx::Error, conflict_message: &str) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return AppError::Conflict(conflict_message.to_string());
        }
        if db.is_check_violation() {
            return AppError::BusinessRule(format!(
                "Constraint violated: {}",
                db.constraint().unwrap_or("check")
            ));
        }
        if db.is_foreign_key_violation() {
            return AppError::NotFound(format!(
                "Referenced record does not exist ({})",
                db.constraint().unwrap_or("foreign key")
            ));
        }
    }
    AppError::Database(e)
}
