//! Users repository for database operations

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use super::{borrows::overdue_predicate, map_constraint_error};
use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, UpdateUser, User, UserDetails, UserQuery},
        Pagination,
    },
};

const USER_COLUMNS: &str = r#"
    u.id, u.moodle_id, u.name, u.email, u.role, u.date_of_birth,
    u.address, u.is_active, u.created_at, u.updated_at
"#;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by ID, locking the row for the rest of the transaction.
    ///
    /// Serializes concurrent borrow requests of the same user so the limit and
    /// duplicate checks see each other's writes.
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u WHERE u.id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user with borrow counters
    pub async fn get_details(&self, id: i64, today: NaiveDate) -> AppResult<UserDetails> {
        sqlx::query_as::<_, UserDetails>(&format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM borrows br
                 WHERE br.user_id = u.id AND br.return_date IS NULL) AS current_borrow_count,
                (SELECT COUNT(*) FROM borrows br
                 WHERE br.user_id = u.id AND {}) AS overdue_count,
                (SELECT COUNT(*) FROM borrows br
                 WHERE br.user_id = u.id) AS total_borrow_count
            FROM users u
            WHERE u.id = $1
            "#,
            USER_COLUMNS,
            overdue_predicate(2)
        ))
        .bind(id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// List users with optional filters
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let pagination = Pagination::new(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.name.is_some() {
            conditions.push(format!(
                "(u.name ILIKE ${0} OR u.email ILIKE ${0} OR u.moodle_id ILIKE ${0})",
                idx
            ));
            idx += 1;
        }
        if query.role.is_some() {
            conditions.push(format!("u.role = ${}", idx));
            idx += 1;
        }
        if query.active.is_some() {
            conditions.push(format!("u.is_active = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let pattern = query.name.as_ref().map(|n| format!("%{}%", n.trim()));

        let count_q = format!("SELECT COUNT(*) FROM users u {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref p) = pattern { count_builder = count_builder.bind(p); }
        if let Some(role) = query.role { count_builder = count_builder.bind(role); }
        if let Some(active) = query.active { count_builder = count_builder.bind(active); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT {} FROM users u {} ORDER BY u.name, u.id LIMIT {} OFFSET {}",
            USER_COLUMNS,
            where_clause,
            pagination.per_page,
            pagination.offset()
        );
        let mut builder = sqlx::query_as::<_, User>(&select_q);
        if let Some(ref p) = pattern { builder = builder.bind(p); }
        if let Some(role) = query.role { builder = builder.bind(role); }
        if let Some(active) = query.active { builder = builder.bind(active); }
        let users = builder.fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    /// Check if a moodle id is already taken
    pub async fn moodle_id_exists(&self, moodle_id: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE moodle_id = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(moodle_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id IS DISTINCT FROM $2)",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a user
    pub async fn create(&self, data: &CreateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users AS u (moodle_id, name, email, role, date_of_birth, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&data.moodle_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(data.role.unwrap_or_default())
        .bind(data.date_of_birth)
        .bind(&data.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "Moodle ID or email already in use"))
    }

    /// Update a user; absent fields are left untouched
    pub async fn update(&self, id: i64, data: &UpdateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users AS u SET
                moodle_id = COALESCE($2, u.moodle_id),
                name = COALESCE($3, u.name),
                email = COALESCE($4, u.email),
                role = COALESCE($5, u.role),
                date_of_birth = COALESCE($6, u.date_of_birth),
                address = COALESCE($7, u.address),
                is_active = COALESCE($8, u.is_active),
                updated_at = NOW()
            WHERE u.id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&data.moodle_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(data.role)
        .bind(data.date_of_birth)
        .bind(&data.address)
        .bind(data.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_constraint_error(e, "Moodle ID or email already in use"))?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Number of borrows with stored status ACTIVE
    pub async fn active_borrow_count(&self, conn: &mut PgConnection, user_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status = 'ACTIVE'",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Number of overdue borrows, swept or not
    pub async fn overdue_borrow_count(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        today: NaiveDate,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM borrows br WHERE br.user_id = $1 AND {}",
            overdue_predicate(2)
        ))
        .bind(user_id)
        .bind(today)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}
