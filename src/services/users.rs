//! User directory service

use chrono::Utc;
use sqlx::PgConnection;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, UpdateUser, User, UserDetails, UserQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// User with current, overdue and lifetime borrow counters
    pub async fn get_details(&self, id: i64) -> AppResult<UserDetails> {
        self.repository
            .users
            .get_details(id, Utc::now().date_naive())
            .await
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.list(query).await
    }

    pub async fn create(&self, data: CreateUser) -> AppResult<User> {
        data.validate()?;

        if self.repository.users.moodle_id_exists(&data.moodle_id, None).await? {
            return Err(AppError::Conflict(format!(
                "User with Moodle ID {} already exists",
                data.moodle_id
            )));
        }
        if self.repository.users.email_exists(&data.email, None).await? {
            return Err(AppError::Conflict(format!(
                "User with email {} already exists",
                data.email
            )));
        }

        let user = self.repository.users.create(&data).await?;
        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update(&self, id: i64, data: UpdateUser) -> AppResult<User> {
        data.validate()?;
        self.repository.users.get_by_id(id).await?;

        if let Some(ref moodle_id) = data.moodle_id {
            if self.repository.users.moodle_id_exists(moodle_id, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "User with Moodle ID {} already exists",
                    moodle_id
                )));
            }
        }
        if let Some(ref email) = data.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "User with email {} already exists",
                    email
                )));
            }
        }

        self.repository.users.update(id, &data).await
    }

    pub async fn deactivate(&self, id: i64) -> AppResult<User> {
        let data = UpdateUser {
            is_active: Some(false),
            ..Default::default()
        };
        let user = self.repository.users.update(id, &data).await?;
        tracing::info!(user_id = id, "User deactivated");
        Ok(user)
    }

    /// Number of borrows currently in ACTIVE status
    pub async fn get_active_borrow_count(&self, id: i64) -> AppResult<i64> {
        self.repository.users.get_by_id(id).await?;
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.users.active_borrow_count(&mut *conn, id).await
    }

    // Transactional variants used by the borrow ledger

    pub async fn lock_user(&self, conn: &mut PgConnection, id: i64) -> AppResult<User> {
        self.repository.users.lock_by_id(conn, id).await
    }

    pub async fn active_borrow_count_in(&self, conn: &mut PgConnection, id: i64) -> AppResult<i64> {
        self.repository.users.active_borrow_count(conn, id).await
    }
}
