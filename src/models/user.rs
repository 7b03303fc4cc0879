//! User model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::UserRole;

/// User record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    /// External identity (Moodle account), unique
    pub moodle_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User with borrow counters
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    /// Borrows not yet returned
    pub current_borrow_count: i64,
    /// Unreturned borrows past their due date
    pub overdue_count: i64,
    /// Every borrow ever recorded for the user
    pub total_borrow_count: i64,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    /// Search in name, email or moodle id
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 64, message = "Moodle ID is required"))]
    pub moodle_id: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: Option<UserRole>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

/// Update user request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 64))]
    pub moodle_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}
