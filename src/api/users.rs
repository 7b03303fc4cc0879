//! User directory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::books::PaginatedResponse;
use crate::{
    error::AppResult,
    models::{
        borrow::UserBorrowsQuery,
        user::{CreateUser, UpdateUser, User, UserDetails, UserQuery},
        BorrowDetails, Pagination,
    },
};

/// List users with optional filters
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(
        ("name" = Option<String>, Query, description = "Search in name, email or Moodle ID"),
        ("role" = Option<String>, Query, description = "ADMIN, USER, MEMBER or LIBRARIAN"),
        ("active" = Option<bool>, Query, description = "Filter by active flag"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<User>)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    let (users, total) = state.services.users.list(&query).await?;
    Ok(Json(PaginatedResponse::new(
        users,
        total,
        Pagination::new(query.page, query.per_page),
    )))
}

/// Get user by ID, with borrow counters
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = UserDetails),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDetails>> {
    let user = state.services.users.get_details(id).await?;
    Ok(Json(user))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Moodle ID or email already in use")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.create(data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found"),
        (status = 409, description = "Moodle ID or email already in use")
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Json(data): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    let user = state.services.users.update(id, data).await?;
    Ok(Json(user))
}

/// Deactivate a user account
#[utoipa::path(
    post,
    path = "/users/{id}/deactivate",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deactivated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn deactivate_user(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    let user = state.services.users.deactivate(id).await?;
    Ok(Json(user))
}

/// Borrowing history of a user
#[utoipa::path(
    get,
    path = "/users/{id}/borrows",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User ID"),
        ("active" = Option<bool>, Query, description = "true: not returned, false: returned"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "User borrows", body = PaginatedResponse<BorrowDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_borrows(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserBorrowsQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowDetails>>> {
    let (borrows, total) = state.services.ledger.user_history(id, &query).await?;
    Ok(Json(PaginatedResponse::new(
        borrows,
        total,
        Pagination::new(query.page, query.per_page),
    )))
}
