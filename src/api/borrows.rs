//! Borrow ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::books::PaginatedResponse;
use crate::{
    error::AppResult,
    models::{
        borrow::{BorrowQuery, CreateBorrow},
        BorrowDetails, Pagination,
    },
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    /// Borrows newly flagged as OVERDUE
    pub updated: u64,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Borrow created", body = BorrowDetails),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "Book unavailable, limit reached, overdue books or already borrowed")
    )
)]
pub async fn create_borrow(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateBorrow>,
) -> AppResult<(StatusCode, Json<BorrowDetails>)> {
    let borrow = state.services.ledger.create_borrow(data).await?;
    Ok((StatusCode::CREATED, Json(borrow)))
}

/// List borrows; filters are combined
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    params(
        ("user_id" = Option<i64>, Query, description = "Filter by user"),
        ("book_id" = Option<i64>, Query, description = "Filter by book"),
        ("active" = Option<bool>, Query, description = "true: not returned, false: returned"),
        ("overdue" = Option<bool>, Query, description = "true: not returned and past due date"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of borrows", body = PaginatedResponse<BorrowDetails>)
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowDetails>>> {
    let (borrows, total) = state.services.ledger.list_borrows(&query).await?;
    Ok(Json(PaginatedResponse::new(
        borrows,
        total,
        Pagination::new(query.page, query.per_page),
    )))
}

/// All overdue borrows, oldest due date first
#[utoipa::path(
    get,
    path = "/borrows/overdue",
    tag = "borrows",
    responses(
        (status = 200, description = "Overdue borrows", body = Vec<BorrowDetails>)
    )
)]
pub async fn list_overdue(State(state): State<crate::AppState>) -> AppResult<Json<Vec<BorrowDetails>>> {
    let borrows = state.services.ledger.list_overdue().await?;
    Ok(Json(borrows))
}

/// Run the overdue sweep immediately
#[utoipa::path(
    post,
    path = "/borrows/overdue/sweep",
    tag = "borrows",
    responses(
        (status = 200, description = "Sweep result", body = SweepResponse)
    )
)]
pub async fn sweep_overdue(State(state): State<crate::AppState>) -> AppResult<Json<SweepResponse>> {
    let updated = state.services.ledger.sweep_overdue().await?;
    Ok(Json(SweepResponse { updated }))
}

/// Get borrow by ID
#[utoipa::path(
    get,
    path = "/borrows/{id}",
    tag = "borrows",
    params(
        ("id" = i64, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Borrow details", body = BorrowDetails),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn get_borrow(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BorrowDetails>> {
    let borrow = state.services.ledger.get_borrow(id).await?;
    Ok(Json(borrow))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    params(
        ("id" = i64, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowDetails),
        (status = 400, description = "Already returned"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BorrowDetails>> {
    let borrow = state.services.ledger.return_book(id).await?;
    Ok(Json(borrow))
}

/// Extend the due date of an active borrow
#[utoipa::path(
    post,
    path = "/borrows/{id}/extend",
    tag = "borrows",
    params(
        ("id" = i64, Path, description = "Borrow ID")
    ),
    responses(
        (status = 200, description = "Due date extended", body = BorrowDetails),
        (status = 400, description = "Not active, overdue or extension limit reached"),
        (status = 404, description = "Borrow not found")
    )
)]
pub async fn extend_borrow(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BorrowDetails>> {
    let borrow = state.services.ledger.extend_due_date(id).await?;
    Ok(Json(borrow))
}
