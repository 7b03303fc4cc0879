//! API handlers for the library REST endpoints

pub mod books;
pub mod borrows;
pub mod categories;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod users;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

/// Routes mounted under `/api/v1`
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/upload", post(books::create_book_with_files))
        .route("/books/search", get(books::search_books))
        .route("/books/available", get(books::available_books))
        .route("/books/popular", get(books::popular_books))
        .route("/books/recommended", get(books::recommended_books))
        .route("/books/new", get(books::new_books))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/is-available", get(books::is_available))
        .route("/books/:id/availability", patch(books::update_availability))
        // Categories
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/categories/:id", get(categories::get_category))
        .route("/categories/:id/books", get(categories::get_category_books))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user).put(users::update_user))
        .route("/users/:id/deactivate", post(users::deactivate_user))
        .route("/users/:id/borrows", get(users::get_user_borrows))
        // Borrows
        .route("/borrows", get(borrows::list_borrows).post(borrows::create_borrow))
        .route("/borrows/overdue", get(borrows::list_overdue))
        .route("/borrows/overdue/sweep", post(borrows::sweep_overdue))
        .route("/borrows/:id", get(borrows::get_borrow))
        .route("/borrows/:id/return", post(borrows::return_book))
        .route("/borrows/:id/extend", post(borrows::extend_borrow))
        // Notifications
        .route("/notifications", get(notifications::list_unread))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .with_state(state)
}
