//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrows, categories, health, notifications, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library API",
        version = "1.0.0",
        description = "Library management REST API: catalog, users and borrow ledger",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::search_books,
        books::available_books,
        books::popular_books,
        books::recommended_books,
        books::new_books,
        books::get_book,
        books::is_available,
        books::create_book,
        books::create_book_with_files,
        books::update_book,
        books::update_availability,
        books::delete_book,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::get_category_books,
        categories::create_category,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::deactivate_user,
        users::get_user_borrows,
        // Borrows
        borrows::create_borrow,
        borrows::list_borrows,
        borrows::list_overdue,
        borrows::sweep_overdue,
        borrows::get_borrow,
        borrows::return_book,
        borrows::extend_borrow,
        // Notifications
        notifications::list_unread,
        notifications::mark_read,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::UpdateAvailability,
            crate::models::enums::BookFormat,
            books::AvailabilityResponse,
            books::BookUploadForm,
            // Categories
            crate::models::category::Category,
            crate::models::category::CreateCategory,
            // Users
            crate::models::user::User,
            crate::models::user::UserDetails,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::enums::UserRole,
            // Borrows
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::CreateBorrow,
            crate::models::enums::BorrowStatus,
            borrows::SweepResponse,
            // Notifications
            crate::models::notification::Notification,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "categories", description = "Book categories"),
        (name = "users", description = "User directory"),
        (name = "borrows", description = "Borrow ledger"),
        (name = "notifications", description = "Notifications")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
