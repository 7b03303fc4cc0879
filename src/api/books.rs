//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::Multipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookFiles, BookQuery, BookSearchQuery, CreateBook, LimitQuery, UpdateAvailability, UpdateBook},
        Pagination,
    },
    services::storage::clean_file_reference,
};

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// List of items
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AvailabilityResponse {
    pub book_id: i64,
    pub available: bool,
}

/// Multipart form accepted by `POST /books/upload`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct BookUploadForm {
    /// `CreateBook` encoded as JSON
    book_data: String,
    #[schema(value_type = Option<String>, format = Binary)]
    book_cover: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pdf_file: Option<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    audio_file: Option<Vec<u8>>,
}

/// List books with optional filters
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(
        ("category_id" = Option<i64>, Query, description = "Filter by category"),
        ("available" = Option<bool>, Query, description = "Only books with a copy on the shelf"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<Book>)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state.services.catalog.list_books(&query).await?;
    Ok(Json(PaginatedResponse::new(
        books,
        total,
        Pagination::new(query.page, query.per_page),
    )))
}

/// Search books by name, author or ISBN
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(
        ("q" = String, Query, description = "Search term"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "Matching books", body = PaginatedResponse<Book>),
        (status = 400, description = "Empty search term")
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookSearchQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (books, total) = state.services.catalog.search_books(&query.q, pagination).await?;
    Ok(Json(PaginatedResponse::new(books, total, pagination)))
}

/// Books with at least one available copy
#[utoipa::path(
    get,
    path = "/books/available",
    tag = "books",
    params(
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Items per page (default: 20, max: 100)")
    ),
    responses(
        (status = 200, description = "Available books", body = PaginatedResponse<Book>)
    )
)]
pub async fn available_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let pagination = Pagination::new(query.page, query.per_page);
    let (books, total) = state.services.catalog.available_books(pagination).await?;
    Ok(Json(PaginatedResponse::new(books, total, pagination)))
}

/// Most borrowed books
#[utoipa::path(
    get,
    path = "/books/popular",
    tag = "books",
    params(
        ("limit" = Option<i64>, Query, description = "Number of books (default: 10)")
    ),
    responses(
        (status = 200, description = "Popular books", body = Vec<Book>)
    )
)]
pub async fn popular_books(
    State(state): State<crate::AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.popular_books(query.limit()).await?;
    Ok(Json(books))
}

/// Recommended books (currently the most borrowed ones)
#[utoipa::path(
    get,
    path = "/books/recommended",
    tag = "books",
    params(
        ("limit" = Option<i64>, Query, description = "Number of books (default: 10)")
    ),
    responses(
        (status = 200, description = "Recommended books", body = Vec<Book>)
    )
)]
pub async fn recommended_books(
    State(state): State<crate::AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.recommended_books(query.limit()).await?;
    Ok(Json(books))
}

/// Most recently added books
#[utoipa::path(
    get,
    path = "/books/new",
    tag = "books",
    params(
        ("limit" = Option<i64>, Query, description = "Number of books (default: 10)")
    ),
    responses(
        (status = 200, description = "Newest books", body = Vec<Book>)
    )
)]
pub async fn new_books(
    State(state): State<crate::AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.new_books(query.limit()).await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Whether a copy of the book can be borrowed right now
#[utoipa::path(
    get,
    path = "/books/{id}/is-available",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Availability flag", body = AvailabilityResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn is_available(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AvailabilityResponse>> {
    let available = state.services.catalog.is_available(id).await?;
    Ok(Json(AvailabilityResponse { book_id: id, available }))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "ISBN already in use")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Create a new book with cover, PDF and audio files (multipart form).
///
/// Parts: `book_data` (JSON, required), `book_cover`, `pdf_file`, `audio_file`.
#[utoipa::path(
    post,
    path = "/books/upload",
    tag = "books",
    request_body(content = BookUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid form"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "ISBN already in use")
    )
)]
pub async fn create_book_with_files(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Book>)> {
    let mut data: Option<CreateBook> = None;
    let mut uploads: Vec<(&'static str, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let folder = match name.as_str() {
            "book_data" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid book_data part: {}", e)))?;
                let parsed: CreateBook = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::BadRequest(format!("Invalid book_data JSON: {}", e)))?;
                data = Some(parsed);
                continue;
            }
            "book_cover" => "covers",
            "pdf_file" => "pdfs",
            "audio_file" => "audio",
            other => {
                tracing::debug!("Ignoring unknown multipart field '{}'", other);
                continue;
            }
        };

        let file_name = field.file_name().unwrap_or(name.as_str()).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid {} part: {}", name, e)))?;
        if !bytes.is_empty() {
            uploads.push((folder, file_name, bytes.to_vec()));
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("Missing book_data part".to_string()))?;
    let catalog = &state.services.catalog;
    catalog.check_new_book(&data).await?;

    let storage = &state.services.storage;
    let mut files = BookFiles::default();
    let mut saved = Vec::new();
    for (folder, file_name, bytes) in uploads {
        let reference = match storage.save(folder, &file_name, &bytes).await {
            Ok(reference) => reference,
            Err(e) => {
                storage.remove_all(&saved).await;
                return Err(e);
            }
        };
        saved.push(reference.clone());
        match folder {
            "covers" => files.book_cover_url = Some(reference),
            "pdfs" => files.pdf_file_url = Some(reference),
            _ => files.audio_file_url = Some(reference),
        }
    }

    // checks can still fail if another request takes the ISBN in between
    let mut book = match catalog.create_book_with_files(data, files).await {
        Ok(book) => book,
        Err(e) => {
            storage.remove_all(&saved).await;
            return Err(e);
        }
    };
    for url in [
        &mut book.book_cover_url,
        &mut book.pdf_file_url,
        &mut book.audio_file_url,
    ] {
        if let Some(reference) = url.as_mut() {
            *reference = clean_file_reference(reference);
        }
    }

    Ok((StatusCode::CREATED, Json(book)))
}

/// Update an existing book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Copy counts out of range"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN already in use")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Json(data): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.update_book(id, data).await?;
    Ok(Json(book))
}

/// Overwrite the number of available copies
#[utoipa::path(
    patch,
    path = "/books/{id}/availability",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = UpdateAvailability,
    responses(
        (status = 200, description = "Availability updated", body = Book),
        (status = 400, description = "Value outside 0..=total_copies"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_availability(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Json(data): Json<UpdateAvailability>,
) -> AppResult<Json<Book>> {
    let book = state
        .services
        .catalog
        .update_availability(id, data.available_copies)
        .await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 400, description = "Copies are still borrowed"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
