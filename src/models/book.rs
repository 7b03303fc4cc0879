//! Book (catalog entry) model and copy-count invariants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::BookFormat;
use crate::error::{AppError, AppResult};

/// Book with its category name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub short_details: Option<String>,
    pub author: String,
    pub about: Option<String>,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub format: BookFormat,
    pub total_copies: i32,
    pub available_copies: i32,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub book_cover_url: Option<String>,
    pub pdf_file_url: Option<String>,
    pub audio_file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Copies currently lent out
    pub fn borrowed_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }
}

/// Validate `0 <= available <= total` and `total > 0`
pub fn validate_copies(total_copies: i32, available_copies: i32) -> AppResult<()> {
    if total_copies <= 0 {
        return Err(AppError::BusinessRule(
            "Total copies must be greater than 0".to_string(),
        ));
    }
    if available_copies < 0 {
        return Err(AppError::BusinessRule(
            "Available copies cannot be negative".to_string(),
        ));
    }
    if available_copies > total_copies {
        return Err(AppError::BusinessRule(
            "Available copies cannot exceed total copies".to_string(),
        ));
    }
    Ok(())
}

/// Copies on the shelf plus copies lent out must fit in the total, otherwise a
/// later return would push `available_copies` past `total_copies`
pub fn check_lent_copies(total_copies: i32, available_copies: i32, lent: i64) -> AppResult<()> {
    if i64::from(available_copies) + lent > i64::from(total_copies) {
        return Err(AppError::BusinessRule(format!(
            "Total copies must cover the {} available and {} currently borrowed copies",
            available_copies, lent
        )));
    }
    Ok(())
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    pub short_details: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author is required"))]
    pub author: String,
    pub about: Option<String>,
    pub category_id: i64,
    #[serde(default)]
    pub format: BookFormat,
    #[validate(range(min = 1, message = "Total copies must be greater than 0"))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    pub available_copies: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
}

impl CreateBook {
    pub fn available_copies(&self) -> i32 {
        self.available_copies.unwrap_or(self.total_copies)
    }
}

/// File references attached at creation
#[derive(Debug, Clone, Default)]
pub struct BookFiles {
    pub book_cover_url: Option<String>,
    pub pdf_file_url: Option<String>,
    pub audio_file_url: Option<String>,
}

/// Partial update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub short_details: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    pub about: Option<String>,
    pub category_id: Option<i64>,
    pub format: Option<BookFormat>,
    pub total_copies: Option<i32>,
    pub available_copies: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
}

impl UpdateBook {
    /// Merge into `book`, then re-check the copy invariant
    pub fn apply(&self, book: &mut Book) -> AppResult<()> {
        if let Some(ref name) = self.name {
            book.name = name.clone();
        }
        if self.short_details.is_some() {
            book.short_details = self.short_details.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if self.about.is_some() {
            book.about = self.about.clone();
        }
        if let Some(category_id) = self.category_id {
            book.category_id = category_id;
        }
        if let Some(format) = self.format {
            book.format = format;
        }
        if let Some(total) = self.total_copies {
            book.total_copies = total;
        }
        if let Some(available) = self.available_copies {
            book.available_copies = available;
        }
        if self.isbn.is_some() {
            book.isbn = self.isbn.clone();
        }
        if self.publication_year.is_some() {
            book.publication_year = self.publication_year;
        }
        validate_copies(book.total_copies, book.available_copies)
    }
}

/// Administrative availability edit
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAvailability {
    pub available_copies: i32,
}

/// Query parameters for the book list
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    pub category_id: Option<i64>,
    /// Only books with at least one copy on the shelf
    pub available: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Search by name, author or ISBN
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookSearchQuery {
    pub q: String,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(total: i32, available: i32) -> Book {
        Book {
            id: 1,
            name: "The Great Gatsby".to_string(),
            short_details: None,
            author: "F. Scott Fitzgerald".to_string(),
            about: None,
            category_id: 1,
            category_name: Some("Fiction".to_string()),
            format: BookFormat::HardCopy,
            total_copies: total,
            available_copies: available,
            isbn: Some("9780743273565".to_string()),
            publication_year: Some(1925),
            book_cover_url: None,
            pdf_file_url: None,
            audio_file_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_copies() {
        assert!(validate_copies(3, 0).is_ok());
        assert!(validate_copies(3, 3).is_ok());
        assert!(matches!(validate_copies(0, 0), Err(AppError::BusinessRule(_))));
        assert!(matches!(validate_copies(3, -1), Err(AppError::BusinessRule(_))));
        assert!(matches!(validate_copies(3, 4), Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_available_defaults_to_total() {
        let req: CreateBook = serde_json::from_value(serde_json::json!({
            "name": "Dune",
            "author": "Frank Herbert",
            "category_id": 2,
            "total_copies": 4
        }))
        .unwrap();
        assert_eq!(req.available_copies(), 4);
        assert_eq!(req.format, BookFormat::HardCopy);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_rejects_zero_copies() {
        let req: CreateBook = serde_json::from_value(serde_json::json!({
            "name": "Dune",
            "author": "Frank Herbert",
            "category_id": 2,
            "total_copies": 0
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_cannot_shrink_below_lent_copies() {
        let mut b = book(3, 1);
        let update = UpdateBook {
            total_copies: Some(0),
            ..Default::default()
        };
        assert!(update.apply(&mut b).is_err());

        let mut b = book(3, 3);
        let update = UpdateBook {
            total_copies: Some(2),
            ..Default::default()
        };
        assert!(matches!(update.apply(&mut b), Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_total_must_cover_unreturned_borrows() {
        assert!(check_lent_copies(3, 1, 2).is_ok());
        assert!(check_lent_copies(2, 0, 2).is_ok());
        assert!(matches!(check_lent_copies(1, 0, 2), Err(AppError::BusinessRule(_))));

        // three copies, two lent out: shrinking to two leaves no room for the shelf copy
        let mut b = book(3, 1);
        let update = UpdateBook {
            total_copies: Some(2),
            ..Default::default()
        };
        update.apply(&mut b).unwrap();
        assert!(matches!(
            check_lent_copies(b.total_copies, b.available_copies, 2),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_update_merges_fields() {
        let mut b = book(3, 2);
        let update = UpdateBook {
            name: Some("Gatsby".to_string()),
            total_copies: Some(5),
            ..Default::default()
        };
        update.apply(&mut b).unwrap();
        assert_eq!(b.name, "Gatsby");
        assert_eq!(b.total_copies, 5);
        assert_eq!(b.available_copies, 2);
        assert_eq!(b.borrowed_copies(), 3);
        assert_eq!(b.author, "F. Scott Fitzgerald");
    }

    #[test]
    fn test_limit_clamped() {
        assert_eq!(LimitQuery { limit: None }.limit(), 10);
        assert_eq!(LimitQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(LimitQuery { limit: Some(500) }.limit(), 100);
    }
}
