//! Data models

pub mod book;
pub mod borrow;
pub mod category;
pub mod enums;
pub mod notification;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrow::{Borrow, BorrowDetails, BorrowPolicy};
pub use category::Category;
pub use enums::{BookFormat, BorrowStatus, UserRole};
pub use notification::Notification;
pub use pagination::Pagination;
pub use user::{User, UserDetails};
