//! Borrow model, borrowing policy and the ledger's business rules.
//!
//! The rule functions here are pure: the ledger service loads the current
//! state inside a locked transaction and asks these functions whether the
//! transition is allowed.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::BorrowStatus;
use crate::{
    config::LedgerConfig,
    error::{AppError, AppResult},
};

/// Borrowing limits and periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowPolicy {
    pub max_active_borrows: i64,
    pub borrow_period_days: i64,
    pub extension_days: i64,
    pub max_extensions: i32,
}

impl Default for BorrowPolicy {
    fn default() -> Self {
        Self {
            max_active_borrows: 5,
            borrow_period_days: 14,
            extension_days: 7,
            max_extensions: 2,
        }
    }
}

impl From<&LedgerConfig> for BorrowPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            max_active_borrows: config.max_active_borrows,
            borrow_period_days: config.borrow_period_days,
            extension_days: config.extension_days,
            max_extensions: config.max_extensions,
        }
    }
}

impl BorrowPolicy {
    pub fn due_date_for(&self, borrow_date: NaiveDate) -> NaiveDate {
        borrow_date + Duration::days(self.borrow_period_days)
    }
}

/// Borrow row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrow {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub extension_count: i32,
    pub status: BorrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Borrow {
    /// Lateness derived from the due date; does not wait for the sweep.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.status {
            BorrowStatus::Returned => false,
            BorrowStatus::Overdue => true,
            BorrowStatus::Active => self.due_date < today,
        }
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_overdue(today) {
            (today - self.due_date).num_days().max(0)
        } else {
            0
        }
    }

    /// ACTIVE and OVERDUE borrows may be returned; RETURNED is terminal.
    pub fn check_returnable(&self) -> AppResult<()> {
        if self.status.is_terminal() {
            return Err(AppError::BusinessRule(format!(
                "Borrow {} has already been returned",
                self.id
            )));
        }
        Ok(())
    }

    pub fn check_extendable(&self, policy: &BorrowPolicy, today: NaiveDate) -> AppResult<()> {
        if self.status != BorrowStatus::Active {
            return Err(AppError::BusinessRule(
                "Only active borrows can be extended".to_string(),
            ));
        }

        if self.extension_count >= policy.max_extensions {
            return Err(AppError::BusinessRule(format!(
                "Maximum number of extensions ({}) reached",
                policy.max_extensions
            )));
        }

        // status may still read ACTIVE until the next sweep
        if self.due_date < today {
            return Err(AppError::BusinessRule(
                "Overdue books cannot be extended".to_string(),
            ));
        }

        Ok(())
    }

    pub fn extended_due_date(&self, policy: &BorrowPolicy) -> NaiveDate {
        self.due_date + Duration::days(policy.extension_days)
    }
}

/// State gathered under lock before a new borrow is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowEligibility {
    pub available_copies: i32,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
    pub already_borrowed: bool,
}

impl BorrowEligibility {
    /// Availability, limit, overdue and duplicate checks, in that order.
    pub fn check(&self, policy: &BorrowPolicy) -> AppResult<()> {
        if self.available_copies <= 0 {
            return Err(AppError::Conflict(
                "Book is not available for borrowing".to_string(),
            ));
        }

        if self.active_borrows >= policy.max_active_borrows {
            return Err(AppError::Conflict(format!(
                "User has reached maximum borrow limit of {} books",
                policy.max_active_borrows
            )));
        }

        if self.overdue_borrows > 0 {
            return Err(AppError::Conflict(
                "User has overdue books and cannot borrow new books".to_string(),
            ));
        }

        if self.already_borrowed {
            return Err(AppError::Conflict(
                "User already has this book borrowed".to_string(),
            ));
        }

        Ok(())
    }
}

/// Borrow joined with book and user display names
#[derive(Debug, Clone, FromRow)]
pub struct BorrowRow {
    #[sqlx(flatten)]
    pub borrow: Borrow,
    pub book_name: String,
    pub user_name: String,
}

/// Borrow as returned by the API, with derived lateness
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowDetails {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub book_id: i64,
    pub book_name: String,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub extension_count: i32,
    pub status: BorrowStatus,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl BorrowRow {
    pub fn into_details(self, today: NaiveDate) -> BorrowDetails {
        let is_overdue = self.borrow.is_overdue(today);
        let days_overdue = self.borrow.days_overdue(today);
        let b = self.borrow;
        BorrowDetails {
            id: b.id,
            user_id: b.user_id,
            user_name: self.user_name,
            book_id: b.book_id,
            book_name: self.book_name,
            borrow_date: b.borrow_date,
            due_date: b.due_date,
            return_date: b.return_date,
            extension_count: b.extension_count,
            status: b.status,
            is_overdue,
            days_overdue,
        }
    }
}

/// Create borrow request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBorrow {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    #[validate(range(min = 1, message = "book_id must be positive"))]
    pub book_id: i64,
}

/// Filters for the borrow list; combined with AND
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    /// true: not yet returned, false: returned
    pub active: Option<bool>,
    /// true: not returned and past due date
    pub overdue: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Query parameters for a user's borrowing history
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserBorrowsQuery {
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn borrow(status: BorrowStatus, due_date: NaiveDate, extension_count: i32) -> Borrow {
        Borrow {
            id: 1,
            user_id: 10,
            book_id: 20,
            borrow_date: due_date - Duration::days(14),
            due_date,
            return_date: None,
            extension_count,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn eligible() -> BorrowEligibility {
        BorrowEligibility {
            available_copies: 1,
            active_borrows: 0,
            overdue_borrows: 0,
            already_borrowed: false,
        }
    }

    #[test]
    fn test_due_date_is_fourteen_days_out() {
        let policy = BorrowPolicy::default();
        assert_eq!(policy.due_date_for(date(2024, 3, 1)), date(2024, 3, 15));
    }

    #[test]
    fn test_eligible_borrow_passes() {
        assert!(eligible().check(&BorrowPolicy::default()).is_ok());
    }

    #[test]
    fn test_no_copies_left_is_conflict() {
        let state = BorrowEligibility { available_copies: 0, ..eligible() };
        let err = state.check(&BorrowPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("not available")));
    }

    #[test]
    fn test_limit_reached_at_five_active() {
        let policy = BorrowPolicy::default();
        let state = BorrowEligibility { active_borrows: 5, ..eligible() };
        let err = state.check(&policy).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("limit")));

        let state = BorrowEligibility { active_borrows: 4, ..eligible() };
        assert!(state.check(&policy).is_ok());
    }

    #[test]
    fn test_overdue_blocks_new_borrows() {
        let state = BorrowEligibility { overdue_borrows: 1, ..eligible() };
        let err = state.check(&BorrowPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("overdue")));
    }

    #[test]
    fn test_duplicate_borrow_is_conflict() {
        let state = BorrowEligibility { already_borrowed: true, ..eligible() };
        let err = state.check(&BorrowPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("already")));
    }

    #[test]
    fn test_checks_run_in_order() {
        // every rule violated at once: availability is reported first
        let state = BorrowEligibility {
            available_copies: 0,
            active_borrows: 9,
            overdue_borrows: 3,
            already_borrowed: true,
        };
        let err = state.check(&BorrowPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("not available")));

        let state = BorrowEligibility { available_copies: 1, ..state };
        let err = state.check(&BorrowPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m.contains("limit")));
    }

    #[test]
    fn test_is_overdue_derived_from_due_date() {
        let today = date(2024, 3, 20);
        assert!(borrow(BorrowStatus::Active, date(2024, 3, 19), 0).is_overdue(today));
        assert!(!borrow(BorrowStatus::Active, date(2024, 3, 20), 0).is_overdue(today));
        assert!(borrow(BorrowStatus::Overdue, date(2024, 3, 1), 0).is_overdue(today));

        let mut returned = borrow(BorrowStatus::Returned, date(2024, 3, 1), 0);
        returned.return_date = Some(date(2024, 3, 10));
        assert!(!returned.is_overdue(today));
    }

    #[test]
    fn test_days_overdue() {
        let today = date(2024, 3, 20);
        assert_eq!(borrow(BorrowStatus::Active, date(2024, 3, 17), 0).days_overdue(today), 3);
        assert_eq!(borrow(BorrowStatus::Active, date(2024, 3, 25), 0).days_overdue(today), 0);
    }

    #[test]
    fn test_return_allowed_for_active_and_overdue() {
        assert!(borrow(BorrowStatus::Active, date(2024, 3, 1), 0).check_returnable().is_ok());
        assert!(borrow(BorrowStatus::Overdue, date(2024, 3, 1), 0).check_returnable().is_ok());
    }

    #[test]
    fn test_second_return_rejected() {
        let err = borrow(BorrowStatus::Returned, date(2024, 3, 1), 0)
            .check_returnable()
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn test_extend_active_borrow() {
        let policy = BorrowPolicy::default();
        let today = date(2024, 3, 10);
        let b = borrow(BorrowStatus::Active, date(2024, 3, 15), 0);
        assert!(b.check_extendable(&policy, today).is_ok());
        assert_eq!(b.extended_due_date(&policy), date(2024, 3, 22));
    }

    #[test]
    fn test_extend_on_due_date_is_allowed() {
        let today = date(2024, 3, 15);
        let b = borrow(BorrowStatus::Active, today, 1);
        assert!(b.check_extendable(&BorrowPolicy::default(), today).is_ok());
    }

    #[test]
    fn test_extension_cap_regardless_of_due_date() {
        let policy = BorrowPolicy::default();
        let today = date(2024, 3, 10);
        for due in [date(2024, 3, 1), date(2024, 3, 10), date(2024, 4, 1)] {
            let err = borrow(BorrowStatus::Active, due, 2)
                .check_extendable(&policy, today)
                .unwrap_err();
            assert!(matches!(err, AppError::BusinessRule(ref m) if m.contains("Maximum")));
        }
    }

    #[test]
    fn test_unswept_overdue_cannot_be_extended() {
        let today = date(2024, 3, 20);
        let err = borrow(BorrowStatus::Active, date(2024, 3, 19), 0)
            .check_extendable(&BorrowPolicy::default(), today)
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(ref m) if m.contains("Overdue")));
    }

    #[test]
    fn test_only_active_can_be_extended() {
        let today = date(2024, 3, 1);
        for status in [BorrowStatus::Returned, BorrowStatus::Overdue] {
            let err = borrow(status, date(2024, 3, 10), 0)
                .check_extendable(&BorrowPolicy::default(), today)
                .unwrap_err();
            assert!(matches!(err, AppError::BusinessRule(ref m) if m.contains("active")));
        }
    }

    #[test]
    fn test_policy_from_config() {
        let config = LedgerConfig {
            max_active_borrows: 3,
            borrow_period_days: 21,
            extension_days: 10,
            max_extensions: 1,
            overdue_sweep_interval_secs: 0,
        };
        let policy = BorrowPolicy::from(&config);
        assert_eq!(policy.max_active_borrows, 3);
        assert_eq!(policy.due_date_for(date(2024, 1, 1)), date(2024, 1, 22));
    }

    #[test]
    fn test_details_carry_derived_lateness() {
        let today = date(2024, 3, 20);
        let row = BorrowRow {
            borrow: borrow(BorrowStatus::Active, date(2024, 3, 18), 1),
            book_name: "Dune".to_string(),
            user_name: "Ada".to_string(),
        };
        let details = row.into_details(today);
        assert_eq!(details.status, BorrowStatus::Active);
        assert!(details.is_overdue);
        assert_eq!(details.days_overdue, 2);
        assert_eq!(details.book_name, "Dune");
    }
}
