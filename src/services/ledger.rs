//! Borrow ledger: the borrow / return / extend state machine.
//!
//! Every mutation runs in one transaction that first locks the rows it depends
//! on (user then book for a new borrow, the borrow itself otherwise). The copy
//! count of the book is only touched through the catalog protocol, on the same
//! transaction, so the borrow row and the counter commit or roll back together.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use validator::Validate;

use super::{catalog::CatalogService, users::UsersService};
use crate::{
    error::AppResult,
    models::{
        borrow::{BorrowEligibility, BorrowQuery, CreateBorrow, UserBorrowsQuery},
        BorrowDetails, BorrowPolicy, Pagination,
    },
    repository::Repository,
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct LedgerService {
    repository: Repository,
    catalog: CatalogService,
    users: UsersService,
    policy: BorrowPolicy,
}

impl LedgerService {
    pub fn new(
        repository: Repository,
        catalog: CatalogService,
        users: UsersService,
        policy: BorrowPolicy,
    ) -> Self {
        Self {
            repository,
            catalog,
            users,
            policy,
        }
    }

    /// Lend one copy of a book to a user
    pub async fn create_borrow(&self, data: CreateBorrow) -> AppResult<BorrowDetails> {
        data.validate()?;
        let today = today();

        let mut tx = self.repository.begin().await?;

        // lock order: user, then book
        self.users.lock_user(&mut *tx, data.user_id).await?;
        let book = self.catalog.lock_book(&mut *tx, data.book_id).await?;

        let eligibility = BorrowEligibility {
            available_copies: book.available_copies,
            active_borrows: self.users.active_borrow_count_in(&mut *tx, data.user_id).await?,
            overdue_borrows: self
                .repository
                .users
                .overdue_borrow_count(&mut *tx, data.user_id, today)
                .await?,
            already_borrowed: self
                .repository
                .borrows
                .has_active_borrow(&mut *tx, data.user_id, data.book_id)
                .await?,
        };
        eligibility.check(&self.policy)?;

        let remaining = self.catalog.decrease_available_copies(&mut *tx, data.book_id).await?;
        let id = self
            .repository
            .borrows
            .insert(
                &mut *tx,
                data.user_id,
                data.book_id,
                today,
                self.policy.due_date_for(today),
            )
            .await?;
        let row = self.repository.borrows.get_row(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = id,
            user_id = data.user_id,
            book_id = data.book_id,
            available_copies = remaining,
            "Book borrowed"
        );
        Ok(row.into_details(today))
    }

    /// Close a borrow and put the copy back on the shelf.
    /// Overdue borrows can be returned too.
    pub async fn return_book(&self, id: i64) -> AppResult<BorrowDetails> {
        let today = today();
        let mut tx = self.repository.begin().await?;

        let borrow = self.repository.borrows.lock_by_id(&mut *tx, id).await?;
        borrow.check_returnable()?;

        let available = self.catalog.increase_available_copies(&mut *tx, borrow.book_id).await?;
        self.repository.borrows.mark_returned(&mut *tx, id, today).await?;
        let row = self.repository.borrows.get_row(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = id,
            book_id = borrow.book_id,
            was_overdue = borrow.is_overdue(today),
            available_copies = available,
            "Book returned"
        );
        Ok(row.into_details(today))
    }

    /// Push the due date back by one extension period
    pub async fn extend_due_date(&self, id: i64) -> AppResult<BorrowDetails> {
        let today = today();
        let mut tx = self.repository.begin().await?;

        let borrow = self.repository.borrows.lock_by_id(&mut *tx, id).await?;
        borrow.check_extendable(&self.policy, today)?;

        let due_date = borrow.extended_due_date(&self.policy);
        self.repository.borrows.extend(&mut *tx, id, due_date).await?;
        let row = self.repository.borrows.get_row(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::info!(
            borrow_id = id,
            %due_date,
            extension_count = borrow.extension_count + 1,
            "Borrow extended"
        );
        Ok(row.into_details(today))
    }

    /// Flag every lapsed ACTIVE borrow as OVERDUE. Safe to run repeatedly.
    pub async fn sweep_overdue(&self) -> AppResult<u64> {
        let updated = self.repository.borrows.sweep_overdue(today()).await?;
        if updated > 0 {
            tracing::info!(updated, "Overdue sweep flagged borrows");
        } else {
            tracing::debug!("Overdue sweep: nothing to flag");
        }
        Ok(updated)
    }

    pub async fn get_borrow(&self, id: i64) -> AppResult<BorrowDetails> {
        let row = self.repository.borrows.get_by_id(id).await?;
        Ok(row.into_details(today()))
    }

    pub async fn list_borrows(&self, query: &BorrowQuery) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let today = today();
        let (rows, total) = self.repository.borrows.list(query, today).await?;
        Ok((rows.into_iter().map(|r| r.into_details(today)).collect(), total))
    }

    pub async fn list_overdue(&self) -> AppResult<Vec<BorrowDetails>> {
        let today = today();
        let rows = self.repository.borrows.list_overdue(today).await?;
        Ok(rows.into_iter().map(|r| r.into_details(today)).collect())
    }

    /// Borrowing history of one user
    pub async fn user_history(
        &self,
        user_id: i64,
        query: &UserBorrowsQuery,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        self.users.get_by_id(user_id).await?;

        let today = today();
        let pagination = Pagination::new(query.page, query.per_page);
        let (rows, total) = self
            .repository
            .borrows
            .list_by_user(user_id, query.active, pagination)
            .await?;
        Ok((rows.into_iter().map(|r| r.into_details(today)).collect(), total))
    }
}

/// Run the overdue sweep every `every` until the runtime shuts down
pub fn spawn_overdue_sweeper(ledger: LedgerService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = every.as_secs(), "Overdue sweeper started");
        loop {
            interval.tick().await;
            if let Err(e) = ledger.sweep_overdue().await {
                tracing::error!("Overdue sweep failed: {}", e);
            }
        }
    })
}
