//! Business logic services

pub mod catalog;
pub mod ledger;
pub mod notifications;
pub mod storage;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, models::BorrowPolicy, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub ledger: ledger::LedgerService,
    pub notifications: notifications::NotificationService,
    pub storage: storage::FileStorage,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let notifications = notifications::NotificationService::new(repository.clone());
        let catalog = catalog::CatalogService::new(
            repository.clone(),
            Arc::new(notifications.clone()),
            config.notifications.admin_recipient.clone(),
        );
        let users = users::UsersService::new(repository.clone());
        let ledger = ledger::LedgerService::new(
            repository.clone(),
            catalog.clone(),
            users.clone(),
            BorrowPolicy::from(&config.ledger),
        );

        Self {
            catalog,
            users,
            ledger,
            notifications,
            storage: storage::FileStorage::new(&config.uploads.dir),
            repository,
        }
    }

    /// Database round-trip for the readiness probe
    pub async fn check_database(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
