//! Business logic services

pub mod catalog;
pub mod email;
pub mod loans;
pub mod reminders;
pub mod reports;
pub mod scheduler;
pub mod templates;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
    pub reports: reports::ReportsService,
    pub reminders: reminders::ReminderService,
    pub scheduler: scheduler::ReminderScheduler,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository and mail transport
    pub fn new(
        repository: Repository,
        config: &AppConfig,
        mailer: Arc<dyn email::MailTransport>,
    ) -> Self {
        let reminders = reminders::ReminderService::new(repository.clone(), mailer);
        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), config.lending.clone()),
            reports: reports::ReportsService::new(repository.clone()),
            scheduler: scheduler::ReminderScheduler::new(
                reminders.clone(),
                config.reminders.interval(),
            ),
            reminders,
            repository,
        }
    }

    /// Store reachability, for readiness checks
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
