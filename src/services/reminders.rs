//! Reminder sweep: due-tomorrow reminders and overdue notices

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::LoanDetails,
    repository::{self, Repository},
};

use super::{email::MailTransport, templates};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Loans due tomorrow
    pub reminders_attempted: usize,
    /// Open loans past due
    pub notices_attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReminderService {
    repository: Repository,
    mailer: Arc<dyn MailTransport>,
}

impl ReminderService {
    pub fn new(repository: Repository, mailer: Arc<dyn MailTransport>) -> Self {
        Self { repository, mailer }
    }

    pub async fn sweep(&self) -> AppResult<SweepReport> {
        self.sweep_at(repository::now()).await
    }

    /// One sweep as of `now`.
    ///
    /// Fails only when the due or overdue query fails; a message that cannot
    /// be delivered is logged and counted.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let (start, end) = tomorrow_bounds(now);
        let due_tomorrow = self.repository.loans.due_between(start, end).await?;
        let overdue = self.repository.loans.overdue(now, None).await?;

        let mut report = SweepReport {
            reminders_attempted: due_tomorrow.len(),
            notices_attempted: overdue.len(),
            ..SweepReport::default()
        };

        for loan in &due_tomorrow {
            let email = templates::due_reminder(&loan.title, loan.due_date);
            self.deliver(loan, &email, &mut report).await;
        }
        for item in &overdue {
            let email =
                templates::overdue_notice(&item.loan.title, item.loan.due_date, item.days_overdue);
            self.deliver(&item.loan, &email, &mut report).await;
        }

        tracing::info!(
            reminders = report.reminders_attempted,
            notices = report.notices_attempted,
            delivered = report.delivered,
            failed = report.failed,
            "reminder sweep finished"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        loan: &LoanDetails,
        email: &templates::RenderedEmail,
        report: &mut SweepReport,
    ) {
        match self
            .mailer
            .send_email(&loan.email, email.subject, &email.html)
            .await
        {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    loan_id = loan.id,
                    to = %loan.email,
                    error = %e,
                    "reminder not delivered"
                );
                report.failed += 1;
            }
        }
    }
}

/// The UTC calendar day after `now`, as a half-open range
fn tomorrow_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let tomorrow = today + Days::new(1);
    let day_after = today + Days::new(2);
    (
        tomorrow.and_time(chrono::NaiveTime::MIN).and_utc(),
        day_after.and_time(chrono::NaiveTime::MIN).and_utc(),
    )
}
