//! Background task running the reminder sweep on a fixed interval

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use crate::error::AppResult;

use super::reminders::{ReminderService, SweepReport};

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic, single-flight reminder sweeps.
///
/// At most one sweep runs at a time, whether started by the timer or by
/// [`ReminderScheduler::run_now`]. Stopping lets an in-flight sweep finish.
#[derive(Clone)]
pub struct ReminderScheduler {
    reminders: ReminderService,
    interval: Duration,
    sweep_lock: Arc<Mutex<()>>,
    running: Arc<Mutex<Option<Running>>>,
}

impl ReminderScheduler {
    pub fn new(reminders: ReminderService, interval: Duration) -> Self {
        Self {
            reminders,
            interval,
            sweep_lock: Arc::new(Mutex::new(())),
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the periodic task; returns false if it is already running
    #[tracing::instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let reminders = self.reminders.clone();
        let sweep_lock = Arc::clone(&self.sweep_lock);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                match sweep_lock.try_lock() {
                    Ok(_guard) => {
                        if let Err(e) = reminders.sweep().await {
                            tracing::error!(error = %e, "reminder sweep skipped");
                        }
                    }
                    Err(_) => tracing::debug!("previous sweep still running, skipping"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("reminder scheduler stopped");
        });

        *running = Some(Running { stop_tx, handle });
        tracing::info!("reminder scheduler started");
        true
    }

    /// Signal the task and wait for it to exit
    pub async fn stop(&self) {
        let Some(Running { stop_tx, handle }) = self.running.lock().await.take() else {
            return;
        };
        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "reminder scheduler task failed");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Sweep immediately, waiting for any in-flight sweep first
    pub async fn run_now(&self) -> AppResult<SweepReport> {
        let _guard = self.sweep_lock.lock().await;
        self.reminders.sweep().await
    }
}
