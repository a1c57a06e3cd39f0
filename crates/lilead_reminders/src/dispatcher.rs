//! Reminder dispatcher
//!
//! One tick scans for due reminders, delivers a push notification for each of
//! them to every device of the owning user, removes tokens the push provider
//! reports as permanently invalid and marks the reminder as sent.
//!
//! Reminders are processed concurrently with a bound; each reminder's
//! lookup, delivery and mark-sent steps run in order. A failure while
//! handling one reminder is logged and never affects the others.

use crate::payload::build_reminder_payload;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use lilead_common::{NotificationPayload, Reminder};
use lilead_config::SchedulerConfig;
use lilead_db::{DbError, DeviceTokenRepository, ReminderRepository};
use lilead_firebase::{DeliveryOutcome, GatewayError, PushGateway};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Failure while handling a single reminder
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Upper bound on one multicast call
    pub gateway_timeout: Duration,
    pub max_concurrent_reminders: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl DispatcherSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            gateway_timeout: Duration::from_secs(config.gateway_timeout_secs),
            max_concurrent_reminders: config.max_concurrent_reminders.max(1),
        }
    }
}

/// What happened to one due reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    /// Delivered (possibly partially) and marked sent
    Sent {
        delivered: usize,
        failed: usize,
        tokens_removed: usize,
        /// False when another tick marked it first
        transitioned: bool,
    },
    /// The user has no devices; marked sent without a delivery attempt
    NoDevices { transitioned: bool },
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Reminders returned by the due scan
    pub due: usize,
    /// Reminders this tick flipped to sent
    pub marked_sent: usize,
    /// Reminders that were already sent by the time this tick marked them
    pub already_sent: usize,
    pub no_devices: usize,
    pub deliveries: usize,
    pub tokens_removed: usize,
    /// Reminders left unsent because the gateway was unavailable
    pub skipped_unavailable: usize,
    /// Reminders that failed with a store error
    pub failed: usize,
    /// The tick did nothing because another tick was still running
    pub overlapped: bool,
}

impl TickReport {
    /// Reminders whose processing completed, i.e. that are now marked sent
    pub fn processed(&self) -> usize {
        self.marked_sent + self.already_sent
    }

    fn skipped_overlap() -> Self {
        Self {
            overlapped: true,
            ..Default::default()
        }
    }

    fn record(&mut self, result: Result<ReminderOutcome, DispatchError>) {
        match result {
            Ok(ReminderOutcome::Sent {
                delivered,
                tokens_removed,
                transitioned,
                ..
            }) => {
                self.deliveries += delivered;
                self.tokens_removed += tokens_removed;
                self.count_mark(transitioned);
            }
            Ok(ReminderOutcome::NoDevices { transitioned }) => {
                self.no_devices += 1;
                self.count_mark(transitioned);
            }
            Err(DispatchError::Gateway(_)) => self.skipped_unavailable += 1,
            Err(DispatchError::Store(_)) => self.failed += 1,
        }
    }

    fn count_mark(&mut self, transitioned: bool) {
        if transitioned {
            self.marked_sent += 1;
        } else {
            self.already_sent += 1;
        }
    }
}

/// Scans for due reminders and delivers them
pub struct ReminderDispatcher<R, D, G> {
    reminders: Arc<R>,
    devices: Arc<D>,
    gateway: Arc<G>,
    settings: DispatcherSettings,
    /// Held for the duration of a tick
    tick_guard: Mutex<()>,
}

impl<R, D, G> ReminderDispatcher<R, D, G>
where
    R: ReminderRepository,
    D: DeviceTokenRepository,
    G: PushGateway,
{
    pub fn new(
        reminders: Arc<R>,
        devices: Arc<D>,
        gateway: Arc<G>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            reminders,
            devices,
            gateway,
            settings,
            tick_guard: Mutex::new(()),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Primes the gateway credentials, bounded by the gateway timeout.
    ///
    /// Failures are only logged; every delivery authenticates again anyway.
    pub async fn prime_gateway(&self) {
        let timeout = self.settings.gateway_timeout;
        match tokio::time::timeout(timeout, self.gateway.initialize()).await {
            Ok(Ok(())) => debug!("Push gateway initialized"),
            Ok(Err(e)) => {
                warn!(error = %e, "Push gateway initialization failed, continuing without it")
            }
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "Push gateway initialization timed out, continuing without it"
            ),
        }
    }

    /// Runs one tick against the clock value `now`.
    ///
    /// Returns a report with `overlapped` set, and does nothing else, when a
    /// tick is already running.
    ///
    /// # Errors
    ///
    /// Only the due scan can fail the tick as a whole; per-reminder failures
    /// are counted in the report.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, DispatchError> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            warn!("Previous reminder tick still running, skipping this one");
            return Ok(TickReport::skipped_overlap());
        };

        let due = self.reminders.find_due(now).await.map_err(|e| {
            error!(error = %e, "Failed to scan for due reminders, skipping tick");
            e
        })?;

        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            debug!("No due reminders");
            return Ok(report);
        }

        info!(count = due.len(), "Found due reminders");

        let work: Vec<_> = due.iter().map(|reminder| self.process_logged(reminder)).collect();
        let results: Vec<_> = stream::iter(work)
            .buffer_unordered(self.settings.max_concurrent_reminders)
            .collect()
            .await;
        for result in results {
            report.record(result);
        }

        info!(
            due = report.due,
            marked_sent = report.marked_sent,
            deliveries = report.deliveries,
            tokens_removed = report.tokens_removed,
            skipped_unavailable = report.skipped_unavailable,
            failed = report.failed,
            "Reminder tick finished"
        );
        Ok(report)
    }

    async fn process_logged(&self, reminder: &Reminder) -> Result<ReminderOutcome, DispatchError> {
        let result = self.process(reminder).await;
        match &result {
            Ok(outcome) => debug!(reminder_id = %reminder.id, ?outcome, "Reminder processed"),
            Err(DispatchError::Gateway(e)) => warn!(
                reminder_id = %reminder.id,
                error = %e,
                "Push gateway unavailable, reminder left unsent"
            ),
            Err(e) => error!(reminder_id = %reminder.id, error = %e, "Failed to process reminder"),
        }
        result
    }

    /// Handles one due reminder.
    ///
    /// # Errors
    ///
    /// `DispatchError::Gateway` when the gateway is unavailable, unconfigured
    /// or timed out; the reminder is then left unsent.
    /// `DispatchError::Store` when a store call fails.
    pub async fn process(&self, reminder: &Reminder) -> Result<ReminderOutcome, DispatchError> {
        let devices = self.devices.tokens_for_user(&reminder.user_id).await?;
        if devices.is_empty() {
            info!(
                reminder_id = %reminder.id,
                user_id = %reminder.user_id,
                "No device tokens registered, marking reminder sent"
            );
            let transitioned = self.reminders.mark_sent(&reminder.id).await?;
            return Ok(ReminderOutcome::NoDevices { transitioned });
        }

        let tokens: Vec<String> = devices.into_iter().map(|d| d.token).collect();
        let payload = build_reminder_payload(reminder);

        debug!(reminder_id = %reminder.id, token_count = tokens.len(), "Delivering reminder");
        let outcomes = self.deliver(&tokens, &payload).await?;

        let delivered = outcomes.iter().filter(|o| o.delivered).count();
        let tokens_removed = self.remove_invalid_tokens(&outcomes).await;
        let transitioned = self.reminders.mark_sent(&reminder.id).await?;

        Ok(ReminderOutcome::Sent {
            delivered,
            failed: outcomes.len() - delivered,
            tokens_removed,
            transitioned,
        })
    }

    async fn deliver(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<Vec<DeliveryOutcome>, GatewayError> {
        let timeout = self.settings.gateway_timeout;
        match tokio::time::timeout(timeout, self.gateway.deliver_multicast(tokens, payload)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }

    /// Unregisters every permanently failed token. Returns how many were removed.
    async fn remove_invalid_tokens(&self, outcomes: &[DeliveryOutcome]) -> usize {
        let mut removed = 0;
        for outcome in outcomes.iter().filter(|o| o.is_permanent_failure()) {
            match self.devices.unregister(&outcome.token).await {
                Ok(()) => {
                    debug!(kind = ?outcome.error_kind, "Removed invalid device token");
                    removed += 1;
                }
                // Already gone.
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(error = %e, "Failed to remove invalid device token"),
            }
        }
        if removed > 0 {
            info!(count = removed, "Removed invalid device tokens");
        }
        removed
    }
}
