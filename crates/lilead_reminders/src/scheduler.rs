//! Lifecycle of the periodic reminder loop
//!
//! [`ReminderScheduler`] owns at most one running loop. `start` is safe to call
//! repeatedly, `stop` cancels the loop and waits for any in-flight tick.

use crate::dispatcher::{ReminderDispatcher, TickReport};
use chrono::Utc;
use lilead_db::{DeviceTokenRepository, ReminderRepository};
use lilead_firebase::PushGateway;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("reminder loop terminated abnormally: {0}")]
    LoopFailed(#[from] JoinError),
}

struct RunningLoop {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Starts and stops the periodic reminder tick
pub struct ReminderScheduler<R, D, G> {
    dispatcher: Arc<ReminderDispatcher<R, D, G>>,
    period: Duration,
    state: Mutex<Option<RunningLoop>>,
}

impl<R, D, G> ReminderScheduler<R, D, G>
where
    R: ReminderRepository + 'static,
    D: DeviceTokenRepository + 'static,
    G: PushGateway + 'static,
{
    pub fn new(dispatcher: Arc<ReminderDispatcher<R, D, G>>, period: Duration) -> Self {
        Self {
            dispatcher,
            period,
            state: Mutex::new(None),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ReminderDispatcher<R, D, G>> {
        &self.dispatcher
    }

    /// Starts the loop unless it is already running.
    ///
    /// The loop primes the gateway credentials before its first tick; a
    /// failure there is logged and ticking starts anyway. Returns `true` when
    /// this call started the loop.
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            debug!("Reminder scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.dispatcher),
            self.period,
            cancel.clone(),
        ));
        *state = Some(RunningLoop { handle, cancel });

        info!(
            period_secs = self.period.as_secs(),
            "Reminder scheduler started"
        );
        true
    }

    /// Stops the loop and waits for an in-flight tick to finish. No-op when not running.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let Some(running) = self.state.lock().await.take() else {
            return Ok(());
        };

        running.cancel.cancel();
        running.handle.await?;
        info!("Reminder scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

async fn run_loop<R, D, G>(
    dispatcher: Arc<ReminderDispatcher<R, D, G>>,
    period: Duration,
    cancel: CancellationToken,
) where
    R: ReminderRepository + 'static,
    D: DeviceTokenRepository + 'static,
    G: PushGateway + 'static,
{
    // First tick one period after start, however long priming takes.
    let first_tick = Instant::now() + period;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = dispatcher.prime_gateway() => {}
    }

    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: JoinSet<Result<TickReport, crate::DispatchError>> = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let dispatcher = Arc::clone(&dispatcher);
                ticks.spawn(async move { dispatcher.run_tick(Utc::now()).await });
            }
            Some(finished) = ticks.join_next(), if !ticks.is_empty() => log_tick(finished),
        }
    }

    while let Some(finished) = ticks.join_next().await {
        log_tick(finished);
    }
}

fn log_tick(finished: Result<Result<TickReport, crate::DispatchError>, JoinError>) {
    match finished {
        Ok(Ok(report)) if report.overlapped => debug!("Tick skipped, previous tick still running"),
        Ok(Ok(report)) if report.due > 0 => {
            info!(processed = report.processed(), "Processed {} reminders", report.processed())
        }
        Ok(Ok(_)) => debug!("Reminder tick found nothing to do"),
        // Already logged by the dispatcher.
        Ok(Err(_)) => {}
        Err(e) if e.is_panic() => error!(error = %e, "Reminder tick panicked"),
        Err(e) => warn!(error = %e, "Reminder tick was cancelled"),
    }
}
