// --- File: crates/services/lilead_backend/src/app_state.rs ---
use lilead_config::AppConfig;
use lilead_db::{DbClient, DbError, SqlDeviceTokenRepository, SqlReminderRepository};
use lilead_db::{DeviceTokenRepository, RepositoryFactory, ReminderRepository, SqlRepositoryFactory};
use lilead_firebase::{FcmPushGateway, PushGateway};
use lilead_reminders::{DispatcherSettings, ReminderDispatcher, ReminderScheduler};
use std::sync::Arc;
use std::time::Duration;

pub type Dispatcher =
    ReminderDispatcher<SqlReminderRepository, SqlDeviceTokenRepository, FcmPushGateway>;
pub type Scheduler =
    ReminderScheduler<SqlReminderRepository, SqlDeviceTokenRepository, FcmPushGateway>;

/// Application state that is shared across all routes.
///
/// Built once by the startup sequence; handlers only clone the `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The application configuration.
    pub config: Arc<AppConfig>,

    /// Device registry, shared with the dispatcher.
    pub devices: Arc<SqlDeviceTokenRepository>,

    /// Lifecycle manager of the reminder loop.
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wires repositories, push gateway, dispatcher and scheduler over `db`.
    ///
    /// The schema of both stores is created if missing. The scheduler is
    /// returned stopped.
    pub async fn new(
        config: Arc<AppConfig>,
        db: DbClient,
        gateway: FcmPushGateway,
    ) -> Result<Self, DbError> {
        let factory = SqlRepositoryFactory::new();
        let reminders: SqlReminderRepository = factory.create_repository(db.clone());
        let devices: SqlDeviceTokenRepository = factory.create_repository(db);
        reminders.init_schema().await?;
        devices.init_schema().await?;

        let devices = Arc::new(devices);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(reminders),
            Arc::clone(&devices),
            Arc::new(gateway),
            DispatcherSettings::from_config(&config.scheduler),
        ));
        let scheduler = Arc::new(Scheduler::new(
            dispatcher,
            Duration::from_secs(config.scheduler.tick_interval_secs.max(1)),
        ));

        Ok(Self {
            config,
            devices,
            scheduler,
        })
    }

    pub fn push_enabled(&self) -> bool {
        self.scheduler.dispatcher().gateway().is_enabled()
    }
}
