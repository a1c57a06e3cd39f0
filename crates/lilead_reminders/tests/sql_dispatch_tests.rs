use chrono::{Duration as ChronoDuration, Utc};
use lilead_common::{Platform, Reminder};
use lilead_db::{
    DbClient, DeviceTokenRepository, ReminderRepository, SqlDeviceTokenRepository,
    SqlReminderRepository,
};
use lilead_firebase::DeliveryErrorKind;
use lilead_reminders::{DispatcherSettings, ReminderDispatcher};
use std::sync::Arc;

use fixtures::{FakeGateway, GatewayMode};

async fn stores() -> (Arc<SqlReminderRepository>, Arc<SqlDeviceTokenRepository>) {
    let db = DbClient::from_url("sqlite::memory:").await.unwrap();
    let reminders = SqlReminderRepository::new(db.clone());
    let devices = SqlDeviceTokenRepository::new(db);
    reminders.init_schema().await.unwrap();
    devices.init_schema().await.unwrap();
    (Arc::new(reminders), Arc::new(devices))
}

fn note(id: &str, user_id: &str, minutes_from_now: i64) -> Reminder {
    Reminder {
        id: id.to_string(),
        lead_id: "lead-1".to_string(),
        user_id: user_id.to_string(),
        content: format!("Reminder {id}"),
        reminder_at: Some(Utc::now() + ChronoDuration::minutes(minutes_from_now)),
        reminder_sent: false,
    }
}

#[tokio::test]
async fn test_tick_against_sql_stores() {
    let (reminders, devices) = stores().await;
    reminders.insert(&note("due", "alice", -5)).await.unwrap();
    reminders.insert(&note("later", "alice", 30)).await.unwrap();
    devices.register("alice", "T1", Platform::Ios).await.unwrap();
    devices
        .register("alice", "T2", Platform::Android)
        .await
        .unwrap();

    let gateway = FakeGateway::healthy();
    gateway.fail_token("T2", DeliveryErrorKind::Unregistered);
    let gateway = Arc::new(gateway);

    let dispatcher = ReminderDispatcher::new(
        Arc::clone(&reminders),
        Arc::clone(&devices),
        Arc::clone(&gateway),
        DispatcherSettings::default(),
    );

    let report = dispatcher.run_tick(Utc::now()).await.unwrap();

    assert_eq!(report.due, 1);
    assert_eq!(report.marked_sent, 1);
    assert_eq!(report.tokens_removed, 1);

    let remaining: Vec<String> = devices
        .tokens_for_user("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.token)
        .collect();
    assert_eq!(remaining, vec!["T1".to_string()]);

    assert!(reminders.find_by_id("due").await.unwrap().unwrap().reminder_sent);
    assert!(!reminders.find_by_id("later").await.unwrap().unwrap().reminder_sent);
    assert!(reminders.find_due(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unavailable_gateway_keeps_sql_reminder_due() {
    let (reminders, devices) = stores().await;
    reminders.insert(&note("due", "alice", -1)).await.unwrap();
    devices.register("alice", "T1", Platform::Web).await.unwrap();

    let dispatcher = ReminderDispatcher::new(
        Arc::clone(&reminders),
        Arc::clone(&devices),
        Arc::new(FakeGateway::new(GatewayMode::Unavailable)),
        DispatcherSettings::default(),
    );

    let report = dispatcher.run_tick(Utc::now()).await.unwrap();

    assert_eq!(report.skipped_unavailable, 1);
    let due = reminders.find_due(Utc::now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, "due");
}
