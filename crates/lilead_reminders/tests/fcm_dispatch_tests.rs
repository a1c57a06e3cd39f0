use chrono::Utc;
use lilead_common::Platform;
use lilead_firebase::{FcmClient, FcmPushGateway, FirebaseAuth, RetryPolicy};
use lilead_reminders::{DispatcherSettings, ReminderDispatcher};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fixtures::{due_reminder, InMemoryDevices, InMemoryReminders};

const SEND_PATH: &str = "/v1/projects/lilead-test/messages:send";

fn fcm_dispatcher(
    base_url: &str,
    reminders: &Arc<InMemoryReminders>,
    devices: &Arc<InMemoryDevices>,
) -> ReminderDispatcher<InMemoryReminders, InMemoryDevices, FcmPushGateway> {
    let client = FcmClient::new(
        base_url,
        "lilead-test",
        FirebaseAuth::static_token("test-token"),
        Duration::from_secs(5),
        RetryPolicy::new(1, Duration::from_millis(1)),
    )
    .unwrap();

    ReminderDispatcher::new(
        Arc::clone(reminders),
        Arc::clone(devices),
        Arc::new(FcmPushGateway::with_client(client, 500, 4)),
        DispatcherSettings::default(),
    )
}

fn google_error(status: u16, google_status: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": { "code": status, "message": "from test server", "status": google_status }
    }))
}

async fn assert_left_unsent(response: ResponseTemplate) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(response)
        .mount(&server)
        .await;

    let reminders = Arc::new(InMemoryReminders::with(vec![due_reminder(
        "note-1", "alice", "Call back", 1,
    )]));
    let devices = Arc::new(InMemoryDevices::with(&[
        ("alice", "tok-ios", Platform::Ios),
        ("alice", "tok-android", Platform::Android),
    ]));
    let dispatcher = fcm_dispatcher(&server.uri(), &reminders, &devices);

    let report = dispatcher.run_tick(Utc::now()).await.unwrap();

    assert_eq!(report.skipped_unavailable, 1);
    assert_eq!(report.marked_sent, 0);
    assert!(!reminders.is_sent("note-1"));
    assert_eq!(reminders.transitions.load(Ordering::SeqCst), 0);
    assert_eq!(devices.tokens().len(), 2);
}

#[tokio::test]
async fn test_provider_outage_leaves_reminder_unsent() {
    assert_left_unsent(google_error(503, "UNAVAILABLE")).await;
}

#[tokio::test]
async fn test_provider_internal_errors_leave_reminder_unsent() {
    assert_left_unsent(google_error(500, "INTERNAL")).await;
}

#[tokio::test]
async fn test_rejected_credentials_leave_reminder_unsent() {
    assert_left_unsent(google_error(401, "UNAUTHENTICATED")).await;
}

#[tokio::test]
async fn test_partial_delivery_marks_reminder_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/lilead-test/messages/1" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(google_error(503, "UNAVAILABLE"))
        .mount(&server)
        .await;

    let reminders = Arc::new(InMemoryReminders::with(vec![due_reminder(
        "note-1", "alice", "Call back", 1,
    )]));
    let devices = Arc::new(InMemoryDevices::with(&[
        ("alice", "tok-ios", Platform::Ios),
        ("alice", "tok-android", Platform::Android),
    ]));
    let dispatcher = fcm_dispatcher(&server.uri(), &reminders, &devices);

    let report = dispatcher.run_tick(Utc::now()).await.unwrap();

    assert_eq!(report.deliveries, 1);
    assert_eq!(report.marked_sent, 1);
    assert!(reminders.is_sent("note-1"));
    // Transient failures keep the token.
    assert_eq!(devices.tokens().len(), 2);
}
