//! End-to-end heartbeat scenarios against a mock gateway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use panel::heartbeat::{Heartbeat, ProcessExit};
use panel::{BeaconTarget, DisableReason, Error, GatewayClient, GatewayConfig, ReporterState};
use panel_common::{Details, Health};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BEAT_PATH: &str = "/software/python-panel/heartbeat";
const WAIT_LIMIT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct RecordingExit {
    calls: AtomicUsize,
}

impl ProcessExit for RecordingExit {
    fn exit(&self, _code: i32) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

async fn gateway() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .mount(&server)
        .await;
    server
}

fn heartbeat(server: &MockServer, interval: Duration, exit: Arc<RecordingExit>) -> Heartbeat {
    let config = GatewayConfig {
        url: server.uri(),
        username: "panel".to_string(),
        password: "secret".to_string(),
        request_timeout_secs: 10,
        token_ttl_secs: 3300,
    };
    let client = Arc::new(GatewayClient::new(&config).unwrap());
    Heartbeat::new(client, BeaconTarget::software("python-panel").unwrap())
        .with_interval(interval)
        .with_grace_period(Duration::from_millis(100))
        .with_process_exit(exit)
}

/// Bodies of all heartbeats the gateway received, in order.
async fn beats(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == BEAT_PATH)
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

/// Poll until `done` holds, panicking after [`WAIT_LIMIT`].
async fn wait_for<F, Fut>(what: &str, mut done: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    while !done().await {
        assert!(Instant::now() < deadline, "Timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

async fn wait_for_beats(server: &MockServer, count: usize) {
    wait_for("heartbeats", || async move { beats(server).await.len() >= count }).await;
}

#[tokio::test]
async fn test_start_fails_for_unregistered_entry() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let exit = Arc::new(RecordingExit::default());
    let hb = heartbeat(&server, Duration::from_millis(100), exit.clone());

    let err = hb.start().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Disabled {
            reason: DisableReason::NotRegistered,
            ..
        }
    ));
    assert!(hb.is_killed());
    assert_eq!(hb.state(), ReporterState::Killed);

    // No background loop was created
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(beats(&server).await.len(), 1);
    assert_eq!(exit.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_update_between_beats() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let hb = heartbeat(&server, Duration::from_millis(200), Arc::default());

    hb.start().await.unwrap();
    wait_for_beats(&server, 2).await;

    let mut details = Details::new();
    details.insert("disk".to_string(), json!("full"));
    hb.set_health_str("warning", Some(details)).unwrap();

    // The beat in flight at the update may carry either health; the one after it must not
    let seen = beats(&server).await.len();
    wait_for_beats(&server, seen + 2).await;
    hb.stop();

    let sent = beats(&server).await;
    assert_eq!(sent[0]["health"], "ok");
    assert_eq!(sent[1]["health"], "ok");
    assert_eq!(
        sent.last().unwrap(),
        &json!({"health": "warning", "details": {"disk": "full"}})
    );
}

#[tokio::test]
async fn test_disabled_after_first_beat_triggers_termination() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let exit = Arc::new(RecordingExit::default());
    let hb = heartbeat(&server, Duration::from_millis(200), exit.clone());
    let kill_switch = hb.kill_switch();

    hb.start().await.unwrap();
    assert!(!kill_switch.is_killed());

    // Beat 2 is refused, termination follows the 100ms grace period
    let calls = &exit.calls;
    wait_for("process exit", || async move { calls.load(Ordering::SeqCst) > 0 }).await;

    assert!(kill_switch.is_killed());
    assert_eq!(kill_switch.reason(), Some(DisableReason::Disabled));
    assert_eq!(exit.calls.load(Ordering::SeqCst), 1);
    assert_eq!(beats(&server).await.len(), 2);
    assert_eq!(hb.state(), ReporterState::Killed);
}

#[tokio::test]
async fn test_transient_failures_do_not_kill() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let exit = Arc::new(RecordingExit::default());
    let hb = heartbeat(&server, Duration::from_millis(100), exit.clone());

    hb.start().await.unwrap();
    wait_for_beats(&server, 4).await;
    hb.stop();

    assert!(!hb.is_killed());
    assert_eq!(exit.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_does_not_wait_for_in_flight_beat() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BEAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let hb = heartbeat(&server, Duration::from_millis(300), Arc::default());
    hb.start().await.unwrap();

    // Beat 2 starts at ~300ms and hangs for 3s
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let before = Instant::now();
    hb.stop();
    assert!(before.elapsed() < Duration::from_millis(500));
    assert_eq!(hb.state(), ReporterState::Stopped);

    // The in-flight beat completes but no further beat follows
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(beats(&server).await.len(), 2);
}

#[tokio::test]
async fn test_hardware_health_error_reported() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path("/hardware/pi-kitchen/heartbeat"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = GatewayConfig {
        url: server.uri(),
        username: "panel".to_string(),
        password: "secret".to_string(),
        request_timeout_secs: 10,
        token_ttl_secs: 3300,
    };
    let client = Arc::new(GatewayClient::new(&config).unwrap());
    let hb = Heartbeat::new(client, BeaconTarget::hardware("pi-kitchen", None).unwrap());
    hb.set_health(Health::Error, None);
    hb.start().await.unwrap();
    hb.stop();

    let requests = server.received_requests().await.unwrap();
    let beat = requests
        .iter()
        .find(|r| r.url.path() == "/hardware/pi-kitchen/heartbeat")
        .unwrap();
    let body: Value = beat.body_json().unwrap();
    assert_eq!(body["health"], "error");
    assert_eq!(body["details"], json!({"status": "running"}));
}
