//! Integration tests for the full recording pipeline.
//!
//! These tests drive a real session over loopback UDP:
//! - Telemetry → Listener → Event Bus → Recorder → IGC file
//! - Recording lifecycle events and zero-fix cleanup
//! - Queue draining on session shutdown
//!
//! Run with: `cargo test --test recording_pipeline`

use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;

use igcbridge::events::{Event, EventKind};
use igcbridge::igc::RecordingMetadata;
use igcbridge::session::{Session, SessionConfig, SessionError};
use igcbridge::recorder::RecorderError;

// ============================================================================
// Test Helpers
// ============================================================================

/// Session bound to an ephemeral port, writing into `dir`, admitting every fix.
fn create_session(dir: &Path) -> Session {
    let config = SessionConfig::builder()
        .udp_port(0)
        .output_dir(dir)
        .file_prefix("TEST")
        .recording_interval(Duration::ZERO)
        .consumer_yield(Duration::from_millis(1))
        .pilot_name("Jane Pilot")
        .build();
    Session::new(config)
}

/// Loopback address of the session's listener.
fn target(session: &Session) -> SocketAddr {
    let port = session.listener().local_addr().unwrap().port();
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn xgps_line(lat: f64, lon: f64, alt: f64) -> String {
    format!("XGPSAerofly FS 4,{lon},{lat},{alt},90.0,30.0")
}

/// Send each line as its own datagram, pacing them so none are coalesced.
async fn send_lines(to: SocketAddr, lines: &[String]) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    for line in lines {
        socket.send_to(line.as_bytes(), to).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the writer reports `count` fixes or the deadline passes.
async fn wait_for_fixes(session: &Session, count: u32) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if session.recorder().writer().status().await.fix_count >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {} fixes", count);
}

fn b_records(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .split("\r\n")
        .filter(|line| line.starts_with('B'))
        .map(str::to_string)
        .collect()
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(Event::kind).collect()
}

// ============================================================================
// Telemetry → IGC file
// ============================================================================

#[tokio::test]
async fn test_udp_telemetry_recorded_as_fixes() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    let path = session.start_recording(None).await.unwrap();
    assert!(path.starts_with(temp.path()));
    assert!(path.file_name().unwrap().to_str().unwrap().starts_with("TEST_"));

    let lines: Vec<String> = (0..5)
        .map(|i| xgps_line(47.0 + i as f64 * 0.01, 8.5, 1200.0))
        .collect();
    send_lines(target(&session), &lines).await;
    wait_for_fixes(&session, 5).await;

    let summary = session.stop_recording().await.unwrap();
    assert_eq!(summary.fix_count, 5);
    assert_eq!(summary.path.as_deref(), Some(path.as_path()));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("AXAFSIM\r\n"));
    assert!(content.contains("HFPLTPILOTINCHARGE:Jane Pilot\r\n"));
    assert!(content.contains("LEND Recording ended at "));

    let records = b_records(&path);
    assert_eq!(records.len(), 5);
    assert!(records[0].starts_with("B120001"));
    assert!(records[4].starts_with("B120005"));
    assert!(records.iter().all(|r| r.len() == 41));

    session.stop().await;
}

#[tokio::test]
async fn test_fixes_written_in_arrival_order() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();
    let path = session.start_recording(None).await.unwrap();

    // Latitudes A < B < C, distinguishable in the B records
    let lines = vec![
        xgps_line(10.0, 0.0, 100.0),
        xgps_line(20.0, 0.0, 100.0),
        xgps_line(30.0, 0.0, 100.0),
    ];
    send_lines(target(&session), &lines).await;
    wait_for_fixes(&session, 3).await;
    session.stop_recording().await.unwrap();

    let latitudes: Vec<String> = b_records(&path).iter().map(|r| r[7..15].to_string()).collect();
    assert_eq!(latitudes, vec!["1000000N", "2000000N", "3000000N"]);

    session.stop().await;
}

#[tokio::test]
async fn test_attitude_and_garbage_do_not_create_fixes() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();
    let path = session.start_recording(None).await.unwrap();

    let lines = vec![
        "XATTAerofly FS 4,180.5,15.3,-5.7".to_string(),
        "INVALID".to_string(),
        "XGPSSim,1,2".to_string(),
        xgps_line(47.0, 8.5, 500.0),
    ];
    send_lines(target(&session), &lines).await;
    wait_for_fixes(&session, 1).await;

    let summary = session.stop_recording().await.unwrap();
    assert_eq!(summary.fix_count, 1);
    assert_eq!(b_records(&path).len(), 1);

    let attitude = session.listener().latest_attitude().unwrap();
    assert_eq!(attitude.heading(), 180.5);
    assert!(session.listener().has_connection());
    assert!(session.listener().connection_status().datagrams_received >= 4);

    session.stop().await;
}

#[tokio::test]
async fn test_telemetry_before_recording_is_not_written() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    send_lines(target(&session), &[xgps_line(47.0, 8.5, 500.0)]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(session.recorder().latest_position().is_some());

    let path = session.start_recording(None).await.unwrap();
    send_lines(target(&session), &[xgps_line(48.0, 8.5, 500.0)]).await;
    wait_for_fixes(&session, 1).await;
    session.stop_recording().await.unwrap();

    let records = b_records(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][7..15], "4800000N");

    session.stop().await;
}

// ============================================================================
// Recording lifecycle
// ============================================================================

#[tokio::test]
async fn test_zero_fix_recording_removes_file() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    let path = session.start_recording(None).await.unwrap();
    assert!(path.exists());

    let summary = session.stop_recording().await.unwrap();
    assert_eq!(summary.fix_count, 0);
    assert!(summary.path.is_none());
    assert!(!path.exists());

    let stopped = session.bus().history_of(EventKind::RecordingStopped);
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0].get("filename"), Some(&Value::Null));
    assert_eq!(stopped[0].get("fix_count"), Some(&Value::from(0)));

    session.stop().await;
}

#[tokio::test]
async fn test_double_start_recording_keeps_first_session() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    let first = session.start_recording(None).await.unwrap();
    let err = session.start_recording(None).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Recorder(RecorderError::AlreadyRecording)
    ));

    send_lines(target(&session), &[xgps_line(47.0, 8.5, 500.0)]).await;
    wait_for_fixes(&session, 1).await;

    let summary = session.stop_recording().await.unwrap();
    assert_eq!(summary.path.as_deref(), Some(first.as_path()));
    assert_eq!(summary.fix_count, 1);

    session.stop().await;
}

#[tokio::test]
async fn test_recording_requires_running_session() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());

    assert!(matches!(
        session.start_recording(None).await,
        Err(SessionError::NotRunning)
    ));
    assert!(matches!(
        session.stop_recording().await,
        Err(SessionError::NotRunning)
    ));

    session.start().await.unwrap();
    assert!(matches!(
        session.stop_recording().await,
        Err(SessionError::Recorder(RecorderError::NotRecording))
    ));
    session.stop().await;
}

#[tokio::test]
async fn test_metadata_overrides_defaults() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    let metadata = RecordingMetadata {
        pilot_name: String::new(),
        glider_type: "ASK 21".to_string(),
        glider_id: "D-1234".to_string(),
        competition_class: Some("Club".to_string()),
    };
    let path = session.start_recording(Some(metadata)).await.unwrap();
    send_lines(target(&session), &[xgps_line(47.0, 8.5, 500.0)]).await;
    wait_for_fixes(&session, 1).await;
    session.stop_recording().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("HFPLTPILOTINCHARGE:Jane Pilot\r\n"));
    assert!(content.contains("HFGTYGLIDERTYPE:ASK 21\r\n"));
    assert!(content.contains("HFGIDGLIDERID:D-1234\r\n"));
    assert!(content.contains("HFCCLCOMPETITIONCLASS:Club\r\n"));

    session.stop().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_session_stop_closes_open_recording() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();
    let path = session.start_recording(None).await.unwrap();

    let lines: Vec<String> = (0..10)
        .map(|i| xgps_line(47.0, 8.5 + i as f64 * 0.001, 900.0))
        .collect();
    send_lines(target(&session), &lines).await;
    wait_for_fixes(&session, 10).await;

    session.stop().await;
    assert!(!session.is_running().await);
    assert!(!session.recorder().writer().is_recording().await);

    assert_eq!(b_records(&path).len(), 10);
    let history = kinds(&session.bus().history());
    assert!(history.contains(&EventKind::RecordingStopped));
    assert_eq!(history.last(), Some(&EventKind::ConnectionLost));
}

#[tokio::test]
async fn test_shutdown_request_cancels_token() {
    let temp = TempDir::new().unwrap();
    let session = create_session(temp.path());
    session.start().await.unwrap();

    let token = session.shutdown_token();
    assert!(!token.is_cancelled());

    session.request_shutdown();
    tokio::time::timeout(Duration::from_secs(1), token.cancelled())
        .await
        .expect("shutdown token should be cancelled");

    session.stop().await;
}
