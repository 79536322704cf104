use super::*;
use crate::config::{DCameraConfig, DeviceConfig};
use crate::source::SourceState;
use crate::types::{DCameraIndex, DHBase};
use std::time::Duration;

fn create_test_config() -> DCameraConfig {
    let mut config = DCameraConfig::default();
    config.devices = vec![
        DeviceConfig {
            dev_id: "4b7e2a90c1d35f68".to_string(),
            dh_id: "camera_0".to_string(),
            attrs: r#"{"CodecType":["avc/h264"]}"#.to_string(),
        },
        DeviceConfig {
            dev_id: "4b7e2a90c1d35f68".to_string(),
            dh_id: "camera_1".to_string(),
            attrs: String::new(),
        },
    ];
    config
}

#[tokio::test]
async fn test_app_creation() {
    let app = DCameraApp::new(create_test_config()).unwrap();
    assert!(app.get_all_component_states().await.is_empty());
    assert_eq!(app.service().device_count().await, 0);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let mut config = create_test_config();
    config.source.event_queue_capacity = 0;
    assert!(DCameraApp::new(config).is_err());
}

#[tokio::test]
async fn test_start_registers_configured_cameras() {
    let mut app = DCameraApp::new(create_test_config()).unwrap();
    assert_eq!(app.start().await.unwrap(), 2);

    let service = app.service();
    let index = DCameraIndex::new("4b7e2a90c1d35f68", "camera_0");
    let device = service.device(&index).await.unwrap();
    assert_eq!(device.state(), SourceState::Registered);
    assert_eq!(device.version(), app.config().source.version);
    assert!(app
        .provider()
        .is_enabled(&DHBase::new("4b7e2a90c1d35f68", "camera_1")));

    assert_eq!(
        app.get_component_state("source_service").await,
        Some(ComponentState::Running)
    );
}

#[tokio::test]
async fn test_start_skips_failing_camera() {
    let mut app = DCameraApp::new(create_test_config()).unwrap();
    app.provider().fail_on("enable_device");
    assert_eq!(app.start().await.unwrap(), 0);
    assert_eq!(app.service().device_count().await, 0);
}

#[tokio::test]
async fn test_run_until_triggered() {
    let mut app = DCameraApp::new(create_test_config()).unwrap();
    app.start().await.unwrap();
    let service = app.service();
    let provider = app.provider();
    let trigger = app.shutdown_trigger();

    let handle = tokio::spawn(async move { app.run().await });
    assert!(trigger.trigger(ShutdownReason::UserRequest).await);
    assert!(!trigger.trigger(ShutdownReason::UserRequest).await);

    let exit_code = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(service.device_count().await, 0);
    assert_eq!(provider.enabled_count(), 0);
}

#[tokio::test]
async fn test_shutdown_on_error_reports_failure() {
    let mut app = DCameraApp::new(create_test_config()).unwrap();
    app.start().await.unwrap();
    let exit_code = app
        .shutdown(ShutdownReason::Error("control channel lost".to_string()))
        .await
        .unwrap();
    assert_eq!(exit_code, 1);
    assert_eq!(
        app.get_component_state("event_monitor").await,
        Some(ComponentState::Stopped)
    );
}

#[test]
fn test_shutdown_reason_display() {
    assert_eq!(
        ShutdownReason::Signal("SIGTERM".to_string()).to_string(),
        "signal SIGTERM"
    );
    assert_eq!(ShutdownReason::UserRequest.to_string(), "user request");
}
