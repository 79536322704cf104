use super::*;
use crate::config::DCameraConfig;
use crate::error::{errno, DCameraError, Result};
use crate::events::{DCameraEvent, EventBus, EventFilter};
use crate::provider::{DCamRetCode, SimulatedProvider};
use crate::types::{
    DCCaptureInfo, DCStreamInfo, DCameraIndex, DCameraSettings, DHBase, EnableParam, EncodeType,
    HdfEventResult, HdfEventType, HdiCameraSettings, HdiCaptureInfo, HdiStreamInfo, SettingsType,
    StreamType,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

const DEV_ID: &str = "f6d4c0e1b2a3948576";
const DH_ID: &str = "camera_0";

/// Records which actions ran and fails the ones it is told to
#[derive(Default)]
struct MockActions {
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    streams_left: bool,
    captures_left: bool,
}

impl MockActions {
    fn run(&mut self, action: &'static str) -> Result<()> {
        self.calls.push(action);
        if self.failing.contains(action) {
            return Err(DCameraError::component("mock".to_string(), action.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceActions for MockActions {
    async fn register(&mut self, _param: &RegisterParam) -> Result<()> {
        self.run("register")
    }

    async fn unregister(&mut self, _param: &RegisterParam) -> Result<()> {
        self.run("unregister")
    }

    async fn open(&mut self, _index: &DCameraIndex) -> Result<()> {
        self.run("open")
    }

    async fn close(&mut self) -> Result<()> {
        self.run("close")
    }

    async fn config_streams(&mut self, _streams: &[Arc<DCStreamInfo>]) -> Result<()> {
        self.run("config_streams")
    }

    async fn release_all_streams(&mut self) -> Result<()> {
        self.run("release_all_streams")
    }

    async fn release_streams(&mut self, _stream_ids: &[i32]) -> Result<bool> {
        self.run("release_streams")?;
        Ok(!self.streams_left)
    }

    async fn start_capture(&mut self, _captures: &[Arc<DCCaptureInfo>]) -> Result<()> {
        self.run("start_capture")
    }

    async fn stop_capture(&mut self, _stream_ids: &[i32]) -> Result<bool> {
        self.run("stop_capture")?;
        Ok(!self.captures_left)
    }

    async fn update_settings(&mut self, _settings: &[Arc<DCameraSettings>]) -> Result<()> {
        self.run("update_settings")
    }

    async fn event_notify(&mut self, _event: &CameraEvent) -> Result<()> {
        self.run("event_notify")
    }
}

fn register_param() -> RegisterParam {
    RegisterParam {
        dev_id: DEV_ID.to_string(),
        dh_id: DH_ID.to_string(),
        req_id: "req-1".to_string(),
        param: EnableParam {
            version: "1.0".to_string(),
            attrs: "{}".to_string(),
        },
    }
}

fn index() -> DCameraIndex {
    DCameraIndex::new(DEV_ID, DH_ID)
}

fn dc_stream(id: i32) -> Arc<DCStreamInfo> {
    Arc::new(DCStreamInfo {
        stream_id: id,
        width: 1280,
        height: 720,
        stride: 0,
        format: 1,
        dataspace: 0,
        encode_type: EncodeType::H264,
        stream_type: StreamType::Continuous,
    })
}

fn sink_event(result: HdfEventResult) -> CameraEvent {
    CameraEvent {
        event_type: HdfEventType::Message,
        event_result: result,
        event_content: String::new(),
    }
}

async fn machine_in(state: SourceState, actions: &mut MockActions) -> StateMachine {
    let mut machine = StateMachine::new();
    let path = [
        (SourceState::Registered, SourceEventData::Register(register_param())),
        (SourceState::Opened, SourceEventData::Open(index())),
        (
            SourceState::Configured,
            SourceEventData::ConfigStreams(vec![dc_stream(1)]),
        ),
        (SourceState::Capture, SourceEventData::StartCapture(Vec::new())),
    ];
    for (target, data) in path {
        if machine.state() == state {
            break;
        }
        machine.execute(actions, &data).await.unwrap();
        assert_eq!(machine.state(), target);
    }
    actions.calls.clear();
    machine
}

#[tokio::test]
async fn test_state_machine_full_lifecycle() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Capture, &mut actions).await;

    machine
        .execute(&mut actions, &SourceEventData::StopCapture(vec![1]))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Configured);

    machine
        .execute(&mut actions, &SourceEventData::ReleaseStreams(vec![1]))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Opened);

    machine
        .execute(&mut actions, &SourceEventData::Close(index()))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Registered);

    machine
        .execute(&mut actions, &SourceEventData::Unregister(register_param()))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Init);
    assert_eq!(
        actions.calls,
        vec!["stop_capture", "release_streams", "close", "unregister"]
    );
}

#[tokio::test]
async fn test_wrong_state_leaves_state_untouched() {
    let mut actions = MockActions::default();
    let mut machine = StateMachine::new();

    let result = machine
        .execute(&mut actions, &SourceEventData::Open(index()))
        .await;
    assert!(matches!(result, Err(DCameraError::WrongState { .. })));
    assert_eq!(machine.state(), SourceState::Init);

    let mut machine = machine_in(SourceState::Registered, &mut actions).await;
    let result = machine
        .execute(&mut actions, &SourceEventData::StartCapture(Vec::new()))
        .await;
    assert_eq!(result.unwrap_err().code(), errno::DCAMERA_WRONG_STATE);
    assert_eq!(machine.state(), SourceState::Registered);
    assert!(actions.calls.is_empty());
}

#[tokio::test]
async fn test_failed_action_keeps_state() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Registered, &mut actions).await;
    actions.failing.insert("open");

    assert!(machine
        .execute(&mut actions, &SourceEventData::Open(index()))
        .await
        .is_err());
    assert_eq!(machine.state(), SourceState::Registered);
}

#[tokio::test]
async fn test_idempotent_requests_are_noops() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Configured, &mut actions).await;

    machine
        .execute(&mut actions, &SourceEventData::Open(index()))
        .await
        .unwrap();
    machine
        .execute(&mut actions, &SourceEventData::StopCapture(vec![1]))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Configured);
    assert!(actions.calls.is_empty());
}

#[tokio::test]
async fn test_partial_release_and_stop_keep_state() {
    let mut actions = MockActions {
        captures_left: true,
        streams_left: true,
        ..Default::default()
    };
    let mut machine = machine_in(SourceState::Capture, &mut actions).await;

    machine
        .execute(&mut actions, &SourceEventData::StopCapture(vec![1]))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Capture);

    actions.captures_left = false;
    machine
        .execute(&mut actions, &SourceEventData::StopCapture(vec![2]))
        .await
        .unwrap();
    machine
        .execute(&mut actions, &SourceEventData::ReleaseStreams(vec![1]))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Configured);
}

#[tokio::test]
async fn test_failed_reconfiguration_falls_back_to_opened() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Configured, &mut actions).await;
    actions.failing.insert("config_streams");

    let result = machine
        .execute(
            &mut actions,
            &SourceEventData::ConfigStreams(vec![dc_stream(2)]),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(machine.state(), SourceState::Opened);
    assert_eq!(actions.calls, vec!["release_all_streams", "config_streams"]);
}

#[tokio::test]
async fn test_unregister_from_capture_closes_first() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Capture, &mut actions).await;

    machine
        .execute(&mut actions, &SourceEventData::Unregister(register_param()))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Init);
    assert_eq!(actions.calls, vec!["close", "unregister"]);
}

#[tokio::test]
async fn test_failed_unregister_after_close_stays_registered() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Opened, &mut actions).await;
    actions.failing.insert("unregister");

    assert!(machine
        .execute(&mut actions, &SourceEventData::Unregister(register_param()))
        .await
        .is_err());
    assert_eq!(machine.state(), SourceState::Registered);
    assert_eq!(actions.calls, vec!["close", "unregister"]);

    actions.failing.clear();
    machine
        .execute(&mut actions, &SourceEventData::Unregister(register_param()))
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Init);
}

#[tokio::test]
async fn test_channel_disconnect_closes_session() {
    let mut actions = MockActions::default();
    let mut machine = machine_in(SourceState::Configured, &mut actions).await;

    machine
        .execute(
            &mut actions,
            &SourceEventData::EventNotify(sink_event(HdfEventResult::DeviceError)),
        )
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Configured);

    machine
        .execute(
            &mut actions,
            &SourceEventData::EventNotify(sink_event(HdfEventResult::ChannelDisconnected)),
        )
        .await
        .unwrap();
    assert_eq!(machine.state(), SourceState::Registered);
    assert_eq!(actions.calls, vec!["event_notify", "event_notify", "close"]);

    let mut machine = StateMachine::new();
    assert!(machine
        .execute(
            &mut actions,
            &SourceEventData::EventNotify(sink_event(HdfEventResult::ChannelDisconnected)),
        )
        .await
        .is_err());
}

struct Harness {
    service: SourceService,
    backend: Arc<SimulatedBackend>,
    provider: Arc<SimulatedProvider>,
    listener: Arc<RecordingListener>,
    event_bus: Arc<EventBus>,
}

impl Harness {
    fn new() -> Self {
        let config = DCameraConfig::default();
        let backend = Arc::new(SimulatedBackend::new(config.source.metadata_cache_size));
        let provider = Arc::new(SimulatedProvider::new());
        let listener = Arc::new(RecordingListener::new());
        let event_bus = Arc::new(EventBus::new(config.source.event_bus_capacity));
        let service = SourceService::new(
            &config,
            backend.clone(),
            provider.clone(),
            listener.clone(),
            Arc::clone(&event_bus),
        );
        Self {
            service,
            backend,
            provider,
            listener,
            event_bus,
        }
    }

    async fn register(&self) -> Result<()> {
        self.service
            .register_distributed_hardware(
                DEV_ID,
                DH_ID,
                "req-1",
                EnableParam {
                    version: "1.0".to_string(),
                    attrs: r#"{"CodecType":["avc/h264"]}"#.to_string(),
                },
            )
            .await
    }

    fn dh_base(&self) -> DHBase {
        DHBase::new(DEV_ID, DH_ID)
    }

    fn callback(&self) -> Arc<crate::provider::ProviderCallback> {
        self.provider.callback(&self.dh_base()).unwrap()
    }

    async fn state(&self) -> SourceState {
        self.service.device(&index()).await.unwrap().state()
    }
}

fn hdi_stream(id: i32) -> HdiStreamInfo {
    HdiStreamInfo {
        stream_id: id,
        width: 1920,
        height: 1080,
        stride: 0,
        format: 1,
        dataspace: 0,
        encode_type: EncodeType::H264 as i32,
        stream_type: StreamType::Continuous as i32,
    }
}

fn hdi_capture(ids: Vec<i32>) -> HdiCaptureInfo {
    HdiCaptureInfo {
        stream_ids: ids,
        width: 1920,
        height: 1080,
        format: 1,
        is_capture: true,
        encode_type: EncodeType::H264 as i32,
        stream_type: StreamType::Continuous as i32,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_enables_provider() {
    let harness = Harness::new();
    harness.register().await.unwrap();

    assert_eq!(harness.state().await, SourceState::Registered);
    assert!(harness.provider.is_enabled(&harness.dh_base()));
    assert_eq!(
        harness.provider.abilities(&harness.dh_base()).unwrap(),
        r#"{"CodecType":["avc/h264"]}"#
    );

    let results = harness.listener.register_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, errno::DCAMERA_OK);
    assert_eq!(results[0].req_id, "req-1");

    let device = harness.service.device(&index()).await.unwrap();
    assert_eq!(device.version(), "1.0");
}

#[tokio::test]
async fn test_register_failure_reports_and_drops_device() {
    let harness = Harness::new();
    harness.provider.fail_on("enable_device");

    assert!(harness.register().await.is_err());
    assert_eq!(harness.service.device_count().await, 0);

    let results = harness.listener.register_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, errno::DCAMERA_BAD_OPERATE);
}

#[tokio::test]
async fn test_register_rejects_oversized_ids() {
    let harness = Harness::new();
    let long_id = "d".repeat(257);
    let result = harness
        .service
        .register_distributed_hardware(&long_id, DH_ID, "req-1", EnableParam::default())
        .await;
    assert!(matches!(result, Err(DCameraError::Validation(_))));
    assert_eq!(harness.service.device_count().await, 0);
}

#[tokio::test]
async fn test_session_lifecycle_through_callback() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    let input = harness.backend.input(&index()).unwrap();
    let controller = harness.backend.controller(&index()).unwrap();

    assert_eq!(callback.open_session(&dh_base).await, DCamRetCode::Success);
    assert_eq!(harness.state().await, SourceState::Opened);
    assert!(controller.is_channel_open());
    assert!(input.is_channel_open());

    assert_eq!(
        callback
            .configure_streams(&dh_base, &[hdi_stream(1), hdi_stream(2)])
            .await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Configured);
    assert_eq!(input.configured_streams(), vec![1, 2]);

    assert_eq!(
        callback
            .start_capture(&dh_base, &[hdi_capture(vec![1, 2])])
            .await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Capture);
    assert!(controller.is_capturing());

    assert_eq!(
        callback.stop_capture(&dh_base, &[1]).await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Capture);
    assert_eq!(
        callback.stop_capture(&dh_base, &[2]).await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Configured);
    assert!(!controller.is_capturing());

    assert_eq!(
        callback.release_streams(&dh_base, &[1, 2]).await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Opened);

    assert_eq!(callback.close_session(&dh_base).await, DCamRetCode::Success);
    assert_eq!(harness.state().await, SourceState::Registered);
    assert!(!controller.is_channel_open());

    harness
        .service
        .unregister_distributed_hardware(DEV_ID, DH_ID, "req-2")
        .await
        .unwrap();
    assert_eq!(harness.service.device_count().await, 0);
    assert!(!harness.provider.is_enabled(&dh_base));
    assert_eq!(harness.listener.unregister_results()[0].req_id, "req-2");
}

#[tokio::test]
async fn test_wrong_state_call_fails_without_transition() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();

    assert_eq!(
        callback
            .configure_streams(&harness.dh_base(), &[hdi_stream(1)])
            .await,
        DCamRetCode::Failed
    );
    assert_eq!(harness.state().await, SourceState::Registered);
}

#[tokio::test]
async fn test_close_from_capture_tears_everything_down() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();

    callback.open_session(&dh_base).await;
    callback.configure_streams(&dh_base, &[hdi_stream(1)]).await;
    callback.start_capture(&dh_base, &[hdi_capture(vec![1])]).await;
    assert_eq!(harness.state().await, SourceState::Capture);

    assert_eq!(callback.close_session(&dh_base).await, DCamRetCode::Success);
    assert_eq!(harness.state().await, SourceState::Registered);

    let input = harness.backend.input(&index()).unwrap();
    assert!(input.capturing_streams().is_empty());
    assert!(input.configured_streams().is_empty());
    assert!(!input.is_channel_open());
}

#[tokio::test]
async fn test_controller_capture_failure_rolls_back() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    callback.open_session(&dh_base).await;
    callback.configure_streams(&dh_base, &[hdi_stream(1)]).await;

    harness
        .backend
        .controller(&index())
        .unwrap()
        .fail_on("start_capture");
    assert_eq!(
        callback.start_capture(&dh_base, &[hdi_capture(vec![1])]).await,
        DCamRetCode::Failed
    );
    assert_eq!(harness.state().await, SourceState::Configured);
    assert!(harness
        .backend
        .input(&index())
        .unwrap()
        .capturing_streams()
        .is_empty());
    assert!(harness
        .provider
        .notifications()
        .iter()
        .any(|(_, event)| event.result == HdfEventResult::StartCaptureError));
}

#[tokio::test]
async fn test_open_failure_notifies_provider() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    harness
        .backend
        .input(&index())
        .unwrap()
        .fail_on("open_channel");

    let callback = harness.callback();
    assert_eq!(
        callback.open_session(&harness.dh_base()).await,
        DCamRetCode::Failed
    );
    assert_eq!(harness.state().await, SourceState::Registered);
    assert!(!harness
        .backend
        .controller(&index())
        .unwrap()
        .is_channel_open());
    assert!(harness
        .provider
        .notifications()
        .iter()
        .any(|(_, event)| event.result == HdfEventResult::OpenChannelError));
}

#[tokio::test]
async fn test_settings_cached_until_session_opens() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    let settings = [HdiCameraSettings {
        setting_type: SettingsType::UpdateMetadata as i32,
        value: "bWV0YWRhdGE=".to_string(),
    }];

    assert_eq!(
        callback.update_settings(&dh_base, &settings).await,
        DCamRetCode::Success
    );
    let controller = harness.backend.controller(&index()).unwrap();
    assert_eq!(controller.cached_metadata(), vec!["bWV0YWRhdGE="]);

    callback.open_session(&dh_base).await;
    assert!(controller.cached_metadata().is_empty());
    assert_eq!(controller.applied_metadata(), vec!["bWV0YWRhdGE="]);
}

#[tokio::test]
async fn test_sink_disconnect_returns_to_registered() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    callback.open_session(&dh_base).await;
    callback.configure_streams(&dh_base, &[hdi_stream(1)]).await;

    let json = build_event_cmd(DH_ID, &sink_event(HdfEventResult::ChannelDisconnected)).unwrap();
    harness
        .service
        .dcamera_notify(DEV_ID, DH_ID, &json)
        .await
        .unwrap();

    assert_eq!(harness.state().await, SourceState::Registered);
    assert!(harness
        .provider
        .notifications()
        .iter()
        .any(|(_, event)| event.result == HdfEventResult::ChannelDisconnected));
}

#[tokio::test]
async fn test_notify_rejects_bad_payloads() {
    let harness = Harness::new();
    harness.register().await.unwrap();

    let result = harness
        .service
        .dcamera_notify(DEV_ID, DH_ID, "{not json")
        .await;
    assert!(matches!(result, Err(DCameraError::BadValue { .. })));

    let json = build_event_cmd(DH_ID, &sink_event(HdfEventResult::DeviceError)).unwrap();
    let result = harness.service.dcamera_notify(DEV_ID, "camera_9", &json).await;
    assert!(matches!(result, Err(DCameraError::NotFound { .. })));
    assert_eq!(harness.state().await, SourceState::Registered);
}

#[tokio::test]
async fn test_events_execute_in_submission_order() {
    let harness = Harness::new();
    let mut receiver = harness
        .event_bus
        .subscribe_filtered(EventFilter::EventTypes(vec!["state_changed"]), "test");
    harness.register().await.unwrap();
    let device = harness.service.device(&index()).await.unwrap();

    let validator = crate::provider::Validator::default();
    let streams = validator.stream_infos(&[hdi_stream(1)]).unwrap();
    let captures = validator.capture_infos(&[hdi_capture(vec![1])]).unwrap();

    let completions = vec![
        device.open_session(index()).unwrap(),
        device.config_streams(streams).unwrap(),
        device.start_capture(captures).unwrap(),
        device.stop_capture(vec![1]).unwrap(),
        device.close_session(index()).unwrap(),
    ];
    for completion in completions {
        completion.wait().await.unwrap();
    }

    let mut transitions = Vec::new();
    while let Ok(Some(event)) = receiver.try_recv() {
        if let DCameraEvent::StateChanged { to, .. } = event {
            transitions.push(to);
        }
    }
    assert_eq!(
        transitions,
        vec![
            SourceState::Registered,
            SourceState::Opened,
            SourceState::Configured,
            SourceState::Capture,
            SourceState::Configured,
            SourceState::Registered,
        ]
    );
}

#[tokio::test]
async fn test_shutdown_unregisters_all_devices() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    harness
        .service
        .register_distributed_hardware(DEV_ID, "camera_1", "req-3", EnableParam::default())
        .await
        .unwrap();
    assert_eq!(harness.provider.enabled_count(), 2);

    harness.service.shutdown().await;
    assert_eq!(harness.service.device_count().await, 0);
    assert_eq!(harness.provider.enabled_count(), 0);
    assert_eq!(harness.listener.unregister_results().len(), 2);
}

#[tokio::test]
async fn test_failed_capture_keeps_running_streams() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    callback.open_session(&dh_base).await;
    callback
        .configure_streams(&dh_base, &[hdi_stream(1), hdi_stream(2)])
        .await;
    assert_eq!(
        callback.start_capture(&dh_base, &[hdi_capture(vec![1])]).await,
        DCamRetCode::Success
    );

    let input = harness.backend.input(&index()).unwrap();
    let controller = harness.backend.controller(&index()).unwrap();
    controller.fail_on("start_capture");
    assert_eq!(
        callback.start_capture(&dh_base, &[hdi_capture(vec![1])]).await,
        DCamRetCode::Failed
    );
    assert_eq!(input.capturing_streams(), vec![1]);
    assert_eq!(
        callback
            .start_capture(&dh_base, &[hdi_capture(vec![1, 2])])
            .await,
        DCamRetCode::Failed
    );
    assert_eq!(harness.state().await, SourceState::Capture);
    assert_eq!(input.capturing_streams(), vec![1]);

    controller.recover("start_capture");
    assert_eq!(
        callback.stop_capture(&dh_base, &[1]).await,
        DCamRetCode::Success
    );
    assert_eq!(harness.state().await, SourceState::Configured);
    assert!(!controller.is_capturing());
}

#[tokio::test]
async fn test_snapshot_without_capture_request_starts_nothing() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    callback.open_session(&dh_base).await;
    let snapshot = HdiStreamInfo {
        stream_type: StreamType::Snapshot as i32,
        ..hdi_stream(3)
    };
    callback.configure_streams(&dh_base, &[snapshot]).await;

    let capture = HdiCaptureInfo {
        is_capture: false,
        stream_type: StreamType::Snapshot as i32,
        ..hdi_capture(vec![3])
    };
    assert_eq!(
        callback.start_capture(&dh_base, &[capture]).await,
        DCamRetCode::Failed
    );
    assert_eq!(harness.state().await, SourceState::Configured);
    assert!(harness
        .backend
        .input(&index())
        .unwrap()
        .capturing_streams()
        .is_empty());
    assert!(!harness
        .backend
        .controller(&index())
        .unwrap()
        .is_capturing());
    assert!(harness
        .provider
        .notifications()
        .iter()
        .any(|(_, event)| event.result == HdfEventResult::StartCaptureError));
}

#[tokio::test]
async fn test_refused_disable_leaves_camera_registered() {
    let harness = Harness::new();
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();
    callback.open_session(&dh_base).await;
    let device = harness.service.device(&index()).await.unwrap();
    let input = harness.backend.input(&index()).unwrap();
    let controller = harness.backend.controller(&index()).unwrap();

    harness.provider.fail_on("disable_device");
    assert!(device.unregister("req-9").unwrap().wait().await.is_err());
    assert_eq!(device.state(), SourceState::Registered);
    assert!(harness.provider.is_enabled(&dh_base));
    assert!(!input.is_channel_open());
    assert!(!controller.is_channel_open());
    assert!(input.is_initialized());
    assert!(!controller.calls().contains(&"uninit"));

    harness.provider.recover("disable_device");
    device.unregister("req-10").unwrap().wait().await.unwrap();
    assert_eq!(device.state(), SourceState::Init);
    assert!(!harness.provider.is_enabled(&dh_base));
    assert!(!input.is_initialized());
}

#[tokio::test]
async fn test_failed_enable_uninits_collaborators() {
    let harness = Harness::new();
    harness.provider.fail_on("enable_device");
    assert!(harness.register().await.is_err());

    let input = harness.backend.input(&index()).unwrap();
    let controller = harness.backend.controller(&index()).unwrap();
    assert!(!input.is_initialized());
    assert_eq!(controller.calls(), vec!["init", "uninit"]);
}

#[tokio::test]
async fn test_collaborator_failure_published_as_system_error() {
    let harness = Harness::new();
    let mut receiver = harness
        .event_bus
        .subscribe_filtered(EventFilter::EventTypes(vec!["system_error"]), "test");
    harness.register().await.unwrap();
    let callback = harness.callback();
    let dh_base = harness.dh_base();

    assert_eq!(
        callback
            .configure_streams(&dh_base, &[hdi_stream(1)])
            .await,
        DCamRetCode::Failed
    );
    assert!(receiver.try_recv().unwrap().is_none());

    harness
        .backend
        .controller(&index())
        .unwrap()
        .fail_on("open_channel");
    assert_eq!(callback.open_session(&dh_base).await, DCamRetCode::Failed);

    match receiver.try_recv().unwrap() {
        Some(DCameraEvent::SystemError { component, error }) => {
            assert!(component.contains(DH_ID));
            assert!(error.contains("open_channel failed"));
        }
        other => panic!("expected a system error, got {:?}", other),
    }
}
