use crate::error::{errno, DCameraError, Result};
use crate::events::{DCameraEvent, EventBus};
use crate::provider::{CameraProvider, ProviderCallback, Validator};
use crate::source::controller::CameraController;
use crate::source::event::{Completion, RegisterParam, SourceEvent, SourceEventData};
use crate::source::input::CameraInput;
use crate::source::listener::{RegisterListener, RegistrationResult};
use crate::source::notify::{parse_event_cmd, CameraEvent};
use crate::source::state::{SourceActions, SourceState, StateMachine};
use crate::types::{
    DCCaptureInfo, DCStreamInfo, DCameraIndex, DCameraSettings, DHBase, EnableParam, HdfEvent,
    HdfEventResult,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collaborators and settings a source device is built from
#[derive(Clone)]
pub struct SourceDevContext {
    pub controller: Arc<dyn CameraController>,
    pub input: Arc<dyn CameraInput>,
    pub provider: Arc<dyn CameraProvider>,
    pub listener: Arc<dyn RegisterListener>,
    pub event_bus: Arc<EventBus>,
    pub validator: Validator,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone)]
struct Snapshot {
    state: SourceState,
    version: String,
}

/// Local proxy of one remote camera.
///
/// Requests are queued and executed one at a time by a worker task that
/// owns the state machine, so callers never observe a half-applied
/// transition. Each request returns a [`Completion`] that can be awaited
/// for the execution result or dropped.
pub struct SourceDev {
    index: DCameraIndex,
    sender: mpsc::Sender<SourceEvent>,
    snapshot: Arc<RwLock<Snapshot>>,
    cancellation_token: CancellationToken,
}

impl SourceDev {
    /// Create the device and start its worker; needs a tokio runtime
    pub fn spawn(
        index: DCameraIndex,
        context: SourceDevContext,
        cancellation_token: CancellationToken,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(context.queue_capacity.max(1));
        let snapshot = Arc::new(RwLock::new(Snapshot {
            state: SourceState::Init,
            version: String::new(),
        }));

        Arc::new_cyclic(|weak: &Weak<SourceDev>| {
            let core = DevCore {
                index: index.clone(),
                dh_base: index.dh_base(),
                weak_self: weak.clone(),
                controller: context.controller,
                input: context.input,
                provider: context.provider,
                listener: context.listener,
                event_bus: Arc::clone(&context.event_bus),
                validator: context.validator,
                snapshot: Arc::clone(&snapshot),
                capturing: BTreeSet::new(),
            };
            tokio::spawn(run_worker(
                core,
                receiver,
                context.event_bus,
                cancellation_token.clone(),
            ));
            info!("Source device {} created", index);

            Self {
                index,
                sender,
                snapshot,
                cancellation_token,
            }
        })
    }

    pub fn index(&self) -> &DCameraIndex {
        &self.index
    }

    pub fn state(&self) -> SourceState {
        self.snapshot.read().state
    }

    /// Protocol version the device was registered with
    pub fn version(&self) -> String {
        self.snapshot.read().version.clone()
    }

    pub fn register(&self, req_id: &str, param: EnableParam) -> Result<Completion> {
        self.post(SourceEventData::Register(self.register_param(req_id, param)))
    }

    pub fn unregister(&self, req_id: &str) -> Result<Completion> {
        let param = self.register_param(req_id, EnableParam::default());
        self.post(SourceEventData::Unregister(param))
    }

    pub fn open_session(&self, index: DCameraIndex) -> Result<Completion> {
        self.post(SourceEventData::Open(index))
    }

    pub fn close_session(&self, index: DCameraIndex) -> Result<Completion> {
        self.post(SourceEventData::Close(index))
    }

    pub fn config_streams(&self, streams: Vec<Arc<DCStreamInfo>>) -> Result<Completion> {
        self.post(SourceEventData::ConfigStreams(streams))
    }

    pub fn release_streams(&self, stream_ids: Vec<i32>) -> Result<Completion> {
        self.post(SourceEventData::ReleaseStreams(stream_ids))
    }

    pub fn start_capture(&self, captures: Vec<Arc<DCCaptureInfo>>) -> Result<Completion> {
        self.post(SourceEventData::StartCapture(captures))
    }

    pub fn stop_capture(&self, stream_ids: Vec<i32>) -> Result<Completion> {
        self.post(SourceEventData::StopCapture(stream_ids))
    }

    pub fn update_settings(&self, settings: Vec<Arc<DCameraSettings>>) -> Result<Completion> {
        self.post(SourceEventData::UpdateSettings(settings))
    }

    /// Queue a `STATE_NOTIFY` command received from the sink
    pub fn notify(&self, event_json: &str) -> Result<Completion> {
        let event = parse_event_cmd(event_json)?;
        self.post(SourceEventData::EventNotify(event))
    }

    fn register_param(&self, req_id: &str, param: EnableParam) -> RegisterParam {
        RegisterParam {
            dev_id: self.index.dev_id.clone(),
            dh_id: self.index.dh_id.clone(),
            req_id: req_id.to_string(),
            param,
        }
    }

    fn post(&self, data: SourceEventData) -> Result<Completion> {
        let event_type = data.event_type();
        let (event, completion) = SourceEvent::new(data);
        match self.sender.try_send(event) {
            Ok(()) => {
                debug!("Device {} queued {}", self.index, event_type);
                Ok(completion)
            }
            Err(TrySendError::Full(_)) => Err(DCameraError::component(
                "event_queue".to_string(),
                format!("queue full, dropping {}", event_type),
            )),
            Err(TrySendError::Closed(_)) => Err(DCameraError::DeviceDestroyed),
        }
    }
}

impl Drop for SourceDev {
    fn drop(&mut self) {
        debug!("Source device {} destroyed", self.index);
        self.cancellation_token.cancel();
    }
}

async fn run_worker(
    mut core: DevCore,
    mut receiver: mpsc::Receiver<SourceEvent>,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
) {
    let mut machine = StateMachine::new();

    loop {
        let mut event = tokio::select! {
            biased;
            event = receiver.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = cancellation_token.cancelled() => break,
        };

        let before = machine.state();
        let result = machine.execute(&mut core, &event.data).await;
        let after = machine.state();

        match &result {
            Err(e) if is_collaborator_failure(e) => {
                let _ = event_bus
                    .publish(DCameraEvent::SystemError {
                        component: format!("device {}", core.index),
                        error: format!("{} in state {}: {}", event.event_type(), before, e),
                    })
                    .await;
            }
            Err(e) => warn!(
                "Device {} rejected {} in state {}: {}",
                core.index,
                event.event_type(),
                before,
                e
            ),
            Ok(()) => {}
        }

        if before != after {
            core.snapshot.write().state = after;
            info!("Device {} state {} -> {}", core.index, before, after);
            let _ = event_bus
                .publish(DCameraEvent::StateChanged {
                    index: core.index.clone(),
                    from: before,
                    to: after,
                    timestamp: SystemTime::now(),
                })
                .await;
        }

        event.complete(result);
    }

    debug!("Worker for device {} stopped", core.index);
}

/// Failures raised by a collaborator rather than by the request itself
fn is_collaborator_failure(error: &DCameraError) -> bool {
    matches!(
        error,
        DCameraError::Component { .. }
            | DCameraError::Init { .. }
            | DCameraError::System { .. }
            | DCameraError::Io(_)
    )
}

/// State owned by the worker task
struct DevCore {
    index: DCameraIndex,
    dh_base: DHBase,
    weak_self: Weak<SourceDev>,
    controller: Arc<dyn CameraController>,
    input: Arc<dyn CameraInput>,
    provider: Arc<dyn CameraProvider>,
    listener: Arc<dyn RegisterListener>,
    event_bus: Arc<EventBus>,
    validator: Validator,
    snapshot: Arc<RwLock<Snapshot>>,
    /// Streams the input reported as started and not yet stopped
    capturing: BTreeSet<i32>,
}

impl DevCore {
    /// Tell the provider an operation failed
    async fn notify_error(&self, result: HdfEventResult, error: &DCameraError) {
        self.notify_provider(HdfEvent::message(result, error.to_string()))
            .await;
    }

    async fn notify_provider(&self, event: HdfEvent) {
        if let Err(e) = self.provider.notify(&self.dh_base, &event).await {
            warn!("Device {} failed to notify provider: {}", self.index, e);
        }
        let _ = self
            .event_bus
            .publish(DCameraEvent::HdfNotify {
                index: self.index.clone(),
                event,
            })
            .await;
    }

    async fn enable(&mut self, param: &RegisterParam) -> Result<()> {
        self.controller
            .init(std::slice::from_ref(&self.index))
            .await?;
        if let Err(e) = self.input.init().await {
            self.uninit_collaborators().await;
            return Err(e);
        }

        let callback = Arc::new(ProviderCallback::new(
            self.index.dev_id.clone(),
            self.index.dh_id.clone(),
            self.weak_self.clone(),
            self.validator,
        ));
        if let Err(e) = self
            .provider
            .enable_device(&self.dh_base, &param.param.attrs, callback)
            .await
        {
            self.uninit_collaborators().await;
            return Err(e);
        }

        self.snapshot.write().version = param.param.version.clone();
        Ok(())
    }

    /// Collaborators stay initialised while the provider still knows the camera
    async fn disable(&mut self) -> Result<()> {
        self.provider.disable_device(&self.dh_base).await?;
        self.uninit_collaborators().await;
        Ok(())
    }

    async fn uninit_collaborators(&self) {
        if let Err(e) = self.controller.uninit().await {
            warn!("Device {} controller uninit failed: {}", self.index, e);
        }
        if let Err(e) = self.input.uninit().await {
            warn!("Device {} input uninit failed: {}", self.index, e);
        }
    }

    fn registration_result(param: &RegisterParam, result: &Result<()>) -> RegistrationResult {
        let (status, data) = match result {
            Ok(()) => (errno::DCAMERA_OK, String::new()),
            Err(e) => (e.code(), e.to_string()),
        };
        RegistrationResult {
            dev_id: param.dev_id.clone(),
            dh_id: param.dh_id.clone(),
            req_id: param.req_id.clone(),
            status,
            data,
        }
    }
}

#[async_trait]
impl SourceActions for DevCore {
    async fn register(&mut self, param: &RegisterParam) -> Result<()> {
        info!(
            "Device {} registering, version {}",
            self.index, param.param.version
        );
        let result = self.enable(param).await;
        let report = Self::registration_result(param, &result);
        let status = report.status;
        self.listener.on_register_result(report);
        let _ = self
            .event_bus
            .publish(DCameraEvent::RegisterResult {
                index: self.index.clone(),
                req_id: param.req_id.clone(),
                status,
            })
            .await;
        result
    }

    async fn unregister(&mut self, param: &RegisterParam) -> Result<()> {
        info!("Device {} unregistering", self.index);
        let result = self.disable().await;
        let report = Self::registration_result(param, &result);
        let status = report.status;
        self.listener.on_unregister_result(report);
        let _ = self
            .event_bus
            .publish(DCameraEvent::UnregisterResult {
                index: self.index.clone(),
                req_id: param.req_id.clone(),
                status,
            })
            .await;
        result
    }

    async fn open(&mut self, index: &DCameraIndex) -> Result<()> {
        let indexes = std::slice::from_ref(index);
        if let Err(e) = self.controller.open_channel(indexes).await {
            self.notify_error(HdfEventResult::OpenChannelError, &e).await;
            return Err(e);
        }
        if let Err(e) = self.input.open_channel(indexes).await {
            if let Err(close_err) = self.controller.close_channel().await {
                warn!("Device {} rollback close failed: {}", self.index, close_err);
            }
            self.notify_error(HdfEventResult::OpenChannelError, &e).await;
            return Err(e);
        }
        self.notify_provider(HdfEvent::message(HdfEventResult::ChannelConnected, ""))
            .await;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.capturing.is_empty() {
            if let Err(e) = self.input.stop_all_capture().await {
                warn!("Device {} stop capture on close failed: {}", self.index, e);
            }
            if let Err(e) = self.controller.stop_capture().await {
                warn!("Device {} controller stop on close failed: {}", self.index, e);
            }
            self.capturing.clear();
        }
        if let Err(e) = self.input.release_all_streams().await {
            warn!("Device {} release streams on close failed: {}", self.index, e);
        }
        if let Err(e) = self.input.close_channel().await {
            warn!("Device {} input close failed: {}", self.index, e);
        }
        if let Err(e) = self.controller.close_channel().await {
            warn!("Device {} controller close failed: {}", self.index, e);
        }
        Ok(())
    }

    async fn config_streams(&mut self, streams: &[Arc<DCStreamInfo>]) -> Result<()> {
        debug!("Device {} configuring {} stream(s)", self.index, streams.len());
        if let Err(e) = self.input.config_streams(streams).await {
            self.notify_error(HdfEventResult::ConfigStreamsError, &e).await;
            return Err(e);
        }
        Ok(())
    }

    async fn release_all_streams(&mut self) -> Result<()> {
        if let Err(e) = self.input.release_all_streams().await {
            self.notify_error(HdfEventResult::ReleaseStreamsError, &e).await;
            return Err(e);
        }
        Ok(())
    }

    async fn release_streams(&mut self, stream_ids: &[i32]) -> Result<bool> {
        match self.input.release_streams(stream_ids).await {
            Ok(all_released) => Ok(all_released),
            Err(e) => {
                self.notify_error(HdfEventResult::ReleaseStreamsError, &e).await;
                Err(e)
            }
        }
    }

    async fn start_capture(&mut self, captures: &[Arc<DCCaptureInfo>]) -> Result<()> {
        let started = match self.input.start_capture(captures).await {
            Ok(started) => started,
            Err(e) => {
                self.notify_error(HdfEventResult::StartCaptureError, &e).await;
                return Err(e);
            }
        };
        if started.is_empty() && self.capturing.is_empty() {
            let e = DCameraError::bad_value("capture request started no stream");
            self.notify_error(HdfEventResult::StartCaptureError, &e).await;
            return Err(e);
        }
        if let Err(e) = self.controller.start_capture(captures).await {
            // only undo what this request started, earlier captures keep running
            if !started.is_empty() {
                if let Err(rollback) = self.input.stop_capture(&started).await {
                    warn!("Device {} capture rollback failed: {}", self.index, rollback);
                }
            }
            self.notify_error(HdfEventResult::StartCaptureError, &e).await;
            return Err(e);
        }
        self.capturing.extend(started);
        Ok(())
    }

    async fn stop_capture(&mut self, stream_ids: &[i32]) -> Result<bool> {
        let all_stopped = match self.input.stop_capture(stream_ids).await {
            Ok(all_stopped) => all_stopped,
            Err(e) => {
                self.notify_error(HdfEventResult::StopCaptureError, &e).await;
                return Err(e);
            }
        };
        for id in stream_ids {
            self.capturing.remove(id);
        }
        if all_stopped {
            if let Err(e) = self.controller.stop_capture().await {
                self.notify_error(HdfEventResult::StopCaptureError, &e).await;
                return Err(e);
            }
            self.capturing.clear();
        }
        Ok(all_stopped)
    }

    async fn update_settings(&mut self, settings: &[Arc<DCameraSettings>]) -> Result<()> {
        let result = match self.input.update_settings(settings).await {
            Ok(()) => self.controller.update_settings(settings).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.notify_error(HdfEventResult::UpdateSettingsError, e).await;
        }
        result
    }

    async fn event_notify(&mut self, event: &CameraEvent) -> Result<()> {
        info!(
            "Device {} received sink event {:?}",
            self.index, event.event_result
        );
        self.controller.notify(event).await?;
        self.notify_provider(event.to_hdf_event()).await;
        Ok(())
    }
}
