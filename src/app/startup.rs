use super::{ComponentState, DCameraApp};
use crate::error::Result;
use crate::events::{DCameraEvent, EventFilter};
use crate::types::EnableParam;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl DCameraApp {
    /// Start the event monitor and register every configured camera.
    ///
    /// Returns the number of cameras that registered successfully; a camera
    /// that fails to register is logged and skipped.
    pub async fn start(&mut self) -> Result<usize> {
        info!("Starting distributed camera source");

        self.set_component_state("event_monitor", ComponentState::Starting)
            .await;
        self.spawn_event_monitor();
        self.set_component_state("event_monitor", ComponentState::Running)
            .await;

        self.set_component_state("source_service", ComponentState::Starting)
            .await;
        let mut registered = 0;
        for device in &self.config.devices {
            let req_id = Uuid::new_v4().to_string();
            let param = EnableParam {
                version: self.config.source.version.clone(),
                attrs: device.attrs.clone(),
            };
            match self
                .service
                .register_distributed_hardware(&device.dev_id, &device.dh_id, &req_id, param)
                .await
            {
                Ok(()) => registered += 1,
                Err(e) => error!("Failed to register camera {}: {}", device.dh_id, e),
            }
        }
        self.set_component_state("source_service", ComponentState::Running)
            .await;

        if registered < self.config.devices.len() {
            warn!(
                "{} of {} configured camera(s) registered",
                registered,
                self.config.devices.len()
            );
        } else {
            info!("{} camera(s) registered", registered);
        }
        Ok(registered)
    }

    /// Log state transitions, provider notifications and device failures
    /// until cancelled
    fn spawn_event_monitor(&self) {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["state_changed", "hdf_notify", "system_error"]),
            "event_monitor",
        );
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = receiver.recv() => match event {
                        Ok(DCameraEvent::HdfNotify { index, event }) => {
                            info!("Camera {} reported {:?}", index, event.result);
                        }
                        Ok(event) => debug!("{}", event.description()),
                        Err(crate::error::EventBusError::Lagged { count }) => {
                            warn!("Event monitor skipped {} events", count);
                        }
                        Err(_) => break,
                    },
                    _ = cancellation_token.cancelled() => break,
                }
            }
            debug!("Event monitor stopped");
        });
    }
}
