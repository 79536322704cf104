use super::{ComponentState, DCameraApp, ShutdownReason};
use crate::error::Result;
use crate::events::DCameraEvent;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

impl DCameraApp {
    /// Unregister every camera and stop background tasks
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");

        let _ = self
            .event_bus
            .publish(DCameraEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: reason.to_string(),
            })
            .await;

        let mut exit_code = match reason {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        };

        self.set_component_state("source_service", ComponentState::Stopping)
            .await;
        match timeout(SHUTDOWN_TIMEOUT, self.service.shutdown()).await {
            Ok(()) => {
                self.set_component_state("source_service", ComponentState::Stopped)
                    .await;
                info!("source_service component stopped");
            }
            Err(_) => {
                self.set_component_state("source_service", ComponentState::Failed)
                    .await;
                error!("Timeout stopping source_service component");
                exit_code = 1;
            }
        }

        // stops the event monitor and signal handlers
        self.cancellation_token.cancel();
        self.set_component_state("event_monitor", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
