use super::{DCameraApp, ShutdownReason, ShutdownTrigger};
use crate::error::{DCameraError, Result};
use tokio::signal;
use tracing::{error, info};

impl DCameraApp {
    /// Run until a shutdown is requested, then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("Distributed camera source is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| DCameraError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;

        self.setup_signal_handlers(self.shutdown_trigger.clone());

        let shutdown_reason = shutdown_receiver.await.map_err(|_| DCameraError::System {
            message: "Shutdown channel closed unexpectedly".to_string(),
        })?;

        info!("Shutdown initiated: {}", shutdown_reason);
        let exit_code = self.shutdown(shutdown_reason).await?;

        info!("Distributed camera source shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, trigger: ShutdownTrigger) {
        // SIGTERM (systemd stop), Unix only
        #[cfg(unix)]
        {
            let trigger = trigger.clone();
            let cancellation_token = self.cancellation_token.clone();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                tokio::select! {
                    Some(()) = sigterm.recv() => {
                        info!("Received SIGTERM signal");
                        trigger
                            .trigger(ShutdownReason::Signal("SIGTERM".to_string()))
                            .await;
                    }
                    _ = cancellation_token.cancelled() => {}
                }
            });
        }

        let cancellation_token = self.cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                Ok(()) = signal::ctrl_c() => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    trigger
                        .trigger(ShutdownReason::Signal("SIGINT".to_string()))
                        .await;
                }
                _ = cancellation_token.cancelled() => {}
            }
        });
    }
}
