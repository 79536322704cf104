use crate::error::EventBusError;
use crate::source::SourceState;
use crate::types::{DCameraIndex, HdfEvent};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// Events that can occur in the distributed camera source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DCameraEvent {
    /// A source device moved between lifecycle states
    StateChanged {
        index: DCameraIndex,
        from: SourceState,
        to: SourceState,
        timestamp: SystemTime,
    },
    /// Registration finished, `status` is the framework errno
    RegisterResult {
        index: DCameraIndex,
        req_id: String,
        status: i32,
    },
    /// Unregistration finished
    UnregisterResult {
        index: DCameraIndex,
        req_id: String,
        status: i32,
    },
    /// A notification was pushed to the camera provider
    HdfNotify { index: DCameraIndex, event: HdfEvent },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl DCameraEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DCameraEvent::StateChanged {
                index, from, to, ..
            } => format!("Device {} state {:?} -> {:?}", index, from, to),
            DCameraEvent::RegisterResult { index, status, .. } => {
                format!("Device {} registered with status {}", index, status)
            }
            DCameraEvent::UnregisterResult { index, status, .. } => {
                format!("Device {} unregistered with status {}", index, status)
            }
            DCameraEvent::HdfNotify { index, event } => {
                format!(
                    "Device {} notified {:?}/{:?}",
                    index, event.event_type, event.result
                )
            }
            DCameraEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            DCameraEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DCameraEvent::StateChanged { .. } => "state_changed",
            DCameraEvent::RegisterResult { .. } => "register_result",
            DCameraEvent::UnregisterResult { .. } => "unregister_result",
            DCameraEvent::HdfNotify { .. } => "hdf_notify",
            DCameraEvent::SystemError { .. } => "system_error",
            DCameraEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Source device the event refers to, if any
    pub fn index(&self) -> Option<&DCameraIndex> {
        match self {
            DCameraEvent::StateChanged { index, .. }
            | DCameraEvent::RegisterResult { index, .. }
            | DCameraEvent::UnregisterResult { index, .. }
            | DCameraEvent::HdfNotify { index, .. } => Some(index),
            DCameraEvent::SystemError { .. } | DCameraEvent::ShutdownRequested { .. } => None,
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<DCameraEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DCameraEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered<S: Into<String>>(&self, filter: EventFilter, name: S) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.into())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: DCameraEvent) -> Result<usize, EventBusError> {
        match &event {
            DCameraEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            DCameraEvent::RegisterResult { status, .. }
            | DCameraEvent::UnregisterResult { status, .. }
                if *status != 0 =>
            {
                warn!("{}", event.description());
            }
            DCameraEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => trace!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events about specific source devices
    Devices(Vec<DCameraIndex>),
    /// Custom filter function
    Custom(fn(&DCameraEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &DCameraEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Devices(devices) => event
                .index()
                .map(|index| devices.contains(index))
                .unwrap_or(false),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<DCameraEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<DCameraEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<DCameraEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<DCameraEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
