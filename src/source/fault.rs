use crate::error::{DCameraError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Operations armed to fail on simulated collaborators
#[derive(Debug, Default)]
pub struct FaultInjector {
    component: &'static str,
    armed: Mutex<HashSet<&'static str>>,
}

impl FaultInjector {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            armed: Mutex::new(HashSet::new()),
        }
    }

    pub fn arm(&self, operation: &'static str) {
        self.armed.lock().insert(operation);
    }

    pub fn disarm(&self, operation: &'static str) {
        self.armed.lock().remove(operation);
    }

    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.armed.lock().contains(operation) {
            return Err(DCameraError::component(
                self.component.to_string(),
                format!("{} failed", operation),
            ));
        }
        Ok(())
    }
}
