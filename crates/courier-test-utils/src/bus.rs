// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use async_trait::async_trait;
use courier_core::traits::FanoutChannel;
use courier_core::types::FanoutEvent;
use courier_core::CourierError;

/// Fan-out channel that records every published event for assertion.
#[derive(Default)]
pub struct CapturingBus {
    events: Mutex<Vec<(String, FanoutEvent)>>,
}

impl CapturingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, FanoutEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, tenant_id: &str) -> Vec<FanoutEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == tenant_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl FanoutChannel for CapturingBus {
    async fn publish(&self, tenant_id: &str, event: FanoutEvent) -> Result<(), CourierError> {
        self.events
            .lock()
            .unwrap()
            .push((tenant_id.to_string(), event));
        Ok(())
    }
}
