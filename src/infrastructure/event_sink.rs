use crate::domain::events::LedgerEvent;
use crate::domain::ports::EventSink;
use std::sync::{Arc, Mutex};

/// Publishes events as structured log lines.
#[derive(Default, Debug, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: LedgerEvent) {
        match &event {
            LedgerEvent::ReconciliationRequired {
                vendor,
                order,
                available,
            } => tracing::warn!(
                %vendor,
                %order,
                %available,
                "Refund overdrew available balance, reconciliation required"
            ),
            other => tracing::info!(vendor = %other.vendor(), event = ?other, "Ledger event"),
        }
    }
}

/// Keeps every published event in memory.
#[derive(Default, Debug, Clone)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: LedgerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VendorId;
    use crate::domain::plan::PlanId;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        let first = LedgerEvent::PlanChanged {
            vendor: VendorId(1),
            from: PlanId::new("free"),
            to: PlanId::new("starter"),
        };
        let second = LedgerEvent::PlanChanged {
            vendor: VendorId(2),
            from: PlanId::new("starter"),
            to: PlanId::new("professional"),
        };
        sink.publish(first.clone());
        sink.publish(second.clone());
        assert_eq!(sink.events(), vec![first, second]);
    }
}
