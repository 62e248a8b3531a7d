#![forbid(unsafe_code)]

use adaptive_kernel_contracts::canonical::CanonicalEvent;

/// Hand-off point to the external learning engine. It sees canonical events
/// only, never scores or reports.
pub trait EventSink {
    fn store_event(&mut self, event: &CanonicalEvent);
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryEventSink {
    events: Vec<CanonicalEvent>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CanonicalEvent] {
        &self.events
    }
}

impl EventSink for InMemoryEventSink {
    fn store_event(&mut self, event: &CanonicalEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn at_sink_01_keeps_arrival_order() {
        let mut sink = InMemoryEventSink::new();
        assert!(sink.events().is_empty());
        for cid in ["t1", "t2"] {
            let event = CanonicalEvent::v1(
                "adn".to_string(),
                "reject".to_string(),
                0.1,
                "2026-01-14T00:00:00Z".to_string(),
                cid.to_string(),
                BTreeMap::new(),
                "R1".to_string(),
            )
            .unwrap();
            sink.store_event(&event);
        }
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events()[0].correlation_id(), "t1");
        assert_eq!(sink.events()[1].correlation_id(), "t2");
    }
}
