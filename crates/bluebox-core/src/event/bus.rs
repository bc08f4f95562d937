//! Fan-out of engine notifications to UI surfaces and the session list.
//!
//! One engine owns one bus. Every chat view and the list listener hold a
//! receiver; a slow receiver lags and skips ahead instead of blocking the
//! engine.

use bluebox_types::event::SessionEvent;
use tokio::sync::broadcast;

/// Sender side of an engine's `SessionEvent` channel.
///
/// Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// `capacity` is how many events a receiver may fall behind before it
    /// lags. Zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget. With no receivers attached the event is dropped.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluebox_types::event::EngineState;

    fn progress(text: &str) -> SessionEvent {
        SessionEvent::ProgressiveText {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn chat_view_and_list_listener_both_see_a_change() {
        let bus = EventBus::new(16);
        let mut view = bus.subscribe();
        let mut list = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);

        bus.publish(SessionEvent::SessionListChanged);

        assert_eq!(view.recv().await.unwrap(), SessionEvent::SessionListChanged);
        assert_eq!(list.recv().await.unwrap(), SessionEvent::SessionListChanged);
    }

    #[tokio::test]
    async fn progress_arrives_in_publish_order() {
        let bus = EventBus::new(16);
        let mut view = bus.subscribe();

        bus.publish(SessionEvent::StateChanged {
            state: EngineState::StreamingResponse,
        });
        bus.publish(progress("Base"));
        bus.publish(progress("Based on"));

        assert!(matches!(
            view.recv().await.unwrap(),
            SessionEvent::StateChanged { .. }
        ));
        assert_eq!(view.recv().await.unwrap(), progress("Base"));
        assert_eq!(view.recv().await.unwrap(), progress("Based on"));
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(16);
        bus.publish(SessionEvent::SessionListChanged);
        let mut view = bus.subscribe();
        assert!(view.try_recv().is_err());
    }

    #[test]
    fn slow_view_lags_then_reads_newest_progress() {
        let bus = EventBus::new(4);
        let mut view = bus.subscribe();
        for i in 0..10 {
            bus.publish(progress(&"x".repeat(i + 1)));
        }

        assert!(matches!(
            view.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(6))
        ));
        let mut last = None;
        while let Ok(event) = view.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(progress(&"x".repeat(10))));
    }

    #[test]
    fn clones_publish_into_one_channel() {
        let bus = EventBus::new(16);
        let engine_side = bus.clone();
        let mut view = bus.subscribe();

        engine_side.publish(SessionEvent::SessionListChanged);

        assert!(view.try_recv().is_ok());
    }

    #[test]
    fn zero_capacity_still_delivers() {
        let bus = EventBus::new(0);
        let mut view = bus.subscribe();
        bus.publish(SessionEvent::SessionListChanged);
        assert!(view.try_recv().is_ok());
    }

    #[test]
    fn publishing_without_receivers_is_harmless() {
        let bus = EventBus::new(16);
        bus.publish(progress("nobody listening"));
        assert_eq!(bus.receiver_count(), 0);
        assert!(format!("{bus:?}").contains("receivers: 0"));
    }
}
