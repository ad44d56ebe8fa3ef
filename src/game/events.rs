//! Player lifecycle events.
//!
//! Dispatch is synchronous and best-effort: listeners run inline at the call
//! site, observe state as of that moment, and must neither panic nor block.
//! Events carry ids and copies of small fields rather than references so a
//! listener can never dangle into the swap-popped player table.

use crate::game::player::PlayerId;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PlayerEnter {
        id: PlayerId,
        name: String,
    },
    PlayerLeave {
        id: PlayerId,
        name: String,
    },
    PlayerDeath {
        killed: PlayerId,
        killer: PlayerId,
        bounty: u16,
        flag_transfer: u16,
    },
    PlayerFreqAndShipChange {
        id: PlayerId,
        old_frequency: u16,
        new_frequency: u16,
        old_ship: u8,
        new_ship: u8,
    },
    PlayerAttach {
        child: PlayerId,
        parent: PlayerId,
    },
    PlayerDetach {
        child: PlayerId,
        parent: PlayerId,
    },
    Spawn {
        id: PlayerId,
        position: Vec2,
    },
    Teleport {
        id: PlayerId,
        position: Vec2,
    },
    SafeEnter {
        position: Vec2,
    },
    SafeLeave {
        position: Vec2,
    },
}

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Process-wide fan-out point for player lifecycle events.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GameEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn dispatch(&mut self, event: GameEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_dispatch_reaches_all_listeners() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in 0..3 {
            let seen = seen.clone();
            bus.subscribe(move |event| {
                if let GameEvent::Spawn { id, .. } = event {
                    seen.borrow_mut().push((tag, *id));
                }
            });
        }

        bus.dispatch(GameEvent::Spawn {
            id: 7,
            position: Vec2::new(512.0, 512.0),
        });

        assert_eq!(&*seen.borrow(), &[(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let mut bus = EventBus::new();
        bus.dispatch(GameEvent::SafeEnter {
            position: Vec2::ZERO,
        });
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_sees_event_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        {
            let seen = seen.clone();
            bus.subscribe(move |event| {
                seen.borrow_mut().push(event.clone());
            });
        }

        bus.dispatch(GameEvent::SafeEnter { position: Vec2::ZERO });
        bus.dispatch(GameEvent::SafeLeave { position: Vec2::ONE });

        let events = seen.borrow();
        assert!(matches!(events[0], GameEvent::SafeEnter { .. }));
        assert!(matches!(events[1], GameEvent::SafeLeave { .. }));
    }
}
