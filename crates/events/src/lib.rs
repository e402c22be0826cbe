//! Application events and the event bus that carries them.
//!
//! Components never call each other to report progress or resizes; they emit
//! an [`AppEvent`] through an [`Emitter`]. The owner of the [`EventBus`] calls
//! [`EventBus::dispatch`] once per frame, which fans every queued event out to
//! all subscribers and hands the batch back for direct routing.
//!
//! # Invariants
//! - Events are delivered in emission order.
//! - Every subscriber sees every event; there is no last-registration-wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// Notifications exchanged between the renderer, the asset manager and the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Bytes arrived for an asset.
    AssetProgress {
        url: String,
        loaded: u64,
        total: u64,
        /// Percentage in `0.0..=100.0`.
        progress: f32,
    },
    /// An asset failed to load.
    AssetError { url: String },
    /// The render surface changed size (logical pixels).
    RendererResize { width: u32, height: u32 },
}

impl AppEvent {
    /// Build a progress event, computing the percentage from the byte counts.
    pub fn progress(url: impl Into<String>, loaded: u64, total: u64) -> Self {
        let progress = if total == 0 {
            100.0
        } else {
            (loaded as f64 / total as f64 * 100.0).min(100.0) as f32
        };
        Self::AssetProgress {
            url: url.into(),
            loaded,
            total,
            progress,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Cloneable sending half of an [`EventBus`].
#[derive(Debug)]
pub struct Emitter<E> {
    tx: Sender<E>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> Emitter<E> {
    /// Queue an event. Emitting after the bus is gone is silently dropped.
    pub fn emit(&self, event: E) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event emitted after the bus was dropped");
        }
    }
}

type Listener<E> = Box<dyn FnMut(&E)>;

/// Multi-subscriber event queue.
pub struct EventBus<E> {
    tx: Sender<E>,
    rx: Receiver<E>,
    listeners: BTreeMap<SubscriptionId, Listener<E>>,
    next_id: u64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            listeners: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// A sender components can keep to emit events later.
    pub fn emitter(&self) -> Emitter<E> {
        Emitter {
            tx: self.tx.clone(),
        }
    }

    /// Queue an event directly on the bus.
    pub fn emit(&self, event: E) {
        // The bus owns the receiver, so this send cannot fail.
        let _ = self.tx.send(event);
    }

    /// Register a listener. Listeners are called in subscription order.
    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver every queued event to every listener and return the batch.
    pub fn dispatch(&mut self) -> Vec<E> {
        let events: Vec<E> = self.rx.try_iter().collect();
        for event in &events {
            for listener in self.listeners.values_mut() {
                listener(event);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn every_subscriber_sees_every_event() {
        let mut bus = EventBus::new();
        let a = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::new(RefCell::new(Vec::new()));
        let (a2, b2) = (a.clone(), b.clone());
        bus.subscribe(move |e: &AppEvent| a2.borrow_mut().push(e.clone()));
        bus.subscribe(move |e: &AppEvent| b2.borrow_mut().push(e.clone()));

        bus.emit(AppEvent::RendererResize {
            width: 800,
            height: 600,
        });
        bus.emitter().emit(AppEvent::AssetError { url: "x.glb".into() });

        let batch = bus.dispatch();
        assert_eq!(batch.len(), 2);
        assert_eq!(*a.borrow(), batch);
        assert_eq!(*b.borrow(), batch);
    }

    #[test]
    fn events_keep_emission_order() {
        let mut bus = EventBus::new();
        let emitter = bus.emitter();
        for i in 0..5u32 {
            emitter.emit(i);
        }
        assert_eq!(bus.dispatch(), vec![0, 1, 2, 3, 4]);
        assert!(bus.dispatch().is_empty());
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let id = bus.subscribe(move |_: &u8| *h.borrow_mut() += 1);
        bus.emit(1);
        bus.dispatch();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(2);
        bus.dispatch();
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn progress_percentage() {
        match AppEvent::progress("a.png", 50, 200) {
            AppEvent::AssetProgress { progress, .. } => assert_eq!(progress, 25.0),
            other => panic!("unexpected {other:?}"),
        }
        match AppEvent::progress("b.png", 0, 0) {
            AppEvent::AssetProgress { progress, .. } => assert_eq!(progress, 100.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
