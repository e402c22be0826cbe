use enigma_common::QualityTier;
use std::collections::BTreeMap;

/// Something the user asked for through the overlay.
///
/// The overlay only queues actions; the application drains and routes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    QualityChanged(QualityTier),
    FullscreenToggled,
    AudioToggled,
    /// The loading screen started hiding. Fires once per overlay.
    LoadingComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UiActionKind {
    Quality,
    Fullscreen,
    Audio,
    LoadingComplete,
}

impl UiAction {
    pub fn kind(&self) -> UiActionKind {
        match self {
            Self::QualityChanged(_) => UiActionKind::Quality,
            Self::FullscreenToggled => UiActionKind::Fullscreen,
            Self::AudioToggled => UiActionKind::Audio,
            Self::LoadingComplete => UiActionKind::LoadingComplete,
        }
    }
}

pub type UiHandler<C> = Box<dyn FnMut(&mut C, &UiAction)>;

/// Routes actions to handlers, one handler per action kind.
///
/// Registering a second handler for a kind replaces the first.
pub struct UiHandlers<C> {
    handlers: BTreeMap<UiActionKind, UiHandler<C>>,
}

impl<C> Default for UiHandlers<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> UiHandlers<C> {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Install `handler` for `kind`, returning the handler it replaced.
    pub fn on(
        &mut self,
        kind: UiActionKind,
        handler: impl FnMut(&mut C, &UiAction) + 'static,
    ) -> Option<UiHandler<C>> {
        let previous = self.handlers.insert(kind, Box::new(handler));
        if previous.is_some() {
            tracing::debug!(?kind, "ui handler replaced");
        }
        previous
    }

    pub fn off(&mut self, kind: UiActionKind) -> Option<UiHandler<C>> {
        self.handlers.remove(&kind)
    }

    pub fn has(&self, kind: UiActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Run the handler for `action`. Returns false when none is registered.
    pub fn dispatch(&mut self, context: &mut C, action: &UiAction) -> bool {
        match self.handlers.get_mut(&action.kind()) {
            Some(handler) => {
                handler(context, action);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reaches_the_matching_handler() {
        let mut handlers: UiHandlers<Vec<QualityTier>> = UiHandlers::new();
        handlers.on(UiActionKind::Quality, |log, action| {
            if let UiAction::QualityChanged(tier) = action {
                log.push(*tier);
            }
        });

        let mut log = Vec::new();
        assert!(handlers.dispatch(&mut log, &UiAction::QualityChanged(QualityTier::High)));
        assert!(!handlers.dispatch(&mut log, &UiAction::AudioToggled));
        assert_eq!(log, vec![QualityTier::High]);
    }

    #[test]
    fn second_registration_replaces_first() {
        let mut handlers: UiHandlers<u32> = UiHandlers::new();
        assert!(handlers.on(UiActionKind::Audio, |n, _| *n += 1).is_none());
        assert!(handlers.on(UiActionKind::Audio, |n, _| *n += 10).is_some());

        let mut n = 0;
        handlers.dispatch(&mut n, &UiAction::AudioToggled);
        assert_eq!(n, 10);

        assert!(handlers.off(UiActionKind::Audio).is_some());
        assert!(!handlers.has(UiActionKind::Audio));
    }
}
