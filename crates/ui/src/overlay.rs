use crate::action::UiAction;
use enigma_common::QualityTier;
use enigma_events::AppEvent;
use std::collections::VecDeque;
use std::time::Duration;

/// Delay between reaching 100% and starting to hide the loading screen.
pub const HIDE_DELAY: Duration = Duration::from_millis(500);
/// Loading-screen fade-out.
pub const SCREEN_FADE: Duration = Duration::from_millis(500);
/// Toast fade in and fade out.
pub const TOAST_FADE: Duration = Duration::from_millis(300);
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);
/// Time the progress bar takes to catch up with a new value.
const BAR_EASE: Duration = Duration::from_millis(300);

const INITIAL_STATUS: &str = "Loading experience...";

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScreenPhase {
    Shown,
    Fading { elapsed: Duration },
    Hidden,
}

/// A transient message shown at the bottom of the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub text: String,
    duration: Duration,
    age: Duration,
}

impl Toast {
    /// Fades in over [`TOAST_FADE`], holds until `duration`, then fades out.
    pub fn opacity(&self) -> f32 {
        let fade = TOAST_FADE.as_secs_f32();
        let age = self.age.as_secs_f32();
        let duration = self.duration.as_secs_f32();
        if age < duration {
            (age / fade).min(1.0)
        } else {
            (1.0 - (age - duration) / fade).max(0.0)
        }
    }

    fn finished(&self) -> bool {
        self.age >= self.duration + TOAST_FADE
    }
}

/// State of the overlay: loading screen, control panel and toasts.
///
/// All timing is driven by [`Overlay::advance`]; nothing here reads a clock.
/// Before [`Overlay::init`] and after [`Overlay::dispose`] every operation
/// is a no-op.
#[derive(Debug)]
pub struct Overlay {
    initialized: bool,
    phase: ScreenPhase,
    progress: f32,
    displayed_progress: f32,
    status: String,
    hide_in: Option<Duration>,
    panel_visible: bool,
    quality: QualityTier,
    toasts: Vec<Toast>,
    next_toast: u64,
    actions: VecDeque<UiAction>,
    loading_complete_sent: bool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay {
    pub fn new() -> Self {
        Self {
            initialized: false,
            phase: ScreenPhase::Shown,
            progress: 0.0,
            displayed_progress: 0.0,
            status: INITIAL_STATUS.to_string(),
            hide_in: None,
            panel_visible: false,
            quality: QualityTier::default(),
            toasts: Vec::new(),
            next_toast: 0,
            actions: VecDeque::new(),
            loading_complete_sent: false,
        }
    }

    /// Build the overlay: loading screen visible, control panel hidden.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        *self = Self {
            initialized: true,
            ..Self::new()
        };
        tracing::debug!("overlay initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Set the bar to `percent` and optionally replace the status text.
    /// Reaching 100 schedules the loading screen to hide after [`HIDE_DELAY`].
    pub fn update_progress(&mut self, percent: f32, text: Option<&str>) {
        if !self.initialized {
            return;
        }
        self.progress = percent.clamp(0.0, 100.0);
        if let Some(text) = text {
            self.status = text.to_string();
        }
        if percent >= 100.0 && self.phase == ScreenPhase::Shown && self.hide_in.is_none() {
            self.hide_in = Some(HIDE_DELAY);
        }
    }

    /// Start fading the loading screen out. The first call queues
    /// [`UiAction::LoadingComplete`].
    pub fn hide_loading_screen(&mut self) {
        if !self.initialized {
            return;
        }
        self.hide_in = None;
        if self.phase == ScreenPhase::Shown {
            self.phase = ScreenPhase::Fading {
                elapsed: Duration::ZERO,
            };
        }
        if !self.loading_complete_sent {
            self.loading_complete_sent = true;
            self.actions.push_back(UiAction::LoadingComplete);
        }
    }

    /// Bring the loading screen back and hide the control panel.
    pub fn show_loading_screen(&mut self) {
        if !self.initialized {
            return;
        }
        self.phase = ScreenPhase::Shown;
        self.hide_in = None;
        self.panel_visible = false;
    }

    pub fn show_message(&mut self, text: impl Into<String>, duration: Duration) {
        if !self.initialized {
            return;
        }
        let toast = Toast {
            id: self.next_toast,
            text: text.into(),
            duration,
            age: Duration::ZERO,
        };
        self.next_toast += 1;
        self.toasts.push(toast);
    }

    /// Reflect asset events in the loading screen.
    pub fn handle_event(&mut self, event: &AppEvent) {
        match event {
            AppEvent::AssetProgress { url, progress, .. } => {
                self.update_progress(*progress, Some(&format!("Loading: {url}")));
            }
            AppEvent::AssetError { url } => {
                self.update_progress(100.0, Some(&format!("Failed to load: {url}")));
            }
            AppEvent::RendererResize { .. } => {}
        }
    }

    /// Quality selector changed.
    pub fn select_quality(&mut self, tier: QualityTier) {
        if !self.initialized || tier == self.quality {
            return;
        }
        self.quality = tier;
        self.actions.push_back(UiAction::QualityChanged(tier));
    }

    pub fn press_fullscreen(&mut self) {
        if self.initialized {
            self.actions.push_back(UiAction::FullscreenToggled);
        }
    }

    pub fn press_audio(&mut self) {
        if self.initialized {
            self.actions.push_back(UiAction::AudioToggled);
        }
    }

    /// Take every queued action, oldest first.
    pub fn drain_actions(&mut self) -> Vec<UiAction> {
        self.actions.drain(..).collect()
    }

    /// Step every timer by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        if !self.initialized {
            return;
        }

        if let ScreenPhase::Fading { elapsed } = self.phase {
            let elapsed = elapsed + dt;
            if elapsed >= SCREEN_FADE {
                self.phase = ScreenPhase::Hidden;
                self.panel_visible = true;
            } else {
                self.phase = ScreenPhase::Fading { elapsed };
            }
        }

        // A fade started here begins counting on the next step.
        if let Some(remaining) = self.hide_in {
            match remaining.checked_sub(dt) {
                Some(left) if !left.is_zero() => self.hide_in = Some(left),
                _ => self.hide_loading_screen(),
            }
        }

        let step = 100.0 * dt.as_secs_f32() / BAR_EASE.as_secs_f32();
        let gap = self.progress - self.displayed_progress;
        self.displayed_progress += gap.clamp(-step, step);

        for toast in &mut self.toasts {
            toast.age += dt;
        }
        self.toasts.retain(|t| !t.finished());
    }

    /// Remove the overlay. Nothing is drawn and no actions are produced
    /// until [`Overlay::init`] is called again.
    pub fn dispose(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        self.toasts.clear();
        self.actions.clear();
        tracing::debug!("overlay disposed");
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Bar fill as drawn, trailing [`Self::progress`] while it eases.
    pub fn displayed_progress(&self) -> f32 {
        self.displayed_progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    /// Keep the selector in sync when quality is changed from elsewhere.
    pub fn set_quality(&mut self, tier: QualityTier) {
        self.quality = tier;
    }

    pub fn is_loading_visible(&self) -> bool {
        self.initialized && self.phase != ScreenPhase::Hidden
    }

    pub fn loading_opacity(&self) -> f32 {
        match self.phase {
            ScreenPhase::Shown => 1.0,
            ScreenPhase::Fading { elapsed } => {
                1.0 - elapsed.as_secs_f32() / SCREEN_FADE.as_secs_f32()
            }
            ScreenPhase::Hidden => 0.0,
        }
    }

    pub fn is_panel_visible(&self) -> bool {
        self.initialized && self.panel_visible
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn ready() -> Overlay {
        let mut overlay = Overlay::new();
        overlay.init();
        overlay
    }

    #[test]
    fn calls_before_init_do_nothing() {
        let mut overlay = Overlay::new();
        overlay.update_progress(100.0, Some("done"));
        overlay.show_message("hi", DEFAULT_TOAST_DURATION);
        overlay.press_audio();
        overlay.advance(ms(2000));
        assert_eq!(overlay.progress(), 0.0);
        assert!(overlay.toasts().is_empty());
        assert!(overlay.drain_actions().is_empty());
    }

    #[test]
    fn full_progress_hides_screen_and_reveals_panel() {
        let mut overlay = ready();
        overlay.update_progress(60.0, Some("Loading: a.glb"));
        overlay.advance(ms(1000));
        assert!(overlay.is_loading_visible());
        assert_eq!(overlay.status(), "Loading: a.glb");

        overlay.update_progress(100.0, Some("Ready!"));
        overlay.advance(ms(400));
        assert_eq!(overlay.loading_opacity(), 1.0);
        assert!(overlay.drain_actions().is_empty());

        overlay.advance(ms(100));
        assert_eq!(overlay.drain_actions(), vec![UiAction::LoadingComplete]);
        assert!(overlay.is_loading_visible());
        assert!(!overlay.is_panel_visible());

        overlay.advance(ms(250));
        assert!((overlay.loading_opacity() - 0.5).abs() < 1e-3);

        overlay.advance(ms(250));
        assert!(!overlay.is_loading_visible());
        assert!(overlay.is_panel_visible());
    }

    #[test]
    fn loading_complete_fires_exactly_once() {
        let mut overlay = ready();
        overlay.update_progress(100.0, None);
        overlay.update_progress(100.0, None);
        overlay.advance(ms(1500));
        overlay.update_progress(100.0, None);
        overlay.hide_loading_screen();
        overlay.advance(ms(1500));

        let completes = overlay
            .drain_actions()
            .into_iter()
            .filter(|a| *a == UiAction::LoadingComplete)
            .count();
        assert_eq!(completes, 1);
    }

    #[test]
    fn show_loading_screen_hides_panel() {
        let mut overlay = ready();
        overlay.hide_loading_screen();
        overlay.advance(ms(600));
        assert!(overlay.is_panel_visible());

        overlay.show_loading_screen();
        assert!(overlay.is_loading_visible());
        assert_eq!(overlay.loading_opacity(), 1.0);
        assert!(!overlay.is_panel_visible());
    }

    #[test]
    fn asset_events_drive_progress() {
        let mut overlay = ready();
        overlay.handle_event(&AppEvent::progress("models/a.glb", 50, 100));
        assert_eq!(overlay.progress(), 50.0);
        assert_eq!(overlay.status(), "Loading: models/a.glb");

        overlay.handle_event(&AppEvent::AssetError {
            url: "models/b.glb".into(),
        });
        assert_eq!(overlay.progress(), 100.0);
        assert_eq!(overlay.status(), "Failed to load: models/b.glb");
    }

    #[test]
    fn toast_lifecycle() {
        let mut overlay = ready();
        overlay.show_message("Audio toggled", ms(1000));
        assert_eq!(overlay.toasts()[0].opacity(), 0.0);

        overlay.advance(ms(150));
        assert!((overlay.toasts()[0].opacity() - 0.5).abs() < 1e-3);
        overlay.advance(ms(500));
        assert_eq!(overlay.toasts()[0].opacity(), 1.0);

        overlay.advance(ms(500));
        let fading = overlay.toasts()[0].opacity();
        assert!(fading < 1.0 && fading > 0.0);

        overlay.advance(ms(200));
        assert!(overlay.toasts().is_empty());
    }

    #[test]
    fn bar_eases_toward_target() {
        let mut overlay = ready();
        overlay.update_progress(100.0, None);
        overlay.advance(ms(150));
        assert!((overlay.displayed_progress() - 50.0).abs() < 1e-2);
        overlay.advance(ms(150));
        assert!((overlay.displayed_progress() - 100.0).abs() < 1e-2);
    }

    #[test]
    fn quality_selection_queues_once_per_change() {
        let mut overlay = ready();
        overlay.select_quality(QualityTier::Medium);
        overlay.select_quality(QualityTier::Ultra);
        overlay.press_fullscreen();
        assert_eq!(
            overlay.drain_actions(),
            vec![
                UiAction::QualityChanged(QualityTier::Ultra),
                UiAction::FullscreenToggled
            ]
        );
        assert_eq!(overlay.quality(), QualityTier::Ultra);
    }

    #[test]
    fn dispose_stops_everything() {
        let mut overlay = ready();
        overlay.show_message("bye", DEFAULT_TOAST_DURATION);
        overlay.press_audio();
        overlay.dispose();
        assert!(!overlay.is_loading_visible());
        assert!(overlay.toasts().is_empty());
        assert!(overlay.drain_actions().is_empty());
        overlay.press_audio();
        assert!(overlay.drain_actions().is_empty());
    }
}
