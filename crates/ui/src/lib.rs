//! On-screen overlay: loading screen, control panel and toast messages.
//!
//! [`Overlay`] holds the state and timers; drawing is a thin egui layer on
//! top. User interaction is surfaced as [`UiAction`]s that the application
//! drains each frame and routes through [`UiHandlers`].
//!
//! # Invariants
//! - [`UiAction::LoadingComplete`] is queued at most once per overlay.
//! - At most one handler is registered per action kind.

mod action;
mod draw;
mod overlay;

pub use action::{UiAction, UiActionKind, UiHandler, UiHandlers};
pub use draw::apply_style;
pub use overlay::{
    DEFAULT_TOAST_DURATION, HIDE_DELAY, Overlay, SCREEN_FADE, TOAST_FADE, Toast,
};

pub fn crate_info() -> &'static str {
    "enigma-ui v0.1.0"
}
