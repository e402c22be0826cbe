//! egui rendering of the overlay.

use crate::overlay::Overlay;
use egui::epaint::Mesh;
use egui::{Align2, Color32, CornerRadius, FontId, Id, Margin, Order, Pos2, Rect, RichText, Sense, Shape, vec2};
use enigma_common::QualityTier;

const BACKDROP: Color32 = Color32::from_rgb(0x0a, 0x0a, 0x14);
const ACCENT: Color32 = Color32::from_rgb(0x8b, 0x00, 0xff);
const ACCENT_END: Color32 = Color32::from_rgb(0xff, 0x00, 0xe6);
const PANEL_FILL: Color32 = Color32::from_rgba_premultiplied(7, 7, 14, 178);

/// Install the overlay look on `ctx`.
pub fn apply_style(ctx: &egui::Context) {
    ctx.style_mut(|style| {
        let visuals = &mut style.visuals;
        visuals.dark_mode = true;
        visuals.override_text_color = Some(Color32::WHITE);
        visuals.window_fill = PANEL_FILL;
        visuals.panel_fill = PANEL_FILL;
        visuals.selection.bg_fill = ACCENT;
        visuals.widgets.inactive.weak_bg_fill = Color32::from_white_alpha(26);
        visuals.widgets.hovered.weak_bg_fill = Color32::from_white_alpha(51);
        visuals.widgets.active.weak_bg_fill = Color32::from_white_alpha(64);
    });
}

impl Overlay {
    /// Draw the overlay for this frame and queue any actions the user took.
    pub fn draw(&mut self, ctx: &egui::Context) {
        if !self.is_initialized() {
            return;
        }
        if self.is_loading_visible() {
            self.draw_loading_screen(ctx);
        }
        if self.is_panel_visible() {
            self.draw_control_panel(ctx);
        }
        self.draw_toasts(ctx);
    }

    fn draw_loading_screen(&self, ctx: &egui::Context) {
        let opacity = self.loading_opacity();
        let screen = ctx.screen_rect();
        egui::Area::new(Id::new("enigma_loading"))
            .order(Order::Foreground)
            .fixed_pos(Pos2::ZERO)
            .show(ctx, |ui| {
                // Swallow pointer input so the scene underneath stays still.
                ui.allocate_rect(screen, Sense::click_and_drag());
                let painter = ui.painter();
                painter.rect_filled(screen, CornerRadius::ZERO, BACKDROP.gamma_multiply(opacity));

                let centre = screen.center();
                let logo = FontId::proportional(40.0);
                painter.text(
                    centre - vec2(0.0, 72.0),
                    Align2::CENTER_CENTER,
                    "ENIGMA",
                    logo.clone(),
                    ACCENT.gamma_multiply(opacity),
                );
                painter.text(
                    centre - vec2(0.0, 28.0),
                    Align2::CENTER_CENTER,
                    "LABS",
                    logo,
                    Color32::WHITE.gamma_multiply(opacity),
                );

                let width = (screen.width() * 0.8).min(400.0);
                let track = Rect::from_center_size(centre + vec2(0.0, 16.0), vec2(width, 4.0));
                painter.rect_filled(track, CornerRadius::same(2), Color32::from_white_alpha(51).gamma_multiply(opacity));
                let fill = self.displayed_progress() / 100.0;
                if fill > 0.0 {
                    let bar = Rect::from_min_size(track.min, vec2(width * fill, track.height()));
                    painter.add(gradient(bar, ACCENT, ACCENT_END, opacity));
                }

                painter.text(
                    track.center_bottom() + vec2(0.0, 20.0),
                    Align2::CENTER_CENTER,
                    self.status(),
                    FontId::proportional(14.0),
                    Color32::from_white_alpha(178).gamma_multiply(opacity),
                );
            });
    }

    fn draw_control_panel(&mut self, ctx: &egui::Context) {
        let mut selected = self.quality();
        let mut fullscreen = false;
        let mut audio = false;

        egui::Area::new(Id::new("enigma_controls"))
            .order(Order::Foreground)
            .anchor(Align2::RIGHT_TOP, vec2(-16.0, 16.0))
            .show(ctx, |ui| {
                egui::Frame::new()
                    .fill(PANEL_FILL)
                    .corner_radius(CornerRadius::same(4))
                    .inner_margin(Margin::same(8))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.label(RichText::new("Quality:").size(12.0));
                            egui::ComboBox::from_id_salt("enigma_quality")
                                .selected_text(selected.label())
                                .show_ui(ui, |ui| {
                                    for tier in QualityTier::ALL {
                                        ui.selectable_value(&mut selected, tier, tier.label());
                                    }
                                });
                            fullscreen = ui.button("Fullscreen").clicked();
                            audio = ui.button("🔊").clicked();
                        });
                    });
            });

        self.select_quality(selected);
        if fullscreen {
            self.press_fullscreen();
        }
        if audio {
            self.press_audio();
        }
    }

    fn draw_toasts(&self, ctx: &egui::Context) {
        for (slot, toast) in self.toasts().iter().rev().enumerate() {
            egui::Area::new(Id::new(("enigma_toast", toast.id)))
                .order(Order::Tooltip)
                .interactable(false)
                .anchor(Align2::CENTER_BOTTOM, vec2(0.0, -32.0 - slot as f32 * 52.0))
                .show(ctx, |ui| {
                    ui.set_opacity(toast.opacity());
                    egui::Frame::new()
                        .fill(PANEL_FILL)
                        .corner_radius(CornerRadius::same(4))
                        .inner_margin(Margin::symmetric(24, 12))
                        .show(ui, |ui| {
                            ui.label(RichText::new(&toast.text).color(Color32::WHITE));
                        });
                });
        }
    }
}

/// Left-to-right two-colour fill.
fn gradient(rect: Rect, from: Color32, to: Color32, opacity: f32) -> Shape {
    let (from, to) = (from.gamma_multiply(opacity), to.gamma_multiply(opacity));
    let mut mesh = Mesh::default();
    mesh.colored_vertex(rect.left_top(), from);
    mesh.colored_vertex(rect.right_top(), to);
    mesh.colored_vertex(rect.right_bottom(), to);
    mesh.colored_vertex(rect.left_bottom(), from);
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    Shape::mesh(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn frame(ctx: &egui::Context, overlay: &mut Overlay) -> egui::FullOutput {
        ctx.run(egui::RawInput::default(), |ctx| overlay.draw(ctx))
    }

    #[test]
    fn loading_screen_paints_something() {
        let ctx = egui::Context::default();
        apply_style(&ctx);
        let mut overlay = Overlay::new();
        overlay.init();
        overlay.update_progress(40.0, Some("Loading: a.glb"));
        overlay.advance(Duration::from_millis(300));

        let output = frame(&ctx, &mut overlay);
        assert!(!output.shapes.is_empty());
        assert!(overlay.drain_actions().is_empty());
    }

    #[test]
    fn disposed_overlay_paints_nothing() {
        let ctx = egui::Context::default();
        let mut overlay = Overlay::new();
        overlay.init();
        overlay.show_message("hello", Duration::from_secs(1));
        overlay.dispose();

        let output = frame(&ctx, &mut overlay);
        assert!(output.shapes.is_empty());
    }

    #[test]
    fn panel_draws_without_queuing_actions() {
        let ctx = egui::Context::default();
        let mut overlay = Overlay::new();
        overlay.init();
        overlay.hide_loading_screen();
        overlay.advance(Duration::from_secs(1));
        overlay.drain_actions();
        assert!(overlay.is_panel_visible());

        let output = frame(&ctx, &mut overlay);
        assert!(!output.shapes.is_empty());
        assert!(overlay.drain_actions().is_empty());
    }
}
