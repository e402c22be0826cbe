use enigma_common::QualityTier;
use enigma_events::{AppEvent, Emitter};
use serde::{Deserialize, Serialize};

/// Output surface configuration. Sizes are logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub shadows_enabled: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_ratio: 1.0,
            shadows_enabled: false,
        }
    }
}

impl RenderSettings {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
            ..Self::default()
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Non-positive or non-finite ratios are ignored.
    pub fn set_pixel_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.pixel_ratio = ratio;
        }
    }

    pub fn enable_shadows(&mut self, enabled: bool) {
        self.shadows_enabled = enabled;
    }

    /// Surface size in device pixels, never zero.
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Applies surface resizes and announces them on the event bus.
#[derive(Debug, Clone)]
pub struct ResizeNotifier {
    emitter: Emitter<AppEvent>,
}

impl ResizeNotifier {
    pub fn new(emitter: Emitter<AppEvent>) -> Self {
        Self { emitter }
    }

    pub fn resize(&self, settings: &mut RenderSettings, width: u32, height: u32) {
        settings.set_size(width, height);
        tracing::debug!(width, height, "renderer resized");
        self.emitter.emit(AppEvent::RendererResize { width, height });
    }
}

/// Glow applied to bright regions of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    /// Luminance above which pixels contribute to the glow.
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 0.7,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

/// Post-processing chain state: the bloom pass and its output resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessing {
    pub bloom: BloomSettings,
    width: u32,
    height: u32,
}

impl PostProcessing {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bloom: BloomSettings::default(),
            width,
            height,
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pin the pixel ratio and bloom parameters for `tier`.
pub fn apply_quality(
    tier: QualityTier,
    device_pixel_ratio: f32,
    settings: &mut RenderSettings,
    bloom: &mut BloomSettings,
) {
    let q = tier.settings();
    settings.set_pixel_ratio(q.pixel_ratio.resolve(device_pixel_ratio));
    bloom.strength = q.bloom_strength;
    bloom.radius = q.bloom_radius;
    tracing::info!(%tier, pixel_ratio = settings.pixel_ratio, "quality applied");
}
