//! Rendering quality tiers and the settings each one pins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-selectable rendering quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// How the output pixel ratio is derived from the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelRatioPolicy {
    /// Always this ratio, regardless of the device.
    Fixed(f32),
    /// The device ratio, capped at this value.
    DeviceCapped(f32),
    /// The device ratio, uncapped.
    Device,
}

impl PixelRatioPolicy {
    pub fn resolve(&self, device_pixel_ratio: f32) -> f32 {
        match *self {
            Self::Fixed(ratio) => ratio,
            Self::DeviceCapped(cap) => device_pixel_ratio.min(cap),
            Self::Device => device_pixel_ratio,
        }
    }
}

/// The `(pixel ratio, bloom strength, bloom radius)` triple pinned by a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    pub pixel_ratio: PixelRatioPolicy,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::Low, Self::Medium, Self::High, Self::Ultra];

    pub fn settings(self) -> QualitySettings {
        match self {
            Self::Low => QualitySettings {
                pixel_ratio: PixelRatioPolicy::Fixed(1.0),
                bloom_strength: 0.5,
                bloom_radius: 0.3,
            },
            Self::Medium => QualitySettings {
                pixel_ratio: PixelRatioPolicy::DeviceCapped(1.5),
                bloom_strength: 0.7,
                bloom_radius: 0.4,
            },
            Self::High => QualitySettings {
                pixel_ratio: PixelRatioPolicy::DeviceCapped(2.0),
                bloom_strength: 0.9,
                bloom_radius: 0.5,
            },
            Self::Ultra => QualitySettings {
                pixel_ratio: PixelRatioPolicy::Device,
                bloom_strength: 1.1,
                bloom_radius: 0.6,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }

    /// Label shown in the quality selector.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Ultra => "Ultra",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown quality tier: {0}")]
pub struct UnknownQualityTier(pub String);

impl FromStr for QualityTier {
    type Err = UnknownQualityTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(UnknownQualityTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_pin_fixed_triples() {
        let dpr = 3.0;
        let expected = [
            (QualityTier::Low, 1.0, 0.5, 0.3),
            (QualityTier::Medium, 1.5, 0.7, 0.4),
            (QualityTier::High, 2.0, 0.9, 0.5),
            (QualityTier::Ultra, 3.0, 1.1, 0.6),
        ];
        for (tier, ratio, strength, radius) in expected {
            let s = tier.settings();
            assert_eq!(s.pixel_ratio.resolve(dpr), ratio, "{tier}");
            assert_eq!(s.bloom_strength, strength, "{tier}");
            assert_eq!(s.bloom_radius, radius, "{tier}");
        }
    }

    #[test]
    fn capped_ratio_uses_device_when_lower() {
        assert_eq!(QualityTier::High.settings().pixel_ratio.resolve(1.25), 1.25);
        assert_eq!(QualityTier::Low.settings().pixel_ratio.resolve(0.5), 1.0);
    }

    #[test]
    fn parse_and_display() {
        for tier in QualityTier::ALL {
            assert_eq!(tier.to_string().parse::<QualityTier>().unwrap(), tier);
        }
        assert_eq!(" ULTRA ".parse::<QualityTier>().unwrap(), QualityTier::Ultra);
        assert!("extreme".parse::<QualityTier>().is_err());
        assert_eq!(QualityTier::default(), QualityTier::Medium);
    }
}
