use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Local axis a bone points along. Only the six signed principal axes are
/// accepted, which keeps the direction a unit vector without normalizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoneOrientation {
    PositiveX,
    NegativeX,
    #[default]
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl BoneOrientation {
    pub const ALL: [BoneOrientation; 6] = [
        BoneOrientation::PositiveX,
        BoneOrientation::NegativeX,
        BoneOrientation::PositiveY,
        BoneOrientation::NegativeY,
        BoneOrientation::PositiveZ,
        BoneOrientation::NegativeZ,
    ];

    pub fn axis(self) -> Vec3 {
        match self {
            BoneOrientation::PositiveX => Vec3::X,
            BoneOrientation::NegativeX => Vec3::NEG_X,
            BoneOrientation::PositiveY => Vec3::Y,
            BoneOrientation::NegativeY => Vec3::NEG_Y,
            BoneOrientation::PositiveZ => Vec3::Z,
            BoneOrientation::NegativeZ => Vec3::NEG_Z,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinnerConfig {
    /// Bone direction used as the per-bone sign reference and for bulge
    /// compensation. Changing it on a started skinner needs
    /// `Skinner::update_compensation_coefficients` before the coefficients
    /// follow.
    pub bone_orientation: BoneOrientation,
    /// Amount of bulge compensation, 0..=1. Zero is plain DQ skinning.
    pub bulge_compensation: f32,
    /// When disabled the world bounds become effectively infinite.
    pub view_frustum_culling: bool,
}

impl Default for SkinnerConfig {
    fn default() -> Self {
        Self {
            bone_orientation: BoneOrientation::default(),
            bulge_compensation: 0.0,
            view_frustum_culling: true,
        }
    }
}

impl SkinnerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: SkinnerConfig = serde_json::from_str(json)?;
        config.bulge_compensation = clamp_bulge_compensation(config.bulge_compensation);
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

pub(crate) fn clamp_bulge_compensation(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
