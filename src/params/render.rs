//! Window and post-processing configuration.

/// Unreal-style bloom parameters
#[derive(Debug, Clone)]
pub struct BloomConfig {
    /// Overall glow multiplier
    pub strength: f32,

    /// Blend between tight and wide mip weighting (0..1)
    pub radius: f32,

    /// Luminance below which pixels do not glow
    pub threshold: f32,

    /// Soft knee above the threshold
    pub smooth_width: f32,

    /// Blur kernel radius per mip level (one entry per level)
    pub kernel_radii: Vec<u32>,

    /// Base weight per mip level (same length as kernel_radii)
    pub mip_factors: Vec<f32>,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            strength: 5.0,
            radius: 0.5,
            threshold: 0.0,
            smooth_width: 0.01,
            kernel_radii: vec![3, 5, 7, 9, 11],
            mip_factors: vec![1.0, 0.8, 0.6, 0.4, 0.2],
        }
    }
}

impl BloomConfig {
    pub fn levels(&self) -> usize {
        self.kernel_radii.len()
    }

    /// Final weight of one mip level in the composite
    pub fn mip_weight(&self, level: usize) -> f32 {
        let factor = self.mip_factors[level];
        let lerped = factor + (1.2 - factor - factor) * self.radius;
        self.strength * lerped
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kernel_radii.is_empty() {
            return Err("Bloom needs at least one mip level".to_string());
        }
        if self.kernel_radii.len() != self.mip_factors.len() {
            return Err(format!(
                "Bloom has {} kernel radii but {} mip factors",
                self.kernel_radii.len(),
                self.mip_factors.len()
            ));
        }
        if self.strength < 0.0 {
            return Err(format!("Bloom strength must be >= 0, got {}", self.strength));
        }
        Ok(())
    }
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Initial window width (logical pixels)
    pub window_width: u32,

    /// Initial window height (logical pixels)
    pub window_height: u32,

    pub bloom: BloomConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            bloom: BloomConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_weight_at_half_radius() {
        let bloom = BloomConfig::default();
        // lerp(f, 1.2 - f, 0.5) = 0.6 for every level
        for level in 0..bloom.levels() {
            assert!((bloom.mip_weight(level) - 5.0 * 0.6).abs() < 1e-5);
        }
    }

    #[test]
    fn test_mip_weight_at_zero_radius_uses_factor() {
        let bloom = BloomConfig {
            radius: 0.0,
            strength: 1.0,
            ..Default::default()
        };
        assert!((bloom.mip_weight(0) - 1.0).abs() < 1e-6);
        assert!((bloom.mip_weight(4) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_mismatched_levels_rejected() {
        let bloom = BloomConfig {
            mip_factors: vec![1.0],
            ..Default::default()
        };
        assert!(bloom.validate().is_err());
    }
}
