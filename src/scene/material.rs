//! Materials: raw-shader backdrop and the audio-displaced standard material.

use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};

use super::envmap::PrefilteredEnvMap;
use crate::params::SphereConfig;

/// Which triangle faces are rasterized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

/// Uniforms of the backdrop shader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackdropUniforms {
    /// Viewport size in device pixels
    pub resolution: Vec2,
    /// Per-frame noise seed
    pub rand: f32,
}

/// Gradient + noise shell the camera sits inside
#[derive(Debug, Clone)]
pub struct BackdropMaterial {
    pub uniforms: BackdropUniforms,
    pub side: Side,
}

impl Default for BackdropMaterial {
    fn default() -> Self {
        Self {
            uniforms: BackdropUniforms {
                resolution: Vec2::ONE,
                rand: 0.0,
            },
            side: Side::Back,
        }
    }
}

/// Audio-driven uniforms registered by the compile hook
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReactiveUniforms {
    pub time: f32,
    pub input_data: Vec4,
    pub output_data: Vec4,
}

/// Whether the compile hook has run yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformBinding {
    Unbound,
    Bound(ReactiveUniforms),
}

/// Vertex program used by the standard material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStage {
    Standard,
    /// Sphere displaced along its normal by the reactive uniforms
    AudioDisplacement,
}

/// Hook run once when the GPU program for a material is compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileHook {
    /// Register time/input/output uniforms and swap in the displacement stage
    AudioDisplacement,
}

/// Metallic/roughness material with optional environment reflections
#[derive(Debug, Clone)]
pub struct StandardMaterial {
    pub color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_intensity: f32,
    pub side: Side,
    pub env_map: Option<Arc<PrefilteredEnvMap>>,
    pub vertex_stage: VertexStage,
    hook: Option<CompileHook>,
    binding: UniformBinding,
}

impl StandardMaterial {
    pub fn new(config: &SphereConfig) -> Self {
        Self {
            color: config.color,
            metalness: config.metalness,
            roughness: config.roughness,
            emissive: config.emissive,
            emissive_intensity: config.emissive_intensity,
            side: Side::Front,
            env_map: None,
            vertex_stage: VertexStage::Standard,
            hook: None,
            binding: UniformBinding::Unbound,
        }
    }

    pub fn set_compile_hook(&mut self, hook: CompileHook) {
        self.hook = Some(hook);
    }

    /// Called by the render pipeline when it builds this material's program.
    /// Runs the installed hook; later calls keep the existing uniforms.
    pub fn compile(&mut self) {
        if let Some(CompileHook::AudioDisplacement) = self.hook {
            if self.binding == UniformBinding::Unbound {
                self.binding = UniformBinding::Bound(ReactiveUniforms::default());
            }
            self.vertex_stage = VertexStage::AudioDisplacement;
        }
    }

    pub fn binding(&self) -> &UniformBinding {
        &self.binding
    }

    pub fn uniforms(&self) -> Option<&ReactiveUniforms> {
        match &self.binding {
            UniformBinding::Bound(uniforms) => Some(uniforms),
            UniformBinding::Unbound => None,
        }
    }

    pub fn uniforms_mut(&mut self) -> Option<&mut ReactiveUniforms> {
        match &mut self.binding {
            UniformBinding::Bound(uniforms) => Some(uniforms),
            UniformBinding::Unbound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniforms_unbound_until_compiled() {
        let mut material = StandardMaterial::new(&SphereConfig::default());
        material.set_compile_hook(CompileHook::AudioDisplacement);
        assert!(material.uniforms().is_none());
        assert_eq!(material.vertex_stage, VertexStage::Standard);

        material.compile();
        assert_eq!(material.uniforms(), Some(&ReactiveUniforms::default()));
        assert_eq!(material.vertex_stage, VertexStage::AudioDisplacement);
    }

    #[test]
    fn test_recompile_keeps_uniform_values() {
        let mut material = StandardMaterial::new(&SphereConfig::default());
        material.set_compile_hook(CompileHook::AudioDisplacement);
        material.compile();
        if let Some(u) = material.uniforms_mut() {
            u.time = 3.0;
        }

        material.compile();
        assert_eq!(material.uniforms().map(|u| u.time), Some(3.0));
    }

    #[test]
    fn test_compile_without_hook_stays_unbound() {
        let mut material = StandardMaterial::new(&SphereConfig::default());
        material.compile();
        assert_eq!(material.binding(), &UniformBinding::Unbound);
    }
}
