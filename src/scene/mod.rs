//! Static scene graph: backdrop shell, reactive sphere and camera.
//!
//! Built once by [`SceneBuilder`]; afterwards the driver and viewport manager
//! mutate the returned [`SceneHandles`] in place.

mod camera;
mod envmap;
mod geometry;
mod material;

use glam::Vec3;
use log::info;

use crate::params::SceneConfig;

pub use camera::PerspectiveCamera;
pub use envmap::{load_prefiltered, prefilter, EnvLevel, EnvMapLoad, PrefilteredEnvMap};
pub use geometry::{Geometry, Vertex};
pub use material::{
    BackdropMaterial, BackdropUniforms, CompileHook, ReactiveUniforms, Side, StandardMaterial,
    UniformBinding, VertexStage,
};

/// Geometry plus material and a simple uniform-scale transform
#[derive(Debug, Clone)]
pub struct Mesh<M> {
    pub geometry: Geometry,
    pub material: M,
    pub position: Vec3,
    pub scale: f32,
    pub visible: bool,
}

impl<M> Mesh<M> {
    pub fn new(geometry: Geometry, material: M) -> Self {
        Self {
            geometry,
            material,
            position: Vec3::ZERO,
            scale: 1.0,
            visible: true,
        }
    }
}

/// Everything the frame loop touches
pub struct SceneHandles {
    pub camera: PerspectiveCamera,
    pub backdrop: Mesh<BackdropMaterial>,
    pub sphere: Mesh<StandardMaterial>,
    /// Linear RGB
    pub clear_color: Vec3,
    pub env_map: EnvMapLoad,
}

impl SceneHandles {
    /// Assign a finished environment map and reveal the sphere.
    /// Returns true on the one call that applies it.
    pub fn apply_pending_env_map(&mut self) -> bool {
        match self.env_map.take_ready() {
            Some(map) => {
                self.sphere.material.env_map = Some(map);
                self.sphere.visible = true;
                info!("Reactive sphere visible");
                true
            }
            None => false,
        }
    }
}

pub struct SceneBuilder<'a> {
    config: &'a SceneConfig,
    env_map: Option<EnvMapLoad>,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(config: &'a SceneConfig) -> Self {
        Self {
            config,
            env_map: None,
        }
    }

    /// Use an existing load instead of spawning one from the configured path
    pub fn with_env_map(mut self, load: EnvMapLoad) -> Self {
        self.env_map = Some(load);
        self
    }

    pub fn build(self) -> SceneHandles {
        let config = self.config;

        let backdrop = Mesh::new(
            Geometry::icosphere(config.backdrop.radius, config.backdrop.detail),
            BackdropMaterial::default(),
        );

        let mut material = StandardMaterial::new(&config.sphere);
        material.set_compile_hook(CompileHook::AudioDisplacement);
        let mut sphere = Mesh::new(
            Geometry::icosphere(config.sphere.radius, config.sphere.detail),
            material,
        );
        sphere.visible = false;

        let mut camera = PerspectiveCamera::new(&config.camera, 1.0);
        camera.look_at(sphere.position);

        let env_map = self
            .env_map
            .unwrap_or_else(|| EnvMapLoad::spawn(&config.env_map));

        info!(
            "Scene built: backdrop {} tris, sphere {} tris",
            backdrop.geometry.triangle_count(),
            sphere.geometry.triangle_count()
        );

        SceneHandles {
            camera,
            backdrop,
            sphere,
            clear_color: config.clear_color,
            env_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::EnvMapSettings;

    fn tiny_map() -> PrefilteredEnvMap {
        let settings = EnvMapSettings {
            path: None,
            base_width: 8,
            levels: 2,
        };
        prefilter(&image::Rgba32FImage::new(8, 4), &settings)
    }

    #[test]
    fn test_build_matches_config() {
        let config = SceneConfig::default();
        let scene = SceneBuilder::new(&config)
            .with_env_map(EnvMapLoad::never())
            .build();

        assert_eq!(scene.camera.fov_degrees, 75.0);
        assert_eq!(scene.camera.position, Vec3::new(2.0, -2.0, 5.0));
        assert_eq!(scene.backdrop.material.side, Side::Back);
        assert_eq!(scene.backdrop.geometry.triangle_count(), 20 * 36);
        assert_eq!(scene.sphere.geometry.triangle_count(), 20 * 121);
        assert!(!scene.sphere.visible);
        assert_eq!(scene.sphere.material.binding(), &UniformBinding::Unbound);
    }

    #[test]
    fn test_env_map_applied_exactly_once() {
        let config = SceneConfig::default();
        let mut scene = SceneBuilder::new(&config)
            .with_env_map(EnvMapLoad::ready(tiny_map()))
            .build();

        assert!(scene.apply_pending_env_map());
        assert!(scene.sphere.visible);
        assert!(scene.sphere.material.env_map.is_some());
        assert!(!scene.apply_pending_env_map());
    }

    #[test]
    fn test_never_loaded_map_keeps_sphere_hidden() {
        let config = SceneConfig::default();
        let mut scene = SceneBuilder::new(&config)
            .with_env_map(EnvMapLoad::never())
            .build();
        for _ in 0..10 {
            assert!(!scene.apply_pending_env_map());
        }
        assert!(!scene.sphere.visible);
    }
}
