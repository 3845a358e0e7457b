//! Render System - an entity-keyed deferred renderer
//!
//! Game entities get a [`RenderComponent`] in a dense, swap-compacted table.
//! Every frame the [`RenderSystem`] walks that table and records three passes
//! through a [`GraphicsBackend`]:
//! - **Geometry**: each record's mesh into the G-buffer (albedo, normal, depth)
//! - **Light**: one additive fullscreen draw per directional, point and spot light
//! - **Composite**: ambient term plus accumulated light into the output texture
//!
//! Two backends are provided:
//! - **wgpu**: headless or adopting an existing device and queue
//! - **Dummy**: no GPU, records every command for inspection
//!
//! # Example
//! ```no_run
//! use render_system::prelude::*;
//!
//! # fn main() -> render_system::RenderResult<()> {
//! let mut backend = DummyBackend::new();
//! let mut renderer = RenderSystem::new(&mut backend, RenderConfig::default())?;
//! renderer.resize(&mut backend, 1280, 720)?;
//!
//! let cube = renderer.add_mesh(Mesh::new("cube", MeshData::cube()));
//! renderer.create(EntityId(1), RenderComponent::new(cube))?;
//! renderer.point_lights.push(PointLight::new(Vec3::new(0.0, 2.0, 2.0), Vec3::ONE, 4.0));
//!
//! let scene = TransformMap::new();
//! renderer.render(&mut backend, &scene, &Camera::default())?;
//! renderer.shutdown(&mut backend);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod render_system;
pub mod resources;
pub mod scene;

pub use backend::{DummyBackend, GraphicsBackend, TextureFormat, WgpuBackend};
pub use error::{RenderError, RenderResult};
pub use render_system::{ComponentId, EntityId, RenderComponent, RenderSystem, TextureId};
pub use resources::{Mesh, MeshData, MeshId};
pub use scene::{Camera, SceneGraph, Transform, TransformMap};

use glam::Vec3;

/// Configuration for creating a [`RenderSystem`]
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Render components reserved up front
    pub initial_capacity: usize,
    /// Ambient light colour
    pub ambient_color: Vec3,
    /// Ambient light intensity
    pub ambient_intensity: f32,
    /// Albedo clear colour; the background after compositing
    pub clear_color: [f32; 4],
    /// Format of the light accumulation buffer
    pub light_buffer_format: TextureFormat,
    /// Format of the final output texture
    pub output_format: TextureFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.03,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            light_buffer_format: TextureFormat::Rgba16Float,
            output_format: TextureFormat::Rgba8Unorm,
        }
    }
}

/// Commonly used types
pub mod prelude {
    pub use crate::backend::{DummyBackend, GraphicsBackend, WgpuBackend};
    pub use crate::error::{RenderError, RenderResult};
    pub use crate::render_system::{ComponentId, EntityId, RenderComponent, RenderSystem, TextureId};
    pub use crate::resources::{DrawType, Mesh, MeshData, MeshId, TextureData};
    pub use crate::scene::camera;
    pub use crate::scene::{
        Attenuation, Camera, DirectionalLight, PointLight, ProjectionKind, SceneGraph, SpotLight,
        Transform, TransformMap,
    };
    pub use crate::RenderConfig;
    pub use glam::{Quat, Vec3, Vec4};
}
