//! The render system
//!
//! Owns the render-component table, the meshes and textures the records
//! refer to, the light lists and the deferred pipeline. [`RenderSystem::render`]
//! records the geometry, light and composite passes, in that order, inside
//! one backend frame.

mod component;
mod table;

pub use component::*;
pub use table::InstanceData;

use glam::Vec3;

use crate::backend::*;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{
    CompositePass, CompositeUniform, FrameTargets, GeometryPass, LightPass, ObjectUniform,
    RenderTarget,
};
use crate::resources::{GpuTexture, Mesh, MeshId, Store, TextureData};
use crate::scene::{Camera, DirectionalLight, LightKind, PointLight, SceneGraph, SpotLight, Transform};
use crate::RenderConfig;

pub struct RenderSystem {
    config: RenderConfig,
    data: InstanceData,
    meshes: Store<Mesh>,
    textures: Store<BoundTexture>,
    white_texture: BoundTexture,

    pub ambient_color: Vec3,
    pub ambient_intensity: f32,
    pub directional_lights: Vec<DirectionalLight>,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,

    targets: Option<FrameTargets>,
    geometry: GeometryPass,
    light: LightPass,
    composite: CompositePass,

    /// Texture bind group currently bound at group 2 of the geometry pass
    current_texture: Option<BindGroupHandle>,
}

impl RenderSystem {
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B, config: RenderConfig) -> RenderResult<Self> {
        let geometry = GeometryPass::new(backend)?;
        let light = LightPass::new(backend, geometry.camera_layout(), config.light_buffer_format)?;
        let composite =
            CompositePass::new(backend, config.light_buffer_format, config.output_format)?;

        let mut white = GpuTexture::create(backend, &TextureData::white())?;
        let bind_group = match geometry.create_texture_bind_group(backend, white.view) {
            Ok(bind_group) => bind_group,
            Err(e) => {
                white.destroy(backend);
                return Err(e.into());
            }
        };

        log::debug!(
            "Render system created (initial capacity {})",
            config.initial_capacity
        );

        Ok(Self {
            data: InstanceData::with_capacity(config.initial_capacity),
            meshes: Store::new(),
            textures: Store::new(),
            white_texture: BoundTexture {
                texture: white,
                bind_group,
            },
            ambient_color: config.ambient_color,
            ambient_intensity: config.ambient_intensity,
            directional_lights: Vec::new(),
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            targets: None,
            geometry,
            light,
            composite,
            current_texture: None,
            config,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    // ---- Render-component table ----

    pub fn allocate(&mut self, capacity: usize) {
        self.data.allocate(capacity);
    }

    pub fn create(&mut self, entity: EntityId, component: RenderComponent) -> RenderResult<ComponentId> {
        self.data.create(entity, component)
    }

    pub fn destroy(&mut self, id: ComponentId) -> RenderResult<()> {
        self.data.destroy(id)
    }

    pub fn get_component_id(&self, entity: EntityId) -> ComponentId {
        self.data.get_component_id(entity)
    }

    pub fn is_valid(&self, id: ComponentId) -> bool {
        self.data.is_valid(id)
    }

    pub fn reset_all_pointers(&mut self) {
        self.data.reset_all_pointers();
    }

    pub fn component(&self, id: ComponentId) -> Option<&RenderComponent> {
        self.data.component(id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut RenderComponent> {
        self.data.component_mut(id)
    }

    /// Read-only view of the table
    pub fn instances(&self) -> &InstanceData {
        &self.data
    }

    // ---- Resources ----

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id)
    }

    /// Remove a mesh and release its buffers. Records still pointing at it
    /// are skipped from then on.
    pub fn remove_mesh<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B, id: MeshId) -> Option<Mesh> {
        let mut mesh = self.meshes.remove(id)?;
        mesh.destroy(backend);
        Some(mesh)
    }

    pub fn add_texture<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        data: &TextureData,
    ) -> RenderResult<TextureId> {
        let mut texture = GpuTexture::create(backend, data)?;
        let bind_group = match self.geometry.create_texture_bind_group(backend, texture.view) {
            Ok(bind_group) => bind_group,
            Err(e) => {
                texture.destroy(backend);
                return Err(e.into());
            }
        };
        Ok(self.textures.insert(BoundTexture { texture, bind_group }))
    }

    pub fn texture(&self, id: TextureId) -> Option<&BoundTexture> {
        self.textures.get(id)
    }

    /// Remove a texture. Records still pointing at it draw with the white
    /// fallback.
    pub fn remove_texture<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B, id: TextureId) -> bool {
        let Some(mut bound) = self.textures.remove(id) else {
            return false;
        };
        if self.current_texture == Some(bound.bind_group) {
            self.current_texture = None;
        }
        backend.destroy_bind_group(bound.bind_group);
        bound.texture.destroy(backend);
        true
    }

    // ---- Framebuffer ----

    /// Recreate every frame target at the new size. Must be called before
    /// the first [`render`](Self::render) and whenever the viewport changes.
    pub fn resize<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFramebufferSize { width, height });
        }
        if self.framebuffer_size() == Some((width, height)) {
            return Ok(());
        }

        let targets = FrameTargets::create(
            backend,
            width,
            height,
            self.config.light_buffer_format,
            self.config.output_format,
        )?;

        let bound = self
            .light
            .bind_targets(backend, &targets)
            .and_then(|_| self.composite.bind_targets(backend, &targets));

        let old = self.targets.take();
        if let Some(old) = old {
            old.destroy(backend);
        }

        match bound {
            Ok(()) => {
                log::debug!("Render targets resized to {}x{}", width, height);
                self.targets = Some(targets);
                Ok(())
            }
            Err(e) => {
                log::warn!("Binding {}x{} targets failed: {}", width, height, e);
                self.light.unbind_targets(backend);
                self.composite.unbind_targets(backend);
                targets.destroy(backend);
                Err(e.into())
            }
        }
    }

    pub fn framebuffer_size(&self) -> Option<(u32, u32)> {
        self.targets.as_ref().map(FrameTargets::size)
    }

    pub fn targets(&self) -> Option<&FrameTargets> {
        self.targets.as_ref()
    }

    /// Final composited image
    pub fn output(&self) -> Option<RenderTarget> {
        self.targets.as_ref().map(|t| t.output)
    }

    // ---- Frame ----

    /// Record one frame: geometry pass, light pass, composite pass.
    ///
    /// Every fallible step (uniform pools, mesh uploads) runs before the
    /// frame begins, so an error never leaves a pass open.
    pub fn render<B, G>(&mut self, backend: &mut B, scene: &G, camera: &Camera) -> RenderResult<()>
    where
        B: GraphicsBackend + ?Sized,
        G: SceneGraph + ?Sized,
    {
        let Some(targets) = self.targets.clone() else {
            return Err(RenderError::TargetsNotSized);
        };

        self.prepare(backend)?;

        backend.begin_frame()?;
        self.geometry_pass(backend, scene, camera, &targets);
        self.light_pass(backend, &targets);
        self.out_pass(backend, &targets);
        backend.end_frame()?;
        Ok(())
    }

    fn prepare<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) -> RenderResult<()> {
        self.geometry.reserve_objects(backend, self.data.len())?;
        self.light
            .reserve_lights(backend, LightKind::Directional, self.directional_lights.len())?;
        self.light
            .reserve_lights(backend, LightKind::Point, self.point_lights.len())?;
        self.light
            .reserve_lights(backend, LightKind::Spot, self.spot_lights.len())?;

        for component in self.data.components() {
            if let Some(mesh) = component.mesh.and_then(|id| self.meshes.get_mut(id)) {
                mesh.generate(backend)?;
            }
        }
        Ok(())
    }

    fn geometry_pass<B, G>(&mut self, backend: &mut B, scene: &G, camera: &Camera, targets: &FrameTargets)
    where
        B: GraphicsBackend + ?Sized,
        G: SceneGraph + ?Sized,
    {
        self.current_texture = None;
        self.geometry.write_camera(backend, &camera.uniform());
        self.geometry.begin(backend, targets, self.config.clear_color);

        let mut current_pipeline = None;
        for (id, entity, component) in self.data.iter() {
            let Some(gpu) = component
                .mesh
                .and_then(|mesh| self.meshes.get(mesh))
                .and_then(Mesh::gpu)
            else {
                log::trace!("Entity {} skipped: no drawable mesh", entity);
                continue;
            };
            let Some(pipeline) = self.geometry.pipeline(gpu.topology()) else {
                continue;
            };

            let transform = scene.world_transform(entity).unwrap_or(Transform::IDENTITY);
            let world = transform.with_scale(transform.scale * component.scale);
            let uniform = ObjectUniform {
                model: world.matrix(),
                normal_matrix: world.normal_matrix(),
                tint: component.tint,
            };
            let Some(object) = self.geometry.write_object(backend, id.index(), &uniform) else {
                log::trace!("Entity {} skipped: no object uniform for slot {}", entity, id);
                continue;
            };

            let texture = match component.texture {
                Some(handle) => match self.textures.get(handle) {
                    Some(bound) => bound.bind_group,
                    None => {
                        log::warn!("Entity {} uses removed texture {:?}; drawing white", entity, handle);
                        self.white_texture.bind_group
                    }
                },
                None => self.white_texture.bind_group,
            };

            if current_pipeline != Some(pipeline) {
                backend.set_render_pipeline(pipeline);
                current_pipeline = Some(pipeline);
            }
            backend.set_bind_group(1, object);
            Self::set_texture(&mut self.current_texture, backend, texture, 2);
            gpu.draw(backend);
        }

        backend.end_render_pass();
    }

    /// Bind `texture` at group `position` unless it is already bound.
    /// Returns whether a bind was issued.
    fn set_texture<B: GraphicsBackend + ?Sized>(
        current: &mut Option<BindGroupHandle>,
        backend: &mut B,
        texture: BindGroupHandle,
        position: u32,
    ) -> bool {
        if *current == Some(texture) {
            return false;
        }
        backend.set_bind_group(position, texture);
        *current = Some(texture);
        true
    }

    fn light_pass<B: GraphicsBackend + ?Sized>(&self, backend: &mut B, targets: &FrameTargets) {
        if !self
            .light
            .begin(backend, targets, self.geometry.camera_bind_group())
        {
            return;
        }

        for (i, light) in self.directional_lights.iter().enumerate() {
            if !light.has_direction() {
                log::trace!("Directional light {} skipped: no direction", i);
                continue;
            }
            self.light
                .draw_light(backend, LightKind::Directional, i, &light.to_gpu_data());
        }
        for (i, light) in self.point_lights.iter().enumerate() {
            self.light
                .draw_light(backend, LightKind::Point, i, &light.to_gpu_data());
        }
        for (i, light) in self.spot_lights.iter().enumerate() {
            if !light.has_direction() {
                log::trace!("Spot light {} skipped: no direction", i);
                continue;
            }
            self.light
                .draw_light(backend, LightKind::Spot, i, &light.to_gpu_data());
        }

        backend.end_render_pass();
    }

    fn out_pass<B: GraphicsBackend + ?Sized>(&self, backend: &mut B, targets: &FrameTargets) {
        let uniform = CompositeUniform {
            ambient: (self.ambient_color * self.ambient_intensity).extend(1.0),
        };
        self.composite.record(backend, targets, &uniform);
    }

    /// Release every GPU resource the system owns.
    pub fn shutdown<B: GraphicsBackend + ?Sized>(mut self, backend: &mut B) {
        for mut mesh in self.meshes.drain() {
            mesh.destroy(backend);
        }
        for mut bound in self.textures.drain() {
            backend.destroy_bind_group(bound.bind_group);
            bound.texture.destroy(backend);
        }
        backend.destroy_bind_group(self.white_texture.bind_group);
        self.white_texture.texture.destroy(backend);

        if let Some(targets) = self.targets.take() {
            targets.destroy(backend);
        }
        self.geometry.destroy(backend);
        self.light.destroy(backend);
        self.composite.destroy(backend);
        log::debug!("Render system shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{Command, DummyBackend};
    use crate::resources::MeshData;
    use crate::scene::TransformMap;

    fn system(backend: &mut DummyBackend) -> RenderSystem {
        let mut system = RenderSystem::new(backend, RenderConfig::default()).unwrap();
        system.resize(backend, 64, 48).unwrap();
        system
    }

    #[test]
    fn set_texture_elides_repeated_binds() {
        let mut backend = DummyBackend::new();
        let sys = system(&mut backend);
        let mut current = None;
        let white = sys.white_texture.bind_group;

        assert!(RenderSystem::set_texture(&mut current, &mut backend, white, 2));
        assert!(!RenderSystem::set_texture(&mut current, &mut backend, white, 2));
        sys.shutdown(&mut backend);
    }

    #[test]
    fn current_texture_resets_each_frame() {
        let mut backend = DummyBackend::new();
        let mut sys = system(&mut backend);
        let mesh = sys.add_mesh(Mesh::new("quad", MeshData::quad()));
        sys.create(EntityId(1), RenderComponent::new(mesh)).unwrap();
        let camera = Camera::default();

        for _ in 0..2 {
            sys.render(&mut backend, &TransformMap::new(), &camera).unwrap();
        }

        let texture_binds = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::SetBindGroup { index: 2, .. }))
            .count();
        assert_eq!(texture_binds, 2);
        sys.shutdown(&mut backend);
    }
}
