//! G-Buffer generation pass for deferred rendering
//!
//! Renders geometry to multiple render targets (MRT):
//! - Albedo (texture * vertex colour * tint)
//! - World-space normals (encoded)
//! - Depth buffer
//!
//! The per-record loop lives in the render system; this type owns the GPU
//! state the loop binds: one pipeline per primitive topology, the camera
//! uniform, a pool of per-slot object uniforms, and the texture layout.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use super::targets::{FrameTargets, ALBEDO_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT};
use super::{opaque_target, uniform_layout, UniformSlot};
use crate::backend::*;
use crate::error::RenderResult;
use crate::scene::CameraUniform;

/// Per-record uniform at group 1
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
    pub tint: Vec4,
}

/// GPU state of the geometry pass
#[derive(Debug)]
pub struct GeometryPass {
    camera_layout: BindGroupLayoutHandle,
    object_layout: BindGroupLayoutHandle,
    texture_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
    camera: UniformSlot,
    objects: Vec<UniformSlot>,
    pipelines: HashMap<PrimitiveTopology, RenderPipelineHandle>,
}

impl GeometryPass {
    pub const LABEL: &'static str = "Geometry Pass";

    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B) -> RenderResult<Self> {
        let camera_layout = backend
            .create_bind_group_layout(&[uniform_layout(0, ShaderStageFlags::VERTEX_FRAGMENT)])?;
        let object_layout =
            backend.create_bind_group_layout(&[uniform_layout(0, ShaderStageFlags::VERTEX)])?;
        let texture_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { comparison: false },
            },
        ])?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Albedo Sampler".into()),
            ..Default::default()
        })?;

        let camera = UniformSlot::create(
            backend,
            camera_layout,
            std::mem::size_of::<CameraUniform>() as u64,
            "Camera Uniform".into(),
        )?;

        let mut pipelines = HashMap::new();
        for topology in PrimitiveTopology::ALL {
            let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(format!("Geometry Pipeline ({:?})", topology)),
                shader: GBUFFER_SHADER.to_string(),
                has_fragment: true,
                vertex_layouts: vec![Vertex::layout()],
                bind_group_layouts: vec![camera_layout, object_layout, texture_layout],
                primitive_topology: topology,
                front_face: FrontFace::Ccw,
                cull_mode: if topology.is_triangles() {
                    CullMode::Back
                } else {
                    CullMode::None
                },
                depth_stencil: Some(DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::Less,
                }),
                color_targets: vec![opaque_target(ALBEDO_FORMAT), opaque_target(NORMAL_FORMAT)],
            })?;
            pipelines.insert(topology, pipeline);
        }

        Ok(Self {
            camera_layout,
            object_layout,
            texture_layout,
            sampler,
            camera,
            objects: Vec::new(),
            pipelines,
        })
    }

    /// Layout of the camera group, shared with the light pass
    pub fn camera_layout(&self) -> BindGroupLayoutHandle {
        self.camera_layout
    }

    pub fn camera_bind_group(&self) -> BindGroupHandle {
        self.camera.bind_group
    }

    pub fn pipeline(&self, topology: PrimitiveTopology) -> Option<RenderPipelineHandle> {
        self.pipelines.get(&topology).copied()
    }

    /// Bind group exposing `view` and the albedo sampler at group 2
    pub fn create_texture_bind_group<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        view: TextureViewHandle,
    ) -> BackendResult<BindGroupHandle> {
        backend.create_bind_group(
            self.texture_layout,
            &[
                (0, BindGroupEntry::Texture(view)),
                (1, BindGroupEntry::Sampler(self.sampler)),
            ],
        )
    }

    /// Grow the object uniform pool to at least `count` slots.
    ///
    /// Every record drawn in a frame needs its own buffer: queued writes all
    /// land before the frame's commands execute.
    pub fn reserve_objects<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        count: usize,
    ) -> BackendResult<()> {
        while self.objects.len() < count {
            let slot = UniformSlot::create(
                backend,
                self.object_layout,
                std::mem::size_of::<ObjectUniform>() as u64,
                format!("Object Uniform {}", self.objects.len()),
            )?;
            self.objects.push(slot);
        }
        Ok(())
    }

    pub fn write_camera<B: GraphicsBackend + ?Sized>(&self, backend: &mut B, uniform: &CameraUniform) {
        backend.write_buffer(self.camera.buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Upload `uniform` into pool slot `slot` and return its bind group.
    pub fn write_object<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        slot: usize,
        uniform: &ObjectUniform,
    ) -> Option<BindGroupHandle> {
        let slot = self.objects.get(slot)?;
        backend.write_buffer(slot.buffer, 0, bytemuck::bytes_of(uniform));
        Some(slot.bind_group)
    }

    /// Open the pass with cleared G-buffer targets and bind the camera.
    pub fn begin<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        targets: &FrameTargets,
        clear_color: [f32; 4],
    ) {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(Self::LABEL.into()),
            color_attachments: vec![
                // Location 0: Albedo
                ColorAttachment {
                    view: targets.albedo.view,
                    load_op: LoadOp::Clear(clear_color),
                    store_op: StoreOp::Store,
                },
                // Location 1: Normal
                ColorAttachment {
                    view: targets.normal.view,
                    load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                    store_op: StoreOp::Store,
                },
            ],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: targets.depth.view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        });

        backend.set_viewport(
            0.0,
            0.0,
            targets.width() as f32,
            targets.height() as f32,
            0.0,
            1.0,
        );
        backend.set_bind_group(0, self.camera.bind_group);
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for slot in self.objects.drain(..) {
            slot.destroy(backend);
        }
        self.camera.destroy(backend);
    }
}

/// G-Buffer generation shader
pub const GBUFFER_SHADER: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    position: vec4<f32>,
}

struct ObjectUniforms {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    tint: vec4<f32>,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
}

struct GBufferOutput {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> object_data: ObjectUniforms;
@group(2) @binding(0) var albedo_texture: texture_2d<f32>;
@group(2) @binding(1) var albedo_sampler: sampler;

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let world_pos = object_data.model * vec4<f32>(input.position, 1.0);
    output.clip_position = camera.view_proj * world_pos;
    output.world_normal = (object_data.normal_matrix * vec4<f32>(input.normal, 0.0)).xyz;
    output.uv = input.uv;
    output.color = input.color;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var output: GBufferOutput;

    let texel = textureSample(albedo_texture, albedo_sampler, input.uv);
    output.albedo = texel * input.color * object_data.tint;

    // Encode world-space normal to [0,1]; zero-length normals stay zero
    var n = vec3<f32>(0.0);
    if dot(input.world_normal, input.world_normal) > 0.0 {
        n = normalize(input.world_normal);
    }
    output.normal = vec4<f32>(n * 0.5 + 0.5, 1.0);

    return output;
}
"#;
