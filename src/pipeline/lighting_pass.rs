//! Light accumulation pass
//!
//! Reads the G-buffer and adds one fullscreen draw per light into the
//! light buffer. Lights of each kind get their own pool of uniform buffers.

use super::targets::{FrameTargets, ALBEDO_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT};
use super::{load_texture_layout, uniform_layout, UniformSlot};
use crate::backend::*;
use crate::error::RenderResult;
use crate::scene::{GpuLightData, LightKind};

/// GPU state of the light pass
#[derive(Debug)]
pub struct LightPass {
    gbuffer_layout: BindGroupLayoutHandle,
    light_layout: BindGroupLayoutHandle,
    pipeline: RenderPipelineHandle,
    gbuffer_bind_group: Option<BindGroupHandle>,
    /// Indexed by [`LightKind`]
    lights: [Vec<UniformSlot>; 3],
}

impl LightPass {
    pub const LABEL: &'static str = "Light Pass";

    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        camera_layout: BindGroupLayoutHandle,
        light_format: TextureFormat,
    ) -> RenderResult<Self> {
        let gbuffer_layout = backend.create_bind_group_layout(&[
            load_texture_layout(0, ALBEDO_FORMAT),
            load_texture_layout(1, NORMAL_FORMAT),
            load_texture_layout(2, DEPTH_FORMAT),
        ])?;
        let light_layout =
            backend.create_bind_group_layout(&[uniform_layout(0, ShaderStageFlags::FRAGMENT)])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Light Pipeline".into()),
            shader: LIGHTING_SHADER.to_string(),
            has_fragment: true,
            vertex_layouts: Vec::new(),
            bind_group_layouts: vec![camera_layout, gbuffer_layout, light_layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState {
                format: light_format,
                blend: Some(BlendState::additive()),
                write_mask: ColorWrites::ALL,
            }],
        })?;

        Ok(Self {
            gbuffer_layout,
            light_layout,
            pipeline,
            gbuffer_bind_group: None,
            lights: Default::default(),
        })
    }

    /// Point the pass at freshly created targets.
    pub fn bind_targets<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        targets: &FrameTargets,
    ) -> BackendResult<()> {
        let bind_group = backend.create_bind_group(
            self.gbuffer_layout,
            &[
                (0, BindGroupEntry::Texture(targets.albedo.view)),
                (1, BindGroupEntry::Texture(targets.normal.view)),
                (2, BindGroupEntry::Texture(targets.depth.view)),
            ],
        )?;
        if let Some(old) = self.gbuffer_bind_group.replace(bind_group) {
            backend.destroy_bind_group(old);
        }
        Ok(())
    }

    /// Release the G-buffer bind group. The pass records nothing until
    /// targets are bound again.
    pub fn unbind_targets<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(old) = self.gbuffer_bind_group.take() {
            backend.destroy_bind_group(old);
        }
    }

    /// Grow the uniform pool of `kind` to at least `count` slots.
    pub fn reserve_lights<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        kind: LightKind,
        count: usize,
    ) -> BackendResult<()> {
        let pool = &mut self.lights[kind as usize];
        while pool.len() < count {
            let slot = UniformSlot::create(
                backend,
                self.light_layout,
                std::mem::size_of::<GpuLightData>() as u64,
                format!("{:?} Light Uniform {}", kind, pool.len()),
            )?;
            pool.push(slot);
        }
        Ok(())
    }

    /// Clear the light buffer and bind the shared state. Returns `false`
    /// when no targets are bound yet.
    pub fn begin<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        targets: &FrameTargets,
        camera_bind_group: BindGroupHandle,
    ) -> bool {
        let Some(gbuffer_bind_group) = self.gbuffer_bind_group else {
            return false;
        };

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(Self::LABEL.into()),
            color_attachments: vec![ColorAttachment {
                view: targets.light.view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.set_viewport(
            0.0,
            0.0,
            targets.width() as f32,
            targets.height() as f32,
            0.0,
            1.0,
        );
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, camera_bind_group);
        backend.set_bind_group(1, gbuffer_bind_group);
        true
    }

    /// Upload one light into its pooled slot and draw it fullscreen.
    pub fn draw_light<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        kind: LightKind,
        index: usize,
        data: &GpuLightData,
    ) {
        let Some(slot) = self.lights[kind as usize].get(index) else {
            log::warn!("No uniform slot for {:?} light {}", kind, index);
            return;
        };
        backend.write_buffer(slot.buffer, 0, bytemuck::bytes_of(data));
        backend.set_bind_group(2, slot.bind_group);
        backend.draw(0..3, 0..1);
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for pool in &mut self.lights {
            for slot in pool.drain(..) {
                slot.destroy(backend);
            }
        }
        if let Some(bind_group) = self.gbuffer_bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
    }
}

/// Deferred lighting shader
pub const LIGHTING_SHADER: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    position: vec4<f32>,
}

struct LightData {
    // xyz = position, w = range
    position_range: vec4<f32>,
    // xyz = color, w = intensity
    color_intensity: vec4<f32>,
    // xyz = direction, w = kind (0=directional, 1=point, 2=spot)
    direction_kind: vec4<f32>,
    // xyz = constant/linear/quadratic, w = cos(cone angle)
    attenuation_cone: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var gbuffer_albedo: texture_2d<f32>;
@group(1) @binding(1) var gbuffer_normal: texture_2d<f32>;
@group(1) @binding(2) var gbuffer_depth: texture_depth_2d;
@group(2) @binding(0) var<uniform> light: LightData;

// Fullscreen triangle
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);
    return output;
}

fn reconstruct_world_position(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let world_pos = camera.inv_view_proj * ndc;
    return world_pos.xyz / world_pos.w;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let pixel_coord = vec2<i32>(input.position.xy);
    let depth = textureLoad(gbuffer_depth, pixel_coord, 0);

    // Background
    if depth >= 1.0 {
        return vec4<f32>(0.0);
    }

    let albedo = textureLoad(gbuffer_albedo, pixel_coord, 0).rgb;
    let normal = normalize(textureLoad(gbuffer_normal, pixel_coord, 0).xyz * 2.0 - 1.0);
    let world_pos = reconstruct_world_position(input.uv, depth);

    let kind = u32(light.direction_kind.w);
    var light_dir: vec3<f32>;
    var attenuation = 1.0;

    if kind == 0u {
        light_dir = -normalize(light.direction_kind.xyz);
    } else {
        let to_light = light.position_range.xyz - world_pos;
        let distance = length(to_light);
        if distance > light.position_range.w {
            return vec4<f32>(0.0);
        }
        light_dir = to_light / max(distance, 1e-4);

        let att = light.attenuation_cone.xyz;
        attenuation = 1.0 / max(att.x + att.y * distance + att.z * distance * distance, 1e-4);

        if kind == 2u {
            let cos_angle = dot(-light_dir, normalize(light.direction_kind.xyz));
            if cos_angle < light.attenuation_cone.w {
                return vec4<f32>(0.0);
            }
        }
    }

    let ndotl = max(dot(normal, light_dir), 0.0);
    let radiance = light.color_intensity.rgb * light.color_intensity.w * attenuation;
    return vec4<f32>(albedo * radiance * ndotl, 1.0);
}
"#;
