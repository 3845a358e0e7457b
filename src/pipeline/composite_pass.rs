//! Composite pass: ambient term plus accumulated light into the output.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use super::targets::{FrameTargets, ALBEDO_FORMAT};
use super::{load_texture_layout, opaque_target, uniform_entry, uniform_layout};
use crate::backend::*;
use crate::error::RenderResult;

/// rgb = ambient colour * intensity
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeUniform {
    pub ambient: Vec4,
}

#[derive(Debug)]
pub struct CompositePass {
    layout: BindGroupLayoutHandle,
    pipeline: RenderPipelineHandle,
    uniform_buffer: BufferHandle,
    bind_group: Option<BindGroupHandle>,
}

impl CompositePass {
    pub const LABEL: &'static str = "Composite Pass";

    pub fn new<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        light_format: TextureFormat,
        output_format: TextureFormat,
    ) -> RenderResult<Self> {
        let layout = backend.create_bind_group_layout(&[
            load_texture_layout(0, ALBEDO_FORMAT),
            load_texture_layout(1, light_format),
            uniform_layout(2, ShaderStageFlags::FRAGMENT),
        ])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Composite Pipeline".into()),
            shader: COMPOSITE_SHADER.to_string(),
            has_fragment: true,
            vertex_layouts: Vec::new(),
            bind_group_layouts: vec![layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![opaque_target(output_format)],
        })?;

        let uniform_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Composite Uniform".into()),
            size: std::mem::size_of::<CompositeUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        Ok(Self {
            layout,
            pipeline,
            uniform_buffer,
            bind_group: None,
        })
    }

    /// Point the pass at freshly created targets.
    pub fn bind_targets<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        targets: &FrameTargets,
    ) -> BackendResult<()> {
        let bind_group = backend.create_bind_group(
            self.layout,
            &[
                (0, BindGroupEntry::Texture(targets.albedo.view)),
                (1, BindGroupEntry::Texture(targets.light.view)),
                (2, uniform_entry(self.uniform_buffer)),
            ],
        )?;
        if let Some(old) = self.bind_group.replace(bind_group) {
            backend.destroy_bind_group(old);
        }
        Ok(())
    }

    pub fn unbind_targets<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(old) = self.bind_group.take() {
            backend.destroy_bind_group(old);
        }
    }

    /// Record the composite draw. Returns `false` when no targets are bound.
    pub fn record<B: GraphicsBackend + ?Sized>(
        &self,
        backend: &mut B,
        targets: &FrameTargets,
        uniform: &CompositeUniform,
    ) -> bool {
        let Some(bind_group) = self.bind_group else {
            return false;
        };

        backend.write_buffer(self.uniform_buffer, 0, bytemuck::bytes_of(uniform));

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(Self::LABEL.into()),
            color_attachments: vec![ColorAttachment {
                view: targets.output.view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
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
        backend.set_bind_group(0, bind_group);
        backend.draw(0..3, 0..1);
        backend.end_render_pass();
        true
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(bind_group) = self.bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
        backend.destroy_buffer(self.uniform_buffer);
    }
}

/// Composite shader
pub const COMPOSITE_SHADER: &str = r#"
struct CompositeUniforms {
    ambient: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
}

@group(0) @binding(0) var albedo_texture: texture_2d<f32>;
@group(0) @binding(1) var light_texture: texture_2d<f32>;
@group(0) @binding(2) var<uniform> composite: CompositeUniforms;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let pixel_coord = vec2<i32>(input.position.xy);
    let albedo = textureLoad(albedo_texture, pixel_coord, 0);
    let light = textureLoad(light_texture, pixel_coord, 0);
    let color = composite.ambient.rgb * albedo.rgb + light.rgb;
    return vec4<f32>(color, 1.0);
}
"#;
