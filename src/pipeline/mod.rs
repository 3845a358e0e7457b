//! Deferred rendering pipeline
//!
//! Three passes, always recorded in this order:
//! 1. Geometry pass - meshes into the G-buffer (albedo, normal, depth)
//! 2. Light pass - one additive fullscreen draw per light into the light buffer
//! 3. Composite pass - ambient term plus light buffer into the output texture

pub mod composite_pass;
pub mod gbuffer_pass;
pub mod lighting_pass;
mod targets;

pub use composite_pass::{CompositePass, CompositeUniform};
pub use gbuffer_pass::{GeometryPass, ObjectUniform};
pub use lighting_pass::LightPass;
pub use targets::{FrameTargets, RenderTarget};

use crate::backend::*;

/// A uniform buffer and the bind group exposing it at binding 0.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniformSlot {
    pub buffer: BufferHandle,
    pub bind_group: BindGroupHandle,
}

impl UniformSlot {
    pub fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        layout: BindGroupLayoutHandle,
        size: u64,
        label: String,
    ) -> BackendResult<Self> {
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let bind_group = match backend.create_bind_group(layout, &[(0, uniform_entry(buffer))]) {
            Ok(bind_group) => bind_group,
            Err(e) => {
                backend.destroy_buffer(buffer);
                return Err(e);
            }
        };
        Ok(Self { buffer, bind_group })
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_bind_group(self.bind_group);
        backend.destroy_buffer(self.buffer);
    }
}

pub(crate) fn uniform_entry(buffer: BufferHandle) -> BindGroupEntry {
    BindGroupEntry::Buffer {
        buffer,
        offset: 0,
        size: None,
    }
}

pub(crate) fn uniform_layout(binding: u32, visibility: ShaderStageFlags) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::UniformBuffer,
    }
}

/// Unfiltered texture read with `textureLoad`
pub(crate) fn load_texture_layout(binding: u32, format: TextureFormat) -> BindGroupLayoutEntry {
    let sample_type = if format.is_depth() {
        TextureSampleType::Depth
    } else {
        TextureSampleType::Float { filterable: false }
    };
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStageFlags::FRAGMENT,
        ty: BindingType::Texture { sample_type },
    }
}

/// Single colour target without blending
pub(crate) fn opaque_target(format: TextureFormat) -> ColorTargetState {
    ColorTargetState {
        format,
        blend: None,
        write_mask: ColorWrites::ALL,
    }
}
