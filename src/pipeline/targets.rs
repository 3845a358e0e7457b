//! Framebuffer-sized render targets

use crate::backend::*;
use crate::error::{RenderError, RenderResult};

pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// A texture usable both as attachment and as pass input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub format: TextureFormat,
}

impl RenderTarget {
    fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> BackendResult<Self> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
                | TextureUsage::COPY_SRC,
        })?;
        let view = match backend.create_texture_view(texture) {
            Ok(view) => view,
            Err(e) => {
                backend.destroy_texture(texture);
                return Err(e);
            }
        };
        Ok(Self {
            texture,
            view,
            format,
        })
    }

    fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.texture);
    }
}

/// G-buffer, light buffer and output texture, always the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTargets {
    width: u32,
    height: u32,
    pub albedo: RenderTarget,
    pub normal: RenderTarget,
    pub depth: RenderTarget,
    pub light: RenderTarget,
    pub output: RenderTarget,
}

impl FrameTargets {
    /// Create every target at `width` x `height`. On failure nothing is
    /// left allocated.
    pub fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        width: u32,
        height: u32,
        light_format: TextureFormat,
        output_format: TextureFormat,
    ) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFramebufferSize { width, height });
        }

        let specs = [
            ("GBuffer Albedo", ALBEDO_FORMAT),
            ("GBuffer Normal", NORMAL_FORMAT),
            ("GBuffer Depth", DEPTH_FORMAT),
            ("Light Buffer", light_format),
            ("Output Texture", output_format),
        ];

        let mut created = Vec::with_capacity(specs.len());
        for (label, format) in specs {
            match RenderTarget::create(backend, label, width, height, format) {
                Ok(target) => created.push(target),
                Err(e) => {
                    for target in created {
                        target.destroy(backend);
                    }
                    return Err(e.into());
                }
            }
        }

        log::debug!("Created frame targets at {}x{}", width, height);

        Ok(Self {
            width,
            height,
            albedo: created[0],
            normal: created[1],
            depth: created[2],
            light: created[3],
            output: created[4],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn destroy<B: GraphicsBackend + ?Sized>(self, backend: &mut B) {
        for target in [self.albedo, self.normal, self.depth, self.light, self.output] {
            target.destroy(backend);
        }
    }
}
