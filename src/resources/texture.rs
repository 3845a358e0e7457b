//! Texture data and GPU upload

use crate::backend::*;

/// CPU-side RGBA8 pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Wrap tightly packed RGBA8 pixels.
    pub fn from_rgba8(name: &str, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: name.to_string(),
        }
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self::from_rgba8(name, 1, 1, color.to_vec())
    }

    /// Create a default white texture
    pub fn white() -> Self {
        Self::solid_color([255, 255, 255, 255], "white")
    }

    /// Create a checkerboard texture with 8x8 pixel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self::from_rgba8("checkerboard", size, size, data)
    }

    /// Byte length a tightly packed upload of this size and format needs.
    pub fn expected_len(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

/// GPU texture with its default view
#[derive(Debug, Clone, PartialEq)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub name: String,
    destroyed: bool,
}

impl GpuTexture {
    /// Create and upload texture to GPU
    pub fn create<B: GraphicsBackend + ?Sized>(
        backend: &mut B,
        data: &TextureData,
    ) -> BackendResult<Self> {
        if data.data.len() as u64 != data.expected_len() {
            return Err(BackendError::TextureCreationFailed(format!(
                "texture '{}' ({}x{}) expects {} bytes, got {}",
                data.name,
                data.width,
                data.height,
                data.expected_len(),
                data.data.len()
            )));
        }

        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let view = match backend.create_texture_view(handle) {
            Ok(view) => view,
            Err(e) => {
                backend.destroy_texture(handle);
                return Err(e);
            }
        };
        backend.write_texture(handle, &data.data, data.width, data.height);

        log::debug!(
            "Uploaded texture '{}' ({}x{})",
            data.name,
            data.width,
            data.height
        );

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
            name: data.name.clone(),
            destroyed: false,
        })
    }

    /// Release the view and texture. Later calls do nothing.
    pub fn destroy<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.destroyed {
            return;
        }
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn checkerboard_cells() {
        let black = [0, 0, 0, 255];
        let white = [255; 4];
        let tex = TextureData::checkerboard(16, black, white);
        assert_eq!(tex.data.len(), 16 * 16 * 4);
        let pixel = |x: usize, y: usize| &tex.data[(y * 16 + x) * 4..(y * 16 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), &black);
        assert_eq!(pixel(8, 0), &white);
        assert_eq!(pixel(8, 8), &black);
    }

    #[test]
    fn create_and_destroy_twice() {
        let mut backend = DummyBackend::new();
        let mut tex = GpuTexture::create(&mut backend, &TextureData::white()).unwrap();
        assert_eq!(backend.live_textures(), 1);
        assert_eq!(backend.live_texture_views(), 1);

        tex.destroy(&mut backend);
        tex.destroy(&mut backend);

        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_texture_views(), 0);
    }

    #[test]
    fn zero_sized_texture_fails() {
        let mut backend = DummyBackend::new();
        let data = TextureData::from_rgba8("empty", 0, 0, Vec::new());
        assert!(GpuTexture::create(&mut backend, &data).is_err());
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn short_pixel_data_fails_before_allocation() {
        let mut backend = DummyBackend::new();
        let data = TextureData::from_rgba8("short", 4, 4, vec![0u8; 3]);
        assert_eq!(data.expected_len(), 64);

        let result = GpuTexture::create(&mut backend, &data);
        assert!(matches!(result, Err(BackendError::TextureCreationFailed(_))));
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_texture_views(), 0);
    }

    #[test]
    fn uploaded_pixels_reach_the_texture() {
        let mut backend = DummyBackend::new();
        let data = TextureData::solid_color([10, 20, 30, 255], "teal");
        let tex = GpuTexture::create(&mut backend, &data).unwrap();
        assert_eq!(backend.texture_data(tex.handle), Some(&[10u8, 20, 30, 255][..]));
    }
}
