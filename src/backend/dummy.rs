//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out handles,
//! keeps the CPU-side contents of every live resource, and records each
//! command in submission order so callers can inspect what a frame did.

use std::collections::HashMap;
use std::ops::Range;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command recorded by [`DummyBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    EndFrame,
    BeginRenderPass {
        label: Option<String>,
        color_targets: Vec<TextureViewHandle>,
        depth_target: Option<TextureViewHandle>,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    SetViewport {
        width: f32,
        height: f32,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// CPU copy of a buffer created through the dummy backend.
#[derive(Debug, Clone)]
pub struct DummyBuffer {
    pub label: Option<String>,
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

/// Dummy GPU backend.
#[derive(Debug, Default)]
pub struct DummyBackend {
    next_id: u64,
    in_frame: bool,
    in_pass: bool,
    frames: u64,
    buffers_created: usize,
    texture_budget: Option<usize>,
    bind_group_budget: Option<usize>,

    buffers: HashMap<u64, DummyBuffer>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_data: HashMap<u64, Vec<u8>>,
    texture_views: HashMap<u64, TextureHandle>,
    samplers: HashMap<u64, SamplerDescriptor>,
    bind_group_layouts: HashMap<u64, Vec<BindGroupLayoutEntry>>,
    bind_groups: HashMap<u64, Vec<(u32, BindGroupEntry)>>,
    render_pipelines: HashMap<u64, RenderPipelineDescriptor>,

    commands: Vec<Command>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, command: Command) {
        if !self.in_pass {
            log::warn!("DummyBackend: {:?} recorded outside a render pass", command);
        }
        self.commands.push(command);
    }

    /// Let `n` more textures be created, then fail every later
    /// `create_texture` until [`clear_failures`](Self::clear_failures).
    pub fn fail_textures_after(&mut self, n: usize) {
        self.texture_budget = Some(n);
    }

    /// Same as [`fail_textures_after`](Self::fail_textures_after) for bind groups.
    pub fn fail_bind_groups_after(&mut self, n: usize) {
        self.bind_group_budget = Some(n);
    }

    pub fn clear_failures(&mut self) {
        self.texture_budget = None;
        self.bind_group_budget = None;
    }

    fn spend(budget: &mut Option<usize>) -> bool {
        match budget {
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
            None => true,
        }
    }

    /// Commands recorded since creation or the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Labels of the render passes recorded so far, in order.
    pub fn pass_labels(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::BeginRenderPass { label, .. } => {
                    Some(label.clone().unwrap_or_default())
                }
                _ => None,
            })
            .collect()
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Total number of buffers ever created, including destroyed ones.
    pub fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_texture_views(&self) -> usize {
        self.texture_views.len()
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<&DummyBuffer> {
        self.buffers.get(&buffer.0)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Pixels of the last accepted `write_texture`.
    pub fn texture_data(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.texture_data.get(&texture.0).map(Vec::as_slice)
    }

    pub fn bind_group_entries(&self, bind_group: BindGroupHandle) -> Option<&[(u32, BindGroupEntry)]> {
        self.bind_groups.get(&bind_group.0).map(Vec::as_slice)
    }

    pub fn pipeline(&self, pipeline: RenderPipelineHandle) -> Option<&RenderPipelineDescriptor> {
        self.render_pipelines.get(&pipeline.0)
    }
}

impl GraphicsBackend for DummyBackend {
    fn begin_frame(&mut self) -> BackendResult<()> {
        if self.in_frame {
            log::warn!("DummyBackend: begin_frame while a frame is already open");
        }
        self.in_frame = true;
        self.commands.push(Command::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if !self.in_frame {
            return Err(BackendError::NoActiveFrame);
        }
        self.in_frame = false;
        self.frames += 1;
        self.commands.push(Command::EndFrame);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        self.create_buffer_init(desc, &vec![0u8; desc.size as usize])
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            data.len()
        );
        let id = self.next_handle();
        self.buffers_created += 1;
        self.buffers.insert(
            id,
            DummyBuffer {
                label: desc.label.clone(),
                usage: desc.usage,
                data: data.to_vec(),
            },
        );
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(buf) = self.buffers.get_mut(&buffer.0) else {
            log::warn!("DummyBackend: write_buffer to unknown buffer {:?}", buffer);
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if buf.data.len() < end {
            buf.data.resize(end, 0);
        }
        buf.data[start..end].copy_from_slice(data);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "zero-sized texture {:?}",
                desc.label
            )));
        }
        if !Self::spend(&mut self.texture_budget) {
            return Err(BackendError::TextureCreationFailed(format!(
                "injected failure for {:?}",
                desc.label
            )));
        }
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );
        let id = self.next_handle();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let id = self.next_handle();
        self.texture_views.insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        let Some(desc) = self.textures.get(&texture.0) else {
            log::warn!("DummyBackend: write_texture to unknown texture {:?}", texture);
            return;
        };
        let expected = width as u64 * height as u64 * desc.format.bytes_per_pixel() as u64;
        if width != desc.width || height != desc.height || data.len() as u64 != expected {
            log::warn!(
                "DummyBackend: rejected write_texture {:?} ({}x{}, {} bytes, expected {})",
                texture,
                width,
                height,
                data.len(),
                expected
            );
            return;
        }
        self.texture_data.insert(texture.0, data.to_vec());
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let id = self.next_handle();
        self.samplers.insert(id, desc.clone());
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let id = self.next_handle();
        self.bind_group_layouts.insert(id, entries.to_vec());
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let expected = self
            .bind_group_layouts
            .get(&layout.0)
            .ok_or_else(|| BackendError::PipelineCreationFailed("Layout not found".into()))?
            .len();
        if expected != entries.len() {
            return Err(BackendError::PipelineCreationFailed(format!(
                "layout expects {} entries, got {}",
                expected,
                entries.len()
            )));
        }
        if !Self::spend(&mut self.bind_group_budget) {
            return Err(BackendError::PipelineCreationFailed(
                "injected bind group failure".into(),
            ));
        }
        let id = self.next_handle();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let id = self.next_handle();
        self.render_pipelines.insert(id, desc.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        if !self.in_frame {
            log::warn!("DummyBackend: render pass {:?} begun outside a frame", desc.label);
        }
        self.in_pass = true;
        self.commands.push(Command::BeginRenderPass {
            label: desc.label.clone(),
            color_targets: desc.color_attachments.iter().map(|a| a.view).collect(),
            depth_target: desc.depth_stencil_attachment.as_ref().map(|a| a.view),
        });
    }

    fn end_render_pass(&mut self) {
        self.record(Command::EndRenderPass);
        self.in_pass = false;
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(Command::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(Command::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.record(Command::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.record(Command::SetIndexBuffer { buffer, format });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.record(Command::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(Command::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record(Command::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_none() {
            log::warn!("DummyBackend: destroying unknown buffer {:?}", buffer);
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            log::warn!("DummyBackend: destroying unknown texture {:?}", texture);
        }
        self.texture_data.remove(&texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.texture_views.remove(&view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_desc(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: Some("test".into()),
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }
    }

    #[test]
    fn handles_are_unique() {
        let mut backend = DummyBackend::new();
        let a = backend.create_buffer(&uniform_desc(16)).unwrap();
        let b = backend.create_buffer(&uniform_desc(16)).unwrap();
        assert_ne!(a, b);
        assert_eq!(backend.live_buffers(), 2);
        assert_eq!(backend.buffers_created(), 2);
    }

    #[test]
    fn write_buffer_updates_contents() {
        let mut backend = DummyBackend::new();
        let buf = backend.create_buffer(&uniform_desc(8)).unwrap();
        backend.write_buffer(buf, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer(buf).unwrap().data, vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn destroy_releases_resources() {
        let mut backend = DummyBackend::new();
        let buf = backend.create_buffer(&uniform_desc(8)).unwrap();
        backend.destroy_buffer(buf);
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.buffers_created(), 1);
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let mut backend = DummyBackend::new();
        let result = backend.create_texture(&TextureDescriptor {
            width: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(BackendError::TextureCreationFailed(_))));
    }

    #[test]
    fn mismatched_texture_write_is_rejected() {
        let mut backend = DummyBackend::new();
        let texture = backend
            .create_texture(&TextureDescriptor {
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8Unorm,
                ..Default::default()
            })
            .unwrap();

        backend.write_texture(texture, &[0u8; 3], 2, 2);
        assert_eq!(backend.texture_data(texture), None);

        backend.write_texture(texture, &[7u8; 16], 2, 2);
        assert_eq!(backend.texture_data(texture), Some(&[7u8; 16][..]));
    }

    #[test]
    fn injected_texture_failure_after_budget() {
        let mut backend = DummyBackend::new();
        backend.fail_textures_after(1);
        assert!(backend.create_texture(&TextureDescriptor::default()).is_ok());
        assert!(matches!(
            backend.create_texture(&TextureDescriptor::default()),
            Err(BackendError::TextureCreationFailed(_))
        ));

        backend.clear_failures();
        assert!(backend.create_texture(&TextureDescriptor::default()).is_ok());
        assert_eq!(backend.live_textures(), 2);
    }

    #[test]
    fn end_frame_without_begin_fails() {
        let mut backend = DummyBackend::new();
        assert!(matches!(backend.end_frame(), Err(BackendError::NoActiveFrame)));

        backend.begin_frame().unwrap();
        backend.end_frame().unwrap();
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn records_pass_commands_in_order() {
        let mut backend = DummyBackend::new();
        let texture = backend.create_texture(&TextureDescriptor::default()).unwrap();
        let view = backend.create_texture_view(texture).unwrap();

        backend.begin_frame().unwrap();
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Pass".into()),
            color_attachments: vec![ColorAttachment {
                view,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.draw(0..3, 0..1);
        backend.end_render_pass();
        backend.end_frame().unwrap();

        assert_eq!(
            backend.commands(),
            &[
                Command::BeginFrame,
                Command::BeginRenderPass {
                    label: Some("Pass".into()),
                    color_targets: vec![view],
                    depth_target: None,
                },
                Command::Draw {
                    vertices: 0..3,
                    instances: 0..1,
                },
                Command::EndRenderPass,
                Command::EndFrame,
            ]
        );
        assert_eq!(backend.pass_labels(), vec!["Pass".to_string()]);
    }
}
