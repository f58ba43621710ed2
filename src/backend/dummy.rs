//! Dummy GPU backend for testing and headless runs.
//!
//! This backend doesn't perform GPU work. It hands out valid handles and
//! records every command in submission order so tests can inspect what a
//! frame would have drawn. Individual operations can be made to fail to
//! exercise the renderer's error paths.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command recorded by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginFrame,
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        data: Vec<u8>,
    },
    WriteTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    BeginRenderPass(RenderPassDescriptor),
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
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    EndRenderPass,
    EndFrame,
}

impl RecordedCommand {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
        )
    }
}

/// Operations that can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FailureInjection {
    pub command_queue: bool,
    pub sampler: bool,
    pub texture: bool,
    pub drawable: bool,
    /// Pipelines whose label contains one of these strings fail to build.
    pub pipeline_labels: Vec<String>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    width: u32,
    height: u32,
    format: TextureFormat,
    next_id: u64,
    in_frame: bool,
    in_pass: bool,
    failures: FailureInjection,

    buffers: HashMap<u64, u64>,
    textures: HashMap<u64, TextureDescriptor>,
    texture_views: HashSet<u64>,
    bind_groups: HashSet<u64>,
    pipelines: HashMap<u64, RenderPipelineDescriptor>,
    commands: Vec<RecordedCommand>,
    frames_presented: u32,
}

impl DummyBackend {
    /// Create a new dummy backend with a surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format: TextureFormat::Bgra8Unorm,
            next_id: 1,
            in_frame: false,
            in_pass: false,
            failures: FailureInjection::default(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashSet::new(),
            bind_groups: HashSet::new(),
            pipelines: HashMap::new(),
            commands: Vec::new(),
            frames_presented: 0,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    pub fn with_failures(mut self, failures: FailureInjection) -> Self {
        self.failures = failures;
        self
    }

    pub fn failures_mut(&mut self) -> &mut FailureInjection {
        &mut self.failures
    }

    /// Every command recorded since creation or the last [`Self::clear_commands`].
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Draw commands in recording order.
    pub fn draw_calls(&self) -> Vec<&RecordedCommand> {
        self.commands.iter().filter(|c| c.is_draw()).collect()
    }

    pub fn pipeline_descriptor(&self, pipeline: RenderPipelineHandle) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.get(&pipeline.0)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn frames_presented(&self) -> u32 {
        self.frames_presented
    }

    /// The most recent data written to `buffer` at offset 0, if any.
    pub fn last_write(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.commands.iter().rev().find_map(|c| match c {
            RecordedCommand::WriteBuffer {
                buffer: b,
                offset: 0,
                data,
            } if *b == buffer => Some(data.as_slice()),
            _ => None,
        })
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: RecordedCommand) {
        log::trace!("DummyBackend: {:?}", command);
        self.commands.push(command);
    }

    fn record_in_pass(&mut self, command: RecordedCommand) {
        if self.in_pass {
            self.record(command);
        } else {
            log::warn!("DummyBackend: {:?} recorded outside a render pass", command);
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl GraphicsBackend for DummyBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn create_command_queue(&mut self) -> BackendResult<CommandQueueHandle> {
        if self.failures.command_queue {
            return Err(BackendError::CommandQueueCreationFailed(
                "injected failure".into(),
            ));
        }
        Ok(CommandQueueHandle(self.allocate()))
    }

    fn begin_frame(&mut self, _queue: CommandQueueHandle) -> BackendResult<FrameContext> {
        if self.failures.drawable {
            return Err(BackendError::NoDrawable);
        }
        self.in_frame = true;
        self.record(RecordedCommand::BeginFrame);
        let view = self.allocate();
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if !self.in_frame {
            return Err(BackendError::NoDrawable);
        }
        self.in_frame = false;
        self.frames_presented += 1;
        self.record(RecordedCommand::EndFrame);
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = self.allocate();
        self.buffers.insert(id, desc.size);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let handle = self.create_buffer(&BufferDescriptor {
            size: data.len() as u64,
            ..desc.clone()
        })?;
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(&buffer.0) {
            Some(size) if offset + data.len() as u64 <= *size => {
                self.record(RecordedCommand::WriteBuffer {
                    buffer,
                    offset,
                    data: data.to_vec(),
                });
            }
            Some(size) => log::error!(
                "DummyBackend: write of {} bytes at {} overflows buffer of {} bytes",
                data.len(),
                offset,
                size
            ),
            None => log::error!("DummyBackend: write to unknown buffer {:?}", buffer),
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if self.failures.texture && !desc.format.is_depth() {
            return Err(BackendError::TextureCreationFailed("injected failure".into()));
        }
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{})",
            desc.label,
            desc.width,
            desc.height
        );
        let id = self.allocate();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let id = self.allocate();
        self.texture_views.insert(id);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            log::error!(
                "DummyBackend: texture write of {} bytes, expected {}",
                data.len(),
                expected
            );
            return;
        }
        self.record(RecordedCommand::WriteTexture {
            texture,
            width,
            height,
        });
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        if self.failures.sampler {
            return Err(BackendError::SamplerCreationFailed("injected failure".into()));
        }
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.allocate()))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        log::trace!("DummyBackend: creating layout with {} entries", entries.len());
        Ok(BindGroupLayoutHandle(self.allocate()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        for (_, entry) in entries {
            if let BindGroupEntry::Buffer { buffer, .. } = entry {
                if !self.buffers.contains_key(&buffer.0) {
                    return Err(BackendError::PipelineCreationFailed(
                        "Buffer not found".into(),
                    ));
                }
            }
        }
        let id = self.allocate();
        self.bind_groups.insert(id);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let label = desc.label.clone().unwrap_or_default();
        if self
            .failures
            .pipeline_labels
            .iter()
            .any(|l| label.contains(l.as_str()))
        {
            return Err(BackendError::PipelineCreationFailed(label));
        }
        let id = self.allocate();
        self.pipelines.insert(id, desc.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.in_pass = true;
        self.record(RecordedCommand::BeginRenderPass(desc.clone()));
    }

    fn end_render_pass(&mut self) {
        if self.in_pass {
            self.in_pass = false;
            self.record(RecordedCommand::EndRenderPass);
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record_in_pass(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record_in_pass(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.record_in_pass(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.record_in_pass(RecordedCommand::SetIndexBuffer { buffer, format });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record_in_pass(RecordedCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record_in_pass(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_none() {
            log::error!("DummyBackend: buffer {:?} destroyed twice", buffer);
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            log::error!("DummyBackend: texture {:?} destroyed twice", texture);
        }
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_buffer(backend: &mut DummyBackend, size: u64) -> BufferHandle {
        backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap()
    }

    #[test]
    fn records_commands_in_order() {
        let mut backend = DummyBackend::new(64, 64);
        let queue = backend.create_command_queue().unwrap();
        let frame = backend.begin_frame(queue).unwrap();
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("pass".into()),
            color_attachments: vec![ColorAttachment {
                view: frame.swapchain_view,
                load_op: LoadOp::Clear([0.0; 4]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.draw(0..4, 0..1);
        backend.end_render_pass();
        backend.end_frame().unwrap();

        let commands = backend.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], RecordedCommand::BeginFrame);
        assert!(matches!(commands[1], RecordedCommand::BeginRenderPass(_)));
        assert!(commands[2].is_draw());
        assert_eq!(commands[3], RecordedCommand::EndRenderPass);
        assert_eq!(commands[4], RecordedCommand::EndFrame);
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn draws_outside_a_pass_are_dropped() {
        let mut backend = DummyBackend::default();
        backend.draw(0..3, 0..1);
        assert!(backend.draw_calls().is_empty());
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut backend = DummyBackend::default().with_failures(FailureInjection {
            command_queue: true,
            drawable: true,
            ..Default::default()
        });
        assert!(matches!(
            backend.create_command_queue(),
            Err(BackendError::CommandQueueCreationFailed(_))
        ));
        assert_eq!(
            backend.begin_frame(CommandQueueHandle(0)).unwrap_err(),
            BackendError::NoDrawable
        );
    }

    #[test]
    fn overflowing_writes_are_rejected() {
        let mut backend = DummyBackend::default();
        let buffer = uniform_buffer(&mut backend, 16);
        backend.write_buffer(buffer, 0, &[0u8; 32]);
        assert!(backend.last_write(buffer).is_none());
        backend.write_buffer(buffer, 0, &[7u8; 16]);
        assert_eq!(backend.last_write(buffer), Some(&[7u8; 16][..]));
    }
}
