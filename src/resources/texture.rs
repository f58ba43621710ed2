//! Camera video frame to GPU texture conversion

use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::provider::{PixelFormat, VideoFrame};

impl PixelFormat {
    pub fn texture_format(&self) -> TextureFormat {
        match self {
            PixelFormat::Bgra8 => TextureFormat::Bgra8Unorm,
            PixelFormat::Rgba8 => TextureFormat::Rgba8Unorm,
        }
    }
}

/// Why a frame could not be turned into a texture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameConversionError {
    #[error("Video frame has zero size")]
    EmptyFrame,
    #[error("Video frame has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

struct CachedTexture {
    texture: TextureHandle,
    bind_group: BindGroupHandle,
    width: u32,
    height: u32,
    format: TextureFormat,
}

/// Reuses one texture for consecutive frames of the same size and format.
///
/// The bind group it hands out matches [`VideoTextureCache::layout`]:
/// binding 0 is the frame texture, binding 1 a linear clamping sampler.
pub struct VideoTextureCache {
    sampler: SamplerHandle,
    layout: BindGroupLayoutHandle,
    current: Option<CachedTexture>,
    textures_created: u32,
}

impl VideoTextureCache {
    pub fn new<B: GraphicsBackend + ?Sized>(backend: &mut B) -> BackendResult<Self> {
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Video Frame Sampler".into()),
            ..Default::default()
        })?;
        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture { filterable: true },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler,
            },
        ])?;

        Ok(Self {
            sampler,
            layout,
            current: None,
            textures_created: 0,
        })
    }

    pub fn layout(&self) -> BindGroupLayoutHandle {
        self.layout
    }

    /// Number of GPU textures created so far
    pub fn textures_created(&self) -> u32 {
        self.textures_created
    }

    /// Upload `frame` and return the bind group to sample it with.
    pub fn texture_for<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        frame: &VideoFrame,
    ) -> Result<BindGroupHandle, FrameConversionError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(FrameConversionError::EmptyFrame);
        }
        let bytes_per_pixel = frame.format.texture_format().bytes_per_pixel() as usize;
        let expected = frame.width as usize * frame.height as usize * bytes_per_pixel;
        if frame.data.len() != expected {
            return Err(FrameConversionError::SizeMismatch {
                expected,
                actual: frame.data.len(),
            });
        }

        let format = frame.format.texture_format();
        let reusable = self
            .current
            .as_ref()
            .is_some_and(|c| c.width == frame.width && c.height == frame.height && c.format == format);

        if !reusable {
            self.release(backend);
            self.current = Some(
                self.create(backend, frame.width, frame.height, format)
                    .map_err(FrameConversionError::Backend)?,
            );
        }

        let Some(cached) = self.current.as_ref() else {
            return Err(FrameConversionError::EmptyFrame);
        };
        backend.write_texture(cached.texture, &frame.data, frame.width, frame.height);
        Ok(cached.bind_group)
    }

    fn create<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> BackendResult<CachedTexture> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some("Video Frame".into()),
            width,
            height,
            format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        let view = backend.create_texture_view(texture)?;
        let bind_group = backend.create_bind_group(
            self.layout,
            &[
                (0, BindGroupEntry::Texture(view)),
                (1, BindGroupEntry::Sampler(self.sampler)),
            ],
        )?;
        self.textures_created += 1;
        log::debug!("Video texture cache: allocated {}x{} {:?}", width, height, format);

        Ok(CachedTexture {
            texture,
            bind_group,
            width,
            height,
            format,
        })
    }

    /// Drop the cached texture, if any.
    pub fn release<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(cached) = self.current.take() {
            backend.destroy_bind_group(cached.bind_group);
            backend.destroy_texture(cached.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, FailureInjection};

    fn frame(width: u32, height: u32) -> VideoFrame {
        VideoFrame {
            width,
            height,
            format: PixelFormat::Bgra8,
            data: vec![0x80; (width * height * 4) as usize],
        }
    }

    #[test]
    fn same_size_frames_share_a_texture() {
        let mut backend = DummyBackend::default();
        let mut cache = VideoTextureCache::new(&mut backend).unwrap();
        let first = cache.texture_for(&mut backend, &frame(8, 4)).unwrap();
        let second = cache.texture_for(&mut backend, &frame(8, 4)).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.textures_created(), 1);
        assert_eq!(backend.live_texture_count(), 1);
    }

    #[test]
    fn size_change_replaces_the_texture() {
        let mut backend = DummyBackend::default();
        let mut cache = VideoTextureCache::new(&mut backend).unwrap();
        cache.texture_for(&mut backend, &frame(8, 4)).unwrap();
        cache.texture_for(&mut backend, &frame(16, 4)).unwrap();
        assert_eq!(cache.textures_created(), 2);
        assert_eq!(backend.live_texture_count(), 1);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let mut backend = DummyBackend::default();
        let mut cache = VideoTextureCache::new(&mut backend).unwrap();
        assert_eq!(
            cache.texture_for(&mut backend, &frame(0, 4)),
            Err(FrameConversionError::EmptyFrame)
        );
        let mut short = frame(4, 4);
        short.data.truncate(10);
        assert_eq!(
            cache.texture_for(&mut backend, &short),
            Err(FrameConversionError::SizeMismatch {
                expected: 64,
                actual: 10
            })
        );
    }

    #[test]
    fn sampler_failure_fails_construction() {
        let mut backend = DummyBackend::default().with_failures(FailureInjection {
            sampler: true,
            ..Default::default()
        });
        assert!(VideoTextureCache::new(&mut backend).is_err());
    }
}
