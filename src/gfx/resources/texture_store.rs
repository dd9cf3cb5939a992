//! Texture registry addressed by [`TextureId`]
//!
//! Meshes and shader programs refer to textures by id only. The store keeps
//! the decoded image for every CPU-side texture and, once a GPU context is
//! attached, the uploaded [`TextureResource`]. Without a context the store
//! still hands out ids, so scene construction works headless.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AssetError;
use crate::gfx::shader::SamplerKind;
use crate::wgpu_utils::GpuContext;

use super::texture_resource::TextureResource;

/// Opaque handle to a texture in a [`TextureStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u32);

impl TextureId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// RGBA8 pixel data kept on the CPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexelImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TexelImage {
    /// Wraps tightly packed RGBA8 rows
    ///
    /// Returns `None` when `pixels` does not hold exactly `width * height` texels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        (width > 0 && height > 0 && pixels.len() == expected).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A single texel of the given colour
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    /// The 1x1 opaque white fallback texture
    pub fn solid_white() -> Self {
        Self::solid([255, 255, 255, 255])
    }

    pub fn from_dynamic(image: image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Nearest-texel lookup with repeat wrapping, like the GPU sampler
    pub fn sample(&self, u: f32, v: f32) -> [u8; 4] {
        let wrap = |coord: f32, size: u32| {
            let t = if coord.is_finite() { coord.rem_euclid(1.0) } else { 0.0 };
            ((t * size as f32) as u32).min(size - 1)
        };
        self.texel(wrap(u, self.width), wrap(v, self.height))
    }
}

#[derive(Debug)]
struct TextureEntry {
    label: String,
    kind: SamplerKind,
    srgb: bool,
    image: Option<TexelImage>,
    resource: Option<TextureResource>,
}

/// Owns every texture the renderer samples from
#[derive(Debug, Default)]
pub struct TextureStore {
    context: Option<GpuContext>,
    entries: Vec<TextureEntry>,
    by_path: HashMap<PathBuf, TextureId>,
    fallbacks: HashMap<SamplerKind, TextureResource>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects the store to a device, uploading everything registered so far
    ///
    /// Also creates the per-kind fallbacks bound in place of missing
    /// textures: opaque white 2D, black cube and a far-plane depth map.
    pub fn attach_gpu(&mut self, context: GpuContext) {
        for entry in self.entries.iter_mut() {
            if entry.resource.is_none() {
                if let Some(image) = &entry.image {
                    entry.resource = Some(upload(&context, &entry.label, image, entry.srgb));
                }
            }
        }

        let white = TexelImage::solid_white();
        self.fallbacks.insert(
            SamplerKind::Color2d,
            upload(&context, "Fallback White", &white, false),
        );
        self.fallbacks.insert(
            SamplerKind::Cube,
            TextureResource::create_hdr_texture(
                &context.device,
                &context.queue,
                "Fallback Cube",
                1,
                6,
                &[vec![0u32; 6]],
            ),
        );
        self.fallbacks.insert(
            SamplerKind::Depth,
            TextureResource::create_depth_fallback(&context.device, &context.queue),
        );

        log::debug!("Texture store attached to GPU with {} textures", self.entries.len());
        self.context = Some(context);
    }

    pub fn context(&self) -> Option<&GpuContext> {
        self.context.as_ref()
    }

    /// Registers a CPU image; uploaded immediately if a GPU is attached
    pub fn insert_image(&mut self, label: &str, image: TexelImage, srgb: bool) -> TextureId {
        let resource = self
            .context
            .as_ref()
            .map(|context| upload(context, label, &image, srgb));

        self.push(TextureEntry {
            label: label.to_string(),
            kind: SamplerKind::Color2d,
            srgb,
            image: Some(image),
            resource,
        })
    }

    /// Registers a texture that only exists on the GPU (shadow map, IBL maps)
    pub fn insert_resource(&mut self, label: &str, kind: SamplerKind, resource: TextureResource) -> TextureId {
        self.push(TextureEntry {
            label: label.to_string(),
            kind,
            srgb: false,
            image: None,
            resource: Some(resource),
        })
    }

    /// Generates a fresh 1x1 opaque white texture
    pub fn generate_white(&mut self) -> TextureId {
        self.insert_image("White", TexelImage::solid_white(), true)
    }

    /// Loads and decodes an image file; repeated paths return the cached id
    pub fn load(&mut self, path: &Path, srgb: bool) -> Result<TextureId, AssetError> {
        if let Some(&id) = self.by_path.get(path) {
            return Ok(id);
        }

        let decoded = image::open(path).map_err(|source| AssetError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let image = TexelImage::from_dynamic(decoded);
        log::debug!(
            "Loaded texture '{}' ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        let id = self.insert_image(&path.to_string_lossy(), image, srgb);
        self.by_path.insert(path.to_path_buf(), id);
        Ok(id)
    }

    pub fn image(&self, id: TextureId) -> Option<&TexelImage> {
        self.entries.get(id.index()).and_then(|e| e.image.as_ref())
    }

    pub fn resource(&self, id: TextureId) -> Option<&TextureResource> {
        self.entries.get(id.index()).and_then(|e| e.resource.as_ref())
    }

    pub fn kind(&self, id: TextureId) -> Option<SamplerKind> {
        self.entries.get(id.index()).map(|e| e.kind)
    }

    pub fn label(&self, id: TextureId) -> Option<&str> {
        self.entries.get(id.index()).map(|e| e.label.as_str())
    }

    pub fn fallback(&self, kind: SamplerKind) -> Option<&TextureResource> {
        self.fallbacks.get(&kind)
    }

    /// Resource to bind for a sampler of `kind`: the texture itself when it
    /// exists and matches the kind, the fallback otherwise
    pub fn resolve(&self, id: Option<TextureId>, kind: SamplerKind) -> Option<&TextureResource> {
        id.and_then(|id| {
            self.entries
                .get(id.index())
                .filter(|e| e.kind == kind)
                .and_then(|e| e.resource.as_ref())
        })
        .or_else(|| self.fallback(kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: TextureEntry) -> TextureId {
        let id = TextureId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }
}

fn upload(context: &GpuContext, label: &str, image: &TexelImage, srgb: bool) -> TextureResource {
    TextureResource::create_from_rgba_data(
        &context.device,
        &context.queue,
        image.pixels(),
        image.width(),
        image.height(),
        label,
        srgb,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_texture_samples_white_everywhere() {
        let mut store = TextureStore::new();
        let id = store.generate_white();
        let image = store.image(id).unwrap();

        assert_eq!(image.width(), 1);
        assert_eq!(image.height(), 1);
        for (u, v) in [(0.0, 0.0), (0.5, 0.5), (1.0, 1.0), (-3.7, 12.25), (f32::NAN, 0.1)] {
            assert_eq!(image.sample(u, v), [255, 255, 255, 255]);
        }
    }

    #[test]
    fn test_generate_white_creates_distinct_textures() {
        let mut store = TextureStore::new();
        let a = store.generate_white();
        let b = store.generate_white();

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.resource(a).is_none());
    }

    #[test]
    fn test_sample_wraps_like_repeat_addressing() {
        let pixels = vec![
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
        ];
        let image = TexelImage::new(2, 1, pixels).unwrap();

        assert_eq!(image.sample(0.25, 0.0), [255, 0, 0, 255]);
        assert_eq!(image.sample(0.75, 0.0), [0, 255, 0, 255]);
        assert_eq!(image.sample(1.25, 0.0), [255, 0, 0, 255]);
        assert_eq!(image.sample(-0.25, 0.0), [0, 255, 0, 255]);
    }

    #[test]
    fn test_rejects_mismatched_pixel_count() {
        assert!(TexelImage::new(2, 2, vec![0; 4]).is_none());
        assert!(TexelImage::new(0, 1, Vec::new()).is_none());
    }

    #[test]
    fn test_missing_file_is_an_asset_error() {
        let mut store = TextureStore::new();
        let result = store.load(Path::new("does/not/exist.png"), true);
        assert!(matches!(result, Err(AssetError::Image { .. })));
    }
}
