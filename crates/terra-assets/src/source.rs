//! Where texture bytes come from.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use rustc_hash::FxHashMap;
use terra_render::TextureImage;

use crate::error::AssetError;

/// Asynchronous provider of decoded textures keyed by path.
pub trait TextureSource {
    fn load(&self, path: &str) -> impl Future<Output = Result<TextureImage, AssetError>>;
}

/// Decode PNG, JPEG or WebP bytes into RGBA8.
pub fn decode_texture(path: &str, bytes: &[u8]) -> Result<TextureImage, AssetError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|source| AssetError::Decode {
            path: path.to_string(),
            source,
        })?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(TextureImage::new(width, height, decoded.into_raw())?)
}

/// Reads textures from the filesystem relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileTextureSource {
    base: PathBuf,
}

impl FileTextureSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Absolute paths are used as-is.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }
}

impl TextureSource for FileTextureSource {
    async fn load(&self, path: &str) -> Result<TextureImage, AssetError> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full).await.map_err(|source| AssetError::Io {
            path: full.display().to_string(),
            source,
        })?;
        tracing::debug!("Read {} ({} bytes)", full.display(), bytes.len());
        decode_texture(path, &bytes)
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    Ready(TextureImage),
    Delayed(TextureImage, Duration),
    Failing,
    Pending,
}

/// In-memory textures with scripted failures and stalls, for headless runs
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextureSource {
    entries: FxHashMap<String, MemoryEntry>,
    fallback: Option<TextureImage>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `image` for every path without an explicit entry.
    pub fn with_fallback(mut self, image: TextureImage) -> Self {
        self.fallback = Some(image);
        self
    }

    pub fn with_image(mut self, path: impl Into<String>, image: TextureImage) -> Self {
        self.entries.insert(path.into(), MemoryEntry::Ready(image));
        self
    }

    /// Resolve `path` after `delay`.
    pub fn with_delay(mut self, path: impl Into<String>, image: TextureImage, delay: Duration) -> Self {
        self.entries.insert(path.into(), MemoryEntry::Delayed(image, delay));
        self
    }

    pub fn with_failure(mut self, path: impl Into<String>) -> Self {
        self.entries.insert(path.into(), MemoryEntry::Failing);
        self
    }

    /// Never resolve `path`.
    pub fn with_pending(mut self, path: impl Into<String>) -> Self {
        self.entries.insert(path.into(), MemoryEntry::Pending);
        self
    }
}

impl TextureSource for MemoryTextureSource {
    async fn load(&self, path: &str) -> Result<TextureImage, AssetError> {
        match self.entries.get(path) {
            Some(MemoryEntry::Ready(image)) => Ok(image.clone()),
            Some(MemoryEntry::Delayed(image, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(image.clone())
            }
            Some(MemoryEntry::Failing) => Err(AssetError::Missing(path.to_string())),
            Some(MemoryEntry::Pending) => std::future::pending().await,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AssetError::Missing(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let tex = decode_texture("a.png", &png_bytes()).unwrap();
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(&tex.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_texture("bad.png", b"not an image").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_file_source_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clouds.png"), png_bytes()).unwrap();
        let source = FileTextureSource::new(dir.path());

        let tex = source.load("clouds.png").await.unwrap();
        assert_eq!(tex.width, 3);

        let missing = source.load("nope.png").await.unwrap_err();
        assert!(matches!(missing, AssetError::Io { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_source_delay_and_fallback() {
        let source = MemoryTextureSource::new()
            .with_delay("slow", TextureImage::solid([1; 4]), Duration::from_secs(2))
            .with_failure("broken")
            .with_fallback(TextureImage::solid([9; 4]));

        let start = tokio::time::Instant::now();
        assert_eq!(source.load("slow").await.unwrap().rgba, vec![1; 4]);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(source.load("broken").await.is_err());
        assert_eq!(source.load("anything").await.unwrap().rgba, vec![9; 4]);
    }
}
