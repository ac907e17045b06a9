/// Asynchronous texture loading
///
/// Each request decodes one image on a background thread and hands the
/// pixels back through a one-shot channel. The frame loop polls once per
/// tick; until a load completes the renderer keeps showing the placeholder
/// pixel. A failed load is reported and never replaces the placeholder.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Handle of a texture slot shared by the material and the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// RGBA8 image ready for upload
#[derive(Debug, Clone)]
pub struct LoadedTexture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

struct PendingLoad {
    id: TextureId,
    path: PathBuf,
    receiver: Receiver<anyhow::Result<LoadedTexture>>,
}

pub struct TextureLoader {
    next_id: u32,
    pending: Vec<PendingLoad>,
}

impl TextureLoader {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Reserve a slot without loading anything into it
    pub fn reserve(&mut self) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Start decoding `path` in the background
    pub fn request(&mut self, path: impl AsRef<Path>) -> TextureId {
        let id = self.reserve();
        let path = path.as_ref().to_path_buf();
        let (sender, receiver) = mpsc::channel();

        let thread_path = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("texture-{}", id.0))
            .spawn(move || {
                // The receiver may already be gone; nothing to do then
                let _ = sender.send(decode(id, &thread_path));
            });

        match spawned {
            Ok(_) => {
                tracing::debug!("Loading texture {:?} from {}", id, path.display());
                self.pending.push(PendingLoad { id, path, receiver });
            }
            Err(e) => tracing::warn!("Could not start texture load for {}: {}", path.display(), e),
        }

        id
    }

    /// Number of loads that have not completed yet
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Collect loads that finished since the last poll
    pub fn poll(&mut self) -> Vec<LoadedTexture> {
        let mut completed = Vec::new();

        self.pending.retain(|load| match load.receiver.try_recv() {
            Ok(Ok(texture)) => {
                tracing::info!("Texture {} loaded ({}x{})", load.path.display(), texture.width, texture.height);
                completed.push(texture);
                false
            }
            Ok(Err(e)) => {
                tracing::warn!("Texture {} failed to load, keeping placeholder: {:#}", load.path.display(), e);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                tracing::warn!("Texture loader for {:?} exited without a result", load.id);
                false
            }
        });

        completed
    }
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(id: TextureId, path: &Path) -> anyhow::Result<LoadedTexture> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(LoadedTexture {
        id,
        width,
        height,
        pixels: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn poll_until_settled(loader: &mut TextureLoader) -> Vec<LoadedTexture> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut loaded = Vec::new();
        while loader.pending() > 0 && Instant::now() < deadline {
            loaded.extend(loader.poll());
            thread::sleep(Duration::from_millis(5));
        }
        loaded
    }

    #[test]
    fn test_ids_are_unique() {
        let mut loader = TextureLoader::new();
        let a = loader.reserve();
        let b = loader.reserve();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_file_never_completes() {
        let mut loader = TextureLoader::new();
        loader.request("does/not/exist.png");
        let loaded = poll_until_settled(&mut loader);
        assert!(loaded.is_empty());
        assert_eq!(loader.pending(), 0);
    }

    #[test]
    fn test_png_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let mut loader = TextureLoader::new();
        let id = loader.request(&path);
        let loaded = poll_until_settled(&mut loader);

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, id);
        assert_eq!((loaded[0].width, loaded[0].height), (2, 1));
        assert_eq!(&loaded[0].pixels[..4], &[10, 20, 30, 255]);
    }
}
