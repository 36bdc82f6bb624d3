use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::{
    error::{Result, VertexError},
    models::SavedImage,
};

/// Prefix of every file this store writes.
pub const IMAGE_PREFIX: &str = "vertex_image_";

/// Prefixes the sweep is allowed to delete. `gemini_image_` files come from
/// older plugin versions sharing the same directory.
pub const SWEEP_PREFIXES: &[&str] = &["vertex_image_", "gemini_image_"];

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Flat directory of generated images with time-based expiry.
pub struct ArtifactStore {
    image_dir: PathBuf,
    retention: Duration,
    last_saved: Mutex<Option<SavedImage>>,
}

impl ArtifactStore {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            retention: DEFAULT_RETENTION,
            last_saved: Mutex::new(None),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Most recent successful save, if any.
    pub fn last_saved(&self) -> Option<SavedImage> {
        self.last_saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Decode a base64 payload and persist it. Failures are logged, never returned.
    ///
    /// Expired images are swept first, even when the payload turns out to be unusable.
    pub async fn save(&self, base64_data: &str, format_hint: &str) -> Option<SavedImage> {
        let result = self.try_save(base64_data, format_hint).await;
        self.record(result)
    }

    /// Persist already decoded image bytes.
    pub async fn store_bytes(&self, bytes: &[u8], format_hint: &str) -> Option<SavedImage> {
        let result = self.try_store(bytes, format_hint).await;
        self.record(result)
    }

    fn record(&self, result: Result<SavedImage>) -> Option<SavedImage> {
        match result {
            Ok(saved) => {
                log::info!("💾 Image saved: {}", saved.path.display());
                *self.last_saved.lock().unwrap_or_else(|e| e.into_inner()) = Some(saved.clone());
                Some(saved)
            }
            Err(e) => {
                log::error!("❌ Failed to save image: {}", e);
                None
            }
        }
    }

    async fn try_save(&self, base64_data: &str, format_hint: &str) -> Result<SavedImage> {
        self.prepare().await?;
        let bytes = decode_base64(base64_data)?;
        self.write(&bytes, format_hint).await
    }

    async fn try_store(&self, bytes: &[u8], format_hint: &str) -> Result<SavedImage> {
        self.prepare().await?;
        self.write(bytes, format_hint).await
    }

    /// Ensure the directory exists and drop expired images.
    async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.image_dir).await.map_err(|e| {
            VertexError::ArtifactError(format!(
                "cannot create {}: {}",
                self.image_dir.display(),
                e
            ))
        })?;

        self.sweep().await;
        Ok(())
    }

    async fn write(&self, bytes: &[u8], format_hint: &str) -> Result<SavedImage> {
        if bytes.is_empty() {
            return Err(VertexError::ArtifactError("empty image payload".into()));
        }

        let dir = tokio::fs::canonicalize(&self.image_dir)
            .await
            .unwrap_or_else(|_| self.image_dir.clone());
        let path = dir.join(generate_filename(format_hint));

        if let Err(e) = tokio::fs::write(&path, bytes).await {
            // Never leave a truncated file behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(VertexError::ArtifactError(format!(
                "cannot write {}: {}",
                path.display(),
                e
            )));
        }

        Ok(SavedImage {
            url: format!("file://{}", path.display()),
            path,
        })
    }

    /// Delete generated images older than the retention window.
    ///
    /// Returns the number of files removed. Per-file errors are logged and skipped.
    pub async fn sweep(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.image_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                log::error!(
                    "❌ Cannot scan image directory {}: {}",
                    self.image_dir.display(),
                    e
                );
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("⚠️  Image directory scan interrupted: {}", e);
                    break;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !SWEEP_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }

            let path = entry.path();
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    log::warn!("⚠️  Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };

            // mtime in the future: not expired
            let Ok(age) = now.duration_since(modified) else {
                continue;
            };
            if age <= self.retention {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    log::debug!("🧹 Removed expired image: {}", name);
                }
                Err(e) => log::warn!("⚠️  Failed to remove {}: {}", path.display(), e),
            }
        }

        removed
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(cleaned)
        .map_err(|e| VertexError::ArtifactError(format!("invalid base64: {}", e)))
}

/// File extension for a MIME subtype such as `png`, `jpeg` or `svg+xml`.
fn sanitize_format(format_hint: &str) -> String {
    let ext: String = format_hint
        .split('+')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "png".to_string()
    } else {
        ext
    }
}

fn generate_filename(format_hint: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}.{}",
        IMAGE_PREFIX,
        timestamp,
        &suffix[..8],
        sanitize_format(format_hint)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs::File;

    fn age_file(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_save_roundtrips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("images"));
        let bytes = b"\x89PNG\r\n\x1a\nnot really a png".to_vec();

        let saved = store.save(&STANDARD.encode(&bytes), "png").await.unwrap();

        assert_eq!(std::fs::read(&saved.path).unwrap(), bytes);
        assert!(saved.url.starts_with("file://"));
        assert!(saved.url.ends_with(".png"));
        assert_eq!(store.last_saved(), Some(saved));
    }

    #[tokio::test]
    async fn test_invalid_base64_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("images"));

        assert!(store.save("%%% not base64 %%%", "png").await.is_none());
        assert!(store.save("", "png").await.is_none());
        assert!(store.last_saved().is_none());
        let written = std::fs::read_dir(dir.path().join("images")).unwrap().count();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_sweep_runs_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        let old = images.join("vertex_image_20240101_000000_deadbeef.png");
        std::fs::write(&old, b"x").unwrap();
        age_file(&old, Duration::from_secs(16 * 60));

        let store = ArtifactStore::new(&images);
        assert!(store.save("%%% not base64 %%%", "png").await.is_none());

        assert!(!old.exists());
    }

    #[tokio::test]
    async fn test_sweep_on_save_removes_only_expired_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();

        let old = images.join("vertex_image_20240101_000000_deadbeef.png");
        let legacy = images.join("gemini_image_20240101_000000_cafebabe.jpg");
        let recent = images.join("vertex_image_20240101_001000_feedface.png");
        let foreign = images.join("avatar.png");
        for path in [&old, &legacy, &recent, &foreign] {
            std::fs::write(path, b"x").unwrap();
        }
        age_file(&old, Duration::from_secs(16 * 60));
        age_file(&legacy, Duration::from_secs(16 * 60));
        age_file(&recent, Duration::from_secs(5 * 60));
        age_file(&foreign, Duration::from_secs(60 * 60));

        let store = ArtifactStore::new(&images);
        assert!(store.save(&STANDARD.encode(b"new"), "png").await.is_some());

        assert!(!old.exists());
        assert!(!legacy.exists());
        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nowhere"));
        assert_eq!(store.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(ArtifactStore::new(dir.path().join("images")));

        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.store_bytes(&[i; 4], "jpeg").await.unwrap() })
            })
            .collect();

        let mut paths = HashSet::new();
        for handle in handles {
            let saved = handle.await.unwrap();
            assert!(saved.path.extension().unwrap() == "jpeg");
            paths.insert(saved.path);
        }
        assert_eq!(paths.len(), 16);
    }

    #[test]
    fn test_filename_layout() {
        let name = generate_filename("svg+xml");
        assert!(name.starts_with(IMAGE_PREFIX));
        assert!(name.ends_with(".svg"));
        // prefix + YYYYmmdd_HHMMSS + _ + 8 hex + .svg
        assert_eq!(name.len(), IMAGE_PREFIX.len() + 15 + 1 + 8 + 4);
        assert_eq!(sanitize_format(""), "png");
        assert_eq!(sanitize_format("JPEG"), "jpeg");
    }
}
