use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::preprocess::Upload;

/// Where one persisted analysis landed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOverlay {
    /// Content-addressed file name shared by both files.
    pub key: String,
    pub upload_path: PathBuf,
    pub overlay_path: PathBuf,
}

/// Persists raw uploads and their saliency overlays.
///
/// Files are keyed by a digest of the uploaded bytes plus the sanitized
/// original name, so two different scans that share a file name never
/// overwrite each other, while re-running the same scan reuses its slot.
#[derive(Debug, Clone)]
pub struct OverlayStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl OverlayStore {
    /// A store over the two directories. Nothing is touched on disk until
    /// the first `persist`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(upload_dir: P, output_dir: Q) -> OverlayStore {
        OverlayStore {
            upload_dir: upload_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Like `new`, but creates both directories up front.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(upload_dir: P, output_dir: Q) -> Result<OverlayStore> {
        let store = OverlayStore::new(upload_dir, output_dir);
        store.ensure_dirs()?;
        debug!("Overlay store: uploads in {:?}, overlays in {:?}", store.upload_dir, store.output_dir);
        Ok(store)
    }

    fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Storage key for an upload: `<first 16 hex chars of SHA-256>_<name>`.
    ///
    /// Names whose extension is not one of the formats this crate can
    /// encode (PNG, JPEG, BMP, GIF) get `.png` appended.
    pub fn key_for(upload: &Upload) -> String {
        let digest = Sha256::digest(&upload.bytes);
        let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();

        let name = sanitize_file_name(&upload.file_name);
        let encodable = matches!(
            ImageFormat::from_path(&name),
            Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp | ImageFormat::Gif)
        );
        let name = if encodable { name } else { format!("{}.png", name) };
        format!("{}_{}", hex, name)
    }

    /// Writes the blended overlay, then the raw upload bytes. On failure
    /// neither file is left behind.
    pub fn persist(&self, upload: &Upload, overlay: &RgbImage) -> Result<StoredOverlay> {
        self.ensure_dirs()?;
        let key = OverlayStore::key_for(upload);
        let upload_path = self.upload_dir.join(&key);
        let overlay_path = self.output_dir.join(&key);

        if let Err(e) = overlay.save(&overlay_path) {
            let _ = fs::remove_file(&overlay_path);
            return Err(e.into());
        }
        if let Err(e) = fs::write(&upload_path, &upload.bytes) {
            let _ = fs::remove_file(&upload_path);
            let _ = fs::remove_file(&overlay_path);
            return Err(e.into());
        }
        info!("Saved overlay to {:?}", overlay_path);

        Ok(StoredOverlay { key, upload_path, overlay_path })
    }

    /// Removes every file in both directories. Returns how many were deleted.
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.output_dir] {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        info!("Removed {} stored files", removed);
        Ok(removed)
    }
}

/// Strips path components and replaces anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(raw: &str) -> String {
    let base = Path::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() { "upload".to_owned() } else { trimmed.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_same_name_different_bytes_get_different_keys() {
        let a = Upload::new("scan.png", vec![1, 2, 3]);
        let b = Upload::new("scan.png", vec![1, 2, 4]);
        assert_ne!(OverlayStore::key_for(&a), OverlayStore::key_for(&b));
        assert_eq!(OverlayStore::key_for(&a), OverlayStore::key_for(&a.clone()));
        assert!(OverlayStore::key_for(&a).ends_with("_scan.png"));
    }

    #[test]
    fn test_key_sanitizes_and_fixes_extension() {
        let key = OverlayStore::key_for(&Upload::new("../weird name?.dcm", vec![0]));
        assert!(key.ends_with("_weird_name_.dcm.png"), "{}", key);
        assert!(!key.contains('/'));
    }

    #[test]
    fn test_formats_without_encoder_fall_back_to_png() {
        for (name, suffix) in [
            ("scan.tiff", "_scan.tiff.png"),
            ("scan.webp", "_scan.webp.png"),
            ("scan.JPG", "_scan.JPG"),
            ("scan.bmp", "_scan.bmp"),
        ] {
            let key = OverlayStore::key_for(&Upload::new(name, vec![9]));
            assert!(key.ends_with(suffix), "{} -> {}", name, key);
        }
    }

    #[test]
    fn test_tiff_upload_persists_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverlayStore::new(dir.path().join("uploads"), dir.path().join("maps"));
        let stored = store
            .persist(&Upload::new("scan.tiff", b"tiff-bytes".to_vec()), &RgbImage::new(3, 3))
            .unwrap();
        assert!(stored.overlay_path.to_string_lossy().ends_with(".tiff.png"));
        assert_eq!(image::open(&stored.overlay_path).unwrap().width(), 3);
    }

    #[test]
    fn test_failed_overlay_write_leaves_no_upload_copy() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("maps");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = OverlayStore::new(dir.path().join("uploads"), &blocker);

        assert!(store.persist(&Upload::new("scan.png", vec![1, 2]), &RgbImage::new(2, 2)).is_err());
        let leftovers = fs::read_dir(dir.path().join("uploads")).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_new_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverlayStore::new(dir.path().join("u"), dir.path().join("o"));
        assert!(!store.upload_dir().exists());
        assert!(!store.output_dir().exists());
    }

    #[test]
    fn test_persist_then_clean() {
        let dir = tempfile::tempdir().unwrap();
        let store = OverlayStore::open(dir.path().join("uploads"), dir.path().join("maps")).unwrap();
        let upload = Upload::new("brain.jpg", b"raw-bytes".to_vec());
        let overlay = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));

        let stored = store.persist(&upload, &overlay).unwrap();
        assert_eq!(fs::read(&stored.upload_path).unwrap(), b"raw-bytes");
        let reloaded = image::open(&stored.overlay_path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (4, 3));

        assert_eq!(store.clean().unwrap(), 2);
        assert!(!stored.overlay_path.exists());
    }
}
