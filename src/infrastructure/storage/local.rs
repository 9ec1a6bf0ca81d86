use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    constants::PROCESSED_DIR,
    entities::{
        image::ImageCategory,
        variant::{parse_variant_file_name, variant_file_name, OutputFormat, VariantName},
    },
    utils::mime::extension_for,
};

const WRITE_PROBE: &str = ".write-probe";

/// Local-disk home of originals and their processed variants.
///
/// Layout: `{root}/{articles,authors,images}/{filename}` for originals and
/// `{root}/processed/{stem}-{variant}.{ext}` for variants. A filename index
/// maps every known original to its category so lookups never probe all
/// directories.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    index: DashMap<String, ImageCategory>,
    delete_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UploadStorage {
    /// Creates the directory tree and indexes files already on disk.
    pub fn init(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let storage = UploadStorage {
            root,
            index: DashMap::new(),
            delete_locks: DashMap::new(),
        };

        for category in ImageCategory::ALL {
            fs::create_dir_all(storage.category_dir(category))?;
        }
        fs::create_dir_all(storage.processed_dir())?;

        for category in ImageCategory::ALL {
            for entry in fs::read_dir(storage.category_dir(category))? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    storage.index.insert(name.to_string(), category);
                }
            }
        }

        info!(
            root = %storage.root.display(),
            indexed = storage.index.len(),
            "upload storage ready"
        );
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: ImageCategory) -> PathBuf {
        self.root.join(category.as_str())
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    pub fn original_path(&self, category: ImageCategory, filename: &str) -> PathBuf {
        self.category_dir(category).join(filename)
    }

    pub fn variant_path(&self, filename: &str, variant: VariantName, format: OutputFormat) -> PathBuf {
        self.processed_dir().join(variant_file_name(filename, variant, format))
    }

    pub fn register(&self, filename: &str, category: ImageCategory) {
        self.index.insert(filename.to_string(), category);
    }

    pub fn forget(&self, filename: &str) {
        self.index.remove(filename);
    }

    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    /// Finds the category and path of an original. Falls back to probing the
    /// category directories for files placed on disk out of band.
    pub async fn locate(&self, filename: &str) -> Option<(ImageCategory, PathBuf)> {
        let indexed = self.index.get(filename).map(|entry| *entry.value());
        if let Some(category) = indexed {
            let path = self.original_path(category, filename);
            if is_file(&path).await {
                return Some((category, path));
            }
            self.forget(filename);
        }

        for category in ImageCategory::ALL {
            let path = self.original_path(category, filename);
            if is_file(&path).await {
                debug!(filename, %category, "indexed file found by probing");
                self.register(filename, category);
                return Some((category, path));
            }
        }
        None
    }

    /// Opens a fresh file for an original; never overwrites.
    pub async fn create_original(&self, category: ImageCategory, filename: &str) -> io::Result<tokio::fs::File> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.original_path(category, filename))
            .await
    }

    /// Per-filename lock serialising check-then-delete.
    pub fn lock_for(&self, filename: &str) -> Arc<Mutex<()>> {
        self.delete_locks
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the lock entry once no request holds it.
    pub fn release_lock(&self, filename: &str) {
        self.delete_locks
            .remove_if(filename, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn held_delete_locks(&self) -> usize {
        self.delete_locks.len()
    }

    /// Every path an upload of `filename` may have produced.
    fn asset_paths(&self, category: ImageCategory, filename: &str) -> Vec<PathBuf> {
        let mut paths = vec![self.original_path(category, filename)];
        for variant in VariantName::ALL {
            for format in OutputFormat::ALL {
                paths.push(self.variant_path(filename, variant, format));
            }
        }
        paths
    }

    /// Removes an original and every variant derived from it; returns the number of files deleted.
    pub async fn remove_asset_files(&self, category: ImageCategory, filename: &str) -> io::Result<usize> {
        let mut removed = usize::from(remove_if_exists(&self.original_path(category, filename)).await?);
        removed += self.remove_variant_files(filename).await?;
        self.forget(filename);
        Ok(removed)
    }

    pub async fn remove_variant_files(&self, filename: &str) -> io::Result<usize> {
        let mut removed = 0;
        for variant in VariantName::ALL {
            for format in OutputFormat::ALL {
                if remove_if_exists(&self.variant_path(filename, variant, format)).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub async fn check_writable(&self) -> io::Result<()> {
        let probe = self.root.join(WRITE_PROBE);
        tokio::fs::write(&probe, b"ok").await?;
        tokio::fs::remove_file(&probe).await
    }

    /// Deletes processed files whose original is gone.
    pub async fn sweep_orphan_variants(&self) -> io::Result<usize> {
        let live_stems: HashSet<String> = self
            .index
            .iter()
            .map(|entry| stem_of(entry.key()).to_string())
            .collect();

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(self.processed_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((stem, _)) = parse_variant_file_name(name) else { continue };

            if !live_stems.contains(stem) && remove_if_exists(&entry.path()).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn batch(&self) -> UploadBatch<'_> {
        UploadBatch {
            storage: self,
            written: Vec::new(),
            committed: false,
        }
    }
}

/// `{field}-{unix millis}-{9 random digits}{ext}`.
pub fn generate_filename(field: &str, original_name: &str, mime: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(100_000_000..1_000_000_000);
    format!(
        "{}-{}-{}{}",
        field,
        Utc::now().timestamp_millis(),
        suffix,
        extension_for(original_name, mime)
    )
}

fn stem_of(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(filename)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Tracks the files a single request wrote. A failed request calls
/// [`UploadBatch::rollback`]; a batch dropped without commit or rollback
/// (the request future was cancelled) falls back to removing its files
/// synchronously in `Drop`.
pub struct UploadBatch<'a> {
    storage: &'a UploadStorage,
    written: Vec<(ImageCategory, String)>,
    committed: bool,
}

impl UploadBatch<'_> {
    pub fn track(&mut self, category: ImageCategory, filename: &str) {
        self.written.push((category, filename.to_string()));
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Keeps the files and publishes them in the filename index.
    pub fn commit(mut self) {
        for (category, filename) in &self.written {
            self.storage.register(filename, *category);
        }
        self.committed = true;
    }

    /// Removes every original and variant the batch recorded.
    pub async fn rollback(mut self) {
        for (category, filename) in std::mem::take(&mut self.written) {
            for path in self.storage.asset_paths(category, &filename) {
                match remove_if_exists(&path).await {
                    Ok(true) => debug!(path = %path.display(), "removed file from failed upload"),
                    Ok(false) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to clean up upload"),
                }
            }
            self.storage.forget(&filename);
        }
    }
}

impl Drop for UploadBatch<'_> {
    fn drop(&mut self) {
        if self.committed || self.written.is_empty() {
            return;
        }
        for (category, filename) in &self.written {
            for path in self.storage.asset_paths(*category, filename) {
                match fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "removed file from cancelled upload"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to clean up upload"),
                }
            }
            self.storage.forget(filename);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, UploadStorage) {
        let dir = TempDir::new().unwrap();
        let storage = UploadStorage::init(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn init_creates_layout_and_indexes_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("authors")).unwrap();
        fs::write(dir.path().join("authors/avatar-1-123456789.png"), b"x").unwrap();

        let storage = UploadStorage::init(dir.path()).unwrap();
        for sub in ["articles", "authors", "images", "processed"] {
            assert!(dir.path().join(sub).is_dir());
        }
        assert_eq!(storage.indexed_count(), 1);
    }

    #[test]
    fn generated_names_are_unique_and_shaped() {
        let a = generate_filename("image", "Holiday.JPG", "image/jpeg");
        let b = generate_filename("image", "Holiday.JPG", "image/jpeg");
        assert_ne!(a, b);

        let parts: Vec<&str> = a.trim_end_matches(".jpg").split('-').collect();
        assert_eq!(parts[0], "image");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(a.ends_with(".jpg"));
    }

    #[actix_rt::test]
    async fn locate_falls_back_to_probing() {
        let (dir, storage) = storage();
        fs::write(dir.path().join("images/manual.png"), b"x").unwrap();

        let (category, path) = storage.locate("manual.png").await.unwrap();
        assert_eq!(category, ImageCategory::Images);
        assert!(path.ends_with("images/manual.png"));
        assert_eq!(storage.indexed_count(), 1);
        assert!(storage.locate("missing.png").await.is_none());
    }

    #[actix_rt::test]
    async fn dropped_batch_removes_written_files() {
        let (dir, storage) = storage();
        {
            let mut batch = storage.batch();
            fs::write(dir.path().join("articles/gallery-1-111111111.jpg"), b"x").unwrap();
            fs::write(dir.path().join("processed/gallery-1-111111111-small.webp"), b"x").unwrap();
            batch.track(ImageCategory::Articles, "gallery-1-111111111.jpg");
        }
        assert!(!dir.path().join("articles/gallery-1-111111111.jpg").exists());
        assert!(!dir.path().join("processed/gallery-1-111111111-small.webp").exists());
        assert!(storage.locate("gallery-1-111111111.jpg").await.is_none());
    }

    #[actix_rt::test]
    async fn rolled_back_batch_removes_written_files() {
        let (dir, storage) = storage();
        fs::write(dir.path().join("images/image-1-555555555.png"), b"x").unwrap();
        fs::write(dir.path().join("processed/image-1-555555555-medium.jpg"), b"x").unwrap();
        fs::write(dir.path().join("images/image-1-666666666.png"), b"x").unwrap();
        storage.register("image-1-555555555.png", ImageCategory::Images);

        let mut batch = storage.batch();
        batch.track(ImageCategory::Images, "image-1-555555555.png");
        assert_eq!(batch.len(), 1);
        batch.rollback().await;

        assert!(!dir.path().join("images/image-1-555555555.png").exists());
        assert!(!dir.path().join("processed/image-1-555555555-medium.jpg").exists());
        assert!(dir.path().join("images/image-1-666666666.png").exists());
        assert_eq!(storage.indexed_count(), 0);
    }

    #[actix_rt::test]
    async fn committed_batch_is_indexed() {
        let (dir, storage) = storage();
        fs::write(dir.path().join("authors/avatar-1-222222222.png"), b"x").unwrap();

        let mut batch = storage.batch();
        batch.track(ImageCategory::Authors, "avatar-1-222222222.png");
        batch.commit();

        assert!(dir.path().join("authors/avatar-1-222222222.png").exists());
        assert_eq!(storage.indexed_count(), 1);
    }

    #[actix_rt::test]
    async fn removal_cascades_to_variants_and_sweep_clears_orphans() {
        let (dir, storage) = storage();
        fs::write(dir.path().join("images/image-1-333333333.jpg"), b"x").unwrap();
        fs::write(dir.path().join("processed/image-1-333333333-thumbnail.jpg"), b"x").unwrap();
        fs::write(dir.path().join("processed/image-1-333333333-thumbnail.webp"), b"x").unwrap();
        fs::write(dir.path().join("processed/ghost-1-444444444-large.jpg"), b"x").unwrap();
        storage.register("image-1-333333333.jpg", ImageCategory::Images);

        assert_eq!(storage.sweep_orphan_variants().await.unwrap(), 1);
        assert!(dir.path().join("processed/image-1-333333333-thumbnail.jpg").exists());

        let removed = storage
            .remove_asset_files(ImageCategory::Images, "image-1-333333333.jpg")
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(storage.indexed_count(), 0);
    }

    #[actix_rt::test]
    async fn delete_locks_are_shared_and_released() {
        let (_dir, storage) = storage();
        let first = storage.lock_for("a.jpg");
        let second = storage.lock_for("a.jpg");
        assert!(Arc::ptr_eq(&first, &second));

        drop(first);
        drop(second);
        storage.release_lock("a.jpg");
        assert_eq!(storage.held_delete_locks(), 0);
        assert!(storage.check_writable().await.is_ok());
    }
}
