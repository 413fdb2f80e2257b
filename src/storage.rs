//! Opens [`Volume`]s backed by a shared blocks file and per-volume
//! references files rooted at a common directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::volume::Volume;

/// Names the files that make up a volume's storage, given its id. Kept as
/// a trait so callers can adopt whatever on-disk naming convention their
/// deployment already uses.
pub trait NameProvider {
    fn references(&self, volume_id: u8) -> String;
    fn blocks(&self) -> String;
}

/// The JAGEX cache naming convention: `main_file_cache.idx{id}` for
/// references and `main_file_cache.dat2` for the shared blocks file.
pub struct DefaultNameProvider;

impl NameProvider for DefaultNameProvider {
    fn references(&self, volume_id: u8) -> String {
        format!("main_file_cache.idx{volume_id}")
    }

    fn blocks(&self) -> String {
        "main_file_cache.dat2".to_string()
    }
}

pub struct Storage<P: NameProvider = DefaultNameProvider> {
    root: PathBuf,
    provider: P,
    blocks: Arc<File>,
    lock: Arc<Mutex<()>>,
}

impl Storage<DefaultNameProvider> {
    /// Opens storage rooted at `root` using the default JAGEX file naming.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Storage::with_provider(root, DefaultNameProvider)
    }
}

impl<P: NameProvider> Storage<P> {
    pub fn with_provider(root: impl Into<PathBuf>, provider: P) -> Result<Self> {
        let root = root.into();
        let blocks_path = root.join(provider.blocks());
        let blocks = open_read_write(&blocks_path)?;
        Ok(Storage {
            root,
            provider,
            blocks: Arc::new(blocks),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Opens the volume identified by `volume_id`, creating its references
    /// file if it doesn't exist yet.
    pub fn open(&self, volume_id: u8) -> Result<Volume> {
        let references_path = self.root.join(self.provider.references(volume_id));
        let references = open_read_write(&references_path)?;
        Ok(Volume::new(
            volume_id,
            references,
            Arc::clone(&self.blocks),
            Arc::clone(&self.lock),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn open_read_write(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?)
}
