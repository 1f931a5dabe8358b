//! Date-keyed artifact storage for the bronze, silver and gold layers
//!
//! Stages never look at paths directly. They ask a store for the latest key
//! of their predecessor layer, read it, and put exactly one artifact of their
//! own layer. Keys are the date-bearing file stems (`2025-09-30`), so the
//! lexicographically greatest key is the most recent one.

use crate::config::PipelineConfig;
use crate::error::Result;
use hashbrown::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Refinement layer an artifact belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }

    /// File name ending that identifies artifacts of this layer
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Layer::Bronze => ".json",
            Layer::Silver => "_silver.csv",
            Layer::Gold => "_gold.parquet",
        }
    }

    pub fn file_name(&self, key: &str) -> String {
        format!("{}{}", key, self.file_suffix())
    }

    /// Recover the artifact key from a file name, if it belongs to this layer
    pub fn key_from_file_name(&self, file_name: &str) -> Option<String> {
        if file_name.starts_with('.') {
            return None;
        }
        file_name
            .strip_suffix(self.file_suffix())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-addressable store of immutable, date-named artifacts
pub trait ArtifactStore {
    /// All keys present in a layer, ascending
    fn keys(&self, layer: Layer) -> Result<Vec<String>>;

    /// Read an artifact; `None` when it does not exist
    fn get(&self, layer: Layer, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write an artifact, replacing any previous artifact with the same key.
    /// Returns a human-readable location.
    fn put(&self, layer: Layer, key: &str, bytes: &[u8]) -> Result<String>;

    /// Most recent key in a layer
    fn latest(&self, layer: Layer) -> Result<Option<String>> {
        Ok(self.keys(layer)?.into_iter().max())
    }
}

/// Filesystem store rooted at the configured data directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.data_dir.clone())
    }

    pub fn layer_dir(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.as_str())
    }

    pub fn path_for(&self, layer: Layer, key: &str) -> PathBuf {
        self.layer_dir(layer).join(layer.file_name(key))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn keys(&self, layer: Layer) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.layer_dir(layer)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|name| layer.key_from_file_name(name))
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn get(&self, layer: Layer, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(layer, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, layer: Layer, key: &str, bytes: &[u8]) -> Result<String> {
        let dir = self.layer_dir(layer);
        fs::create_dir_all(&dir)?;
        let target = self.path_for(layer, key);
        write_atomically(&dir, &target, bytes)?;
        Ok(target.display().to_string())
    }
}

/// Write to a uniquely named hidden temp file in `dir`, then rename it over the target
///
/// Concurrent writers to one target each get their own temp file; the last rename wins.
pub(crate) fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// In-memory store, mainly for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<(Layer, String), Vec<u8>>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts across all layers
    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn keys(&self, layer: Layer) -> Result<Vec<String>> {
        let artifacts = self.artifacts.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = artifacts
            .keys()
            .filter(|(l, _)| *l == layer)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn get(&self, layer: Layer, key: &str) -> Result<Option<Vec<u8>>> {
        let artifacts = self.artifacts.read().unwrap_or_else(|e| e.into_inner());
        Ok(artifacts.get(&(layer, key.to_string())).cloned())
    }

    fn put(&self, layer: Layer, key: &str, bytes: &[u8]) -> Result<String> {
        let mut artifacts = self.artifacts.write().unwrap_or_else(|e| e.into_inner());
        artifacts.insert((layer, key.to_string()), bytes.to_vec());
        Ok(format!("memory://{}/{}", layer, layer.file_name(key)))
    }
}
