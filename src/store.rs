//! Persisted vector index store.
//!
//! A [`VectorStore`] pairs a [`FlatIndex`] with a payload array where
//! `payloads[i]` describes index row `i`. The pairing is checked when the
//! store is built and again every time it is loaded.
//!
//! # Layout
//!
//! Each store lives in its own directory as three files:
//!
//! | File | Content |
//! |------|---------|
//! | `index_file` (e.g. `index.bin`) | binary flat index, see [`crate::index`] |
//! | `payload_file` (e.g. `texts.json`) | JSON array of payload records |
//! | `<index stem>.manifest.json` | build id, model, dims, count, SHA-256 of both files |
//!
//! # Atomicity
//!
//! [`VectorStore::persist`] writes all three files to temp files in the
//! target directory, fsyncs them, then renames the index, the payloads and
//! finally the manifest into place. The previous index and payload files are
//! copied aside first; if any rename fails, the files already replaced are
//! restored from those copies so the prior build stays loadable.
//! [`VectorStore::load`] verifies both companion files against the manifest
//! checksums. A reader racing a rebuild therefore sees either a complete old
//! pair, a complete new pair, or a [`Error::CorruptIndex`] it can retry;
//! never a silently misaligned pair.
//!
//! The store assumes a single writer. Concurrent rebuilds of the same
//! directory are not coordinated.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::{FlatIndex, Neighbor};

const MANIFEST_VERSION: u32 = 1;

/// File locations of one persisted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    dir: PathBuf,
    index_file: String,
    payload_file: String,
}

impl IndexPaths {
    pub fn new(
        dir: impl Into<PathBuf>,
        index_file: impl Into<String>,
        payload_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            index_file: index_file.into(),
            payload_file: payload_file.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.dir.join(&self.payload_file)
    }

    pub fn manifest_path(&self) -> PathBuf {
        let stem = Path::new(&self.index_file)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.index_file.clone());
        self.dir.join(format!("{}.manifest.json", stem))
    }

    /// Whether both companion files are present.
    pub fn exists(&self) -> bool {
        self.index_path().is_file() && self.payload_path().is_file()
    }
}

/// Metadata written alongside every persisted store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub build_id: Uuid,
    pub model: String,
    pub dims: usize,
    pub count: usize,
    pub created_at: DateTime<Utc>,
    pub index_file: String,
    pub index_sha256: String,
    pub payload_file: String,
    pub payload_sha256: String,
}

/// A resolved search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit<'a, P> {
    pub payload: &'a P,
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct VectorStore<P> {
    index: FlatIndex,
    payloads: Vec<P>,
    manifest: Option<Manifest>,
}

impl<P> VectorStore<P> {
    /// Build a store where `payloads[i]` describes `vectors[i]`.
    pub fn build(dims: usize, vectors: &[Vec<f32>], payloads: Vec<P>) -> Result<Self> {
        if vectors.len() != payloads.len() {
            return Err(Error::Misaligned {
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }
        Ok(Self {
            index: FlatIndex::build(dims, vectors)?,
            payloads,
            manifest: None,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.index.dims()
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn payloads(&self) -> &[P] {
        &self.payloads
    }

    /// Manifest this store was loaded with or last persisted under.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Up to `k` nearest payloads for `query`, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit<'_, P>>> {
        let neighbors = self.index.search_one(query, k)?;
        Ok(self.resolve(&neighbors))
    }

    /// Attach payloads to raw neighbours, dropping positions with no payload.
    pub fn resolve(&self, neighbors: &[Neighbor]) -> Vec<Hit<'_, P>> {
        neighbors
            .iter()
            .filter_map(|n| match self.payloads.get(n.position) {
                Some(payload) => Some(Hit {
                    payload,
                    position: n.position,
                    distance: n.distance,
                }),
                None => {
                    warn!(
                        position = n.position,
                        payloads = self.payloads.len(),
                        "search returned a position with no payload, skipping"
                    );
                    None
                }
            })
            .collect()
    }
}

impl<P: Serialize> VectorStore<P> {
    /// Write the store to `paths`, replacing any previous build.
    pub fn persist(&mut self, paths: &IndexPaths, model: &str) -> Result<Manifest> {
        let dir = paths.dir();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let index_bytes = self.index.to_bytes();
        let payload_bytes = serde_json::to_vec(&self.payloads)?;

        let manifest = Manifest {
            format_version: MANIFEST_VERSION,
            build_id: Uuid::new_v4(),
            model: model.to_string(),
            dims: self.index.dims(),
            count: self.index.len(),
            created_at: Utc::now(),
            index_file: paths.index_file.clone(),
            index_sha256: sha256_hex(&index_bytes),
            payload_file: paths.payload_file.clone(),
            payload_sha256: sha256_hex(&payload_bytes),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

        let staged = [
            (write_temp(dir, &index_bytes)?, paths.index_path()),
            (write_temp(dir, &payload_bytes)?, paths.payload_path()),
            (write_temp(dir, &manifest_bytes)?, paths.manifest_path()),
        ];
        // Same order as the first two staged files.
        let backups = [
            Backup::take(dir, paths.index_path())?,
            Backup::take(dir, paths.payload_path())?,
        ];

        let mut committed = 0;
        for (tmp, target) in staged {
            if let Err(e) = commit(tmp, &target) {
                warn!(
                    dir = %dir.display(),
                    error = %e,
                    "persist failed, restoring previous index files"
                );
                for backup in backups.into_iter().take(committed) {
                    backup.restore();
                }
                return Err(e);
            }
            committed += 1;
        }

        info!(
            dir = %dir.display(),
            count = manifest.count,
            dims = manifest.dims,
            build_id = %manifest.build_id,
            "persisted vector index"
        );
        self.manifest = Some(manifest.clone());
        Ok(manifest)
    }
}

impl<P: DeserializeOwned> VectorStore<P> {
    /// Load a store persisted at `paths`.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexNotFound`] if either companion file is missing.
    /// - [`Error::CorruptIndex`] if the files fail to decode, disagree with
    ///   the manifest, or have different row counts.
    pub fn load(paths: &IndexPaths) -> Result<Self> {
        let index_path = paths.index_path();
        let payload_path = paths.payload_path();

        let index_bytes = read_existing(&index_path)?;
        let payload_bytes = read_existing(&payload_path)?;
        let manifest = read_manifest(paths)?;

        if let Some(m) = &manifest {
            if m.index_sha256 != sha256_hex(&index_bytes)
                || m.payload_sha256 != sha256_hex(&payload_bytes)
            {
                return Err(Error::corrupt(
                    &index_path,
                    "index and payload files do not match the manifest (rebuild in progress?)",
                ));
            }
        } else {
            warn!(dir = %paths.dir().display(), "no manifest found, skipping checksum verification");
        }

        let index = FlatIndex::from_bytes(&index_bytes).map_err(|r| Error::corrupt(&index_path, r))?;
        let payloads: Vec<P> = serde_json::from_slice(&payload_bytes)
            .map_err(|e| Error::corrupt(&payload_path, e.to_string()))?;

        if index.len() != payloads.len() {
            return Err(Error::corrupt(
                &index_path,
                format!(
                    "index has {} vectors but payload file has {} records",
                    index.len(),
                    payloads.len()
                ),
            ));
        }
        if let Some(m) = &manifest {
            if m.count != index.len() || m.dims != index.dims() {
                return Err(Error::corrupt(
                    &index_path,
                    format!(
                        "manifest describes {} × {} but index is {} × {}",
                        m.count,
                        m.dims,
                        index.len(),
                        index.dims()
                    ),
                ));
            }
        }

        debug!(
            dir = %paths.dir().display(),
            count = index.len(),
            dims = index.dims(),
            "loaded vector index"
        );
        Ok(Self {
            index,
            payloads,
            manifest,
        })
    }
}

/// Long-lived, lazily loaded handle to a persisted store.
///
/// The first successful [`get`](Self::get) caches the store; later calls
/// reuse it until [`reload`](Self::reload) is called. A missing index is
/// never cached, so a build that lands later is picked up automatically.
pub struct StoreHandle<P> {
    paths: IndexPaths,
    cached: RwLock<Option<Arc<VectorStore<P>>>>,
}

impl<P: DeserializeOwned> StoreHandle<P> {
    pub fn new(paths: IndexPaths) -> Self {
        Self {
            paths,
            cached: RwLock::new(None),
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// The loaded store, or `None` if nothing has been indexed yet.
    pub fn get(&self) -> Result<Option<Arc<VectorStore<P>>>> {
        if let Some(store) = self.read_cache().as_ref() {
            return Ok(Some(Arc::clone(store)));
        }

        let store = match VectorStore::load(&self.paths) {
            Ok(store) => Arc::new(store),
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut cache = self.cached.write().unwrap_or_else(|p| p.into_inner());
        *cache = Some(Arc::clone(&store));
        Ok(Some(store))
    }

    /// Drop the cached store; the next [`get`](Self::get) reads from disk.
    pub fn reload(&self) {
        let mut cache = self.cached.write().unwrap_or_else(|p| p.into_inner());
        *cache = None;
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<VectorStore<P>>>> {
        self.cached.read().unwrap_or_else(|p| p.into_inner())
    }
}

/// Read the manifest at `paths`, if one has been written.
pub fn read_manifest(paths: &IndexPaths) -> Result<Option<Manifest>> {
    let path = paths.manifest_path();
    match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::corrupt(&path, format!("invalid manifest: {}", e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn read_existing(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::IndexNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::io(path, e)
        }
    })
}

fn write_temp(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(tmp.path(), e))?;
    Ok(tmp)
}

/// Copy of a file's previous contents, kept until the new build is committed.
struct Backup {
    target: PathBuf,
    saved: Option<NamedTempFile>,
}

impl Backup {
    fn take(dir: &Path, target: PathBuf) -> Result<Self> {
        let saved = match fs::metadata(&target) {
            Ok(meta) if meta.is_file() => {
                let bytes = fs::read(&target).map_err(|e| Error::io(&target, e))?;
                Some(write_temp(dir, &bytes)?)
            }
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(&target, e)),
        };
        Ok(Self { target, saved })
    }

    /// Put the previous contents back; a file that did not exist is removed.
    fn restore(self) {
        let result = match self.saved {
            Some(tmp) => tmp.persist(&self.target).map(|_| ()).map_err(|e| e.error),
            None => fs::remove_file(&self.target),
        };
        if let Err(e) = result {
            warn!(path = %self.target.display(), error = %e, "failed to restore previous file");
        }
    }
}

fn commit(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target)
        .map_err(|e| Error::io(target, e.error))?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
