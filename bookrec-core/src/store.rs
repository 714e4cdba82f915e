//! Persistence of fitted models.
//!
//! A model is always written and read as one unit. On disk that unit is a small
//! fixed header followed by a bincode payload:
//!
//! ```text
//! | magic "BKRV" | version u32 | payload_len u64 | crc32c u32 | payload ... |
//! ```
//!
//! All integers are little-endian. The file is written to a temp sibling, synced,
//! then renamed over the target, so readers never observe a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TfidfConfig;
use crate::error::{RecError, RecResult};
use crate::item::ItemId;
use crate::sparse::CsrMatrix;
use crate::vectorizer::VectorSpaceModel;

const MODEL_MAGIC: &[u8; 4] = b"BKRV";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 4;

/// Result of looking up a persisted model.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(VectorSpaceModel),
    /// Nothing has been persisted at this location yet.
    NotFound,
}

/// A named location holding at most one serialized `VectorSpaceModel`.
pub trait ModelStore: Send + Sync + std::fmt::Debug {
    fn save(&self, model: &VectorSpaceModel) -> RecResult<()>;
    /// Returns `NotFound` when nothing is stored; any malformed content is an error.
    fn load(&self) -> RecResult<LoadOutcome>;
}

#[derive(Serialize)]
struct ModelBundleRef<'a> {
    config: &'a TfidfConfig,
    vocabulary: &'a [String],
    idf: &'a [f32],
    matrix: &'a CsrMatrix,
    item_ids: &'a [ItemId],
}

#[derive(Deserialize)]
struct ModelBundle {
    config: TfidfConfig,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
    matrix: CsrMatrix,
    item_ids: Vec<ItemId>,
}

fn encode(model: &VectorSpaceModel) -> RecResult<Vec<u8>> {
    let bundle = ModelBundleRef {
        config: &model.config,
        vocabulary: &model.vocabulary,
        idf: &model.idf,
        matrix: &model.matrix,
        item_ids: &model.item_ids,
    };
    let payload = bincode::serialize(&bundle)?;

    let mut bytes = vec![0u8; HEADER_LEN];
    bytes[0..4].copy_from_slice(MODEL_MAGIC);
    LittleEndian::write_u32(&mut bytes[4..8], FORMAT_VERSION);
    LittleEndian::write_u64(&mut bytes[8..16], payload.len() as u64);
    LittleEndian::write_u32(&mut bytes[16..20], crc32c::crc32c(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode(bytes: &[u8], path: &Path) -> RecResult<VectorSpaceModel> {
    if bytes.len() < HEADER_LEN {
        return Err(RecError::corrupt(path, format!("file is {} bytes, shorter than the header", bytes.len())));
    }
    if &bytes[0..4] != MODEL_MAGIC {
        return Err(RecError::corrupt(path, "bad magic bytes"));
    }
    let version = LittleEndian::read_u32(&bytes[4..8]);
    if version != FORMAT_VERSION {
        return Err(RecError::corrupt(path, format!("unsupported format version {}", version)));
    }
    let payload_len = LittleEndian::read_u64(&bytes[8..16]);
    let stored_crc = LittleEndian::read_u32(&bytes[16..20]);
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != payload_len {
        return Err(RecError::corrupt(
            path,
            format!("payload is {} bytes, header says {}", payload.len(), payload_len),
        ));
    }
    let calculated_crc = crc32c::crc32c(payload);
    if calculated_crc != stored_crc {
        return Err(RecError::corrupt(
            path,
            format!("checksum mismatch: stored 0x{:08x}, calculated 0x{:08x}", stored_crc, calculated_crc),
        ));
    }

    let bundle: ModelBundle = bincode::deserialize(payload)
        .map_err(|e| RecError::corrupt(path, format!("undecodable payload: {}", e)))?;
    VectorSpaceModel::from_parts(bundle.config, bundle.vocabulary, bundle.idf, bundle.matrix, bundle.item_ids)
        .map_err(|reason| RecError::corrupt(path, reason))
}

/// Stores the model in a single file.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileModelStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }
}

impl ModelStore for FileModelStore {
    fn save(&self, model: &VectorSpaceModel) -> RecResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RecError::io(parent, e))?;
        }
        let bytes = encode(model)?;
        let temp_path = self.temp_path();

        let mut file = File::create(&temp_path).map_err(|e| RecError::io(&temp_path, e))?;
        file.write_all(&bytes).map_err(|e| RecError::io(&temp_path, e))?;
        file.sync_all().map_err(|e| RecError::io(&temp_path, e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| RecError::io(&temp_path, e))?;
        info!(path = ?self.path, rows = model.n_items(), terms = model.n_terms(), bytes = bytes.len(), "Saved TF-IDF model");
        Ok(())
    }

    fn load(&self) -> RecResult<LoadOutcome> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No persisted model at path");
                return Ok(LoadOutcome::NotFound);
            }
            Err(e) => return Err(RecError::io(&self.path, e)),
        };
        let model = decode(&bytes, &self.path).map_err(|e| {
            warn!(path = ?self.path, error = %e, "Persisted model is corrupt");
            e
        })?;
        info!(path = ?self.path, rows = model.n_items(), terms = model.n_terms(), "Loaded TF-IDF model");
        Ok(LoadOutcome::Loaded(model))
    }
}

/// Keeps the encoded model in memory. Goes through the same encoding as the file store.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&self, model: &VectorSpaceModel) -> RecResult<()> {
        let bytes = encode(model)?;
        *self.bytes.write() = Some(bytes);
        Ok(())
    }

    fn load(&self) -> RecResult<LoadOutcome> {
        match self.bytes.read().as_deref() {
            Some(bytes) => Ok(LoadOutcome::Loaded(decode(bytes, Path::new("<memory>"))?)),
            None => Ok(LoadOutcome::NotFound),
        }
    }
}
