//! Single-file key-value store
//!
//! File format:
//! ```text
//! [HEADER: 64 bytes]
//!   - magic: 8 bytes ("SPARSEMT")
//!   - version: 4 bytes (u32 LE)
//!   - flags: 4 bytes
//!   - entry_count: 8 bytes (u64 LE)
//!   - index_offset: 8 bytes (u64 LE)
//!   - refs_offset: 8 bytes (u64 LE)
//!   - refs_count: 8 bytes (u64 LE)
//!   - reserved: 16 bytes
//!
//! [RECORDS: variable]
//!   - encoded records, concatenated
//!
//! [INDEX: variable]
//!   - (key_len u16, key, offset u64, size u32) per live key, sorted by key
//!
//! [REFS: variable]
//!   - (name_len u16, name, hash 32 bytes) per ref, sorted by name
//! ```
//!
//! The index lives in memory and is only written by [`FileStore::sync`].
//! Overwritten and deleted records stay in the file as dead space.

use super::record::Record;
use super::KvStore;
use crate::model::Hash;
use crate::{Error, Result, MAGIC, VERSION};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

const HEADER_SIZE: u64 = 64;

/// Tuning knobs for record encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// zstd compression level
    pub compression_level: i32,
    /// Records smaller than this many bytes are stored uncompressed
    pub compression_threshold: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            compression_level: 3,
            compression_threshold: 256,
        }
    }
}

/// Index entry for a live key
#[derive(Clone, Debug)]
struct IndexEntry {
    offset: u64,
    size: u32,
}

/// A key-value store backed by a single file, with a small table of named
/// refs used to persist root digests.
pub struct FileStore {
    /// Path to the database file
    path: PathBuf,
    /// The file handle
    file: RwLock<File>,
    /// In-memory index
    index: RwLock<HashMap<Vec<u8>, IndexEntry>>,
    /// Refs (name → root hash)
    refs: RwLock<HashMap<String, Hash>>,
    /// Current append position
    write_offset: RwLock<u64>,
    options: StoreOptions,
}

impl FileStore {
    /// Create a new store file, truncating any existing one
    pub fn create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        // Write header
        let mut header = [0u8; HEADER_SIZE as usize];
        header[0..8].copy_from_slice(MAGIC);
        header[8..12].copy_from_slice(&VERSION.to_le_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
            write_offset: RwLock::new(HEADER_SIZE),
            options,
        })
    }

    /// Open an existing store file
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..8] != MAGIC {
            return Err(Error::InvalidFile("Invalid magic bytes".into()));
        }

        let version = le_u32(&header[8..12]);
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let entry_count = le_u64(&header[16..24]);
        let index_offset = le_u64(&header[24..32]);
        let refs_offset = le_u64(&header[32..40]);
        let refs_count = le_u64(&header[40..48]);

        // Load index if it exists
        let mut index = HashMap::new();
        if index_offset > 0 && entry_count > 0 {
            file.seek(SeekFrom::Start(index_offset))?;
            for _ in 0..entry_count {
                let key = read_prefixed(&mut file)?;

                let mut entry_buf = [0u8; 12];
                file.read_exact(&mut entry_buf)?;
                let offset = le_u64(&entry_buf[0..8]);
                let size = le_u32(&entry_buf[8..12]);

                index.insert(key, IndexEntry { offset, size });
            }
        }

        // Load refs
        let mut refs = HashMap::new();
        if refs_offset > 0 && refs_count > 0 {
            file.seek(SeekFrom::Start(refs_offset))?;
            for _ in 0..refs_count {
                let name = String::from_utf8_lossy(&read_prefixed(&mut file)?).to_string();

                let mut hash_buf = [0u8; 32];
                file.read_exact(&mut hash_buf)?;
                refs.insert(name, Hash::from_bytes(hash_buf));
            }
        }

        // Calculate write offset (end of records, before index)
        let write_offset = if index_offset > 0 {
            index_offset
        } else {
            file.seek(SeekFrom::End(0))?
        };

        trace!(path = %path.display(), entries = index.len(), refs = refs.len(), "opened store");

        Ok(FileStore {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            refs: RwLock::new(refs),
            write_offset: RwLock::new(write_offset),
            options,
        })
    }

    /// Open or create a store file
    pub fn open_or_create(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path, options)
        } else {
            Self::create(path, options)
        }
    }

    /// Check if a key exists
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.read().contains_key(key)
    }

    /// Number of live keys
    pub fn entry_count(&self) -> usize {
        self.index.read().len()
    }

    // === Ref Management ===

    /// Get the hash stored under a ref
    pub fn get_ref(&self, name: &str) -> Option<Hash> {
        self.refs.read().get(name).copied()
    }

    /// Point a ref at a hash
    pub fn set_ref(&self, name: &str, hash: Hash) {
        self.refs.write().insert(name.to_string(), hash);
    }

    /// Delete a ref
    pub fn remove_ref(&self, name: &str) -> Result<()> {
        self.refs
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::RefNotFound(name.to_string()))
    }

    /// List all refs, sorted by name
    pub fn list_refs(&self) -> Vec<(String, Hash)> {
        let mut refs: Vec<_> = self
            .refs
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        refs.sort();
        refs
    }

    /// Flush the index and refs to disk
    pub fn sync(&self) -> Result<()> {
        let index = self.index.read();
        let refs = self.refs.read();
        let write_offset = *self.write_offset.read();
        let mut file = self.file.write();

        // Sort for determinism
        let mut entries: Vec<_> = index.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut ref_list: Vec<_> = refs.iter().collect();
        ref_list.sort_by(|a, b| a.0.cmp(b.0));

        let mut tail = Vec::new();
        for (key, entry) in &entries {
            write_prefixed(&mut tail, key)?;
            tail.extend_from_slice(&entry.offset.to_le_bytes());
            tail.extend_from_slice(&entry.size.to_le_bytes());
        }
        let refs_offset = write_offset + tail.len() as u64;
        for (name, hash) in &ref_list {
            write_prefixed(&mut tail, name.as_bytes())?;
            tail.extend_from_slice(hash.as_bytes());
        }

        file.seek(SeekFrom::Start(write_offset))?;
        file.write_all(&tail)?;
        file.set_len(write_offset + tail.len() as u64)?;

        // Update header
        file.seek(SeekFrom::Start(16))?;
        file.write_all(&(entries.len() as u64).to_le_bytes())?;
        file.write_all(&write_offset.to_le_bytes())?;
        file.write_all(&refs_offset.to_le_bytes())?;
        file.write_all(&(ref_list.len() as u64).to_le_bytes())?;

        file.sync_all()?;
        trace!(entries = entries.len(), refs = ref_list.len(), "synced store");
        Ok(())
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .index
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(hex::encode(key)))?;

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(entry.offset))?;

        let mut data = vec![0u8; entry.size as usize];
        file.read_exact(&mut data)?;

        Ok(Record::decode(&data)?.data)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > u16::MAX as usize {
            return Err(Error::InvalidFile(format!(
                "key of {} bytes exceeds the index limit",
                key.len()
            )));
        }

        // Identical rewrite
        if self.index.read().contains_key(key) && self.get(key)? == value {
            return Ok(());
        }

        let encoded = Record::new(value.to_vec()).encode(
            self.options.compression_level,
            self.options.compression_threshold,
        )?;
        let size = u32::try_from(encoded.len())
            .map_err(|_| Error::InvalidFile(format!("record of {} bytes is too large", encoded.len())))?;

        let offset = {
            let mut write_offset = self.write_offset.write();
            let offset = *write_offset;

            let mut file = self.file.write();
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&encoded)?;

            *write_offset = offset + size as u64;
            offset
        };

        self.index
            .write()
            .insert(key.to_vec(), IndexEntry { offset, size });
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.index
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(hex::encode(key)))
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        if let Err(e) = self.sync() {
            warn!(path = %self.path.display(), error = %e, "failed to sync store on drop");
        }
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("entries", &self.entry_count())
            .finish()
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Read a u16-length-prefixed byte string
fn read_prefixed(file: &mut File) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    file.read_exact(&mut len_buf)?;
    let mut bytes = vec![0u8; u16::from_le_bytes(len_buf) as usize];
    file.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn write_prefixed(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| Error::InvalidFile(format!("{} bytes exceed the u16 length prefix", bytes.len())))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}
