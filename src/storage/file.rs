//! Directory-backed storage, one checksummed file per key.

use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

use super::Storage;

/// Magic bytes for item files.
const ITEM_MAGIC: &[u8; 4] = b"FBK\0";

/// Current item format version.
const ITEM_VERSION: u8 = 1;

/// File storage configuration.
#[derive(Clone, Debug)]
pub struct FileStorageConfig {
    /// Directory holding the item files.
    pub path: PathBuf,

    /// Read cache size (number of keys).
    pub cache_size: usize,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./form-backups"),
            cache_size: 64,
            create_if_missing: true,
        }
    }
}

/// [`Storage`] that keeps each key in its own file.
///
/// File names are the SHA-256 of the key, so any key is a valid name.
/// Layout: magic, version, key length (u16) and key, value length (u64)
/// and value, CRC32 of the value. Writes go to a temporary file that is
/// renamed into place. The directory is locked for the lifetime of the
/// storage so only one process writes to it.
pub struct FileStorage {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Recently read values (None = known absent).
    cache: Mutex<LruCache<String, Option<String>>>,
}

impl FileStorage {
    /// Open the storage directory, creating it if configured to.
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(BackupError::StorageUnavailable(format!(
                    "{} does not exist",
                    config.path.display()
                )));
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        let cache_size = NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the file holding `key`.
    pub fn item_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.path.join(format!("{}.item", hex::encode(digest)))
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| BackupError::Locked)?;

        Ok(lock_file)
    }

    fn encode(key: &str, value: &str) -> Result<Vec<u8>> {
        let key_bytes = key.as_bytes();
        let key_len = u16::try_from(key_bytes.len())
            .map_err(|_| BackupError::InvalidFormat(format!("key too long: {} bytes", key_bytes.len())))?;
        let value_bytes = value.as_bytes();

        let mut buf = Vec::with_capacity(4 + 1 + 2 + key_bytes.len() + 8 + value_bytes.len() + 4);
        buf.extend_from_slice(ITEM_MAGIC);
        buf.push(ITEM_VERSION);
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(key_bytes);
        buf.extend_from_slice(&(value_bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(value_bytes);
        buf.extend_from_slice(&crc32fast::hash(value_bytes).to_le_bytes());
        Ok(buf)
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<String> {
        let mut reader = Reader { bytes, pos: 0 };

        if reader.take(4)? != ITEM_MAGIC {
            return Err(BackupError::InvalidFormat("Invalid item magic".into()));
        }
        let version = reader.take(1)?[0];
        if version != ITEM_VERSION {
            return Err(BackupError::InvalidFormat(format!(
                "Unsupported item version: {}",
                version
            )));
        }

        let key_len = u16::from_le_bytes(reader.array()?) as usize;
        if reader.take(key_len)? != key.as_bytes() {
            return Err(BackupError::InvalidFormat("Item key mismatch".into()));
        }

        let value_len = u64::from_le_bytes(reader.array()?) as usize;
        let value = reader.take(value_len)?;

        let stored_checksum = u32::from_le_bytes(reader.array()?);
        let computed_checksum = crc32fast::hash(value);
        if stored_checksum != computed_checksum {
            return Err(BackupError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        String::from_utf8(value.to_vec())
            .map_err(|e| BackupError::InvalidFormat(format!("Item value is not UTF-8: {}", e)))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| BackupError::InvalidFormat("Truncated item file".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.lock().get(key).cloned() {
            return Ok(cached);
        }

        let item_path = self.item_path(key);
        let value = if item_path.exists() {
            Some(Self::decode(key, &fs::read(&item_path)?)?)
        } else {
            None
        };

        self.cache.lock().put(key.to_string(), value.clone());
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let encoded = Self::encode(key, value)?;
        let item_path = self.item_path(key);
        let tmp_path = item_path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &item_path)?;

        self.cache
            .lock()
            .put(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.cache.lock().put(key.to_string(), None);

        let item_path = self.item_path(key);
        if item_path.exists() {
            fs::remove_file(&item_path)?;
        }
        Ok(())
    }
}
