use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::types::Chunk;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Splits shared file content into fixed-size chunks with SHA-256 checksums.
pub struct ChunkReader {
    content: Arc<[u8]>,
    chunk_size: usize,
    offset: u64,
    key: String,
}

impl ChunkReader {
    /// Creates a reader over `content` destined for `key`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(content: Arc<[u8]>, key: &str, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            content,
            chunk_size,
            offset: 0,
            key: key.to_string(),
        }
    }

    /// Moves to the given byte offset (for resume). Clamped to the content size.
    pub fn seek_to(&mut self, offset: u64) {
        self.offset = offset.min(self.file_size());
    }

    /// Returns the next chunk, or `None` once all content has been read.
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }

        let size = std::cmp::min(remaining as usize, self.chunk_size);
        let start = self.offset as usize;
        let data = self.content[start..start + size].to_vec();

        let chunk = Chunk {
            offset: self.offset,
            size,
            checksum: checksum_bytes(&data),
            data,
            key: self.key.clone(),
        };
        self.offset += size as u64;
        Some(chunk)
    }

    /// Destination key the chunks are tagged with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total content size in bytes.
    pub fn file_size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size() - self.offset
    }

    /// Returns `true` when the next chunk would be the last one.
    pub fn is_last_chunk(&self) -> bool {
        self.remaining() <= self.chunk_size as u64
    }
}

// ---------------------------------------------------------------------------
// ChunkWriter
// ---------------------------------------------------------------------------

/// Writes chunks to disk at exact offsets with optional checksum verification.
pub struct ChunkWriter {
    base_path: PathBuf,
    written: HashMap<String, u64>,
}

impl ChunkWriter {
    /// Creates a writer rooted at `base_path`.
    pub fn new(base_path: &Path) -> Self {
        Self {
            base_path: base_path.to_path_buf(),
            written: HashMap::new(),
        }
    }

    /// Writes a chunk to disk.
    ///
    /// - Rejects keys that would escape `base_path`.
    /// - Verifies checksum if non-empty.
    /// - Creates intermediate directories as needed.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<(), TransferError> {
        crate::validate_destination_key(&chunk.key)?;

        if !chunk.checksum.is_empty() && checksum_bytes(&chunk.data) != chunk.checksum {
            return Err(TransferError::ChecksumMismatch);
        }

        let full_path = self.base_path.join(&chunk.key);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&full_path)?;
        file.seek(SeekFrom::Start(chunk.offset))?;
        file.write_all(&chunk.data)?;

        self.written
            .insert(chunk.key.clone(), chunk.offset + chunk.data.len() as u64);
        Ok(())
    }

    /// Creates an empty blob for `key` (zero-byte uploads have no chunks).
    pub fn touch(&mut self, key: &str) -> Result<(), TransferError> {
        crate::validate_destination_key(key)?;
        let full_path = self.base_path.join(key);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&full_path)?;
        self.written.insert(key.to_string(), 0);
        Ok(())
    }

    /// Deletes whatever has been written for `key`.
    pub fn discard(&mut self, key: &str) -> Result<(), TransferError> {
        crate::validate_destination_key(key)?;
        self.written.remove(key);
        match std::fs::remove_file(self.base_path.join(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the last written byte offset for `key` (0 if never written).
    pub fn written_offset(&self, key: &str) -> u64 {
        self.written.get(key).copied().unwrap_or(0)
    }

    /// Returns the base output path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
