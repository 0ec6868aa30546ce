//! Content hashing for transfer verification
//!
//! Two digests are used by the pipeline:
//!
//! - the chunked content hash ([`ContentHasher`]): the stream is split into 4 MiB
//!   blocks, each block is hashed with SHA-256, and the concatenated block digests are
//!   hashed again with SHA-256. This is the value the remote store reports for every
//!   file, so it is what downloads are verified against.
//! - a plain SHA-256 over the whole file, recorded in the manifest for auditing.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::constants::hashing::{BLOCK_SIZE, HEX_DIGEST_LEN, READ_CHUNK_SIZE};
use crate::errors::{HashError, HashResult};

/// SHA-256 digest stored as its raw 32 bytes
///
/// Displays and serializes as a lowercase 64-character hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Parse a 64-character hex string (case insensitive)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use archive_transfer::app::Sha256Digest;
    ///
    /// let digest = Sha256Digest::from_hex(
    ///     "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855",
    /// )?;
    /// assert_eq!(
    ///     digest.to_hex(),
    ///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// # Ok::<(), archive_transfer::errors::HashError>(())
    /// ```
    pub fn from_hex(hex_str: &str) -> HashResult<Self> {
        if hex_str.len() != HEX_DIGEST_LEN {
            return Err(HashError::InvalidHex {
                hash: hex_str.to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes).map_err(|_| HashError::InvalidHex {
            hash: hex_str.to_string(),
        })?;
        Ok(Sha256Digest(bytes))
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Sha256Digest(bytes)
    }

    /// Plain (single-level) SHA-256 of a byte slice
    pub fn of(data: &[u8]) -> Self {
        Sha256Digest(Sha256::digest(data).into())
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Sha256Digest {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Incremental two-level content hasher
///
/// Callers may feed the stream in chunks of any size; block boundaries are tracked
/// internally, so the result only depends on the bytes, never on how they were split.
/// Once [`digest`](Self::digest) or [`hex_digest`](Self::hex_digest) has been called
/// the hasher is finalized and every further call fails with [`HashError::Finalized`].
///
/// `Clone` copies the complete mid-stream state, so a partially fed hasher can be
/// branched and both copies finalized independently.
///
/// # Examples
///
/// ```rust
/// use archive_transfer::app::ContentHasher;
///
/// let mut hasher = ContentHasher::new();
/// hasher.update(b"hel")?;
/// hasher.update(b"lo")?;
/// assert_eq!(
///     hasher.hex_digest()?,
///     "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
/// );
/// assert!(hasher.update(b"more").is_err());
/// # Ok::<(), archive_transfer::errors::HashError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContentHasher {
    overall: Option<Sha256>,
    block: Sha256,
    block_pos: usize,
}

impl ContentHasher {
    /// Create an empty hasher
    pub fn new() -> Self {
        Self {
            overall: Some(Sha256::new()),
            block: Sha256::new(),
            block_pos: 0,
        }
    }

    /// Feed the next chunk of the stream
    pub fn update(&mut self, data: &[u8]) -> HashResult<()> {
        let overall = self.overall.as_mut().ok_or(HashError::Finalized)?;

        let mut remaining = data;
        while !remaining.is_empty() {
            // A full block is only folded in once more data arrives, so an
            // exactly aligned stream never produces an empty trailing block.
            if self.block_pos == BLOCK_SIZE {
                overall.update(self.block.finalize_reset());
                self.block_pos = 0;
            }

            let space_in_block = BLOCK_SIZE - self.block_pos;
            let take = space_in_block.min(remaining.len());
            let (part, rest) = remaining.split_at(take);
            self.block.update(part);
            self.block_pos += part.len();
            remaining = rest;
        }

        Ok(())
    }

    /// Finalize and return the raw digest
    pub fn digest(&mut self) -> HashResult<Sha256Digest> {
        let mut overall = self.overall.take().ok_or(HashError::Finalized)?;
        if self.block_pos > 0 {
            overall.update(self.block.finalize_reset());
            self.block_pos = 0;
        }
        Ok(Sha256Digest(overall.finalize().into()))
    }

    /// Finalize and return the lowercase hex digest
    pub fn hex_digest(&mut self) -> HashResult<String> {
        self.digest().map(|digest| digest.to_hex())
    }

    /// Whether the digest has already been taken
    pub fn is_finalized(&self) -> bool {
        self.overall.is_none()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the chunked content hash of a slice in one call
pub fn content_hash(data: &[u8]) -> Sha256Digest {
    let mut overall = Sha256::new();
    for block in data.chunks(BLOCK_SIZE) {
        overall.update(Sha256::digest(block));
    }
    Sha256Digest(overall.finalize().into())
}

/// Compute the chunked content hash of a local file
pub async fn content_hash_file(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut hasher = ContentHasher::new();
    read_chunks(path, |chunk| {
        hasher
            .update(chunk)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    })
    .await?;
    let digest = hasher
        .digest()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    debug!("Content hash generated for {}", path.display());
    Ok(digest)
}

/// Compute the plain SHA-256 of a local file
pub async fn sha256_file(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    read_chunks(path, |chunk| {
        hasher.update(chunk);
        Ok(())
    })
    .await?;

    debug!("SHA-256 generated for {}", path.display());
    Ok(Sha256Digest(hasher.finalize().into()))
}

async fn read_chunks<F>(path: &Path, mut sink: F) -> std::io::Result<()>
where
    F: FnMut(&[u8]) -> std::io::Result<()>,
{
    let mut file = File::open(path).await?;
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        sink(&buffer[..n])?;
    }
    Ok(())
}
