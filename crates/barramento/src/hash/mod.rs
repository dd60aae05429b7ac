//! Content digests for package files and whole packages.
//!
//! A directory digest is computed in two levels: every regular file under
//! the directory is hashed on its own, the hex digests are sorted, and the
//! concatenation of the sorted list is hashed once more with the same
//! algorithm. The result depends only on file contents, never on the order
//! in which the filesystem enumerates entries.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest;
use walkdir::WalkDir;

use crate::error::HashError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Name used in the METS `CHECKSUMTYPE` attribute.
    pub fn mets_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha224 => 56,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Hashes an in-memory buffer.
    pub fn digest_bytes(&self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => hex_digest::<md5::Md5>(data),
            HashAlgorithm::Sha1 => hex_digest::<sha1::Sha1>(data),
            HashAlgorithm::Sha224 => hex_digest::<sha2::Sha224>(data),
            HashAlgorithm::Sha256 => hex_digest::<sha2::Sha256>(data),
            HashAlgorithm::Sha384 => hex_digest::<sha2::Sha384>(data),
            HashAlgorithm::Sha512 => hex_digest::<sha2::Sha512>(data),
        }
    }

    fn digest_reader<R: Read>(&self, reader: R) -> std::io::Result<String> {
        match self {
            HashAlgorithm::Md5 => stream_digest::<md5::Md5, _>(reader),
            HashAlgorithm::Sha1 => stream_digest::<sha1::Sha1, _>(reader),
            HashAlgorithm::Sha224 => stream_digest::<sha2::Sha224, _>(reader),
            HashAlgorithm::Sha256 => stream_digest::<sha2::Sha256, _>(reader),
            HashAlgorithm::Sha384 => stream_digest::<sha2::Sha384, _>(reader),
            HashAlgorithm::Sha512 => stream_digest::<sha2::Sha512, _>(reader),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        HashAlgorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| HashError::UnsupportedAlgorithm(s.to_string()))
    }
}

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    to_hex(&D::digest(data))
}

fn stream_digest<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Computes the hex digest of a single file.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String, HashError> {
    if !path.is_file() {
        return Err(HashError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| HashError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    algorithm
        .digest_reader(BufReader::new(file))
        .map_err(|e| HashError::Read {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Computes the order-independent digest of every file under `path`.
pub fn hash_directory(path: &Path, algorithm: HashAlgorithm) -> Result<String, HashError> {
    if !path.is_dir() {
        return Err(HashError::DirectoryNotFound(path.to_path_buf()));
    }

    let files = list_files(path)?;
    if files.is_empty() {
        return Err(HashError::NoFilesFound(path.to_path_buf()));
    }

    let mut digests = files
        .iter()
        .map(|file| hash_file(file, algorithm))
        .collect::<Result<Vec<_>, _>>()?;
    digests.sort();

    Ok(algorithm.digest_bytes(digests.concat().as_bytes()))
}

/// Recomputes the digest of a file or directory and compares it to
/// `expected`, ignoring case.
pub fn verify(path: &Path, expected: &str, algorithm: HashAlgorithm) -> Result<bool, HashError> {
    let actual = if path.is_dir() {
        hash_directory(path, algorithm)?
    } else {
        hash_file(path, algorithm)?
    };
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

/// All regular files below `root`, recursively.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, HashError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| HashError::Walk {
            path: root.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Total size in bytes of every regular file below `root`.
pub fn directory_size(root: &Path) -> Result<u64, HashError> {
    let mut total = 0u64;
    for file in list_files(root)? {
        let meta = std::fs::metadata(&file).map_err(|e| HashError::Read {
            path: file.clone(),
            source: e,
        })?;
        total += meta.len();
    }
    Ok(total)
}

/// Human-readable size with binary units, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", size);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
