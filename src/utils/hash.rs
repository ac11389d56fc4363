use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;

/// Bytes read per chunk while folding a file into its digest.
pub const CHUNK_SIZE: usize = 65536;

/// Content digest algorithm used to fingerprint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256, 64 hex characters.
    #[default]
    Sha256,
    /// xxHash3-128, 32 hex characters. Fast but not cryptographic.
    Xxh3,
}

impl DigestAlgorithm {
    /// Configuration name of the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Xxh3 => "xxh3",
        }
    }
}

impl std::str::FromStr for DigestAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "xxh3" => Ok(Self::Xxh3),
            other => Err(anyhow::anyhow!("Unknown hash algorithm: {other}")),
        }
    }
}

/// A file that could not be read while hashing.
///
/// This is a value, not a failure of the scan: the file is left out of the
/// state and the caller turns it into a log event.
#[derive(Debug)]
pub struct Unreadable {
    /// File that failed.
    pub path: PathBuf,
    /// Underlying I/O error.
    pub source: io::Error,
}

impl std::fmt::Display for Unreadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

/// Hash a byte slice with the given algorithm.
#[must_use]
pub fn hash_bytes(data: &[u8], algorithm: DigestAlgorithm) -> String {
    match algorithm {
        DigestAlgorithm::Sha256 => format!("{:x}", Sha256::digest(data)),
        DigestAlgorithm::Xxh3 => format!("{:032x}", xxhash_rust::xxh3::xxh3_128(data)),
    }
}

/// Stream a file through the digest in [`CHUNK_SIZE`] pieces.
///
/// Never loads the whole file. Any I/O error (permission denied, file gone
/// mid-read, sharing violation) is returned as [`Unreadable`]; the caller
/// reports it, so it is only traced at debug level here.
pub fn hash_file(path: &Path, algorithm: DigestAlgorithm) -> Result<String, Unreadable> {
    hash_file_streaming(path, algorithm).map_err(|source| {
        tracing::debug!("can not access this file {}: {source}", path.display());
        Unreadable {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn hash_file_streaming(path: &Path, algorithm: DigestAlgorithm) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    match algorithm {
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            fold_chunks(&mut file, &mut buffer, |chunk| hasher.update(chunk))?;
            Ok(format!("{:x}", hasher.finalize()))
        }
        DigestAlgorithm::Xxh3 => {
            let mut hasher = Xxh3::new();
            fold_chunks(&mut file, &mut buffer, |chunk| hasher.update(chunk))?;
            Ok(format!("{:032x}", hasher.digest128()))
        }
    }
}

fn fold_chunks<R, F>(reader: &mut R, buffer: &mut [u8], mut update: F) -> io::Result<()>
where
    R: Read,
    F: FnMut(&[u8]),
{
    loop {
        let bytes_read = match reader.read(buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        update(&buffer[..bytes_read]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unreadable_file_is_silent_at_warn_level() -> Result<()> {
        let dir = tempdir()?;
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            hash_file(&dir.path().join("missing.txt"), DigestAlgorithm::Sha256)
        });

        let err = result.unwrap_err();
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
        assert!(captured.0.lock().unwrap().is_empty());
        Ok(())
    }

    #[test]
    fn test_hash_bytes() {
        let data = b"Hello, World!";
        let hash1 = hash_bytes(data, DigestAlgorithm::Sha256);
        let hash2 = hash_bytes(data, DigestAlgorithm::Sha256);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);

        let hash3 = hash_bytes(b"Different data", DigestAlgorithm::Sha256);
        assert_ne!(hash1, hash3);

        assert_eq!(hash_bytes(data, DigestAlgorithm::Xxh3).len(), 32);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hash_bytes(b"", DigestAlgorithm::Sha256),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_file_matches_bytes() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        std::fs::write(&file_path, "Test content for hashing")?;

        for algorithm in [DigestAlgorithm::Sha256, DigestAlgorithm::Xxh3] {
            let streamed = hash_file(&file_path, algorithm).map_err(|e| e.source)?;
            assert_eq!(streamed, hash_bytes(b"Test content for hashing", algorithm));
        }

        Ok(())
    }

    #[test]
    fn test_hash_file_spanning_chunks() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&file_path, &content)?;

        let streamed = hash_file(&file_path, DigestAlgorithm::Sha256).map_err(|e| e.source)?;
        assert_eq!(streamed, hash_bytes(&content, DigestAlgorithm::Sha256));

        Ok(())
    }

    #[test]
    fn test_hash_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.txt");

        let err = hash_file(&missing, DigestAlgorithm::Sha256).unwrap_err();
        assert_eq!(err.path, missing);
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("SHA256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!("xxh3".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Xxh3);
        assert!("md5".parse::<DigestAlgorithm>().is_err());
    }
}
