//! Voice file integrity verification.
//!
//! The voice catalog lists the size and MD5 digest of every file. A cached
//! file only counts as present when both match, so a truncated or replaced
//! download is fetched again instead of failing inside ONNX Runtime.
//!
//! # Example
//!
//! ```rust
//! use piper_bench::model_integrity::{verify, IntegrityResult};
//! use std::path::Path;
//!
//! let result = verify(Path::new("/nonexistent/voice.onnx"), None, None);
//! assert_eq!(result, IntegrityResult::Missing);
//! ```

use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Result of a voice file integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityResult {
    /// File exists and matches the expected size and digest.
    Ok,
    /// File does not exist at the given path.
    Missing,
    /// File exists but its length differs from the catalog.
    SizeMismatch,
    /// File exists but its MD5 digest does not match the expected value.
    Corrupt,
    /// File exists but no expected digest was provided; only the size was checked.
    NoChecksum,
}

impl IntegrityResult {
    /// Whether the file can be used without downloading it again.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ok | Self::NoChecksum)
    }
}

impl fmt::Display for IntegrityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Missing => write!(f, "missing"),
            Self::SizeMismatch => write!(f, "size_mismatch"),
            Self::Corrupt => write!(f, "corrupt"),
            Self::NoChecksum => write!(f, "no_checksum"),
        }
    }
}

/// Verify a voice file against an optional expected size and MD5 hex digest.
///
/// The size is compared first so that obviously wrong files are rejected
/// without hashing hundreds of megabytes.
pub fn verify(
    path: &Path,
    expected_size: Option<u64>,
    expected_md5: Option<&str>,
) -> IntegrityResult {
    let meta = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => {
            debug!(path = %path.display(), "voice integrity: file missing");
            return IntegrityResult::Missing;
        }
    };

    if let Some(size) = expected_size
        && meta.len() != size
    {
        warn!(
            path = %path.display(),
            expected = size,
            actual = meta.len(),
            "voice integrity: size mismatch"
        );
        return IntegrityResult::SizeMismatch;
    }

    let Some(expected) = expected_md5 else {
        return IntegrityResult::NoChecksum;
    };

    match md5_hex(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => {
            debug!(path = %path.display(), "voice integrity: checksum ok");
            IntegrityResult::Ok
        }
        Ok(actual) => {
            warn!(
                path = %path.display(),
                expected,
                actual = %actual,
                "voice integrity: checksum mismatch"
            );
            IntegrityResult::Corrupt
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "voice integrity: failed to read file for checksum"
            );
            IntegrityResult::Corrupt
        }
    }
}

/// Compute the MD5 hex digest of a file's contents in 64 KiB chunks.
pub fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; 65_536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}
