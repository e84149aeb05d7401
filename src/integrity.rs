//! Payload integrity check against the descriptor's declared MD5 digest.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Result of comparing a payload against its declared digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCheck {
    pub declared: String,
    pub computed: String,
}

impl DigestCheck {
    /// Hex digests are compared case-insensitively.
    pub fn matches(&self) -> bool {
        self.declared.eq_ignore_ascii_case(&self.computed)
    }
}

/// Compute the lowercase hex MD5 of the file at `path`, streaming it in chunks.
pub fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0_u8; READ_BUFFER_BYTES];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(to_hex_lowercase(&hasher.finalize()))
}

/// Recompute the payload digest and pair it with the declared one.
///
/// Runs on the blocking pool; callers must not relocate the payload until this
/// returns.
pub async fn verify(payload: PathBuf, declared: String) -> io::Result<DigestCheck> {
    let computed = tokio::task::spawn_blocking(move || md5_hex(&payload))
        .await
        .map_err(io::Error::other)??;
    Ok(DigestCheck { declared, computed })
}

fn to_hex_lowercase(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
