//! File digests used to verify downloaded assets.
//!
//! Nexus reports several checksums per asset; the algorithm name doubles as
//! the key into the asset's checksum map. Digests are computed on demand by
//! re-reading the file, never inline with the transfer.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithms understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Key used by the repository's checksum map (e.g. `"md5"`).
    pub fn key(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Stream a file through the digest. Returns lowercase hex and the number of bytes read.
    pub fn digest_path(&self, path: &Path) -> io::Result<(String, u64)> {
        let mut f = File::open(path)?;
        match self {
            ChecksumAlgorithm::Md5 => digest_reader::<Md5>(&mut f),
            ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(&mut f),
            ChecksumAlgorithm::Sha512 => digest_reader::<Sha512>(&mut f),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" => Ok(ChecksumAlgorithm::Sha512),
            other => Err(format!("unsupported checksum algorithm: {}", other)),
        }
    }
}

/// Reads in chunks to keep memory use bounded; suitable for large files.
fn digest_reader<D: Digest>(reader: &mut impl Read) -> io::Result<(String, u64)> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

/// Compute MD5 of a file as lowercase hex.
pub fn md5_path(path: &Path) -> io::Result<String> {
    ChecksumAlgorithm::Md5.digest_path(path).map(|(hex, _)| hex)
}
