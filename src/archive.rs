//! Downloading and unpacking toolchain archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use crate::error::ToolchainError;

/// Fetches a remote file to a local path.
///
/// The toolchain fetcher only talks to the network through this trait.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), ToolchainError>;
}

/// Downloads over HTTP(S) with a blocking client.
#[derive(Debug, Default)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), ToolchainError> {
        let failed = |message: String| ToolchainError::Download {
            url: url.to_string(),
            message,
        };
        info!("Downloading {url}");
        let mut response = self.client
            .get(url)
            .header("User-Agent", "compiler-release")
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        // Stream into a sibling temp file so an interrupted download never looks complete.
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut partial = tempfile::NamedTempFile::new_in(dir)?;
        response.copy_to(partial.as_file_mut()).map_err(|e| failed(e.to_string()))?;
        partial.persist(dest).map_err(|e| e.error)?;
        debug!("saved {}", dest.display());
        Ok(())
    }
}

/// Computes the hex encoded sha256 of a file.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fails unless the digest of `path` equals `expected` (case-insensitive).
pub fn verify_digest(path: &Path, expected: &str) -> Result<(), ToolchainError> {
    let actual = sha256_file(path)?;
    let expected = expected.trim().to_ascii_lowercase();
    if actual != expected {
        return Err(ToolchainError::DigestMismatch { expected, actual });
    }
    Ok(())
}

/// Unpacks `archive` into `dest`, choosing the format from the file name.
///
/// Supports `.tar.gz`/`.tgz` and `.zip`.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), ToolchainError> {
    let failed = |message: String| ToolchainError::Extract {
        archive: archive.to_path_buf(),
        message,
    };
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    std::fs::create_dir_all(dest)?;
    info!("Extracting {} into {}", archive.display(), dest.display());

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = File::open(archive)?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_preserve_permissions(true);
        tar.unpack(dest).map_err(|e| failed(e.to_string()))
    } else if name.ends_with(".zip") {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| failed(e.to_string()))?;
        zip.extract(dest).map_err(|e| failed(e.to_string()))
    } else {
        Err(failed(String::from("unknown archive format")))
    }
}
