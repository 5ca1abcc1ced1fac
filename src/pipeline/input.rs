//! Input resolution: turn a user-supplied path, URL or byte buffer into a
//! local PDF file.
//!
//! pdfium opens documents from the file system, so URL downloads and
//! uploaded bytes are written to a temp location that is cleaned up when
//! [`ResolvedInput`] is dropped. The `%PDF` magic is checked before
//! returning so callers get [`ExtractError::NotAPdf`] instead of a pdfium
//! parse error.

use crate::error::ExtractError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path, or a temp file we own.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF lives in a temp directory kept alive here.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input was an in-memory buffer written to a temp file.
    Buffered(NamedTempFile),
}

impl ResolvedInput {
    /// Path to the PDF regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Buffered(file) => file.path(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Verify `bytes` starts with `%PDF`. `origin` names the source in errors.
pub fn check_pdf_magic(bytes: &[u8], origin: &Path) -> Result<(), ExtractError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ExtractError::NotAPdf {
            path: origin.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    if input.trim().is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Write `bytes` to a managed temp file after checking the PDF magic.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, ExtractError> {
    check_pdf_magic(bytes, Path::new("<upload>"))?;

    let mut tmp = NamedTempFile::new()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;

    debug!("Buffered {} bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Buffered(tmp))
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut head = Vec::with_capacity(4);
            Read::take(&mut f, 4)
                .read_to_end(&mut head)
                .map_err(|e| ExtractError::Internal(format!("read {}: {e}", path.display())))?;
            check_pdf_magic(&head, &path)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    check_pdf_magic(&bytes, &file_path)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment when it looks like a file name, else `statement.pdf`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "statement.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/stmt.pdf"));
        assert!(is_url("http://example.com/stmt.pdf"));
        assert!(!is_url("/tmp/stmt.pdf"));
        assert!(!is_url("stmt.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://x.test/a/q3-2024.pdf"), "q3-2024.pdf");
        assert_eq!(filename_from_url("https://x.test/download"), "statement.pdf");
        assert_eq!(filename_from_url("https://x.test/"), "statement.pdf");
    }

    #[test]
    fn magic_check() {
        let origin = Path::new("x");
        assert!(check_pdf_magic(b"%PDF-1.7\n", origin).is_ok());
        assert!(matches!(
            check_pdf_magic(b"PK\x03\x04rest", origin),
            Err(ExtractError::NotAPdf { magic, .. }) if &magic == b"PK\x03\x04"
        ));
        assert!(check_pdf_magic(b"%P", origin).is_err());
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_input("  ", 5).await.err().expect("should fail");
        assert!(matches!(err, ExtractError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, ExtractError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn local_pdf_accepted() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%fake").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), f.path());
    }

    #[tokio::test]
    async fn local_file_shorter_than_magic_rejected() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5)
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, ExtractError::NotAPdf { magic, .. } if magic == *b"%P\0\0"));
    }

    #[test]
    fn bytes_are_buffered_to_disk() {
        let resolved = resolve_bytes(b"%PDF-1.4\n%fake").unwrap();
        let on_disk = std::fs::read(resolved.path()).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4\n%fake");
    }

    #[test]
    fn bytes_without_magic_rejected() {
        assert!(matches!(
            resolve_bytes(b"<html>"),
            Err(ExtractError::NotAPdf { .. })
        ));
    }
}
