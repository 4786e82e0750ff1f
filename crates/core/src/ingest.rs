use crate::error::{ConfigError, ExtractionError};
use crate::models::SourceDocument;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// PDF files directly inside `folder`, sorted by file name.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|error| ConfigError::InvalidInputDir {
            path: folder.to_path_buf(),
            reason: error.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.into_path());
        }
    }

    files.sort_unstable_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, ExtractionError> {
    let bytes = fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn describe_document(path: &Path) -> Result<SourceDocument, ExtractionError> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ExtractionError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })?;

    Ok(SourceDocument {
        filename,
        source_path: path.to_path_buf(),
        checksum: digest_file(path)?,
    })
}
