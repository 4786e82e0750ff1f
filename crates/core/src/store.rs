use crate::error::{Corruption, StoreCorruptError, StoreError};
use crate::models::{VectorStoreSnapshot, SNAPSHOT_FORMAT_VERSION};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Single-file snapshot store. Every save replaces the whole file.
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
}

impl VectorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the snapshot next to the target and renames it into place, so a
    /// failure at any point leaves the previous file untouched.
    pub fn save(&self, snapshot: &VectorStoreSnapshot) -> Result<(), StoreError> {
        validate_snapshot(snapshot).map_err(StoreError::InvalidSnapshot)?;

        write_atomically(&self.path, |file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush().map_err(serde_json::Error::io)?;
            Ok(())
        })?;

        tracing::debug!(
            path = %self.path.display(),
            records = snapshot.records.len(),
            "vector store written"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<VectorStoreSnapshot, StoreCorruptError> {
        let corrupt = |kind| StoreCorruptError {
            path: self.path.clone(),
            kind,
        };

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(corrupt(Corruption::Missing))
            }
            Err(error) => return Err(corrupt(Corruption::Unreadable(error.to_string()))),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(corrupt(Corruption::Empty));
        }

        let snapshot: VectorStoreSnapshot = serde_json::from_slice(&bytes)
            .map_err(|error| corrupt(Corruption::Malformed(error.to_string())))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(corrupt(Corruption::UnsupportedVersion(snapshot.format_version)));
        }

        validate_snapshot(&snapshot).map_err(|details| corrupt(Corruption::Invalid(details)))?;

        Ok(snapshot)
    }
}

/// Checks dimensionality, finiteness and per-source chunk numbering.
pub fn validate_snapshot(snapshot: &VectorStoreSnapshot) -> Result<(), String> {
    if !snapshot.records.is_empty() && snapshot.dimensions == 0 {
        return Err("snapshot has records but zero dimensions".to_string());
    }

    let mut next_index: HashMap<&str, (u64, u64)> = HashMap::new();

    for (position, record) in snapshot.records.iter().enumerate() {
        if record.embedding.len() != snapshot.dimensions {
            return Err(format!(
                "record {position} has dimension {} but snapshot declares {}",
                record.embedding.len(),
                snapshot.dimensions
            ));
        }
        if record.embedding.iter().any(|value| !value.is_finite()) {
            return Err(format!("record {position} contains a non-finite value"));
        }

        let metadata = &record.metadata;
        if metadata.start_offset > metadata.end_offset {
            return Err(format!("record {position} has inverted offsets"));
        }

        let (expected, total) = next_index
            .entry(metadata.source_filename.as_str())
            .or_insert((0, metadata.total_chunks));
        if metadata.chunk_index != *expected || metadata.total_chunks != *total {
            return Err(format!(
                "record {position} of {} has chunk_index {}/{} (expected {}/{})",
                metadata.source_filename,
                metadata.chunk_index,
                metadata.total_chunks,
                expected,
                total
            ));
        }
        *expected += 1;
    }

    for (source, (seen, total)) in next_index {
        if seen != total {
            return Err(format!("{source} has {seen} records but total_chunks {total}"));
        }
    }

    Ok(())
}

fn write_atomically<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut File) -> Result<(), serde_json::Error>,
{
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(io_error)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".vectors-")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .map_err(io_error)?;

    write(temp.as_file_mut())?;
    temp.as_file().sync_all().map_err(io_error)?;
    persist(temp, path).map_err(io_error)
}

fn persist(temp: NamedTempFile, path: &Path) -> std::io::Result<()> {
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
