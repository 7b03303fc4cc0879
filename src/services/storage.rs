//! Local storage of uploaded book files

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{AppError, AppResult};

/// Public prefix under which the upload directory is served
pub const FILES_ROUTE: &str = "/files";

#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to `<dir>/<folder>/<millis>_<name>` and return the public reference
    pub async fn save(&self, folder: &str, original_name: &str, bytes: &[u8]) -> AppResult<String> {
        let name = sanitize_file_name(original_name)?;
        let stored_name = format!("{}_{}", Utc::now().timestamp_millis(), name);

        let folder_path = self.dir.join(folder);
        tokio::fs::create_dir_all(&folder_path).await?;
        tokio::fs::write(folder_path.join(&stored_name), bytes).await?;

        tracing::info!(folder, file = %stored_name, size = bytes.len(), "Stored uploaded file");
        Ok(format!("{}/{}/{}", FILES_ROUTE, folder, stored_name))
    }

    /// Delete a file previously returned by `save`. Missing files are ignored.
    pub async fn remove(&self, reference: &str) {
        let Some(stored) = reference
            .strip_prefix(FILES_ROUTE)
            .map(|r| r.trim_start_matches('/'))
        else {
            tracing::warn!(reference, "Not a stored file reference");
            return;
        };
        if Path::new(stored)
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            tracing::warn!(reference, "Refusing to remove file outside the upload directory");
            return;
        }

        match tokio::fs::remove_file(self.dir.join(stored)).await {
            Ok(()) => tracing::info!(reference, "Removed stored file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(reference, "Failed to remove stored file: {}", e),
        }
    }

    pub async fn remove_all(&self, references: &[String]) {
        for reference in references {
            self.remove(reference).await;
        }
    }
}

/// Keep only the last path component of a client supplied name
fn sanitize_file_name(original_name: &str) -> AppResult<String> {
    Path::new(original_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "..")
        .map(|n| n.replace(' ', "_"))
        .ok_or_else(|| AppError::BadRequest(format!("Invalid file name '{}'", original_name)))
}

/// Strip the timestamp prefix a stored file name carries: `/files/covers/1700000000000_dune.png`
/// becomes `/files/covers/dune.png`.
pub fn clean_file_reference(reference: &str) -> String {
    let (dir, file) = match reference.rfind('/') {
        Some(pos) => reference.split_at(pos + 1),
        None => ("", reference),
    };
    match file.split_once('_') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{}{}", dir, rest)
        }
        _ => reference.to_string(),
    }
}
