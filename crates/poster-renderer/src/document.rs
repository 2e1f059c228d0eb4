//! Input documents: discovery on disk and conversion to page bodies.

use std::io;
use std::path::{Path, PathBuf};

use crate::content::StorageContent;
use crate::converter::Converter;

/// Input format, chosen by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceFormat {
    Markdown,
    Html,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

/// Error loading a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),
}

/// A converted input file, ready to publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedDocument {
    title: String,
    body: StorageContent,
    source_path: PathBuf,
}

impl ProcessedDocument {
    pub fn new(title: impl Into<String>, body: StorageContent, source_path: PathBuf) -> Self {
        Self {
            title: title.into(),
            body,
            source_path,
        }
    }

    /// Read and convert a file.
    ///
    /// The page title is the file name without its extension.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unsupported`] for extensions other than
    /// `.md`, `.markdown`, `.html` and `.htm`, and [`DocumentError::Read`] if
    /// the file cannot be read as UTF-8.
    pub fn from_path(path: &Path, converter: &Converter) -> Result<Self, DocumentError> {
        let format =
            SourceFormat::from_path(path).ok_or_else(|| DocumentError::Unsupported(path.to_owned()))?;
        let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_owned(),
            source,
        })?;

        let body = match format {
            SourceFormat::Markdown => converter.convert(&source),
            SourceFormat::Html => converter.convert_html(&source),
        };
        tracing::debug!(path = %path.display(), bytes = body.as_str().len(), "Converted document");

        Ok(Self::new(title_from_path(path), body, path.to_owned()))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &StorageContent {
        &self.body
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// List the documents to publish from a file or directory.
///
/// A file is returned as is. A directory yields its supported files in name
/// order; subdirectories and other files are skipped.
///
/// # Errors
///
/// Returns [`DocumentError::Read`] if the path or directory cannot be read,
/// and [`DocumentError::Unsupported`] for a single file of an unknown type.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let read_error = |source| DocumentError::Read {
        path: path.to_owned(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(read_error)?;
    if !metadata.is_dir() {
        if SourceFormat::from_path(path).is_none() {
            return Err(DocumentError::Unsupported(path.to_owned()));
        }
        return Ok(vec![path.to_owned()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(read_error)? {
        let entry_path = entry.map_err(read_error)?.path();
        if entry_path.is_dir() {
            tracing::debug!(path = %entry_path.display(), "Skipping subdirectory");
        } else if SourceFormat::from_path(&entry_path).is_some() {
            files.push(entry_path);
        } else {
            tracing::warn!(path = %entry_path.display(), "Skipping unsupported file");
        }
    }
    files.sort();
    Ok(files)
}
