//! Building the (path, label) table a loader reads from.
//!
//! Three sources are supported:
//!
//! - a directory tree whose immediate subdirectories are classes, labelled
//!   `0..N` in lexicographic order ([`FileCatalog::from_directory`]);
//! - a text file of whitespace-separated `path label` pairs
//!   ([`FileCatalog::from_list_file`]);
//! - a plain list of filenames, all labelled `0` ([`FileCatalog::from_filenames`]).
//!
//! # Example
//!
//! ```no_run
//! use framewindow::{FileCatalog, FrameWindowError};
//!
//! let catalog = FileCatalog::from_directory("datasets/kinetics/train")?;
//! for entry in catalog.entries() {
//!     println!("{} -> {}", entry.path.display(), entry.label);
//! }
//! # Ok::<(), FrameWindowError>(())
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::FrameWindowError;

/// One media file and its class label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogEntry {
    /// Path of the media file.
    pub path: PathBuf,
    /// Integer class label.
    pub label: i32,
}

impl CatalogEntry {
    /// Create an entry.
    pub fn new<P: Into<PathBuf>>(path: P, label: i32) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// An ordered list of (path, label) pairs, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCatalog {
    entries: Vec<CatalogEntry>,
}

impl FileCatalog {
    /// Scan a directory tree.
    ///
    /// Immediate subdirectories of `root` are sorted lexicographically and
    /// labelled `0..N` in that order. Regular files and symlinks inside each
    /// subdirectory are included; entries whose type cannot be determined are
    /// kept as well. The final list is sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`FrameWindowError::DirectoryOpen`] if `root` or any class
    /// directory cannot be read.
    pub fn from_directory<P: AsRef<Path>>(root: P) -> Result<Self, FrameWindowError> {
        let root = root.as_ref();
        let mut class_names: Vec<String> = Vec::new();

        for entry in read_directory(root)? {
            let entry = entry.map_err(|error| directory_error(root, error))?;
            let path = entry.path();
            let metadata = fs::metadata(&path).map_err(|error| FrameWindowError::DirectoryOpen {
                path: path.clone(),
                reason: format!("could not access during directory traversal: {error}"),
            })?;
            if metadata.is_dir() {
                class_names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        class_names.sort();

        let mut entries = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            collect_class(&root.join(class_name), label as i32, &mut entries)?;
        }
        entries.sort();

        log::info!(
            "read {} files from {} directories",
            entries.len(),
            class_names.len()
        );

        Ok(Self { entries })
    }

    /// Load `path label` pairs from a list file.
    ///
    /// # Errors
    ///
    /// Returns [`FrameWindowError::Io`] if the file cannot be read and
    /// [`FrameWindowError::FileListFormat`] on malformed content.
    pub fn from_list_file<P: AsRef<Path>>(path: P) -> Result<Self, FrameWindowError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let catalog = Self::parse_list(&text).map_err(|error| match error {
            FrameWindowError::FileListFormat { line, content, .. } => {
                FrameWindowError::FileListFormat {
                    path: path.to_path_buf(),
                    line,
                    content,
                }
            }
            other => other,
        })?;
        log::info!("read {} files from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parse the contents of a list file.
    ///
    /// Tokens are whitespace separated and consumed in `path label` pairs, so
    /// line breaks carry no meaning beyond separating tokens. A dangling path
    /// or a label that is not an integer is a format error.
    pub fn parse_list(text: &str) -> Result<Self, FrameWindowError> {
        let mut entries = Vec::new();
        let mut pending: Option<(&str, usize)> = None;

        for (line_index, line) in text.lines().enumerate() {
            for token in line.split_whitespace() {
                match pending.take() {
                    None => pending = Some((token, line_index + 1)),
                    Some((file, _)) => {
                        let label = token.parse::<i32>().map_err(|_| {
                            FrameWindowError::FileListFormat {
                                path: PathBuf::new(),
                                line: line_index + 1,
                                content: token.to_string(),
                            }
                        })?;
                        entries.push(CatalogEntry::new(file, label));
                    }
                }
            }
        }

        if let Some((file, line)) = pending {
            return Err(FrameWindowError::FileListFormat {
                path: PathBuf::new(),
                line,
                content: file.to_string(),
            });
        }

        Ok(Self { entries })
    }

    /// Use an explicit list of files, every one labelled `0`.
    pub fn from_filenames<I, P>(filenames: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: filenames
                .into_iter()
                .map(|path| CatalogEntry::new(path, 0))
                .collect(),
        }
    }

    /// The entries, in catalog order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by position.
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }
}

impl From<Vec<CatalogEntry>> for FileCatalog {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

fn read_directory(path: &Path) -> Result<fs::ReadDir, FrameWindowError> {
    fs::read_dir(path).map_err(|error| directory_error(path, error))
}

fn directory_error(path: &Path, error: std::io::Error) -> FrameWindowError {
    FrameWindowError::DirectoryOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

fn collect_class(
    directory: &Path,
    label: i32,
    entries: &mut Vec<CatalogEntry>,
) -> Result<(), FrameWindowError> {
    for entry in read_directory(directory)? {
        let entry = entry.map_err(|error| directory_error(directory, error))?;
        let keep = match entry.file_type() {
            Ok(file_type) => file_type.is_file() || file_type.is_symlink(),
            Err(_) => true,
        };
        if keep {
            entries.push(CatalogEntry::new(entry.path(), label));
        }
    }
    Ok(())
}
