//! Byte sources for avatar files.
//!
//! A dropped file arrives either as a path on disk or as an in-memory buffer
//! (some platforms hand over the bytes directly). `ByteSource` wraps both so
//! the loader only ever sees one kind of handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LoadError;

/// A file the user dropped onto the window.
#[derive(Clone, Debug, Default)]
pub struct DroppedFile {
    /// File name as reported by the windowing system
    pub name: String,
    /// Set when the file lives on disk
    pub path: Option<PathBuf>,
    /// Set when the windowing system already read the file
    pub bytes: Option<Arc<[u8]>>,
}

impl DroppedFile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self {
            name: display_name(path),
            path: Some(path.to_path_buf()),
            bytes: None,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            path: None,
            bytes: Some(bytes.into()),
        }
    }
}

/// A loadable handle to the bytes of one avatar file.
#[derive(Clone)]
pub enum ByteSource {
    Path(PathBuf),
    Memory { name: String, bytes: Arc<[u8]> },
}

impl ByteSource {
    /// Wrap a dropped file. In-memory bytes win over the path when both exist.
    pub fn from_dropped(file: &DroppedFile) -> Option<Self> {
        if let Some(ref bytes) = file.bytes {
            return Some(Self::Memory {
                name: file.name.clone(),
                bytes: Arc::clone(bytes),
            });
        }
        file.path.clone().map(Self::Path)
    }

    /// Name used in log lines and errors
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => display_name(path),
            Self::Memory { name, .. } => name.clone(),
        }
    }

    /// Read the full contents.
    pub fn read(&self) -> Result<Arc<[u8]>, LoadError> {
        match self {
            Self::Path(path) => std::fs::read(path)
                .map(Arc::from)
                .map_err(|e| LoadError::Read {
                    name: path.display().to_string(),
                    message: e.to_string(),
                }),
            Self::Memory { bytes, .. } => Ok(Arc::clone(bytes)),
        }
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Memory { name, bytes } => f
                .debug_struct("Memory")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_prefers_bytes() {
        let file = DroppedFile {
            name: "a.vrm".to_string(),
            path: Some(PathBuf::from("/does/not/exist.vrm")),
            bytes: Some(Arc::from(&b"abc"[..])),
        };
        let source = ByteSource::from_dropped(&file).unwrap();
        assert_eq!(source.name(), "a.vrm");
        assert_eq!(&*source.read().unwrap(), b"abc");
    }

    #[test]
    fn test_empty_drop_record_has_no_source() {
        assert!(ByteSource::from_dropped(&DroppedFile::default()).is_none());
    }

    #[test]
    fn test_missing_path_is_read_error() {
        let source = ByteSource::from_dropped(&DroppedFile::from_path("/nonexistent/x.vrm")).unwrap();
        assert_eq!(source.name(), "x.vrm");
        assert!(matches!(source.read(), Err(LoadError::Read { .. })));
    }
}
