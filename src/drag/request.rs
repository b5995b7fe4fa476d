//! A single drag request — one absolute path to an existing file.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::DragError;

/// A validated drag request.
///
/// Not retained after the drag call returns. The `id` only correlates
/// log lines between the scheduling thread and the background unit.
#[derive(Debug, Clone)]
pub struct DragRequest {
    id: Uuid,
    path: PathBuf,
}

impl DragRequest {
    /// Validate `path` and build a request.
    ///
    /// Checks, in order: the path is absolute, then it exists.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DragError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(DragError::NotAbsolute(path));
        }
        if let Err(e) = std::fs::metadata(&path) {
            // Unreachable files are reported the same way as missing ones.
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot stat drag path"
                );
            }
            return Err(DragError::PathNotFound(path));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            path,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URI for the path, percent-encoded.
    pub fn file_uri(&self) -> Result<String, DragError> {
        url::Url::from_file_path(&self.path)
            .map(String::from)
            .map_err(|()| {
                DragError::NativeTakeoverFailed(format!(
                    "cannot express {} as a file URI",
                    self.path.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_file_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let request = DragRequest::new(&path).unwrap();
        assert_eq!(request.path(), path);
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pdf");

        let err = DragRequest::new(&path).unwrap_err();
        assert!(matches!(err, DragError::PathNotFound(p) if p == path));
    }

    #[test]
    fn path_through_a_regular_file_is_not_found() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("child.pdf");

        let err = DragRequest::new(&path).unwrap_err();
        assert!(matches!(err, DragError::PathNotFound(p) if p == path));
    }

    #[test]
    fn relative_path_is_rejected_before_existence() {
        let err = DragRequest::new("Cargo.toml").unwrap_err();
        assert!(matches!(err, DragError::NotAbsolute(_)));
    }

    #[test]
    fn each_request_gets_its_own_id() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let a = DragRequest::new(file.path()).unwrap();
        let b = DragRequest::new(file.path()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[cfg(unix)]
    #[test]
    fn file_uri_escapes_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarterly report.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let uri = DragRequest::new(&path).unwrap().file_uri().unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("/quarterly%20report.pdf"));
    }
}
