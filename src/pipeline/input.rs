//! Input validation: make sure the path names a readable PDF before any
//! extraction strategy touches it.
//!
//! Checking the `%PDF` magic bytes up front gives callers a meaningful error
//! instead of whatever pdfium or lopdf make of an HTML error page or a JPEG.

use crate::error::ScribeError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<(), ScribeError> {
    if !path.exists() {
        return Err(ScribeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ScribeError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ScribeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ScribeError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        }
    }

    if &magic != b"%PDF" {
        return Err(ScribeError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Validated PDF input: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ScribeError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"<html>not a pdf</html>").unwrap();
        let err = validate_pdf(tmp.path()).unwrap_err();
        match err {
            ScribeError::NotAPdf { magic, .. } => assert_eq!(&magic, b"<htm"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_file_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();
        assert!(matches!(
            validate_pdf(tmp.path()),
            Err(ScribeError::NotAPdf { .. })
        ));
    }

    #[test]
    fn pdf_header_is_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%%EOF\n").unwrap();
        assert!(validate_pdf(tmp.path()).is_ok());
    }
}
