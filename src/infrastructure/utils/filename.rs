use crate::errors::AppError;

/// Rejects identifiers that could escape the upload root. Runs before any
/// filesystem or database access.
pub fn validate_filename(filename: &str) -> Result<&str, AppError> {
    let invalid = filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0');

    if invalid {
        return Err(AppError::InvalidInput("Invalid filename".into()));
    }
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_attempts_are_rejected() {
        for bad in ["", "..", "../etc/passwd", "a/b.jpg", "a\\b.jpg", "x..y.jpg", "nul\0.jpg"] {
            assert!(
                matches!(validate_filename(bad), Err(AppError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn generated_names_pass() {
        assert!(validate_filename("featuredImage-1718000000000-123456789.jpg").is_ok());
    }
}
