//! Validation functions for persisted and command line values.
//!
//! Provides custom validation functions for the backup directory and the
//! info tool binary path.

use validator::ValidationError;

use std::path::Path;

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access backup dir {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

pub fn validate_writable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    validate_dir_exist_or_created(dir)?;
    let md = std::fs::metadata(dir).map_err(|e| {
        ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot access metadata for {:?}: {}", dir, e).into())
    })?;
    if md.permissions().readonly() {
        Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("cannot write to dir {:?}", dir).into()))
    } else {
        Ok(())
    }
}

pub fn validate_tool_path<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ValidationError::new("InvalidToolPath")
            .with_message(format!("{:?} is not an executable file", path).into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_dir_exist_or_created_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/apks");

        assert!(validate_dir_exist_or_created(&nested).is_ok());
        assert!(nested.is_dir());
    }

    #[test]
    fn test_validate_dir_exist_or_created_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not_a_dir");
        std::fs::write(&file, "x").unwrap();

        let err = validate_dir_exist_or_created(&file).unwrap_err();
        assert_eq!(err.code, "InvalidDirectory");
    }

    #[test]
    fn test_validate_writable_dir_ok_for_temp_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_writable_dir(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_validate_tool_path() {
        let temp_dir = TempDir::new().unwrap();
        let tool = temp_dir.path().join("aapt");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        assert!(validate_tool_path(&tool).is_ok());
        assert!(validate_tool_path(temp_dir.path()).is_err());
        assert!(validate_tool_path(temp_dir.path().join("missing")).is_err());
    }
}
