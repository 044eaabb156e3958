//! Validation functions for configuration values.
//!
//! Every function only inspects its input and reports a `ValidationError`; nothing is
//! created or modified on disk.

use validator::ValidationError;

use std::path::Path;

/// External commands receive paths as text, so a path must survive that unchanged.
pub fn validate_utf8_path<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();
    if path.to_str().is_none() {
        return Err(ValidationError::new("NonUtf8Path")
            .with_message(format!("{:?} is not valid UTF-8", path).into()));
    }

    Ok(())
}

pub fn validate_not_blank<S: AsRef<str>>(value: S) -> Result<(), ValidationError> {
    if value.as_ref().trim().is_empty() {
        return Err(ValidationError::new("Required").with_message("must not be empty".into()));
    }

    Ok(())
}

pub fn validate_readable_dir<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.as_os_str().is_empty() {
        return Err(ValidationError::new("Required").with_message("must not be empty".into()));
    }
    validate_utf8_path(dir)?;
    if !dir.exists() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }
    if !dir.is_dir() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} is not a directory", dir).into()));
    }
    std::fs::read_dir(dir).map(|_| ()).map_err(|e| {
        ValidationError::new("UnreadableDirectory")
            .with_message(format!("cannot read directory {:?}: {}", dir, e).into())
    })
}

pub fn validate_readable_file<P: AsRef<Path>>(file: P) -> Result<(), ValidationError> {
    let file = file.as_ref();
    validate_utf8_path(file)?;
    if !file.is_file() {
        return Err(ValidationError::new("InvalidFile")
            .with_message(format!("{:?} not found or not a regular file", file).into()));
    }
    std::fs::File::open(file).map(|_| ()).map_err(|e| {
        ValidationError::new("UnreadableFile")
            .with_message(format!("cannot read file {:?}: {}", file, e).into())
    })
}

/// The prefix becomes part of a directory name on the remote host, so it cannot hold
/// a path separator or NUL. Anything else a POSIX file name allows is accepted.
pub fn validate_name_prefix<S: AsRef<str>>(prefix: S) -> Result<(), ValidationError> {
    let prefix = prefix.as_ref();
    if let Some(c) = prefix.chars().find(|c| *c == '/' || *c == '\0') {
        return Err(ValidationError::new("InvalidNamePrefix").with_message(
            format!("backup name prefix {:?} must not contain {:?}", prefix, c).into(),
        ));
    }

    Ok(())
}
