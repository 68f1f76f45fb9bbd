// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::io::ErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by stores, drives and the filesystem manager.
///
/// A missing path during a read is not an error: reads return `Ok(None)`.
/// These variants cover structural violations and storage failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: '{0}'")]
    InvalidPath(String),

    /// The storage grant behind a handle is gone; the caller should re-prompt
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error at {path}: {message}")]
    Io { path: String, message: String },
}

impl Error {
    pub fn not_found<S: AsRef<str>>(path: S) -> Self {
        Error::NotFound(path.as_ref().to_string())
    }

    pub fn not_a_directory<S: AsRef<str>>(path: S) -> Self {
        Error::NotADirectory(path.as_ref().to_string())
    }

    pub fn not_a_file<S: AsRef<str>>(path: S) -> Self {
        Error::NotAFile(path.as_ref().to_string())
    }

    pub fn already_exists<S: AsRef<str>>(path: S) -> Self {
        Error::AlreadyExists(path.as_ref().to_string())
    }

    pub fn invalid_path<S: AsRef<str>>(path: S) -> Self {
        Error::InvalidPath(path.as_ref().to_string())
    }

    pub fn permission_denied<S: AsRef<str>>(what: S) -> Self {
        Error::PermissionDenied(what.as_ref().to_string())
    }

    pub fn parse<S: AsRef<str>>(message: S) -> Self {
        Error::Parse(message.as_ref().to_string())
    }

    /// Classify a host I/O error raised while touching `path`
    pub fn from_io<S: AsRef<str>>(path: S, err: &std::io::Error) -> Self {
        let path = path.as_ref();
        match err.kind() {
            ErrorKind::NotFound => Error::not_found(path),
            ErrorKind::PermissionDenied => Error::permission_denied(path),
            ErrorKind::AlreadyExists => Error::already_exists(path),
            ErrorKind::NotADirectory => Error::not_a_directory(path),
            ErrorKind::IsADirectory => Error::not_a_file(path),
            _ => Error::Io {
                path: path.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// True for the "does not exist" family of errors
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Parse(err.to_string())
    }
}
