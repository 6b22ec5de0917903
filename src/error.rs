//! Engine error taxonomy. The pack this crate was grown from has no
//! `thiserror` dependency anywhere; like the teacher's own modules, failures
//! that are part of the defined contract get a plain enum with hand-written
//! `Display`, while failures from the world outside that contract (I/O, mmap,
//! a missing file) flow through `anyhow`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZealError {
    NotFound,
    Exists,
    IsDirectory,
    NotADirectory,
    NotEmpty,
    NameTooLong,
    NoFreeDirent,
    NoSpace,
    TooLarge,
    Unsupported,
    Corrupt,
    /// rmdir or similar refused on the root directory.
    Permission,
}

impl fmt::Display for ZealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ZealError::NotFound => "not found",
            ZealError::Exists => "already exists",
            ZealError::IsDirectory => "is a directory",
            ZealError::NotADirectory => "not a directory",
            ZealError::NotEmpty => "directory not empty",
            ZealError::NameTooLong => "name too long",
            ZealError::NoFreeDirent => "no free directory entry",
            ZealError::NoSpace => "no space left on device",
            ZealError::TooLarge => "value too large",
            ZealError::Unsupported => "operation not supported",
            ZealError::Corrupt => "image is corrupt",
            ZealError::Permission => "operation not permitted",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ZealError {}

pub type Result<T> = std::result::Result<T, ZealError>;
