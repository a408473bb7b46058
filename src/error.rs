// src/error.rs

//! Error types for the chime library
//!
//! Errors fall into four reported categories plus internal passthroughs:
//!
//! - **Validation**: unknown scheme, malformed archive entry, unrecoverable XML,
//!   malformed shell module
//! - **Capability**: transcoding unsupported, sound over the duration cap,
//!   patching unsupported on this host generation
//! - **Privilege**: elevation required and absent
//! - **Availability**: missing shell module or module backup
//!
//! Expected-transient conditions (a locked live module during move-aside) are
//! handled locally by the patcher and never surface here.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad error category, mirroring how callers are expected to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Capability,
    Privilege,
    Availability,
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    /// The named scheme is not registered in the layered store
    #[error("unknown sound scheme '{name}'")]
    UnknownScheme { name: String },

    /// A sound archive could not be read or is missing a required entry
    #[error("malformed sound archive '{path}': {reason}")]
    MalformedArchive { path: String, reason: String },

    /// The proprietary metadata index could not be recovered
    #[error("unrecoverable archive metadata XML: {reason}")]
    MalformedXml { reason: String },

    /// The shell module is not a patchable PE image
    #[error("malformed module '{path}': {reason}")]
    MalformedModule { path: String, reason: &'static str },

    /// The source sound is not in the canonical format and no transcoder is available
    #[error("sound transcoding is not available on this host")]
    TranscodingUnavailable,

    /// The source sound exceeds the duration ceiling
    #[error("sound file is {seconds}s long, limit is {limit}s")]
    SoundTooLong { seconds: u64, limit: u64 },

    /// Startup sound patching is not possible on this host generation
    #[error("startup sound patching is not supported on this host")]
    PatchingUnsupported,

    /// The operation needs elevated rights
    #[error("elevation is required to {operation}")]
    ElevationRequired { operation: &'static str },

    /// The shell module is missing from its expected location
    #[error("shell module not found at '{}'", .path.display())]
    ModuleNotFound { path: PathBuf },

    /// No pristine module backup exists yet
    #[error("no module backup found at '{}'", .path.display())]
    BackupNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("hive serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings parse error: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("settings write error: {0}")]
    SettingsWrite(#[from] toml::ser::Error),
}

impl Error {
    /// Category of this error per the reporting taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownScheme { .. }
            | Error::MalformedArchive { .. }
            | Error::MalformedXml { .. }
            | Error::MalformedModule { .. } => ErrorCategory::Validation,
            Error::TranscodingUnavailable
            | Error::SoundTooLong { .. }
            | Error::PatchingUnsupported => ErrorCategory::Capability,
            Error::ElevationRequired { .. } => ErrorCategory::Privilege,
            Error::ModuleNotFound { .. } | Error::BackupNotFound { .. } => {
                ErrorCategory::Availability
            }
            _ => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let cases: &[(Error, ErrorCategory)] = &[
            (
                Error::UnknownScheme {
                    name: "Nope".into(),
                },
                ErrorCategory::Validation,
            ),
            (
                Error::MalformedModule {
                    path: "shell.dll".into(),
                    reason: "missing DOS header",
                },
                ErrorCategory::Validation,
            ),
            (Error::TranscodingUnavailable, ErrorCategory::Capability),
            (
                Error::SoundTooLong {
                    seconds: 45,
                    limit: 30,
                },
                ErrorCategory::Capability,
            ),
            (Error::PatchingUnsupported, ErrorCategory::Capability),
            (
                Error::ElevationRequired {
                    operation: "patch the shell module",
                },
                ErrorCategory::Privilege,
            ),
            (
                Error::BackupNotFound {
                    path: PathBuf::from("shell.dll.bak"),
                },
                ErrorCategory::Availability,
            ),
            (
                Error::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
                ErrorCategory::Internal,
            ),
        ];
        for (err, category) in cases {
            assert_eq!(err.category(), *category, "{err}");
        }
    }
}
