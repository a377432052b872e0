//! Error types for merge operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a merge or cover operation.
///
/// Problems local to a single resource or table of contents are not errors;
/// they are reported as [`MergeWarning`](crate::MergeWarning)s instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("No package document found in {}", path.display())]
    MissingPackage { path: PathBuf },

    #[error("No input volumes to merge")]
    NoInputVolumes,

    #[error("Cover file not found: {}", .0.display())]
    MissingCoverFile(PathBuf),

    #[error("Cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
