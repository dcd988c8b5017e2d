//! Error types for loading, encoding and querying.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying a [`crate::PqIndex`]
#[derive(Debug, Error)]
pub enum PqError {

    /// Malformed centroid or feature data
    #[error("format error in {source_name} at line {line}: {reason}")]
    Format {
        /// Name of the resource the data came from
        source_name: String ,
        /// 1-based line number, 0 if the whole resource is at fault
        line: usize ,
        /// What was wrong with the line
        reason: String
    } ,

    /// A centroid resource for a subspace could not be found
    #[error("centroids for subspace {subspace} not found at {}", .path.display())]
    MissingSubspace {
        /// 0-based subspace index
        subspace: usize ,
        path: PathBuf
    } ,

    /// A vector or centroid does not have the expected length
    #[error("dimension mismatch for {context} {index}: expected {expected}, got {actual}")]
    Dimension {
        /// What kind of vector was checked, e.g. `"vector"` or `"query"`
        context: &'static str ,
        index: usize ,
        expected: usize ,
        actual: usize
    } ,

    /// Invalid parameters, e.g. a dimension not divisible by the subspace width
    #[error("configuration error: {0}")]
    Configuration( String ) ,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf ,
        #[source]
        source: std::io::Error
    }
}

impl PqError {

    pub(crate) fn format(
        source_name: &str ,
        line: usize ,
        reason: impl Into<String>
    ) -> Self {
        PqError::Format { source_name: source_name.to_string() , line , reason: reason.into() }
    }

    /// Maps a failure to read line `line` of `source_name`. Bytes that are not
    /// UTF-8 are malformed data, anything else is a read failure
    pub(crate) fn read_line(
        source_name: &str ,
        line: usize ,
        err: std::io::Error
    ) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => PqError::format( source_name , line , "line is not valid UTF-8" ) ,
            _ => PqError::Io { path: PathBuf::from( source_name ) , source: err }
        }
    }

    /// Returns `true` for errors caused by malformed or missing source data
    pub fn is_format_error( &self ) -> bool {
        matches!( self , PqError::Format { .. } | PqError::MissingSubspace { .. } )
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PqError> ;
