//! Error types for standoff parsing and linking.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bratlink operations.
pub type Result<T> = std::result::Result<T, StandoffError>;

/// Everything that can go wrong while turning a standoff pair into an annotation graph.
///
/// Only [`StandoffError::MalformedRecord`] is recoverable: the record reader logs it and
/// skips the line. Every other kind aborts the parse of the whole document.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StandoffError {
    /// A line could not be split into a key and a remainder.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// An A/E/R record points at a key that does not exist.
    #[error("record {record} references missing {reference}")]
    MissingReference { record: String, reference: String },

    /// Event triggers loop back on themselves.
    #[error("record {record} has a cyclic event reference through {reference}")]
    ReferenceCycle { record: String, reference: String },

    /// A T record's span section is not a list of `start end` integer pairs.
    #[error("record {record} has an invalid span {span:?}: {reason}")]
    SpanParse {
        record: String,
        span: String,
        reason: String,
    },

    /// Annotation file has no sibling text file.
    #[error("no text file found for {0}")]
    MissingCompanion(PathBuf),

    /// Two files of one corpus map to the same document key.
    #[error("document key {key} is already taken; {path} not loaded")]
    DuplicateDocument { key: String, path: PathBuf },

    #[error("{0} is not a valid directory")]
    NotADirectory(PathBuf),

    #[error("{path} is not valid UTF-8: {reason}")]
    Utf8 { path: PathBuf, reason: String },

    /// XML export/import failure.
    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A fatal error attributed to the file that caused it.
    #[error("failed to parse {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: Box<StandoffError>,
    },
}

impl StandoffError {
    pub fn missing(record: impl Into<String>, reference: impl Into<String>) -> Self {
        StandoffError::MissingReference {
            record: record.into(),
            reference: reference.into(),
        }
    }

    pub fn xml(msg: impl ToString) -> Self {
        StandoffError::Xml(msg.to_string())
    }

    /// Attach the offending file path, unless one is already attached.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ StandoffError::Document { .. } => already,
            other => StandoffError::Document {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether this error aborts a document parse.
    pub fn is_fatal(&self) -> bool {
        match self {
            StandoffError::MalformedRecord { .. } => false,
            StandoffError::Document { source, .. } => source.is_fatal(),
            _ => true,
        }
    }

    /// The innermost error, skipping file attribution.
    pub fn root(&self) -> &StandoffError {
        match self {
            StandoffError::Document { source, .. } => source.root(),
            other => other,
        }
    }
}
