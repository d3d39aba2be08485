//! Module for the error management
use thiserror::Error;

/// An error that can occur when reading GTFS data.
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer could not be opened as a zip archive, or one of its entries is unreadable
    #[error("corrupt archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),
    /// Impossible to read an entry of the archive
    #[error("impossible to read '{file_name}'")]
    NamedFileIO {
        /// The file name that could not be read
        file_name: String,
        /// The inital error that caused the unability to read the file
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Impossible to read a CSV file
    #[error("impossible to read csv file '{file_name}'")]
    CSVError {
        /// File name that could not be parsed as CSV
        file_name: String,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
    },
    /// The realtime document is not a feed envelope
    #[error("malformed realtime feed")]
    MalformedFeed(#[from] serde_json::Error),
}

/// A single field that could not be converted to the type of its column.
///
/// This never aborts the row: the field is emitted as `null` and the value is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedField {
    /// Table the row belongs to
    pub table: String,
    /// Column of the field
    pub column: String,
    /// Raw text as found in the CSV
    pub value: String,
    /// Why the conversion failed
    pub reason: String,
}

impl std::fmt::Display for MalformedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}: '{}' ({})",
            self.table, self.column, self.value, self.reason
        )
    }
}
