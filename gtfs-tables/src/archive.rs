use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::Error;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;

/// A table file found in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File name without its directory nor its suffix, e.g. `stop_times`
    pub name: String,
    /// Content decoded as UTF-8
    pub text: String,
}

/// Everything read from one archive
#[derive(Debug)]
pub struct ExtractedArchive {
    /// Table files, in no particular order
    pub entries: Vec<ArchiveEntry>,
    /// All files that are present in the archive, tables or not
    pub files: Vec<String>,
    /// sha256 sum of the archive
    pub sha256: String,
}

/// Allows to parameterize which files of the archive are read
///
/// ```
///let reader = gtfs_tables::ArchiveReader::default().suffix(".csv");
///assert_eq!(".csv", reader.suffix);
///```
#[derive(Derivative, Debug, Clone)]
#[derivative(Default)]
pub struct ArchiveReader {
    /// Files whose name ends with this suffix are tables; the suffix is stripped to name them
    #[derivative(Default(value = "\".txt\".to_owned()"))]
    pub suffix: String,
}

impl ArchiveReader {
    /// Configures the suffix of the table files (default: `.txt`)
    ///
    /// Returns Self and can be chained
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Opens `bytes` as a zip archive and reads every table file
    ///
    /// Files in sub-directories are matched on their file name only.
    /// Fails with [Error::CorruptArchive] if the buffer is not a readable zip.
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedArchive, Error> {
        let sha256 = format!("{:x}", Sha256::digest(bytes));
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::new();
        let mut files = Vec::with_capacity(archive.len());
        let mut seen = HashSet::new();

        for i in 0..archive.len() {
            let mut archive_file = archive.by_index(i)?;
            let file_path = archive_file.name().to_owned();
            files.push(file_path.clone());
            if archive_file.is_dir() {
                continue;
            }

            let name = match Path::new(&file_path)
                .file_name()
                .and_then(|f| f.to_str())
                .and_then(|f| f.strip_suffix(self.suffix.as_str()))
            {
                Some(name) if !name.is_empty() => name.to_owned(),
                _ => continue,
            };
            if !seen.insert(name.clone()) {
                warn!("{file_path}: table {name} already read from another file, ignored");
                continue;
            }

            let mut buf = Vec::with_capacity(archive_file.size() as usize);
            archive_file
                .read_to_end(&mut buf)
                .map_err(|e| Error::NamedFileIO {
                    file_name: file_path.clone(),
                    source: Box::new(e),
                })?;
            let text = match String::from_utf8(buf) {
                Ok(text) => text,
                Err(e) => {
                    warn!("{file_path} is not valid UTF-8, invalid sequences replaced");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            debug!("{file_path}: {} bytes", text.len());
            entries.push(ArchiveEntry { name, text });
        }

        Ok(ExtractedArchive {
            entries,
            files,
            sha256,
        })
    }
}
