//! Validation inputs.
//!
//! Inputs are supplied by external collaborators: the upload layer hands over
//! raw bytes with metadata, the parser hands over a header row and value rows.
//! The core never tokenizes files itself.

use crate::core::types::{FileMetadata, InputKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw file bytes together with their metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    /// Metadata supplied by the upload collaborator.
    pub metadata: FileMetadata,
    /// The file contents.
    pub bytes: Arc<[u8]>,
}

impl FileInput {
    /// Create a file input; the declared size is taken from the bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            metadata: FileMetadata::new(name, bytes.len() as u64),
            bytes: bytes.into(),
        }
    }

    /// Create from explicit metadata.
    pub fn with_metadata(metadata: FileMetadata, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            metadata,
            bytes: bytes.into(),
        }
    }

    /// Set the declared MIME type.
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.metadata.mime_type = Some(mime_type.into());
        self
    }

    /// Contents as UTF-8 with any byte-order mark removed.
    pub fn text(&self) -> Option<&str> {
        let bytes = self.bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&self.bytes[..]);
        std::str::from_utf8(bytes).ok()
    }
}

/// One parsed row: column name to cell value, in header order.
pub type Row = IndexMap<String, String>;

/// A parsed table with its header row kept separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names in file order.
    pub headers: Vec<String>,
    /// Data rows.
    pub rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set with the given headers.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row given as values in header order.
    ///
    /// Extra values are dropped; missing values become empty strings.
    pub fn push_values<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter().map(Into::into);
        let row: Row = self
            .headers
            .iter()
            .map(|header| (header.clone(), values.next().unwrap_or_default()))
            .collect();
        self.rows.push(row);
    }

    /// Builder-style variant of [`RowSet::push_values`].
    pub fn with_row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_values(values);
        self
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a header exists, compared case-insensitively.
    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Actual header spelling for a case-insensitive name.
    pub fn find_column(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.headers
            .iter()
            .find(|h| h.trim().eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    /// Iterate over the values of one column, treating absent cells as empty.
    pub fn column<'a>(&'a self, header: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(header).map(String::as_str).unwrap_or(""))
    }
}

/// Input handed to the validation runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationInput {
    /// Raw bytes, for file upload and preflight.
    File(FileInput),
    /// Parsed rows, for column mapping and later stages.
    Rows(RowSet),
}

impl ValidationInput {
    /// Which variant this is.
    pub fn kind(&self) -> InputKind {
        match self {
            ValidationInput::File(_) => InputKind::File,
            ValidationInput::Rows(_) => InputKind::Rows,
        }
    }
}

impl From<FileInput> for ValidationInput {
    fn from(file: FileInput) -> Self {
        ValidationInput::File(file)
    }
}

impl From<RowSet> for ValidationInput {
    fn from(rows: RowSet) -> Self {
        ValidationInput::Rows(rows)
    }
}

impl From<FileInput> for Arc<ValidationInput> {
    fn from(file: FileInput) -> Self {
        Arc::new(ValidationInput::File(file))
    }
}

impl From<RowSet> for Arc<ValidationInput> {
    fn from(rows: RowSet) -> Self {
        Arc::new(ValidationInput::Rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_text_strips_bom() {
        let file = FileInput::new("a.csv", b"\xEF\xBB\xBFname\n".to_vec());
        assert_eq!(file.text(), Some("name\n"));
        assert_eq!(file.metadata.size, 8);
    }

    #[test]
    fn test_file_text_rejects_invalid_utf8() {
        let file = FileInput::new("a.csv", vec![0xff, 0xfe, 0x00]);
        assert!(file.text().is_none());
    }

    #[test]
    fn test_row_set_padding_and_lookup() {
        let rows = RowSet::new(["Name", "Email"])
            .with_row(["Ada"])
            .with_row(["Grace", "grace@example.com", "extra"]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[0]["Email"], "");
        assert_eq!(rows.find_column("email"), Some("Email"));
        assert_eq!(
            rows.column("Email").collect::<Vec<_>>(),
            vec!["", "grace@example.com"]
        );
    }

    #[test]
    fn test_input_kind() {
        let input: ValidationInput = RowSet::default().into();
        assert_eq!(input.kind(), InputKind::Rows);
    }
}
