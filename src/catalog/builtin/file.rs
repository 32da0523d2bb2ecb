//! File upload and preflight checks over raw bytes.

use super::{capped_details, is_blank, split_record};
use crate::core::error::CheckError;
use crate::core::input::FileInput;
use crate::core::types::Severity;
use crate::validation::check::{CheckResult, FileCheck};
use crate::validation::result::{CheckOutcome, RowTally};
use std::collections::HashMap;

/// Header fields of the file, or `MissingContext` when there is no header.
fn header_fields(file: &FileInput) -> Result<Vec<String>, CheckError> {
    let text = file
        .text()
        .ok_or_else(|| CheckError::Unreadable("file is not valid UTF-8".to_string()))?;
    match text.lines().next() {
        Some(line) if !is_blank(line) => Ok(split_record(line)),
        _ => Err(CheckError::MissingContext("the file has no header row".to_string())),
    }
}

/// Accepts files whose extension is on the allow list.
pub struct FileTypeCheck {
    extensions: Vec<String>,
    mime_types: Vec<String>,
}

impl FileTypeCheck {
    /// Create with lower-case extensions and MIME types.
    pub fn new(extensions: Vec<String>, mime_types: Vec<String>) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_ascii_lowercase()).collect(),
            mime_types: mime_types.iter().map(|m| m.to_ascii_lowercase()).collect(),
        }
    }
}

impl FileCheck for FileTypeCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let expected = self.extensions.join(", ");
        let Some(extension) = file.metadata.extension() else {
            return Ok(CheckOutcome::fail(format!(
                "'{}' has no extension; expected one of: {}",
                file.metadata.name, expected
            )));
        };
        if !self.extensions.contains(&extension) {
            return Ok(CheckOutcome::fail(format!(
                "Unsupported file type '.{}'; expected one of: {}",
                extension, expected
            )));
        }

        if let Some(mime) = &file.metadata.mime_type {
            let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            if !self.mime_types.is_empty() && !self.mime_types.contains(&essence) {
                return Ok(CheckOutcome::warning(format!(
                    "Declared type '{}' is unusual for a .{} file",
                    mime, extension
                ))
                .with_severity(Severity::Medium));
            }
        }

        Ok(CheckOutcome::pass(format!(".{} file accepted", extension)))
    }
}

/// Rejects empty files.
pub struct NotEmptyCheck;

impl FileCheck for NotEmptyCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        if file.bytes.is_empty() {
            return Ok(CheckOutcome::fail("The file is empty"));
        }
        if file.bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(CheckOutcome::fail("The file contains only whitespace"));
        }
        Ok(CheckOutcome::pass(format!("{} bytes received", file.bytes.len())))
    }
}

/// Enforces the upload size limit.
pub struct FileSizeCheck {
    max_bytes: u64,
}

impl FileSizeCheck {
    /// Create with the largest accepted size.
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl FileCheck for FileSizeCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let size = file.metadata.size.max(file.bytes.len() as u64);
        if size > self.max_bytes {
            Ok(CheckOutcome::fail(format!(
                "The file is {} bytes; the limit is {} bytes",
                size, self.max_bytes
            ))
            .with_details([
                format!("declared size: {}", file.metadata.size),
                format!("received bytes: {}", file.bytes.len()),
            ]))
        } else {
            Ok(CheckOutcome::pass(format!("{} bytes is within the limit", size)))
        }
    }
}

/// Flags file names that carry path separators or control characters.
pub struct FileNameCheck;

impl FileCheck for FileNameCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let name = &file.metadata.name;
        let mut problems = Vec::new();
        if name.contains('/') || name.contains('\\') {
            problems.push("contains a path separator".to_string());
        }
        if name.chars().any(char::is_control) {
            problems.push("contains control characters".to_string());
        }
        if name.starts_with('.') {
            problems.push("is a hidden file name".to_string());
        }

        if problems.is_empty() {
            Ok(CheckOutcome::pass("File name is clean"))
        } else {
            Ok(CheckOutcome::warning(format!("File name '{}' {}", name, problems.join(" and ")))
                .with_details(problems))
        }
    }
}

/// Requires UTF-8 text.
pub struct EncodingCheck;

impl FileCheck for EncodingCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        if file.text().is_some() {
            return Ok(CheckOutcome::pass("File is valid UTF-8"));
        }
        let offset = match std::str::from_utf8(&file.bytes) {
            Ok(_) => 0,
            Err(error) => error.valid_up_to(),
        };
        Ok(CheckOutcome::fail("File is not valid UTF-8")
            .with_details([format!("first invalid byte at offset {}", offset)]))
    }
}

/// Requires a non-blank first line.
pub struct HeaderPresentCheck;

impl FileCheck for HeaderPresentCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        match header_fields(file) {
            Ok(fields) => Ok(CheckOutcome::pass(format!("Header has {} columns", fields.len()))),
            Err(CheckError::MissingContext(_)) => {
                Ok(CheckOutcome::fail("The first line of the file is blank"))
            }
            Err(other) => Err(other),
        }
    }
}

/// Rejects repeated column names, compared case-insensitively.
pub struct DuplicateHeadersCheck;

impl FileCheck for DuplicateHeadersCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let fields = header_fields(file)?;
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for (position, field) in fields.iter().enumerate() {
            if is_blank(field) {
                continue;
            }
            let key = field.trim().to_lowercase();
            match seen.get(&key) {
                Some(first) => duplicates.push(format!(
                    "'{}' at column {} repeats column {}",
                    field.trim(),
                    position + 1,
                    first + 1
                )),
                None => {
                    seen.insert(key, position);
                }
            }
        }

        if duplicates.is_empty() {
            Ok(CheckOutcome::pass("Column names are unique"))
        } else {
            Ok(CheckOutcome::fail(format!("{} duplicate column name(s)", duplicates.len()))
                .with_details(capped_details(duplicates)))
        }
    }
}

/// Rejects unnamed columns.
pub struct BlankHeadersCheck;

impl FileCheck for BlankHeadersCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let blanks: Vec<String> = header_fields(file)?
            .iter()
            .enumerate()
            .filter(|(_, field)| is_blank(field))
            .map(|(position, _)| format!("column {} has no name", position + 1))
            .collect();

        if blanks.is_empty() {
            Ok(CheckOutcome::pass("Every column is named"))
        } else {
            Ok(CheckOutcome::fail(format!("{} unnamed column(s)", blanks.len()))
                .with_details(capped_details(blanks)))
        }
    }
}

/// Compares each record's field count with the header's.
pub struct ColumnConsistencyCheck;

impl FileCheck for ColumnConsistencyCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let expected = header_fields(file)?.len();
        let text = file
            .text()
            .ok_or_else(|| CheckError::Unreadable("file is not valid UTF-8".to_string()))?;

        let mut checked = 0usize;
        let mut mismatches = Vec::new();
        for (line_number, line) in text.lines().enumerate().skip(1) {
            if is_blank(line) {
                continue;
            }
            checked += 1;
            let found = split_record(line).len();
            if found != expected {
                mismatches.push(format!(
                    "line {}: {} fields, expected {}",
                    line_number + 1,
                    found,
                    expected
                ));
            }
        }

        let tally = RowTally::new(checked, mismatches.len());
        if mismatches.is_empty() {
            Ok(CheckOutcome::pass(format!("All {} records have {} fields", checked, expected))
                .with_tally(tally))
        } else {
            Ok(CheckOutcome::warning(format!(
                "{} of {} records have the wrong number of fields",
                mismatches.len(),
                checked
            ))
            .with_tally(tally)
            .with_details(capped_details(mismatches)))
        }
    }
}

/// Flags files that mix CRLF and LF line endings.
pub struct LineEndingsCheck;

impl FileCheck for LineEndingsCheck {
    fn evaluate(&self, file: &FileInput) -> CheckResult {
        let bytes = &file.bytes;
        let crlf = bytes.windows(2).filter(|w| *w == b"\r\n").count();
        let lf = bytes.iter().filter(|&&b| b == b'\n').count() - crlf;

        if crlf > 0 && lf > 0 {
            Ok(CheckOutcome::warning("The file mixes CRLF and LF line endings")
                .with_details([format!("{} CRLF, {} LF", crlf, lf)]))
        } else {
            Ok(CheckOutcome::pass("Line endings are consistent"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CheckStatus;

    fn csv(content: &str) -> FileInput {
        FileInput::new("people.csv", content.as_bytes().to_vec())
    }

    #[test]
    fn test_file_type() {
        let check = FileTypeCheck::new(vec!["csv".into()], vec!["text/csv".into()]);

        let pdf = FileInput::new("report.pdf", b"%PDF".to_vec());
        assert_eq!(check.evaluate(&pdf).unwrap().status, CheckStatus::Fail);

        let plain = csv("a\n1\n");
        assert_eq!(check.evaluate(&plain).unwrap().status, CheckStatus::Pass);

        let odd_mime = csv("a\n1\n").mime_type("image/png");
        let outcome = check.evaluate(&odd_mime).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.severity, Some(Severity::Medium));

        let with_charset = csv("a\n").mime_type("text/csv; charset=utf-8");
        assert_eq!(check.evaluate(&with_charset).unwrap().status, CheckStatus::Pass);
    }

    #[test]
    fn test_not_empty_and_size() {
        assert_eq!(NotEmptyCheck.evaluate(&csv("")).unwrap().status, CheckStatus::Fail);
        assert_eq!(NotEmptyCheck.evaluate(&csv(" \n\t")).unwrap().status, CheckStatus::Fail);
        assert_eq!(NotEmptyCheck.evaluate(&csv("a")).unwrap().status, CheckStatus::Pass);

        let check = FileSizeCheck::new(4);
        assert_eq!(check.evaluate(&csv("abcd")).unwrap().status, CheckStatus::Pass);
        assert_eq!(check.evaluate(&csv("abcde")).unwrap().status, CheckStatus::Fail);
    }

    #[test]
    fn test_file_name() {
        let hidden = FileInput::new("../.secret.csv", b"a".to_vec());
        let outcome = FileNameCheck.evaluate(&hidden).unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.details.len(), 2);
    }

    #[test]
    fn test_encoding() {
        let bad = FileInput::new("x.csv", vec![b'a', b',', 0xff]);
        let outcome = EncodingCheck.evaluate(&bad).unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, vec!["first invalid byte at offset 2"]);
    }

    #[test]
    fn test_header_checks_on_unreadable_file() {
        let bad = FileInput::new("x.csv", vec![0xff, 0xfe]);
        assert!(matches!(
            DuplicateHeadersCheck.evaluate(&bad),
            Err(CheckError::Unreadable(_))
        ));
    }

    #[test]
    fn test_header_present() {
        assert_eq!(
            HeaderPresentCheck.evaluate(&csv("\n1,2\n")).unwrap().status,
            CheckStatus::Fail
        );
        assert_eq!(
            HeaderPresentCheck.evaluate(&csv("a,b\n1,2\n")).unwrap().status,
            CheckStatus::Pass
        );
    }

    #[test]
    fn test_duplicate_headers() {
        let outcome = DuplicateHeadersCheck
            .evaluate(&csv("name,email,name\nA,a@x.io,B\n"))
            .unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, vec!["'name' at column 3 repeats column 1"]);

        let case_only = DuplicateHeadersCheck.evaluate(&csv("Email, email\n")).unwrap();
        assert_eq!(case_only.status, CheckStatus::Fail);

        assert!(matches!(
            DuplicateHeadersCheck.evaluate(&csv("")),
            Err(CheckError::MissingContext(_))
        ));
    }

    #[test]
    fn test_blank_headers() {
        let outcome = BlankHeadersCheck.evaluate(&csv("a,,c\n")).unwrap();
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert_eq!(outcome.details, vec!["column 2 has no name"]);
    }

    #[test]
    fn test_column_consistency() {
        let outcome = ColumnConsistencyCheck
            .evaluate(&csv("a,b\n1,2\n1\n\"x,y\",z\n\n1,2,3\n"))
            .unwrap();
        assert_eq!(outcome.status, CheckStatus::Warning);
        assert_eq!(outcome.tally, Some(RowTally::new(4, 2)));
        assert_eq!(outcome.details[0], "line 3: 1 fields, expected 2");
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(
            LineEndingsCheck.evaluate(&csv("a\r\nb\nc")).unwrap().status,
            CheckStatus::Warning
        );
        assert_eq!(
            LineEndingsCheck.evaluate(&csv("a\r\nb\r\n")).unwrap().status,
            CheckStatus::Pass
        );
    }
}
