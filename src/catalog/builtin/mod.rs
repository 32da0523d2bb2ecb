//! Built-in checks.
//!
//! Checks are grouped by stage family. `register_all` installs them in stage
//! order, which is also the order results are reported in.

pub mod file;
pub mod mapping;
pub mod normalize;
pub mod quality;
pub mod review;

pub use file::{
    BlankHeadersCheck, ColumnConsistencyCheck, DuplicateHeadersCheck, EncodingCheck,
    FileNameCheck, FileSizeCheck, FileTypeCheck, HeaderPresentCheck, LineEndingsCheck,
    NotEmptyCheck,
};
pub use mapping::{EmptyColumnsCheck, RequiredColumnsCheck, UnknownColumnsCheck};
pub use normalize::{
    BlankRowsCheck, EmailCaseCheck, ExactDuplicateRowsCheck, KeyCollisionCheck,
    TrimWhitespaceCheck,
};
pub use quality::{EmailFormatCheck, NumericConsistencyCheck, RequiredValuesCheck};
pub use review::{BatchPlanCheck, RowCountCheck, SummaryCheck};

use crate::catalog::registry::{Validation, ValidationCatalog};
use crate::core::config::PipelineConfig;
use crate::core::types::{CheckType, Severity, ValidationCategory};
use crate::validation::check::CheckFn;

/// Maximum number of detail lines a check reports.
pub const MAX_DETAILS: usize = 20;

/// Register every built-in check.
///
/// A built-in whose id is already taken is skipped, so callers can install
/// their own version of a check before the built-ins.
pub fn register_all(catalog: &ValidationCatalog, config: &PipelineConfig) {
    use ValidationCategory::*;

    let structural = |id: &str, category: ValidationCategory, name: &str, severity: Severity| {
        Validation::new(id, category, name)
            .severity(severity)
            .check_type(CheckType::Structural)
    };
    let data = |id: &str, category: ValidationCategory, name: &str, severity: Severity| {
        Validation::new(id, category, name)
            .severity(severity)
            .check_type(CheckType::Data)
    };

    let checks: Vec<(Validation, CheckFn)> = vec![
        // File upload
        (
            structural("upload_file_type", FileUpload, "File type", Severity::Critical)
                .description("The file extension is one of the accepted types"),
            CheckFn::file(FileTypeCheck::new(
                config.allowed_extensions.clone(),
                config.allowed_mime_types.clone(),
            )),
        ),
        (
            structural("upload_not_empty", FileUpload, "File not empty", Severity::Critical)
                .description("The file contains data"),
            CheckFn::file(NotEmptyCheck),
        ),
        (
            structural("upload_file_size", FileUpload, "File size", Severity::High)
                .description("The file is within the size limit"),
            CheckFn::file(FileSizeCheck::new(config.max_file_size_bytes)),
        ),
        (
            structural("upload_file_name", FileUpload, "File name", Severity::Low)
                .description("The file name has no path separators or control characters"),
            CheckFn::file(FileNameCheck),
        ),
        // File preflight
        (
            structural("preflight_encoding", FilePreflight, "Text encoding", Severity::Critical)
                .description("The file is valid UTF-8"),
            CheckFn::file(EncodingCheck),
        ),
        (
            structural("preflight_header_present", FilePreflight, "Header row", Severity::Critical)
                .description("The first line holds column names"),
            CheckFn::file(HeaderPresentCheck),
        ),
        (
            structural(
                "preflight_duplicate_headers",
                FilePreflight,
                "Duplicate headers",
                Severity::Critical,
            )
            .description("Every column name is unique"),
            CheckFn::file(DuplicateHeadersCheck),
        ),
        (
            structural("preflight_blank_headers", FilePreflight, "Blank headers", Severity::High)
                .description("Every column has a name"),
            CheckFn::file(BlankHeadersCheck),
        ),
        (
            structural(
                "preflight_column_consistency",
                FilePreflight,
                "Column count",
                Severity::Medium,
            )
            .description("Every record has as many fields as the header"),
            CheckFn::file(ColumnConsistencyCheck),
        ),
        (
            structural("preflight_line_endings", FilePreflight, "Line endings", Severity::Low)
                .description("Line endings are used consistently"),
            CheckFn::file(LineEndingsCheck),
        ),
        // Column mapping
        (
            structural(
                "mapping_required_columns",
                ColumnMapping,
                "Required columns",
                Severity::Critical,
            )
            .description("Every required column is present"),
            CheckFn::rows(RequiredColumnsCheck::new(config.required_columns.clone())),
        ),
        (
            structural("mapping_unknown_columns", ColumnMapping, "Unknown columns", Severity::Low)
                .description("Every column maps to a known target field"),
            CheckFn::rows(UnknownColumnsCheck::new(config.known_columns.clone())),
        ),
        (
            data("mapping_empty_columns", ColumnMapping, "Empty columns", Severity::Medium)
                .description("No column is blank in every row"),
            CheckFn::rows(EmptyColumnsCheck),
        ),
        // Data quality
        (
            data("quality_required_values", DataQuality, "Required values", Severity::High)
                .description("Required columns have a value in every row"),
            CheckFn::rows(RequiredValuesCheck::new(config.required_columns.clone())),
        ),
        (
            data("quality_email_format", DataQuality, "Email format", Severity::Medium)
                .description("Email addresses are well formed"),
            CheckFn::rows(EmailFormatCheck),
        ),
        (
            data(
                "quality_numeric_consistency",
                DataQuality,
                "Numeric consistency",
                Severity::Low,
            )
            .description("Numeric columns hold only numbers"),
            CheckFn::rows(NumericConsistencyCheck::default()),
        ),
        // Data transformation
        (
            data("transform_trim_whitespace", DataTransformation, "Whitespace", Severity::Low)
                .description("Values without leading or trailing whitespace"),
            CheckFn::rows(TrimWhitespaceCheck),
        ),
        (
            data("transform_email_case", DataTransformation, "Email case", Severity::Low)
                .description("Email addresses are lower-case"),
            CheckFn::rows(EmailCaseCheck),
        ),
        (
            data("transform_blank_rows", DataTransformation, "Blank rows", Severity::Medium)
                .description("No row is entirely blank"),
            CheckFn::rows(BlankRowsCheck),
        ),
        // Deduplication
        (
            data("dedup_exact_rows", Deduplication, "Duplicate rows", Severity::Medium)
                .description("No row repeats an earlier row exactly"),
            CheckFn::rows(ExactDuplicateRowsCheck),
        ),
        (
            Validation::new("dedup_key_collisions", Deduplication, "Duplicate keys")
                .severity(Severity::High)
                .check_type(CheckType::Business)
                .description("Key columns identify each record uniquely"),
            CheckFn::rows(KeyCollisionCheck::new(config.dedup_key_columns.clone())),
        ),
        // Final review
        (
            Validation::new("review_row_count", FinalReview, "Row count")
                .severity(Severity::Critical)
                .check_type(CheckType::Business)
                .description("The import holds at least one and at most the allowed rows"),
            CheckFn::rows(RowCountCheck::new(config.max_row_count)),
        ),
        (
            Validation::new("review_summary", FinalReview, "Import summary")
                .description("Summary of what will be imported"),
            CheckFn::rows(SummaryCheck),
        ),
        // Import push
        (
            structural(
                "push_target_columns",
                ImportPush,
                "Target columns",
                Severity::Critical,
            )
            .description("The target receives every required column"),
            CheckFn::rows(RequiredColumnsCheck::new(config.required_columns.clone())),
        ),
        (
            Validation::new("push_batch_plan", ImportPush, "Batch plan")
                .description("How rows are split into push batches"),
            CheckFn::rows(BatchPlanCheck::new(config.push_batch_size)),
        ),
    ];

    for (validation, check) in checks {
        let id = validation.id.clone();
        if let Err(error) = catalog.register(validation, check) {
            log::warn!("skipping built-in check '{}': {}", id, error);
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Whether a cell holds nothing but whitespace.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Whether a column holds email addresses, judged by its name.
pub(crate) fn is_email_column(header: &str) -> bool {
    header.to_ascii_lowercase().contains("email")
}

/// Structural email check: one `@`, a local part, and a dotted domain.
pub(crate) fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_alphanumeric() || c == '-')
    })
}

/// Split one delimited line into fields, honouring double quotes.
///
/// This only inspects structure; it is not a full tokenizer and does not
/// handle fields that span lines.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Cap a list of detail lines at [`MAX_DETAILS`], noting how many were cut.
pub(crate) fn capped_details<I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut details = Vec::new();
    let mut extra = 0usize;
    for line in lines {
        if details.len() < MAX_DETAILS {
            details.push(line);
        } else {
            extra += 1;
        }
    }
    if extra > 0 {
        details.push(format!("... and {} more", extra));
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered_in_every_stage() {
        let catalog = ValidationCatalog::with_builtins(&PipelineConfig::default());
        for &category in ValidationCategory::all() {
            assert!(
                catalog.count_for_category(category) > 0,
                "{} has no checks",
                category
            );
        }
        assert_eq!(catalog.len(), 25);
    }

    #[test]
    fn test_preregistered_check_wins() {
        use crate::core::input::FileInput;
        use crate::validation::check::CheckResult;
        use crate::validation::result::CheckOutcome;

        let catalog = ValidationCatalog::new();
        catalog
            .register(
                Validation::new("upload_file_type", ValidationCategory::FileUpload, "Custom"),
                CheckFn::file(|_: &FileInput| -> CheckResult { Ok(CheckOutcome::pass("ok")) }),
            )
            .unwrap();
        register_all(&catalog, &PipelineConfig::default());

        assert_eq!(catalog.get("upload_file_type").unwrap().name, "Custom");
        assert_eq!(catalog.len(), 25);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email(" grace.hopper@navy.mil "));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@example..com"));
    }

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(split_record("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_record("\"x, y\",z\r"), vec!["x, y", "z"]);
        assert_eq!(split_record("\"say \"\"hi\"\"\",2"), vec!["say \"hi\"", "2"]);
        assert_eq!(split_record(""), vec![""]);
    }

    #[test]
    fn test_capped_details() {
        let details = capped_details((0..25).map(|i| i.to_string()));
        assert_eq!(details.len(), MAX_DETAILS + 1);
        assert_eq!(details.last().unwrap(), "... and 5 more");
    }
}
