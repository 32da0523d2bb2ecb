//! Stagegate CLI - Staged File Import Validation
//!
//! This is a demonstration CLI for the stagegate library. It plays the part
//! of the upload and parser collaborators with a naive CSV splitter.

use anyhow::{bail, Context, Result};
use stagegate::catalog::builtin::split_record;
use stagegate::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("stagegate");

    if args.len() < 2 {
        print_usage(program);
        return Ok(());
    }

    match args[1].as_str() {
        "catalog" => list_checks(load_config(&args[2..])?.as_ref()),
        "run" => {
            let Some(path) = args.get(2) else {
                print_usage(program);
                bail!("please specify a CSV file");
            };
            run_import(Path::new(path), &args[3..])
        }
        "status" => {
            let Some(id) = args.get(2) else {
                print_usage(program);
                bail!("please specify a session id");
            };
            show_status(id, &args[3..])
        }
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            print_usage(program);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("Stagegate v{}", stagegate::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  catalog [--config FILE]               List all checks by stage");
    println!("  run <csv> [options]                   Run a file through every stage");
    println!("  status <session-id> --session-dir DIR Show a stored session");
    println!("  help                                  Show this help message");
    println!();
    println!("Options:");
    println!("  --config <file>       Pipeline configuration (TOML)");
    println!("  --session-dir <dir>   Directory for session documents");
    println!("  --json                Print the session as JSON (status only)");
}

/// Options shared by the commands.
#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    session_dir: Option<PathBuf>,
    json: bool,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                options.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--session-dir" if i + 1 < args.len() => {
                options.session_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--json" => {
                options.json = true;
                i += 1;
            }
            other => bail!("unknown option: {}", other),
        }
    }
    Ok(options)
}

fn load_config(args: &[String]) -> Result<Option<PipelineConfig>> {
    let options = parse_options(args)?;
    options
        .config
        .map(|path| {
            PipelineConfig::from_file(&path)
                .with_context(|| format!("loading configuration from {}", path.display()))
        })
        .transpose()
}

fn list_checks(config: Option<&PipelineConfig>) -> Result<()> {
    let default = PipelineConfig::default();
    let catalog = ValidationCatalog::with_builtins(config.unwrap_or(&default));

    println!("Available checks ({} total):", catalog.len());
    println!();

    for (category, checks) in catalog.grouped_by_category() {
        println!("  {} ({})", category, category.input_kind());
        for check in checks {
            let severity = check
                .severity
                .map_or_else(|| "info".to_string(), |s| s.to_string());
            println!("      • {} [{}] - {}", check.id, severity, check.description);
        }
        println!();
    }
    Ok(())
}

fn build_pipeline(options: &Options) -> Result<ImportPipeline> {
    let config = match &options.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut builder = ImportPipeline::builder(config).with_events(|event: PipelineEvent| {
        if let PipelineEvent::RunDiscarded { category, run, .. } = event {
            println!("   ↺ {}: run {} superseded", category, run);
        }
    });
    if let Some(dir) = &options.session_dir {
        let store = JsonFileSessionStore::open(dir)
            .with_context(|| format!("opening session directory {}", dir.display()))?;
        builder = builder.with_store(Arc::new(store));
    }
    Ok(builder.build())
}

fn run_import(path: &Path, args: &[String]) -> Result<()> {
    let options = parse_options(args)?;
    let pipeline = build_pipeline(&options)?;

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let file = FileInput::new(name, bytes);
    let rows = parse_rows(&file);

    let session = pipeline.create_session(file.metadata.clone())?;
    let id = session.id();
    pipeline.set_summary(
        id,
        format!("{} rows in {} columns", rows.len(), rows.headers.len()),
    )?;
    println!("📄 {} ({} bytes), session {}", file.metadata.name, file.metadata.size, id);
    println!();

    let file: Arc<ValidationInput> = file.into();
    let rows: Arc<ValidationInput> = rows.into();

    let mut next = None;
    loop {
        let category = match pipeline.enter(id, next)? {
            Stage::At(category) => category,
            Stage::Done => {
                println!("🎉 Import complete");
                break;
            }
            Stage::NotStarted => bail!("session {} did not start", id),
        };

        let input = match category.input_kind() {
            InputKind::File => Arc::clone(&file),
            InputKind::Rows => Arc::clone(&rows),
        };
        pipeline.run_stage(id, category, input)?;
        print_stage(&pipeline, id, category)?;

        match pipeline.route(id, category)? {
            Route::Advance(Stage::At(following)) => next = Some(following),
            Route::Advance(_) => {
                println!("🎉 Import complete");
                break;
            }
            Route::Stay => {
                println!("⛔ Fix the issues above and run {} again", category);
                break;
            }
            Route::ReturnTo(target) => {
                println!("⛔ Go back to {} and upload a corrected file", target);
                break;
            }
        }
    }

    if options.session_dir.is_some() {
        println!();
        println!("Session saved: {}", id);
    }
    Ok(())
}

fn print_stage(pipeline: &ImportPipeline, id: SessionId, category: ValidationCategory) -> Result<()> {
    let snapshot = pipeline.snapshot(id)?;
    let rollup = pipeline.rollup(id, category)?;
    println!(
        "{} {} - {} (score {})",
        status_icon(snapshot.status(category)),
        category,
        snapshot.status(category),
        rollup.score
    );

    for result in pipeline.results(id, category)? {
        let icon = match result.status {
            CheckStatus::Pass => "✓",
            CheckStatus::Warning => "!",
            CheckStatus::Fail => "✗",
            CheckStatus::Pending => "…",
        };
        println!("   {} {}: {}", icon, result.name, result.message);
        if result.status != CheckStatus::Pass {
            for detail in &result.technical_details {
                println!("       {}", detail);
            }
        }
    }
    println!();
    Ok(())
}

fn status_icon(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Success => "✅",
        StageStatus::Warning => "⚠️ ",
        StageStatus::Error => "❌",
        StageStatus::VerificationPending => "⏳",
        StageStatus::InProgress => "🔄",
        StageStatus::NotStarted => "  ",
    }
}

fn show_status(id: &str, args: &[String]) -> Result<()> {
    let options = parse_options(args)?;
    if options.session_dir.is_none() {
        bail!("--session-dir is required");
    }
    let id: SessionId = id
        .parse()
        .with_context(|| format!("'{}' is not a session id", id))?;
    let pipeline = build_pipeline(&options)?;
    let session = pipeline.resume(id)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("Session {} ({})", session.id(), session.lifecycle());
    println!("File: {} ({} bytes)", session.file().name, session.file().size);
    if !session.summary().is_empty() {
        println!("Summary: {}", session.summary());
    }
    println!("Current stage: {}", session.current_stage());
    println!("Revision: {}", session.revision());
    println!();
    for &category in ValidationCategory::all() {
        let cleared = if session.is_completed(category) { "cleared" } else { "" };
        let score = stagegate::validation::score(session.results(category));
        println!(
            "  {} {:<20} {:<22} score {:>3} {}",
            status_icon(session.status(category)),
            category.display_name(),
            session.status(category).to_string(),
            score,
            cleared
        );
    }
    Ok(())
}

/// Split a CSV file into a header row and value rows.
///
/// Quoted fields are honoured within a line; fields spanning lines are the
/// job of a real parser.
fn parse_rows(file: &FileInput) -> RowSet {
    let Some(text) = file.text() else {
        return RowSet::default();
    };
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return RowSet::default();
    };

    let mut rows = RowSet::new(split_record(header).into_iter().map(|h| h.trim().to_string()));
    for line in lines {
        rows.push_values(split_record(line));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_keeps_escaped_quotes() {
        let file = FileInput::new(
            "quotes.csv",
            b"name,note\r\n\"Lovelace, Ada\",\"say \"\"hi\"\"\"\r\n\r\nGrace,plain\n".to_vec(),
        );
        let rows = parse_rows(&file);

        assert_eq!(rows.headers, vec!["name", "note"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[0]["name"], "Lovelace, Ada");
        assert_eq!(rows.rows[0]["note"], "say \"hi\"");
        assert_eq!(rows.rows[1]["note"], "plain");
    }

    #[test]
    fn test_parse_rows_without_text() {
        assert!(parse_rows(&FileInput::new("empty.csv", Vec::new())).headers.is_empty());
        assert!(parse_rows(&FileInput::new("bin.csv", vec![0xff, 0xfe])).is_empty());
    }
}
