//! Upload run: discover, convert and publish every source document.

use std::path::{Path, PathBuf};

use poster_config::Configuration;
use poster_confluence::{
    ConfluenceClient, RetryPolicy, SessionBuilder, Transport, UpsertAction, UpsertOutcome,
    Upserter,
};
use poster_renderer::{Converter, ConverterOptions, ProcessedDocument, discover};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{CliError, FileError};
use crate::output::Output;

/// Outcome for one source file.
#[derive(Debug)]
pub(crate) struct FileReport {
    pub path: PathBuf,
    pub result: Result<UpsertOutcome, FileError>,
}

/// Publish everything under the configured source path.
///
/// Returns `Ok(true)` when every document was published (or, for a dry run,
/// converted). Configuration, session and discovery problems abort the run
/// with an error before anything is sent.
pub(crate) fn execute(
    config: &Configuration,
    dry_run: bool,
    output: &Output,
) -> Result<bool, CliError> {
    let files = discover(config.source_path())?;
    if files.is_empty() {
        output.info(&format!(
            "No markdown or HTML files found in {}",
            config.source_path().display()
        ));
        return Ok(true);
    }
    let converter = converter_for(config);

    if dry_run {
        return Ok(preview(&files, &converter, output));
    }

    let session = SessionBuilder::build(config)?;
    let client = ConfluenceClient::new(session, RetryPolicy::from_settings(config.upload()));
    let upserter = Upserter::new(&client, config.space_key(), config.parent_title());
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.upload().jobs)
        .build()?;

    output.info(&format!(
        "Publishing {} document(s) under \"{}\" in space {}",
        files.len(),
        config.parent_title(),
        config.space_key()
    ));
    let reports = publish_all(&pool, &files, &converter, &upserter);
    Ok(summarize(&reports, output))
}

fn converter_for(config: &Configuration) -> Converter {
    let settings = config.converter();
    Converter::new(ConverterOptions {
        code_theme: Some(settings.code_theme.clone()).filter(|theme| !theme.is_empty()),
        line_numbers: settings.line_numbers,
    })
}

/// Convert and upsert every file on `pool`. Reports come back in input order.
pub(crate) fn publish_all<T: Transport>(
    pool: &ThreadPool,
    files: &[PathBuf],
    converter: &Converter,
    upserter: &Upserter<'_, T>,
) -> Vec<FileReport> {
    pool.install(|| {
        files
            .par_iter()
            .map(|path| FileReport {
                path: path.clone(),
                result: publish_one(path, converter, upserter),
            })
            .collect()
    })
}

fn publish_one<T: Transport>(
    path: &Path,
    converter: &Converter,
    upserter: &Upserter<'_, T>,
) -> Result<UpsertOutcome, FileError> {
    let document = ProcessedDocument::from_path(path, converter)?;
    let outcome = upserter.upsert(&document).inspect_err(|err| {
        tracing::debug!(path = %path.display(), error = %err, "Upsert failed");
    })?;
    Ok(outcome)
}

/// Print one line per file and a total. Returns whether all succeeded.
pub(crate) fn summarize(reports: &[FileReport], output: &Output) -> bool {
    let mut failed = 0;
    output.info("");
    for report in reports {
        match &report.result {
            Ok(outcome) => output.success(&describe(outcome)),
            Err(err) => {
                failed += 1;
                output.error(&format!("Failed {}: {err}", report.path.display()));
            }
        }
    }
    output.highlight(&format!(
        "\n{} published, {} failed",
        reports.len() - failed,
        failed
    ));
    failed == 0
}

fn describe(outcome: &UpsertOutcome) -> String {
    let verb = match outcome.action {
        UpsertAction::Created => "Created",
        UpsertAction::Updated => "Updated",
    };
    let page = &outcome.page;
    let mut line = format!(
        "{verb} \"{}\" (id {}, version {})",
        page.title, page.id, page.version
    );
    if outcome.conflict_retried {
        line.push_str(" after a version conflict");
    }
    line
}

/// Convert each file and print its title and body without publishing.
fn preview(files: &[PathBuf], converter: &Converter, output: &Output) -> bool {
    output.highlight("[DRY RUN] Nothing will be published.");
    let mut ok = true;
    for path in files {
        match ProcessedDocument::from_path(path, converter) {
            Ok(document) => {
                output.info(&format!("\n{} ({})", document.title(), path.display()));
                output.content(document.body().as_str());
            }
            Err(err) => {
                ok = false;
                output.error(&format!("Failed {}: {err}", path.display()));
            }
        }
    }
    ok
}
