use std::path::{Path, PathBuf};

use colored::Colorize;
use margincheck_core::{annotate, report, snapshot, Diagnostics};

use crate::prelude::{eprintln, println, *};
use crate::suggest::SuggestOptions;

#[derive(Debug, clap::Parser)]
#[command(name = "annotate")]
#[command(about = "Write an annotated copy of the PDF marking code that runs into the margin")]
pub struct App {
    /// Path to the source PDF file
    pub path: PathBuf,

    /// Reuse the problem pages of a saved snapshot instead of detecting again
    #[clap(long)]
    pub snapshot: Option<PathBuf>,

    /// Output file [default: <source>_annotated.pdf, or stdout with --text]
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Append reformatting suggestions to the notes
    #[clap(long)]
    pub include_suggestions: bool,

    /// Ask the model for suggestions before annotating (implies --include-suggestions)
    #[clap(long)]
    pub suggest: bool,

    /// Write a text report instead of an annotated PDF
    #[clap(long)]
    pub text: bool,

    #[clap(flatten)]
    pub model: SuggestOptions,
}

/// `<dir>/<stem>_annotated.pdf` next to the source.
pub fn default_output(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    source.with_file_name(f!("{}_annotated.pdf", stem))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let mut diagnostics = Diagnostics::new();

    let mut pages = match &app.snapshot {
        Some(snapshot_path) => {
            crate::check::ensure_pdf(&app.path)?;
            snapshot::load(snapshot_path)
                .with_context(|| f!("Failed to load snapshot {}", snapshot_path.display()))?
        }
        None => crate::check::detect_pages(&app.path, None, &global, &mut diagnostics).await?,
    };

    if app.suggest {
        crate::suggest::enrich(&mut pages, &app.model, &global, &mut diagnostics).await?;
    }

    if app.text {
        let text = report::render_as_text(&pages).join("\n");
        match &app.output {
            Some(output) => {
                if is_same_file(output, &app.path) {
                    return Err(Error::WouldOverwriteSource(output.clone()).into());
                }
                std::fs::write(output, text + "\n")
                    .with_context(|| f!("Failed to write {}", output.display()))?;
                eprintln!("Report written to {}", output.display());
            }
            None => std::println!("{}", text),
        }
        return Ok(());
    }

    let output = app
        .output
        .clone()
        .unwrap_or_else(|| default_output(&app.path));
    if is_same_file(&output, &app.path) {
        return Err(Error::WouldOverwriteSource(output).into());
    }

    let include_suggestions = app.include_suggestions || app.suggest;
    let (mut document, summary) =
        annotate::annotate_pdf(&pages, &app.path, include_suggestions, &mut diagnostics)
            .with_context(|| f!("Failed to annotate {}", app.path.display()))?;
    document
        .save(&output)
        .with_context(|| f!("Failed to write {}", output.display()))?;

    println!(
        "{} {}",
        f!("{} annotations written to", summary.written).green(),
        output.display()
    );
    if summary.skipped > 0 {
        println!(
            "{}",
            f!("{} annotations skipped (anchor outside the page)", summary.skipped).yellow()
        );
    }
    if summary.failed > 0 {
        println!(
            "{}",
            f!("{} annotations could not be written", summary.failed).red()
        );
    }

    Ok(())
}
