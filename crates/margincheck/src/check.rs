use std::path::{Path, PathBuf};

use colored::Colorize;
use margincheck_core::{detect, snapshot, Diagnostics, ProblemPdfPage};

use crate::prelude::{eprintln, println, *};
use crate::suggest::SuggestOptions;

#[derive(Debug, clap::Parser)]
#[command(name = "check")]
#[command(about = "Detect highlighted code blocks that run into the margin")]
pub struct App {
    /// Path to the PDF file
    pub path: PathBuf,

    /// Print the detected problem pages as JSON
    #[clap(long)]
    pub json: bool,

    /// Directory the snapshot file is written to
    #[clap(long, env = "MARGINCHECK_SNAPSHOT_DIR", default_value = ".")]
    pub snapshot_dir: PathBuf,

    /// Do not write a snapshot file
    #[clap(long)]
    pub no_snapshot: bool,

    /// Ask the model for a reformatting suggestion for every block
    #[clap(long)]
    pub suggest: bool,

    #[clap(flatten)]
    pub model: SuggestOptions,
}

/// Fail early on a missing path or one without a `.pdf` extension.
pub fn ensure_pdf(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::NotFound(path.to_path_buf()).into());
    }
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(Error::NotAPdf(path.to_path_buf()).into());
    }
    Ok(())
}

/// Detect, optionally enrich with suggestions, and return the problem pages.
pub async fn detect_pages(
    path: &Path,
    suggest: Option<&SuggestOptions>,
    global: &crate::Global,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ProblemPdfPage>> {
    ensure_pdf(path)?;

    let mut pages = detect::detect_path(path, diagnostics)
        .with_context(|| f!("Failed to analyse {}", path.display()))?;

    if global.verbose {
        eprintln!(
            "Detected {} problem blocks on {} pages",
            block_count(&pages),
            pages.len()
        );
    }

    if let Some(options) = suggest {
        let applied = crate::suggest::enrich(&mut pages, options, global, diagnostics).await?;
        if global.verbose {
            eprintln!("Stored {} suggestions", applied);
        }
    }

    Ok(pages)
}

pub fn block_count(pages: &[ProblemPdfPage]) -> usize {
    pages.iter().map(|p| p.problem_code_blocks.len()).sum()
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let first = text.lines().next().unwrap_or_default();
    if first.chars().count() > max {
        let cut: String = first.chars().take(max.saturating_sub(3)).collect();
        f!("{}...", cut)
    } else {
        first.to_string()
    }
}

fn print_table(pages: &[ProblemPdfPage]) {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Page".bold().cyan(),
        "Block".bold().cyan(),
        "Font size".bold().cyan(),
        "Fits".bold().cyan(),
        "Suggestion".bold().cyan(),
        "Text".bold().cyan()
    ]);

    for page in pages {
        for (key, block) in page.keyed_blocks() {
            let font_size = block
                .font_size
                .map(|fs| f!("{:.1}", fs))
                .unwrap_or_else(|| "-".to_string());
            let fits = block
                .chars_fit()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let suggestion = if block.suggested_reformat.is_some() {
                "yes".green()
            } else {
                "no".bright_black()
            };
            table.add_row(prettytable::row![
                (key.page_num + 1).to_string().green(),
                (key.block_index + 1).to_string(),
                font_size.bright_yellow(),
                fits,
                suggestion,
                preview(&block.full_text, 60).bright_white()
            ]);
        }
    }

    table.printstd();
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let mut diagnostics = Diagnostics::new();
    let suggest = app.suggest.then_some(&app.model);
    let pages = detect_pages(&app.path, suggest, &global, &mut diagnostics).await?;

    if !app.no_snapshot {
        let path = snapshot::save(&app.snapshot_dir, &app.path, &pages, &chrono::Local::now())
            .with_context(|| f!("Failed to write snapshot to {}", app.snapshot_dir.display()))?;
        eprintln!("Snapshot written to {}", path.display());
    }

    if app.json {
        std::println!("{}", serde_json::to_string_pretty(&pages)?);
    } else if pages.is_empty() {
        println!("{}", "No code runs into the margin.".green());
    } else {
        print_table(&pages);
        println!(
            "{}",
            f!(
                "{} problem blocks on {} pages",
                block_count(&pages),
                pages.len()
            )
            .yellow()
            .bold()
        );
    }

    if diagnostics.warning_count() > 0 {
        eprintln!(
            "{}",
            f!("{} warnings; rerun with RUST_LOG=warn for details", diagnostics.warning_count())
                .bright_black()
        );
    }

    Ok(())
}
