use std::path::PathBuf;

use margincheck_core::{report, snapshot};

use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "report")]
#[command(about = "Print the text report of a saved snapshot")]
pub struct App {
    /// Path to a snapshot written by `check`
    pub snapshot: PathBuf,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let pages = snapshot::load(&app.snapshot)
        .with_context(|| f!("Failed to load snapshot {}", app.snapshot.display()))?;

    if global.verbose {
        eprintln!("Loaded {} problem pages", pages.len());
    }

    if pages.is_empty() {
        println!("No problem blocks recorded.");
        return Ok(());
    }

    for line in report::render_as_text(&pages) {
        std::println!("{}", line);
    }

    Ok(())
}
