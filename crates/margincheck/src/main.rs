use crate::prelude::*;
use clap::Parser;

mod annotate;
mod check;
mod error;
mod prelude;
mod report;
mod suggest;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Find highlighted code listings that run into the margin of a PDF and annotate them"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Whether to display additional information.
    #[clap(long, env = "MARGINCHECK_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Detect code blocks running into the margin
    Check(crate::check::App),

    /// Write an annotated copy of the PDF (or a text report)
    Annotate(crate::annotate::App),

    /// Print the text report of a saved snapshot
    Report(crate::report::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Check(sub_app) => crate::check::run(sub_app, app.global).await,
        SubCommands::Annotate(sub_app) => crate::annotate::run(sub_app, app.global).await,
        SubCommands::Report(sub_app) => crate::report::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
