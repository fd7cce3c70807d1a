use crate::prelude::{eprintln, *};
use indicatif::{ProgressBar, ProgressStyle};
use margincheck_core::suggest::{apply_suggestions, build_prompt, requests, SYSTEM_PREAMBLE};
use margincheck_core::{DiagnosticSink, ProblemPdfPage};
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::ollama;

#[derive(Debug, Clone, clap::Args)]
pub struct SuggestOptions {
    /// Ollama base URL
    #[clap(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Model used for reformatting suggestions
    #[clap(long, env = "MARGINCHECK_MODEL", default_value = "qwen2.5-coder")]
    pub model: String,
}

fn create_client(ollama_url: &str) -> Result<ollama::Client> {
    use rig::client::Nothing;

    ollama::Client::builder()
        .api_key(Nothing)
        .base_url(ollama_url)
        .build()
        .map_err(|e| eyre!("Failed to create Ollama client: {}", e))
}

/// Ask the model for a reformatting of every block, one request at a time,
/// and store the usable answers. A failed request only costs that block
/// its suggestion.
pub async fn enrich(
    pages: &mut [ProblemPdfPage],
    options: &SuggestOptions,
    global: &crate::Global,
    sink: &mut dyn DiagnosticSink,
) -> Result<usize> {
    let requests = requests(pages);
    if requests.is_empty() {
        return Ok(0);
    }

    if global.verbose {
        eprintln!("Ollama URL: {}", options.ollama_url);
        eprintln!("Model: {}", options.model);
        eprintln!("Blocks: {}", requests.len());
    }

    let client = create_client(&options.ollama_url)?;
    let agent = client
        .agent(&options.model)
        .preamble(SYSTEM_PREAMBLE)
        .build();

    let progress = ProgressBar::new(requests.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| eyre!("Invalid progress template: {}", e))?,
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut results = Vec::with_capacity(requests.len());
    for request in &requests {
        progress.set_message(f!("suggesting {}", request.key));
        let prompt = build_prompt(request);

        let answer = match agent.prompt(&prompt).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                log::warn!("{}: model request failed: {}", request.key, e);
                None
            }
        };
        results.push((request.key, answer));
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(apply_suggestions(pages, results, sink))
}
