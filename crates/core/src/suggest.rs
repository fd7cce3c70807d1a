//! Pure half of the suggestion step: building requests and prompts for the
//! language model and folding its answers back into the problem pages.
//!
//! The model call itself lives in the binary. Results are joined back by
//! [`BlockKey`], never by position in a response.

use std::collections::HashMap;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::model::{BlockKey, ProblemPdfPage};

/// Answer the model gives when it cannot reformat a block.
pub const FAIL_SENTINEL: &str = "UNABLE_TO_ASSESS";

pub const SYSTEM_PREAMBLE: &str = "You are a technical book editor. You reformat code listings \
so every line fits within a fixed width, keeping the code valid and its meaning unchanged. \
You respond with code only.";

/// One block to be reformatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub key: BlockKey,
    pub full_text: String,
    pub chars_fit: Option<u32>,
}

/// One request per block, pages and blocks in stored order.
pub fn requests(pages: &[ProblemPdfPage]) -> Vec<SuggestionRequest> {
    pages
        .iter()
        .flat_map(|page| page.keyed_blocks())
        .map(|(key, block)| SuggestionRequest {
            key,
            full_text: block.full_text.clone(),
            chars_fit: block.chars_fit(),
        })
        .collect()
}

/// Build the user prompt for one request.
pub fn build_prompt(request: &SuggestionRequest) -> String {
    let mut parts = Vec::new();

    parts.push("Reformat the following code so that it no longer runs past the right margin.".to_string());

    match request.chars_fit {
        Some(chars) => parts.push(format!(
            "Each line must be at most {} characters long, including indentation.",
            chars
        )),
        None => parts.push("Keep each line noticeably shorter than the longest line below.".to_string()),
    }

    parts.push(format!("```\n{}\n```", request.full_text));
    parts.push("IMPORTANT: DO NOT PROVIDE ANY OTHER NOTES OR COMMENTARY.".to_string());
    parts.push(format!(
        "If you are uncertain how to or unable to reformat the code, respond only with: {}",
        FAIL_SENTINEL
    ));

    parts.join("\n\n")
}

/// Strip a surrounding Markdown fence (with or without a language tag).
fn strip_fence(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim_matches('\n')
}

/// Clean a raw model answer. `None` for an empty answer or one carrying
/// the failure sentinel anywhere, in any case.
pub fn interpret_response(raw: &str) -> Option<String> {
    if raw.to_uppercase().contains(FAIL_SENTINEL) {
        return None;
    }

    let code = strip_fence(raw);
    if code.trim().is_empty() {
        return None;
    }
    Some(code.to_string())
}

/// Store each suggestion on the block its key names.
///
/// `None` results and keys naming no block are reported; neither touches
/// any block. Returns the number of suggestions stored.
pub fn apply_suggestions(
    pages: &mut [ProblemPdfPage],
    results: impl IntoIterator<Item = (BlockKey, Option<String>)>,
    sink: &mut dyn DiagnosticSink,
) -> usize {
    let page_index: HashMap<usize, usize> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| (page.page_num, i))
        .collect();
    let mut applied = 0;

    for (key, suggestion) in results {
        let block = page_index
            .get(&key.page_num)
            .and_then(|&i| pages[i].problem_code_blocks.get_mut(key.block_index));

        let Some(block) = block else {
            sink.report(Diagnostic::UnmatchedSuggestion { key });
            continue;
        };

        match suggestion.as_deref().and_then(interpret_response) {
            Some(text) => {
                block.suggested_reformat = Some(text);
                applied += 1;
            }
            None => sink.report(Diagnostic::SuggestionUnavailable {
                key,
                reason: "model gave no usable answer".to_string(),
            }),
        }
    }

    applied
}
