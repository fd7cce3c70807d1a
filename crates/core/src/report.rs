use crate::model::ProblemPdfPage;

fn page_marker(edge: &str, page_number: usize) -> String {
    format!("********** {edge} PDF Page {page_number} (absolute page) **********")
}

fn block_marker(edge: &str, kind: &str, index: usize, count: usize) -> String {
    format!("***** {edge} {kind} Code Block {index} of {count} *****")
}

/// Render problem pages as plain text lines.
///
/// Each page is bracketed by page markers (1-based page numbers). Each block
/// gets a `Problematic` section with its text and, when a suggestion is
/// present, a `Suggested` section. A blank line follows every block section.
pub fn render_as_text(pages: &[ProblemPdfPage]) -> Vec<String> {
    let mut lines = Vec::new();

    for page in pages {
        let page_number = page.page_num + 1;
        let count = page.problem_code_blocks.len();
        lines.push(page_marker("START", page_number));

        for (i, block) in page.problem_code_blocks.iter().enumerate() {
            let index = i + 1;
            lines.push(block_marker("START", "Problematic", index, count));
            lines.push(block.full_text.clone());
            lines.push(block_marker("END", "Problematic", index, count));
            lines.push(String::new());

            if let Some(suggestion) = &block.suggested_reformat {
                lines.push(block_marker("START", "Suggested", index, count));
                lines.push(suggestion.clone());
                lines.push(block_marker("END", "Suggested", index, count));
                lines.push(String::new());
            }
        }

        lines.push(page_marker("END", page_number));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProblemCodeBlock, Rectangle};
    use std::path::PathBuf;

    fn block(text: &str, suggestion: Option<&str>) -> ProblemCodeBlock {
        ProblemCodeBlock {
            allotted_rect: Rectangle::new(100.0, 100.0, 300.0, 120.0),
            full_text_rect: Rectangle::new(100.0, 100.0, 612.0, 120.0),
            full_text: text.to_string(),
            font_size: Some(10.0),
            suggested_reformat: suggestion.map(str::to_string),
        }
    }

    fn page(page_num: usize, blocks: Vec<ProblemCodeBlock>) -> ProblemPdfPage {
        ProblemPdfPage {
            filepath: PathBuf::from("book.pdf"),
            page_num,
            problem_code_blocks: blocks,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(render_as_text(&[]).is_empty());
    }

    #[test]
    fn test_single_block_without_suggestion() {
        let lines = render_as_text(&[page(0, vec![block("fn main() {}", None)])]);
        assert_eq!(
            lines,
            vec![
                "********** START PDF Page 1 (absolute page) **********",
                "***** START Problematic Code Block 1 of 1 *****",
                "fn main() {}",
                "***** END Problematic Code Block 1 of 1 *****",
                "",
                "********** END PDF Page 1 (absolute page) **********",
            ]
        );
        assert!(!lines.iter().any(|l| l.contains("Suggested")));
    }

    #[test]
    fn test_suggestion_section_follows_block() {
        let lines = render_as_text(&[page(
            4,
            vec![
                block("first", Some("first\n  reformatted")),
                block("second", None),
            ],
        )]);

        assert_eq!(lines[0], "********** START PDF Page 5 (absolute page) **********");
        assert_eq!(lines[5], "***** START Suggested Code Block 1 of 2 *****");
        assert_eq!(lines[6], "first\n  reformatted");
        assert_eq!(lines[7], "***** END Suggested Code Block 1 of 2 *****");
        assert_eq!(lines[9], "***** START Problematic Code Block 2 of 2 *****");
        assert_eq!(lines.last().unwrap(), "********** END PDF Page 5 (absolute page) **********");
        assert_eq!(lines.len(), 14);
    }

    #[test]
    fn test_pages_keep_input_order() {
        let lines = render_as_text(&[page(7, vec![block("a", None)]), page(2, vec![block("b", None)])]);
        let headers: Vec<&String> = lines.iter().filter(|l| l.contains("START PDF Page")).collect();
        assert_eq!(
            headers,
            vec![
                "********** START PDF Page 8 (absolute page) **********",
                "********** START PDF Page 3 (absolute page) **********",
            ]
        );
    }
}
