//! HTML block-level extraction via `scraper`, converted into Markdown text
//! that the normaliser's Markdown path then strips and filters.

use scraper::{Html, Selector};

/// One block-level element in document order: an optional heading level
/// (1-6) and its text content.
pub struct Block {
    pub heading_level: Option<u8>,
    pub text: String,
}

/// Walks block-level elements (`h1`-`h6`, `p`, `li`, `blockquote`) in
/// document order, skipping `script`/`style`/`code`/`pre` content.
pub fn extract_blocks(raw_html: &str) -> Vec<Block> {
    let document = Html::parse_document(raw_html);
    let selector = Selector::parse("h1,h2,h3,h4,h5,h6,p,li,blockquote")
        .expect("static selector is valid");

    document
        .select(&selector)
        .filter_map(|el| {
            let tag = el.value().name();
            let text: String = el
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                return None;
            }
            let heading_level = match tag {
                "h1" => Some(1),
                "h2" => Some(2),
                "h3" => Some(3),
                "h4" => Some(4),
                "h5" => Some(5),
                "h6" => Some(6),
                _ => None,
            };
            Some(Block { heading_level, text })
        })
        .collect()
}

/// Converts a block list to Markdown text, one block per paragraph,
/// separated by blank lines — the shape `paragraphs_from_markdown` expects.
pub fn blocks_to_markdown(blocks: Vec<Block>) -> String {
    blocks
        .into_iter()
        .map(|b| match b.heading_level {
            Some(level) => format!("{} {}", "#".repeat(level as usize), b.text),
            None => b.text,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_paragraphs_and_headings_in_order() {
        let html = "<html><body><h1>Title</h1><p>First real paragraph with enough words.</p><p>Second real paragraph with enough words.</p></body></html>";
        let blocks = extract_blocks(html);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].heading_level, Some(1));
        assert_eq!(blocks[1].heading_level, None);
    }

    #[test]
    fn skips_empty_blocks() {
        let html = "<html><body><p></p><p>Real content here with words.</p></body></html>";
        let blocks = extract_blocks(html);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn converts_headings_to_markdown_pounds() {
        let blocks = vec![
            Block { heading_level: Some(2), text: "Heading".into() },
            Block { heading_level: None, text: "Body text.".into() },
        ];
        let md = blocks_to_markdown(blocks);
        assert_eq!(md, "## Heading\n\nBody text.");
    }
}
