use scraper::{ElementRef, Html};
use watchpost_core::error::AppError;
use watchpost_core::evaluator::collapse_whitespace;
use watchpost_core::traits::Cleaner;

/// Elements whose content is never rendered as page text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that visually separate their text from the neighbours.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// HTML-to-text cleaner using scraper.
///
/// Drops script and style content, keeps the rendered text, and collapses
/// whitespace so substring searches see what a reader of the page sees.
#[derive(Debug, Clone, Default)]
pub struct TextCleaner;

impl TextCleaner {
    pub fn new() -> Self {
        Self
    }
}

impl Cleaner for TextCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let document = Html::parse_document(html);
        let mut text = String::with_capacity(html.len() / 2);
        collect_text(document.root_element(), &mut text);
        Ok(collapse_whitespace(&text))
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_TAGS.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child_element, out);
            if block {
                out.push(' ');
            }
        }
    }
}
