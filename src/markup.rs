use anyhow::{Context, Result};
use html2text::render::text_renderer::TrivialDecorator;

/// Line width handed to the renderer. Wrapping only inserts whitespace, which
/// the tokenizer collapses, so it just has to exceed any realistic word.
const RENDER_WIDTH: usize = 1000;

/// Flatten an XHTML chapter to plain text.
///
/// Block elements end up on separate lines so adjacent paragraphs never fuse.
/// Inline markup disappears without adding decorations, the document head,
/// scripts and styles are not rendered, and character entities are decoded.
pub fn strip_markup(html: &str) -> Result<String> {
    html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
        .context("Failed to render chapter markup")
}
