pub mod block;
pub mod check;
pub mod segmenter;
pub mod template;
pub mod walk;

use interpreter::Namespace;
use log::debug;
use pulldown_cmark::{Event, html};

use crate::block::render_code;
use crate::segmenter::HeadingSegmenter;
use crate::walk::{DocumentBlock, document_blocks};

pub use block::{CodeBlock, CodeMode, escape_html};
pub use check::check_document;
pub use template::{DEFAULT_PLACEHOLDER, Template};

/// Renders a Markdown document into slide markup.
///
/// All executed blocks in one render share a single namespace, so later
/// blocks see what earlier ones defined. Every render starts from a fresh
/// namespace and a fresh heading trail.
#[derive(Debug, Default)]
pub struct SlideRenderer {
    segmenter: HeadingSegmenter,
    namespace: Namespace,
}

impl SlideRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, source: &str) -> String {
        self.segmenter.reset();
        self.namespace.clear();

        let mut events: Vec<Event<'_>> = Vec::new();
        for block in document_blocks(source) {
            match block {
                DocumentBlock::Heading { level, content } => {
                    let mut text = String::new();
                    html::push_html(&mut text, content.into_iter());
                    events.push(Event::Html(self.segmenter.heading(&text, level).into()));
                }
                DocumentBlock::Code(code) => {
                    events.push(Event::Html(render_code(&code, &mut self.namespace).into()));
                }
                DocumentBlock::Other(other) => events.extend(other),
            }
        }
        debug!(
            "rendered document, {} name(s) bound",
            self.namespace.len()
        );

        let mut output = String::new();
        html::push_html(&mut output, events.into_iter());
        output
    }

    /// Bindings left behind by the last render.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

/// Render `source` from scratch.
pub fn render_document(source: &str) -> String {
    SlideRenderer::new().render(source)
}
