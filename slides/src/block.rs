use std::ops::Range;

use interpreter::{Namespace, replay_session, run_script};
use log::{debug, warn};

/// Info-string prefix that asks for a block to be executed.
pub const RUN_PREFIX: &str = "run:";

/// The language `run:` blocks can actually be executed in.
pub const SCRIPT_LANGUAGE: &str = "python";

/// Info string of an interactive session block.
pub const SESSION_TAG: &str = "python-repl";

const SESSION_LABEL: &str = "Python REPL";

/// A code block as it appears in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// The fence info string, if there was one.
    pub info: Option<String>,
    /// The block contents with trailing whitespace removed.
    pub text: String,
    /// Byte range of the whole block in the document.
    pub span: Range<usize>,
    /// Start of each contiguous run of `text`, paired with where that run
    /// begins in the document.
    segments: Vec<(usize, usize)>,
}

impl CodeBlock {
    /// A block that is not tied to any document position.
    pub fn new(info: Option<&str>, text: impl Into<String>) -> Self {
        let text = text.into();
        CodeBlock {
            info: info.map(str::to_string),
            span: 0..text.len(),
            text,
            segments: vec![(0, 0)],
        }
    }

    pub(crate) fn from_parts(
        info: Option<String>,
        text: String,
        span: Range<usize>,
        segments: Vec<(usize, usize)>,
    ) -> Self {
        CodeBlock {
            info,
            text,
            span,
            segments,
        }
    }

    /// How this block should be rendered.
    pub fn mode(&self) -> CodeMode<'_> {
        CodeMode::parse(self.info.as_deref())
    }

    /// Map a byte offset in `text` to a byte offset in the document.
    pub fn document_offset(&self, text_offset: usize) -> usize {
        self.segments
            .iter()
            .rev()
            .find(|(start, _)| *start <= text_offset)
            .map(|(start, document)| document + (text_offset - start))
            .unwrap_or(self.span.start + text_offset)
    }
}

/// Rendering mode selected by a code block's info string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMode<'a> {
    /// Displayed verbatim, highlighted with the tag as given.
    Plain(Option<&'a str>),
    /// `run:python`: executed, output shown underneath.
    Script,
    /// `python-repl`: replayed line by line.
    Session,
    /// `run:<language>` for a language that cannot be executed.
    Unsupported(&'a str),
}

impl<'a> CodeMode<'a> {
    /// Select the mode from the first word of an info string.
    pub fn parse(info: Option<&'a str>) -> Self {
        let Some(tag) = info.and_then(|info| info.split_whitespace().next()) else {
            return CodeMode::Plain(None);
        };
        if tag == SESSION_TAG {
            return CodeMode::Session;
        }
        match tag.strip_prefix(RUN_PREFIX) {
            Some(SCRIPT_LANGUAGE) => CodeMode::Script,
            Some(language) => CodeMode::Unsupported(language),
            None => CodeMode::Plain(Some(tag)),
        }
    }
}

/// Render one code block, running it against `namespace` when its mode asks
/// for execution.
pub fn render_code(block: &CodeBlock, namespace: &mut Namespace) -> String {
    match block.mode() {
        CodeMode::Plain(tag) => {
            debug!("code block: plain ({})", tag.unwrap_or("no language"));
            code_markup(tag, tag, &block.text, None)
        }
        CodeMode::Script => {
            debug!("code block: script");
            let output = run_script(&block.text, namespace)
                .into_output()
                .filter(|output| !output.is_empty());
            code_markup(
                Some(SCRIPT_LANGUAGE),
                Some(SCRIPT_LANGUAGE),
                &block.text,
                output.as_deref(),
            )
        }
        CodeMode::Session => {
            debug!("code block: session");
            let transcript = replay_session(&block.text, namespace);
            code_markup(
                Some(SESSION_LABEL),
                Some(SCRIPT_LANGUAGE),
                &transcript,
                None,
            )
        }
        CodeMode::Unsupported(language) => {
            warn!(
                "cannot run `{}{}` blocks, showing the code only",
                RUN_PREFIX, language
            );
            code_markup(Some(language), Some(language), &block.text, None)
        }
    }
}

fn code_markup(
    label: Option<&str>,
    class: Option<&str>,
    code: &str,
    output: Option<&str>,
) -> String {
    let name = label
        .map(|label| {
            format!(
                r#"<div class="pre-name oneline"><span>{}</span></div>"#,
                escape_html(label)
            )
        })
        .unwrap_or_default();
    let code_tag = match class {
        Some(class) => format!(r#"<code class="{}">"#, escape_html(class)),
        None => "<code>".to_string(),
    };
    let output_block = output
        .map(|output| {
            format!(
                r#"<pre><div class="pre-name oneline"><span>output</span></div><code>{}</code></pre>"#,
                escape_html(output)
            )
        })
        .unwrap_or_default();

    format!(
        "\n<pre>{}{}{}</code></pre>\n{}\n",
        name,
        code_tag,
        escape_html(code),
        output_block
    )
}

/// Escape the characters that would otherwise be read as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
