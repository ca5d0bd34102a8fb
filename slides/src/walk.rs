use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::block::CodeBlock;

/// What the renderer sees of a document: headings and code blocks, with
/// everything between them kept as raw Markdown events.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBlock<'a> {
    Heading {
        level: u8,
        /// Inline events between the heading's start and end tags.
        content: Vec<Event<'a>>,
    },
    Code(CodeBlock),
    Other(Vec<Event<'a>>),
}

pub fn markdown_options() -> Options {
    Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES
}

/// Split Markdown source into headings, code blocks and pass-through events,
/// in document order.
pub fn document_blocks(source: &str) -> Vec<DocumentBlock<'_>> {
    let parser = Parser::new_ext(source, markdown_options());
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut blocks = Vec::new();
    let mut other = Vec::new();
    let mut i = 0;

    while i < events.len() {
        let (ref event, ref range) = events[i];

        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush_other(&mut blocks, &mut other);
                let level = heading_level_to_u8(level);
                i += 1;
                let content = collect_heading_content(&events, &mut i);
                blocks.push(DocumentBlock::Heading { level, content });
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                flush_other(&mut blocks, &mut other);
                let info = match kind {
                    CodeBlockKind::Fenced(info) if !info.trim().is_empty() => {
                        Some(info.trim().to_string())
                    }
                    _ => None,
                };
                let start = range.start;
                i += 1;
                blocks.push(DocumentBlock::Code(collect_code(&events, &mut i, info, start)));
            }

            _ => {
                other.push(event.clone());
                i += 1;
            }
        }
    }

    flush_other(&mut blocks, &mut other);
    blocks
}

fn flush_other<'a>(blocks: &mut Vec<DocumentBlock<'a>>, other: &mut Vec<Event<'a>>) {
    if !other.is_empty() {
        blocks.push(DocumentBlock::Other(std::mem::take(other)));
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn collect_heading_content<'a>(
    events: &[(Event<'a>, Range<usize>)],
    i: &mut usize,
) -> Vec<Event<'a>> {
    let mut content = Vec::new();
    while *i < events.len() {
        let (ref event, _) = events[*i];
        *i += 1;
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            _ => content.push(event.clone()),
        }
    }
    content
}

/// Gather the text of a code block, remembering where each piece came from.
fn collect_code(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    info: Option<String>,
    start: usize,
) -> CodeBlock {
    let mut text = String::new();
    let mut segments = Vec::new();
    let mut end = start;

    while *i < events.len() {
        let (ref event, ref range) = events[*i];
        *i += 1;
        match event {
            Event::End(TagEnd::CodeBlock) => {
                end = range.end;
                break;
            }
            Event::Text(s) => {
                segments.push((text.len(), range.start));
                text.push_str(s);
            }
            _ => {}
        }
    }

    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
    if segments.is_empty() {
        segments.push((0, start));
    }
    CodeBlock::from_parts(info, text, start..end.max(start), segments)
}
