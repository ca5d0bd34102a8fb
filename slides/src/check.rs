use interpreter::{ParseError, check_script, check_session};

use crate::block::{CodeBlock, CodeMode};
use crate::walk::{DocumentBlock, document_blocks};

/// Syntax errors in every block that would be executed, without running
/// anything. Spans are byte offsets into `source`.
pub fn check_document(source: &str) -> Vec<ParseError> {
    let mut errors = Vec::new();
    for block in document_blocks(source) {
        if let DocumentBlock::Code(code) = block {
            errors.extend(check_block(&code));
        }
    }
    errors
}

/// Syntax errors in a single block, with spans mapped into the document.
pub fn check_block(block: &CodeBlock) -> Vec<ParseError> {
    let errors = match block.mode() {
        CodeMode::Script => check_script(&block.text).err().into_iter().collect(),
        CodeMode::Session => check_session(&block.text),
        CodeMode::Plain(_) | CodeMode::Unsupported(_) => Vec::new(),
    };

    errors
        .into_iter()
        .map(|mut error| {
            let start = block.document_offset(error.span.start);
            let end = block.document_offset(error.span.end).max(start);
            error.span = start..end;
            error
        })
        .collect()
}
