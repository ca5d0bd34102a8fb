use std::ops::Range;

use crate::ast::BinaryOperator;
use crate::error::ParseError;

/// Deepest bracket nesting accepted in one logical line.
const MAX_BRACKET_DEPTH: usize = 200;

/// Deepest block nesting accepted.
const MAX_INDENT_DEPTH: usize = 100;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    Str(String),
    /// f-string body with escapes already processed; fields are parsed later.
    FString(String),

    Name(String),

    // Keywords
    False,
    None,
    True,
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Elif,
    Else,
    While,
    For,
    Def,
    Return,
    Pass,
    Break,
    Continue,
    Raise,
    Del,
    Global,
    Try,
    Except,
    Finally,
    As,
    Assert,
    /// Reserved words the interpreter does not implement (`import`, `class`, ...).
    Unsupported(&'static str),

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LeftShift,
    RightShift,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Assign,
    AugAssign(BinaryOperator),

    // Grouping and punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Range<usize>,
    pub line: usize,
}

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "import", "from", "class", "with", "yield", "lambda", "nonlocal", "async", "await",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split source text into tokens, emitting INDENT/DEDENT around indented blocks.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    Ok(lexer.tokens)
}

// ---------------------------------------------------------------------------
// Lexer state
// ---------------------------------------------------------------------------

struct Lexer {
    chars: Vec<char>,
    /// Byte offset of each character, plus one trailing entry for the end.
    byte_pos: Vec<usize>,
    pos: usize,
    line: usize,
    indents: Vec<usize>,
    /// Open brackets: (character, char index, line).
    brackets: Vec<(char, usize, usize)>,
    tokens: Vec<SpannedToken>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let mut byte_pos = Vec::with_capacity(chars.len() + 1);
        let mut offset = 0;
        for c in &chars {
            byte_pos.push(offset);
            offset += c.len_utf8();
        }
        byte_pos.push(offset);

        Lexer {
            chars,
            byte_pos,
            pos: 0,
            line: 1,
            indents: vec![0],
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn span(&self, start: usize, end: usize) -> Range<usize> {
        self.byte_pos[start]..self.byte_pos[end]
    }

    fn push(&mut self, token: Token, start: usize) {
        let span = self.span(start, self.pos);
        self.tokens.push(SpannedToken {
            token,
            span,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ParseError {
        let end = self.pos.max(start + 1).min(self.chars.len());
        let end = end.max(start);
        ParseError::new(message, self.span(start, end), self.line)
    }

    fn run(&mut self) -> Result<(), ParseError> {
        let mut at_line_start = true;

        while self.pos < self.chars.len() {
            if at_line_start && self.brackets.is_empty() {
                at_line_start = false;
                if self.indentation()? {
                    at_line_start = true;
                    continue;
                }
            }

            let c = self.chars[self.pos];
            match c {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.pos += 1;
                }

                '\n' => {
                    let start = self.pos;
                    self.pos += 1;
                    if self.brackets.is_empty() {
                        self.push(Token::Newline, start);
                        at_line_start = true;
                    }
                    self.line += 1;
                }

                '#' => {
                    while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
                        self.pos += 1;
                    }
                }

                // Explicit line joining
                '\\' => {
                    let start = self.pos;
                    self.pos += 1;
                    if self.peek_at(0) == Some('\r') {
                        self.pos += 1;
                    }
                    if self.peek_at(0) == Some('\n') {
                        self.pos += 1;
                        self.line += 1;
                    } else {
                        return Err(self.error(
                            "unexpected character after line continuation character",
                            start,
                        ));
                    }
                }

                '"' | '\'' => self.string(self.pos, false, false)?,

                '0'..='9' => self.number()?,
                '.' if matches!(self.peek_at(1), Some('0'..='9')) => self.number()?,

                c if c.is_alphabetic() || c == '_' => self.word()?,

                _ => self.operator()?,
            }
        }

        if let Some(&(bracket, index, line)) = self.brackets.last() {
            return Err(ParseError::new(
                format!("'{}' was never closed", bracket),
                self.span(index, index + 1),
                line,
            ));
        }

        let end = self.chars.len();
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.token, Token::Newline | Token::Dedent))
        {
            self.push(Token::Newline, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent, end);
        }
        self.push(Token::Eof, end);
        Ok(())
    }

    /// Measure the indentation of a new line and emit INDENT/DEDENT tokens.
    /// Returns true when the line is blank or comment-only and has been consumed.
    fn indentation(&mut self) -> Result<bool, ParseError> {
        let mut column = 0;
        while let Some(c) = self.peek_at(0) {
            match c {
                ' ' => column += 1,
                '\t' => column = (column / 8 + 1) * 8,
                '\x0c' => column = 0,
                '\r' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek_at(0) {
            None => return Ok(true),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(true);
            }
            Some('#') => {
                while self.peek_at(0).is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
                if self.peek_at(0).is_some() {
                    self.pos += 1;
                    self.line += 1;
                }
                return Ok(true);
            }
            _ => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if column > current {
            if self.indents.len() > MAX_INDENT_DEPTH {
                return Err(self.error("too many levels of indentation", self.pos));
            }
            self.indents.push(column);
            self.push(Token::Indent, self.pos);
        } else if column < current {
            while self.indents.last().is_some_and(|&level| level > column) {
                self.indents.pop();
                self.push(Token::Dedent, self.pos);
            }
            if self.indents.last().copied().unwrap_or(0) != column {
                return Err(self.error(
                    "unindent does not match any outer indentation level",
                    self.pos,
                ));
            }
        }
        Ok(false)
    }

    fn word(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self
            .peek_at(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        // String prefixes: f"..", r"..", rf"..", fr".."
        if matches!(self.peek_at(0), Some('"' | '\'')) {
            let prefix = word.to_ascii_lowercase();
            match prefix.as_str() {
                "f" => return self.string(start, false, true),
                "r" => return self.string(start, true, false),
                "rf" | "fr" => return self.string(start, true, true),
                _ => {}
            }
        }

        let token = match word.as_str() {
            "False" => Token::False,
            "None" => Token::None,
            "True" => Token::True,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "def" => Token::Def,
            "return" => Token::Return,
            "pass" => Token::Pass,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "raise" => Token::Raise,
            "del" => Token::Del,
            "global" => Token::Global,
            "try" => Token::Try,
            "except" => Token::Except,
            "finally" => Token::Finally,
            "as" => Token::As,
            "assert" => Token::Assert,
            other => match UNSUPPORTED_KEYWORDS.iter().find(|k| **k == other) {
                Some(keyword) => Token::Unsupported(keyword),
                None => Token::Name(word),
            },
        };
        self.push(token, start);
        Ok(())
    }

    /// Lex a string literal. `start` is the index of the prefix (or the quote
    /// when there is none); `self.pos` must be on the opening quote.
    fn string(&mut self, start: usize, raw: bool, formatted: bool) -> Result<(), ParseError> {
        let quote = self.chars[self.pos];
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let start_line = self.line;
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek_at(0) else {
                let message = if triple {
                    format!(
                        "unterminated triple-quoted string literal (detected at line {})",
                        self.line
                    )
                } else {
                    format!(
                        "unterminated string literal (detected at line {})",
                        self.line
                    )
                };
                return Err(ParseError::new(
                    message,
                    self.span(start, self.pos),
                    start_line,
                ));
            };

            match c {
                '\\' => {
                    self.pos += 1;
                    let Some(escaped) = self.peek_at(0) else {
                        continue;
                    };
                    self.pos += 1;
                    if raw {
                        value.push('\\');
                        value.push(escaped);
                        if escaped == '\n' {
                            self.line += 1;
                        }
                        continue;
                    }
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '\n' => self.line += 1,
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                '\n' if !triple => {
                    return Err(ParseError::new(
                        format!(
                            "unterminated string literal (detected at line {})",
                            self.line
                        ),
                        self.span(start, self.pos),
                        start_line,
                    ));
                }
                c if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.pos += 3;
                        break;
                    }
                    value.push(c);
                    self.pos += 1;
                }
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    value.push(c);
                    self.pos += 1;
                }
            }
        }

        let token = if formatted {
            Token::FString(value)
        } else {
            Token::Str(value)
        };
        let span = self.span(start, self.pos);
        self.tokens.push(SpannedToken {
            token,
            span,
            line: start_line,
        });
        Ok(())
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;

        // Hexadecimal literals
        if self.peek_at(0) == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .peek_at(0)
                .is_some_and(|c| c.is_ascii_hexdigit() || c == '_')
            {
                self.pos += 1;
            }
            let digits: String = self.chars[digits_start..self.pos]
                .iter()
                .filter(|c| **c != '_')
                .collect();
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| self.error("invalid hexadecimal literal", start))?;
            self.push(Token::Integer(value), start);
            return Ok(());
        }

        let mut is_float = false;
        while self
            .peek_at(0)
            .is_some_and(|c| c.is_ascii_digit() || c == '_')
        {
            self.pos += 1;
        }
        if self.peek_at(0) == Some('.') {
            is_float = true;
            self.pos += 1;
            while self
                .peek_at(0)
                .is_some_and(|c| c.is_ascii_digit() || c == '_')
            {
                self.pos += 1;
            }
        }
        if matches!(self.peek_at(0), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        if self
            .peek_at(0)
            .is_some_and(|c| c.is_alphabetic() || c == '_')
        {
            return Err(self.error("invalid decimal literal", start));
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let token = if is_float {
            Token::Float(
                text.parse::<f64>()
                    .map_err(|_| self.error("invalid decimal literal", start))?,
            )
        } else {
            Token::Integer(
                text.parse::<i64>()
                    .map_err(|_| self.error("integer literal is too large", start))?,
            )
        };
        self.push(token, start);
        Ok(())
    }

    fn operator(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let c = self.chars[self.pos];
        let next = self.peek_at(1);
        let after = self.peek_at(2);

        let (token, width) = match (c, next) {
            ('*', Some('*')) if after == Some('=') => {
                (Token::AugAssign(BinaryOperator::Power), 3)
            }
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('/', Some('/')) if after == Some('=') => {
                (Token::AugAssign(BinaryOperator::FloorDivision), 3)
            }
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('+', Some('=')) => (Token::AugAssign(BinaryOperator::Addition), 2),
            ('-', Some('=')) => (Token::AugAssign(BinaryOperator::Subtraction), 2),
            ('*', Some('=')) => (Token::AugAssign(BinaryOperator::Multiplication), 2),
            ('/', Some('=')) => (Token::AugAssign(BinaryOperator::Division), 2),
            ('%', Some('=')) => (Token::AugAssign(BinaryOperator::Modulo), 2),
            ('<', Some('<')) if after == Some('=') => {
                (Token::AugAssign(BinaryOperator::LeftShift), 3)
            }
            ('<', Some('<')) => (Token::LeftShift, 2),
            ('>', Some('>')) if after == Some('=') => {
                (Token::AugAssign(BinaryOperator::RightShift), 3)
            }
            ('>', Some('>')) => (Token::RightShift, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LessEq, 2),
            ('>', Some('=')) => (Token::GreaterEq, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Less, 1),
            ('>', _) => (Token::Greater, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('.', _) => (Token::Dot, 1),
            (';', _) => (Token::Semicolon, 1),
            ('(', _) => (Token::LParen, 1),
            ('[', _) => (Token::LBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            (')', _) => (Token::RParen, 1),
            (']', _) => (Token::RBracket, 1),
            ('}', _) => (Token::RBrace, 1),
            (c, _) if c.is_ascii() => {
                self.pos += 1;
                return Err(self.error("invalid syntax", start));
            }
            (c, _) => {
                self.pos += 1;
                return Err(self.error(
                    format!("invalid character '{}' (U+{:04X})", c, c as u32),
                    start,
                ));
            }
        };

        match token {
            Token::LParen | Token::LBracket | Token::LBrace => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    self.pos += 1;
                    return Err(self.error("too many nested parentheses", start));
                }
                self.brackets.push((c, start, self.line));
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    Some((open, _, _)) if open == expected => {}
                    Some((open, _, _)) => {
                        self.pos += 1;
                        return Err(self.error(
                            format!(
                                "closing parenthesis '{}' does not match opening parenthesis '{}'",
                                c, open
                            ),
                            start,
                        ));
                    }
                    None => {
                        self.pos += 1;
                        return Err(self.error(format!("unmatched '{}'", c), start));
                    }
                }
            }
            _ => {}
        }

        self.pos += width;
        self.push(token, start);
        Ok(())
    }
}
