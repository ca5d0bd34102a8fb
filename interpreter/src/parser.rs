use std::ops::Range;
use std::rc::Rc;

use crate::ast::{
    BinaryOperator, BooleanOperator, CompareOperator, ExceptHandler, Expr, FStringPart,
    FunctionDef, Parameter, Stmt, Target, UnaryOperator,
};
use crate::error::ParseError;
use crate::lexer::{SpannedToken, Token, tokenize};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a complete code fragment (any number of statements).
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();
    while !parser.at(&Token::Eof) {
        if parser.eat(&Token::Newline) {
            continue;
        }
        body.extend(parser.parse_statement()?);
    }
    Ok(body)
}

/// Parse source that must consist of a single expression list and nothing
/// else. Statements (assignments, keywords, ...) are rejected with a
/// `ParseError`, which is how callers tell expressions from statements.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source.trim_start_matches([' ', '\t']))?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression_list()?;
    parser.eat(&Token::Newline);
    if !parser.at(&Token::Eof) {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

// Binding powers (precedence). Higher = tighter binding.
const BP_OR: u8 = 2; // or
const BP_AND: u8 = 4; // and
const BP_NOT: u8 = 6; // not
const BP_COMPARISON: u8 = 8; // == != < > <= >= in is
const BP_SHIFT: u8 = 10; // << >>
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / // %
const BP_UNARY: u8 = 16; // - +
const BP_POWER: u8 = 18; // **

/// Deepest expression recursion accepted before parsing gives up.
const MAX_EXPR_DEPTH: usize = 200;

enum Infix {
    Binary(BinaryOperator),
    Logical(BooleanOperator),
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    function_depth: usize,
    loop_depth: usize,
    expr_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser {
            tokens,
            pos: 0,
            function_depth: 0,
            loop_depth: 0,
            expr_depth: 0,
        }
    }

    fn current(&self) -> &SpannedToken {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> SpannedToken {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError::new(message, token.span.clone(), token.line)
    }

    fn error_at(&self, index: usize, message: impl Into<String>) -> ParseError {
        let token = &self.tokens[index.min(self.tokens.len().saturating_sub(1))];
        ParseError::new(message, token.span.clone(), token.line)
    }

    /// The error for a token that cannot appear at the current position.
    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Token::Indent => self.error("unexpected indent"),
            Token::Dedent => self.error("unindent does not match any outer indentation level"),
            Token::Eof => self.error("unexpected EOF while parsing"),
            Token::Unsupported(keyword) => {
                self.error("invalid syntax").with_note(format!("'{}' is not supported", keyword))
            }
            _ => self.error("invalid syntax"),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Name(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let stmt = match self.peek() {
            Token::If => self.parse_if()?,
            Token::While => self.parse_while()?,
            Token::For => self.parse_for()?,
            Token::Def => self.parse_def()?,
            Token::Try => self.parse_try()?,
            _ => return self.parse_simple_statements(),
        };
        Ok(vec![stmt])
    }

    /// One logical line of `;`-separated simple statements.
    fn parse_simple_statements(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = vec![self.parse_simple_statement()?];
        while self.eat(&Token::Semicolon) {
            if self.at(&Token::Newline) || self.at(&Token::Eof) {
                break;
            }
            stmts.push(self.parse_simple_statement()?);
        }
        if !self.eat(&Token::Newline) && !self.at(&Token::Eof) {
            return Err(self.unexpected());
        }
        Ok(stmts)
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().clone() {
            Token::Pass => {
                self.pos += 1;
                Ok(Stmt::Pass)
            }
            Token::Break => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.pos += 1;
                Ok(Stmt::Break)
            }
            Token::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.pos += 1;
                Ok(Stmt::Continue)
            }
            Token::Return => {
                if self.function_depth == 0 {
                    return Err(self.error("'return' outside function"));
                }
                self.pos += 1;
                let value = if starts_expression(self.peek()) {
                    Some(self.parse_expression_list()?)
                } else {
                    None
                };
                Ok(Stmt::Return(value))
            }
            Token::Raise => {
                self.pos += 1;
                let value = if starts_expression(self.peek()) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(Stmt::Raise(value))
            }
            Token::Del => {
                self.pos += 1;
                let start = self.pos;
                let targets = match self.parse_expression_list()? {
                    Expr::Tuple(items) => items
                        .into_iter()
                        .map(|item| self.to_target(item, start, "delete"))
                        .collect::<Result<Vec<_>, _>>()?,
                    other => vec![self.to_target(other, start, "delete")?],
                };
                Ok(Stmt::Delete(targets))
            }
            Token::Global => {
                self.pos += 1;
                let mut names = vec![self.expect_name()?];
                while self.eat(&Token::Comma) {
                    names.push(self.expect_name()?);
                }
                Ok(Stmt::Global(names))
            }
            Token::Assert => {
                self.pos += 1;
                let test = self.parse_test()?;
                let message = if self.eat(&Token::Comma) {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(Stmt::Assert { test, message })
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Expression statement, assignment chain or augmented assignment.
    fn parse_expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.pos;
        let first = self.parse_expression_list()?;

        if self.at(&Token::Assign) {
            let mut pending = vec![(first, start)];
            let mut value_start = start;
            while self.eat(&Token::Assign) {
                value_start = self.pos;
                pending.push((self.parse_expression_list()?, value_start));
            }
            let (value, _) = pending
                .pop()
                .ok_or_else(|| self.error_at(value_start, "invalid syntax"))?;
            let targets = pending
                .into_iter()
                .map(|(expr, index)| self.to_target(expr, index, "assign to"))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Stmt::Assignment { targets, value });
        }

        if let Token::AugAssign(operator) = *self.peek() {
            self.pos += 1;
            let target = match first {
                Expr::Name(_) | Expr::Subscript { .. } => {
                    self.to_target(first, start, "assign to")?
                }
                _ => {
                    return Err(self.error_at(
                        start,
                        "illegal expression for augmented assignment",
                    ));
                }
            };
            let value = self.parse_expression_list()?;
            return Ok(Stmt::AugmentedAssignment {
                target,
                operator,
                value,
            });
        }

        Ok(Stmt::Expression(first))
    }

    fn to_target(&self, expr: Expr, index: usize, verb: &str) -> Result<Target, ParseError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Subscript { value, index: key } => Ok(Target::Subscript {
                value: *value,
                index: *key,
            }),
            Expr::Tuple(items) | Expr::List(items) => Ok(Target::Tuple(
                items
                    .into_iter()
                    .map(|item| self.to_target(item, index, verb))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Attribute { .. } => Err(self
                .error_at(index, "invalid syntax")
                .with_note("attribute assignment is not supported")),
            Expr::Call { .. } => Err(self.error_at(index, format!("cannot {} function call", verb))),
            Expr::None
            | Expr::Boolean(_)
            | Expr::Integer(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::FString(_) => Err(self.error_at(index, format!("cannot {} literal", verb))),
            _ => Err(self.error_at(index, format!("cannot {} expression", verb))),
        }
    }

    /// `: <simple statements>` or `: NEWLINE INDENT <statements> DEDENT`.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if !self.eat(&Token::Colon) {
            return Err(self.error("expected ':'"));
        }
        if !self.eat(&Token::Newline) {
            return self.parse_simple_statements();
        }
        if !self.eat(&Token::Indent) {
            return Err(self.error("expected an indented block"));
        }
        let mut body = Vec::new();
        while !self.eat(&Token::Dedent) {
            if self.at(&Token::Eof) {
                break;
            }
            body.extend(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let condition = self.parse_test()?;
        let body = self.parse_block()?;
        let mut branches = vec![(condition, body)];

        while self.eat(&Token::Elif) {
            let condition = self.parse_test()?;
            let body = self.parse_block()?;
            branches.push((condition, body));
        }

        let orelse = if self.eat(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { branches, orelse })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let condition = self.parse_test()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let target = self.parse_target_list()?;
        self.expect(Token::In)?;
        let iter = self.parse_expression_list()?;
        let body = self.parse_loop_body()?;
        Ok(Stmt::For { target, iter, body })
    }

    fn parse_def(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let name = self.expect_name()?;
        self.expect(Token::LParen)?;

        let mut parameters: Vec<Parameter> = Vec::new();
        while !self.eat(&Token::RParen) {
            let index = self.pos;
            let param = self.expect_name()?;
            // Annotations are accepted and ignored.
            if self.eat(&Token::Colon) {
                self.parse_test()?;
            }
            let default = if self.eat(&Token::Assign) {
                Some(self.parse_test()?)
            } else {
                if parameters.iter().any(|p| p.default.is_some()) {
                    return Err(self.error_at(
                        index,
                        "non-default argument follows default argument",
                    ));
                }
                None
            };
            if parameters.iter().any(|p| p.name == param) {
                return Err(self.error_at(
                    index,
                    format!("duplicate argument '{}' in function definition", param),
                ));
            }
            parameters.push(Parameter {
                name: param,
                default,
            });
            if !self.eat(&Token::Comma) {
                self.expect(Token::RParen)?;
                break;
            }
        }

        // Return annotation: `-> expr`
        if self.at(&Token::Minus) && self.peek_at(1) == Some(&Token::Greater) {
            self.pos += 2;
            self.parse_test()?;
        }

        let saved_loop_depth = std::mem::take(&mut self.loop_depth);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loop_depth;

        Ok(Stmt::FunctionDef(Rc::new(FunctionDef {
            name,
            parameters,
            body: body?,
        })))
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.eat(&Token::Except) {
            let class = if self.at(&Token::Colon) {
                None
            } else {
                Some(self.parse_test()?)
            };
            let binding = if self.eat(&Token::As) {
                Some(self.expect_name()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            handlers.push(ExceptHandler {
                class,
                binding,
                body,
            });
        }

        let orelse = if !handlers.is_empty() && self.eat(&Token::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat(&Token::Finally) {
            self.parse_block()?
        } else {
            Vec::new()
        };

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error("expected 'except' or 'finally' block"));
        }

        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    /// Targets of `for` loops and comprehensions: stops before `in`.
    fn parse_target_list(&mut self) -> Result<Target, ParseError> {
        let start = self.pos;
        let first = self.parse_expr(BP_COMPARISON + 1)?;
        if !self.at(&Token::Comma) {
            return self.to_target(first, start, "assign to");
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.at(&Token::In) {
                break;
            }
            items.push(self.parse_expr(BP_COMPARISON + 1)?);
        }
        self.to_target(Expr::Tuple(items), start, "assign to")
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `a, b, c` becomes a tuple; a single expression stays as is.
    fn parse_expression_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_test()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !starts_expression(self.peek()) {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr::Tuple(items))
    }

    /// An expression including the conditional form `a if c else b`.
    fn parse_test(&mut self) -> Result<Expr, ParseError> {
        let body = self.parse_expr(0)?;
        if !self.eat(&Token::If) {
            return Ok(body);
        }
        let condition = self.parse_expr(0)?;
        self.expect(Token::Else)?;
        let orelse = self.parse_test()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        self.check_depth(1)?;
        self.expr_depth += 1;
        let result = self.parse_expr_bp(min_bp);
        self.expr_depth -= 1;
        result
    }

    /// Operator chains (`a + b + c`, `f()()`) nest to the left, so each link
    /// counts towards the depth as well.
    fn check_depth(&self, chain: usize) -> Result<(), ParseError> {
        if self.expr_depth + chain > MAX_EXPR_DEPTH {
            return Err(self.error("expression is nested too deeply"));
        }
        Ok(())
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;
        let mut chain = 0;

        loop {
            // Comparisons chain: a < b < c
            if self.compare_operator().is_some() {
                if BP_COMPARISON < min_bp {
                    break;
                }
                chain += 1;
                self.check_depth(chain)?;
                let mut comparisons = Vec::new();
                while let Some((operator, width)) = self.compare_operator() {
                    self.pos += width;
                    let right = self.parse_expr(BP_COMPARISON + 1)?;
                    comparisons.push((operator, right));
                }
                left = Expr::Compare {
                    left: Box::new(left),
                    comparisons,
                };
                continue;
            }

            let (l_bp, r_bp, infix) = match self.peek() {
                Token::Or => (BP_OR, BP_OR + 1, Infix::Logical(BooleanOperator::Or)),
                Token::And => (BP_AND, BP_AND + 1, Infix::Logical(BooleanOperator::And)),
                Token::LeftShift => (
                    BP_SHIFT,
                    BP_SHIFT + 1,
                    Infix::Binary(BinaryOperator::LeftShift),
                ),
                Token::RightShift => (
                    BP_SHIFT,
                    BP_SHIFT + 1,
                    Infix::Binary(BinaryOperator::RightShift),
                ),
                Token::Plus => (
                    BP_ADDITIVE,
                    BP_ADDITIVE + 1,
                    Infix::Binary(BinaryOperator::Addition),
                ),
                Token::Minus => (
                    BP_ADDITIVE,
                    BP_ADDITIVE + 1,
                    Infix::Binary(BinaryOperator::Subtraction),
                ),
                Token::Star => (
                    BP_MULTIPLICATIVE,
                    BP_MULTIPLICATIVE + 1,
                    Infix::Binary(BinaryOperator::Multiplication),
                ),
                Token::Slash => (
                    BP_MULTIPLICATIVE,
                    BP_MULTIPLICATIVE + 1,
                    Infix::Binary(BinaryOperator::Division),
                ),
                Token::DoubleSlash => (
                    BP_MULTIPLICATIVE,
                    BP_MULTIPLICATIVE + 1,
                    Infix::Binary(BinaryOperator::FloorDivision),
                ),
                Token::Percent => (
                    BP_MULTIPLICATIVE,
                    BP_MULTIPLICATIVE + 1,
                    Infix::Binary(BinaryOperator::Modulo),
                ),
                // Right-associative, and the right operand may be unary: 2 ** -1
                Token::DoubleStar => (BP_POWER, BP_UNARY, Infix::Binary(BinaryOperator::Power)),
                _ => break,
            };

            if l_bp < min_bp {
                break;
            }
            chain += 1;
            self.check_depth(chain)?;
            self.pos += 1;
            let right = self.parse_expr(r_bp)?;

            left = match infix {
                Infix::Binary(operator) => Expr::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Infix::Logical(operator) => Expr::Logical {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    /// Returns the comparison operator at the cursor and how many tokens it spans.
    fn compare_operator(&self) -> Option<(CompareOperator, usize)> {
        match self.peek() {
            Token::EqEq => Some((CompareOperator::Equal, 1)),
            Token::NotEq => Some((CompareOperator::NotEqual, 1)),
            Token::Less => Some((CompareOperator::Less, 1)),
            Token::LessEq => Some((CompareOperator::LessEqual, 1)),
            Token::Greater => Some((CompareOperator::Greater, 1)),
            Token::GreaterEq => Some((CompareOperator::GreaterEqual, 1)),
            Token::In => Some((CompareOperator::In, 1)),
            Token::Not if self.peek_at(1) == Some(&Token::In) => {
                Some((CompareOperator::NotIn, 2))
            }
            Token::Is if self.peek_at(1) == Some(&Token::Not) => {
                Some((CompareOperator::IsNot, 2))
            }
            Token::Is => Some((CompareOperator::Is, 1)),
            _ => None,
        }
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let (operator, bp) = match self.peek() {
            Token::Not => (UnaryOperator::LogicalNot, BP_NOT),
            Token::Minus => (UnaryOperator::Negation, BP_UNARY),
            Token::Plus => (UnaryOperator::Identity, BP_UNARY),
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_expr(bp)?;
        Ok(Expr::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    /// An atom followed by any number of calls, subscripts and attribute accesses.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        let mut chain = 0;
        while matches!(self.peek(), Token::LParen | Token::LBracket | Token::Dot) {
            chain += 1;
            self.check_depth(chain)?;
            match self.peek() {
                Token::LParen => {
                    self.pos += 1;
                    let (arguments, keywords) = self.parse_call_arguments()?;
                    expr = Expr::Call {
                        function: Box::new(expr),
                        arguments,
                        keywords,
                    };
                }
                Token::LBracket => {
                    self.pos += 1;
                    let index = self.parse_subscript_index()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::Dot => {
                    self.pos += 1;
                    let name = self.expect_name()?;
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Str(_) | Token::FString(_)) {
            return self.parse_strings();
        }

        let token = self.advance();
        match token.token {
            Token::Integer(n) => Ok(Expr::Integer(n)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::None => Ok(Expr::None),
            Token::Name(name) => Ok(Expr::Name(name)),

            // Parenthesized expression, tuple or generator
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_test()?;
                if self.at(&Token::For) {
                    let comprehension = self.parse_comprehension(first)?;
                    self.expect(Token::RParen)?;
                    return Ok(comprehension);
                }
                if !self.eat(&Token::Comma) {
                    self.expect(Token::RParen)?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while !self.at(&Token::RParen) {
                    items.push(self.parse_test()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Tuple(items))
            }

            // List display or comprehension
            Token::LBracket => {
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_test()?;
                if self.at(&Token::For) {
                    let comprehension = self.parse_comprehension(first)?;
                    self.expect(Token::RBracket)?;
                    return Ok(comprehension);
                }
                let mut items = vec![first];
                while self.eat(&Token::Comma) {
                    if self.at(&Token::RBracket) {
                        break;
                    }
                    items.push(self.parse_test()?);
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }

            // Dict display
            Token::LBrace => {
                let mut entries = Vec::new();
                while !self.at(&Token::RBrace) {
                    let key = self.parse_test()?;
                    if !self.eat(&Token::Colon) {
                        return Err(self
                            .unexpected()
                            .with_note("set displays are not supported"));
                    }
                    let value = self.parse_test()?;
                    entries.push((key, value));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBrace)?;
                Ok(Expr::Dict(entries))
            }

            _ => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }

    /// `for target in iter [if condition]` after the element of a comprehension.
    fn parse_comprehension(&mut self, element: Expr) -> Result<Expr, ParseError> {
        self.expect(Token::For)?;
        let target = self.parse_target_list()?;
        self.expect(Token::In)?;
        let iter = self.parse_expr(0)?;
        let condition = if self.eat(&Token::If) {
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };
        if self.at(&Token::For) || self.at(&Token::If) {
            return Err(self
                .unexpected()
                .with_note("only one 'for' and one 'if' clause are supported"));
        }
        Ok(Expr::ListComprehension {
            element: Box::new(element),
            target: Box::new(target),
            iter: Box::new(iter),
            condition,
        })
    }

    /// Arguments after an opening parenthesis, through the closing one.
    fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut arguments = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();

        while !self.eat(&Token::RParen) {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Name(name), Some(Token::Assign)) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {}", name)));
                }
                let value = self.parse_test()?;
                keywords.push((name, value));
            } else {
                if !keywords.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let argument = self.parse_test()?;
                let argument = if self.at(&Token::For) && arguments.is_empty() {
                    self.parse_comprehension(argument)?
                } else {
                    argument
                };
                arguments.push(argument);
            }

            if !self.eat(&Token::Comma) {
                self.expect(Token::RParen)?;
                break;
            }
        }

        Ok((arguments, keywords))
    }

    /// Index or slice inside `[...]`.
    fn parse_subscript_index(&mut self) -> Result<Expr, ParseError> {
        let start = if self.at(&Token::Colon) {
            None
        } else {
            Some(self.parse_test()?)
        };

        if !self.eat(&Token::Colon) {
            let Some(index) = start else {
                return Err(self.unexpected());
            };
            if !self.at(&Token::Comma) {
                return Ok(index);
            }
            let mut items = vec![index];
            while self.eat(&Token::Comma) {
                if self.at(&Token::RBracket) {
                    break;
                }
                items.push(self.parse_test()?);
            }
            return Ok(Expr::Tuple(items));
        }

        let stop = if self.at(&Token::Colon) || self.at(&Token::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&Token::Colon) && !self.at(&Token::RBracket) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        Ok(Expr::Slice {
            start: start.map(Box::new),
            stop,
            step,
        })
    }

    /// Adjacent string literals concatenate; any f-string makes the whole an f-string.
    fn parse_strings(&mut self) -> Result<Expr, ParseError> {
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut formatted = false;

        loop {
            let token = self.current().clone();
            match token.token {
                Token::Str(s) => {
                    self.pos += 1;
                    push_literal(&mut parts, &s);
                }
                Token::FString(body) => {
                    self.pos += 1;
                    formatted = true;
                    for part in parse_fstring(&body, token.span.clone(), token.line)? {
                        match part {
                            FStringPart::Literal(s) => push_literal(&mut parts, &s),
                            field => parts.push(field),
                        }
                    }
                }
                _ => break,
            }
        }

        if formatted {
            return Ok(Expr::FString(parts));
        }
        let mut text = String::new();
        for part in parts {
            if let FStringPart::Literal(s) = part {
                text.push_str(&s);
            }
        }
        Ok(Expr::Str(text))
    }
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Integer(_)
            | Token::Float(_)
            | Token::Str(_)
            | Token::FString(_)
            | Token::Name(_)
            | Token::True
            | Token::False
            | Token::None
            | Token::Not
            | Token::Minus
            | Token::Plus
            | Token::LParen
            | Token::LBracket
            | Token::LBrace
    )
}

fn push_literal(parts: &mut Vec<FStringPart>, text: &str) {
    if let Some(FStringPart::Literal(last)) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(FStringPart::Literal(text.to_string()));
    }
}

// ---------------------------------------------------------------------------
// f-string parsing
// ---------------------------------------------------------------------------

/// Split an f-string body into literal text and `{expr!conv:spec}` fields.
fn parse_fstring(
    body: &str,
    span: Range<usize>,
    line: usize,
) -> Result<Vec<FStringPart>, ParseError> {
    let error = |message: &str| ParseError::new(format!("f-string: {}", message), span.clone(), line);

    let chars: Vec<char> = body.chars().collect();
    let len = chars.len();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < len {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(error("single '}' is not allowed")),
            '{' => {
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                i += 1;
                let start = i;
                let mut depth = 0usize;
                let mut quote: Option<char> = None;

                // Find the end of the expression: a top-level `}`, `:` or `!`.
                while i < len {
                    let c = chars[i];
                    if let Some(q) = quote {
                        if c == q {
                            quote = None;
                        }
                        i += 1;
                        continue;
                    }
                    match c {
                        '\'' | '"' => quote = Some(c),
                        '(' | '[' | '{' => depth += 1,
                        ')' | ']' | '}' if depth > 0 => depth -= 1,
                        '}' | ':' if depth == 0 => break,
                        '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => break,
                        _ => {}
                    }
                    i += 1;
                }

                let source: String = chars[start..i].iter().collect();
                if source.trim().is_empty() {
                    return Err(error("empty expression not allowed"));
                }

                let mut conversion = None;
                if chars.get(i) == Some(&'!') {
                    match chars.get(i + 1) {
                        Some(c @ ('r' | 's' | 'a')) => conversion = Some(*c),
                        _ => return Err(error("invalid conversion character")),
                    }
                    i += 2;
                }

                let mut spec = String::new();
                if chars.get(i) == Some(&':') {
                    i += 1;
                    while i < len && chars[i] != '}' {
                        spec.push(chars[i]);
                        i += 1;
                    }
                }

                if chars.get(i) != Some(&'}') {
                    return Err(error("expecting '}'"));
                }
                i += 1;

                let expr = parse_expression(source.trim()).map_err(|e| error(&e.message))?;
                parts.push(FStringPart::Field {
                    expr,
                    conversion,
                    spec,
                });
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}
