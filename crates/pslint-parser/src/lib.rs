//! PowerShell script and data-file parser
//!
//! This crate provides a recursive-descent parser for the subset of PowerShell
//! that pslint needs: data files (`.psd1` hashtable literals) in full, plus
//! the statement forms lint rules inspect in scripts (commands, pipelines,
//! assignments, functions, `param()` blocks with attributes, class headers).
//!
//! # Quick Start
//!
//! ```
//! use pslint_parser::parse_string;
//! use pslint_parser::ast::NodeKind;
//!
//! let ast = parse_string("@{ IncludeRules = @('AvoidUsingCmdletAliases') }").unwrap();
//! let table = ast.first_hashtable().unwrap();
//!
//! if let NodeKind::Hashtable(entries) = &table.kind {
//!     assert_eq!(entries[0].key, "IncludeRules");
//! }
//! ```
//!
//! To parse from a file on disk:
//!
//! ```no_run
//! use std::path::Path;
//! use pslint_parser::parse_file;
//!
//! let ast = parse_file(Path::new("PSScriptAnalyzerSettings.psd1")).unwrap();
//! ```
//!
//! # Modules
//!
//! - [`ast`] — AST types: [`ast::ScriptAst`], [`ast::Node`], [`ast::NodeKind`],
//!   [`ast::Extent`], [`ast::Position`]
//! - [`error`] — Error types: [`error::ParseError`], [`error::LexerError`]
//! - [`lexer`] — Tokenizer: [`lexer::Lexer`], [`lexer::Token`], [`lexer::TokenKind`]
//!
//! # Pluggable parsing
//!
//! The analyzer talks to parsers through the [`ScriptParser`] trait so a more
//! complete parser can be substituted. [`DefaultParser`] is the implementation
//! in this crate. It never fails outright: errors are reported in
//! [`ParseOutput::errors`] next to whatever tree could be produced.
//!
//! ```
//! use pslint_parser::{DefaultParser, ScriptParser};
//!
//! let output = DefaultParser.parse("gci | % { $_ }", None);
//! assert!(output.errors.is_empty());
//! assert!(!output.tokens.is_empty());
//! ```

pub mod ast;
pub mod error;
pub mod lexer;

use ast::{
    Attribute, Extent, FunctionDefinition, HashEntry, NamedArgument, Node, NodeKind, ParamBlock,
    Parameter, Position, ScriptAst, ScriptBlock, Span, TypeDefinition,
};
use error::{ParseError, ParseResult};
use lexer::{Lexer, Token, TokenKind};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parse a PowerShell file from disk
pub fn parse_file(path: &Path) -> ParseResult<ScriptAst> {
    let content = fs::read_to_string(path).map_err(|e| ParseError::IoError(e.to_string()))?;
    parse_source(&content, Some(path))
}

/// Parse PowerShell source from a string
pub fn parse_string(source: &str) -> ParseResult<ScriptAst> {
    parse_source(source, None)
}

/// Parse PowerShell source, recording `file` in every extent
pub fn parse_source(source: &str, file: Option<&Path>) -> ParseResult<ScriptAst> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize()?;
    Parser::new(source, file, &tokens).parse()
}

/// The result of parsing one script: tree, token stream and errors.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub ast: ScriptAst,
    pub tokens: Vec<Token>,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A source of syntax trees for the analyzer.
pub trait ScriptParser: Send + Sync {
    /// Parse `source`. `file` is recorded in the extents of the result.
    fn parse(&self, source: &str, file: Option<&Path>) -> ParseOutput;

    /// Read and parse a file. Only I/O failures are returned as `Err`.
    fn parse_file(&self, path: &Path) -> ParseResult<ParseOutput> {
        let content = fs::read_to_string(path)
            .map_err(|e| ParseError::IoError(format!("{}: {}", path.display(), e)))?;
        Ok(self.parse(&content, Some(path)))
    }
}

/// The recursive-descent parser shipped with this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParser;

impl ScriptParser for DefaultParser {
    fn parse(&self, source: &str, file: Option<&Path>) -> ParseOutput {
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(e) => {
                return ParseOutput {
                    ast: empty_ast(source, file),
                    tokens: Vec::new(),
                    errors: vec![e],
                };
            }
        };
        let result = Parser::new(source, file, &tokens).parse();
        match result {
            Ok(ast) => ParseOutput {
                ast,
                tokens,
                errors: Vec::new(),
            },
            Err(e) => ParseOutput {
                ast: empty_ast(source, file),
                tokens,
                errors: vec![e],
            },
        }
    }
}

fn empty_ast(source: &str, file: Option<&Path>) -> ScriptAst {
    ScriptAst {
        param_block: None,
        statements: Vec::new(),
        extent: Extent::new(
            Span::new(Position::new(1, 1, 0), end_position(source)),
            file,
            source,
        ),
    }
}

fn end_position(source: &str) -> Position {
    let mut line = 1;
    let mut column = 1;
    for ch in source.chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    Position::new(line, column, source.len())
}

/// Comparison and bitwise operators, without the leading dash or the
/// `c`/`i` case prefix.
const COMPARISON_OPERATORS: &[&str] = &[
    "eq", "ne", "gt", "ge", "lt", "le", "like", "notlike", "match", "notmatch", "contains",
    "notcontains", "in", "notin", "replace", "split", "join", "is", "isnot", "as", "f", "band",
    "bor", "bxor", "shl", "shr",
];

fn is_comparison_operator(name: &str) -> bool {
    COMPARISON_OPERATORS.contains(&name)
        || name
            .strip_prefix(['c', 'i'])
            .is_some_and(|rest| COMPARISON_OPERATORS.contains(&rest))
}

/// The token that ends a statement list.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Closing {
    Eof,
    Brace,
    Paren,
}

impl Closing {
    fn matches(&self, kind: &TokenKind) -> bool {
        matches!(
            (self, kind),
            (Closing::Eof, TokenKind::Eof)
                | (Closing::Brace, TokenKind::CloseBrace)
                | (Closing::Paren, TokenKind::CloseParen)
        )
    }
}

/// Parser for PowerShell token streams
struct Parser<'a> {
    source: &'a str,
    file: Option<&'a Path>,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, file: Option<&'a Path>, tokens: &'a [Token]) -> Self {
        Self {
            source,
            file,
            tokens,
            pos: 0,
        }
    }

    fn current(&self) -> &'a Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, n: usize) -> &'a Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.current();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(word))
    }

    /// End of the most recently consumed token.
    fn prev_end(&self) -> Position {
        if self.pos == 0 {
            Position::new(1, 1, 0)
        } else {
            self.tokens[(self.pos - 1).min(self.tokens.len() - 1)].span.end
        }
    }

    fn prev_kind(&self) -> Option<&'a TokenKind> {
        self.pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map(|token| &token.kind)
    }

    fn extent(&self, start: Position, end: Position) -> Extent {
        let text = self.source.get(start.offset..end.offset).unwrap_or("");
        Extent::new(Span::new(start, end), self.file, text)
    }

    fn extent_from(&self, start: Position) -> Extent {
        self.extent(start, self.prev_end())
    }

    fn skip_newlines(&mut self) {
        while matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Comment(_)
        ) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Comment(_)
        ) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        if matches!(token.kind, TokenKind::Eof) {
            ParseError::UnexpectedEof {
                position: token.span.start,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.display_name(),
                position: token.span.start,
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<&'a Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.display_name()))
        }
    }

    /// Consume the closing delimiter of a block opened at `open`.
    fn expect_close(&mut self, closing: Closing, open: Position) -> ParseResult<()> {
        if closing.matches(&self.current().kind) {
            self.advance();
            return Ok(());
        }
        if matches!(self.current().kind, TokenKind::Eof) {
            let delimiter = match closing {
                Closing::Paren => ')',
                _ => '}',
            };
            return Err(ParseError::UnclosedBlock {
                delimiter,
                position: open,
            });
        }
        Err(self.unexpected(match closing {
            Closing::Paren => "')'",
            _ => "'}'",
        }))
    }

    fn parse(&mut self) -> ParseResult<ScriptAst> {
        self.skip_separators();
        let param_block = self.try_parse_param_block()?;
        let statements = self.parse_statement_list(Closing::Eof)?;
        if !matches!(self.current().kind, TokenKind::Eof) {
            return Err(self.unexpected("statement"));
        }
        Ok(ScriptAst {
            param_block,
            statements,
            extent: Extent::new(
                Span::new(Position::new(1, 1, 0), end_position(self.source)),
                self.file,
                self.source,
            ),
        })
    }

    fn parse_statement_list(&mut self, closing: Closing) -> ParseResult<Vec<Node>> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            let kind = &self.current().kind;
            if closing.matches(kind) || matches!(kind, TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);

            match &self.current().kind {
                TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Comment(_)
                | TokenKind::Eof
                // `'value' { ... }` clauses inside switch bodies
                | TokenKind::OpenBrace => {}
                // `foreach ($item in $items)`
                TokenKind::Word(word)
                    if closing == Closing::Paren && word.eq_ignore_ascii_case("in") =>
                {
                    self.advance();
                }
                kind if closing.matches(kind) => {}
                _ if self.prev_kind() == Some(&TokenKind::CloseBrace) => {}
                _ => return Err(self.unexpected("newline or ';'")),
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Node> {
        match &self.current().kind {
            TokenKind::Word(word)
                if (word.eq_ignore_ascii_case("function") || word.eq_ignore_ascii_case("filter"))
                    && matches!(self.peek(1).kind, TokenKind::Word(_)) =>
            {
                return self.parse_function();
            }
            TokenKind::Word(word)
                if word.eq_ignore_ascii_case("class")
                    && matches!(self.peek(1).kind, TokenKind::Word(_)) =>
            {
                let start = self.current().span.start;
                return self.parse_class(Vec::new(), start);
            }
            TokenKind::OpenBracket => {
                let start = self.current().span.start;
                if let Some(attributes) = self.try_parse_class_attributes() {
                    return self.parse_class(attributes, start);
                }
            }
            _ => {}
        }
        self.parse_pipeline_statement()
    }

    fn parse_function(&mut self) -> ParseResult<Node> {
        let start = self.current().span.start;
        let is_filter = self.at_word("filter");
        self.advance();

        let name = match &self.advance().kind {
            TokenKind::Word(name) => name.clone(),
            _ => return Err(self.unexpected("function name")),
        };

        let parameters = if self.at(&TokenKind::OpenParen) {
            self.parse_parameter_list()?
        } else {
            Vec::new()
        };
        self.skip_newlines();
        let body = self.parse_script_block()?;

        Ok(Node::new(
            NodeKind::FunctionDefinition(Box::new(FunctionDefinition {
                name,
                is_filter,
                parameters,
                body,
            })),
            self.extent_from(start),
        ))
    }

    /// Attributes directly followed by `class`. Restores the position and
    /// returns `None` when the brackets turn out to be something else.
    fn try_parse_class_attributes(&mut self) -> Option<Vec<Attribute>> {
        let saved = self.pos;
        if let Ok(attributes) = self.parse_attribute_list()
            && self.at_word("class")
            && matches!(self.peek(1).kind, TokenKind::Word(_))
        {
            return Some(attributes);
        }
        self.pos = saved;
        None
    }

    /// `class Name [: Base] { ... }`. Members are skipped.
    fn parse_class(&mut self, attributes: Vec<Attribute>, start: Position) -> ParseResult<Node> {
        self.advance();
        let name = match &self.advance().kind {
            TokenKind::Word(name) => name.clone(),
            _ => return Err(self.unexpected("class name")),
        };

        while !matches!(
            self.current().kind,
            TokenKind::OpenBrace | TokenKind::Eof | TokenKind::Newline | TokenKind::Semicolon
        ) {
            self.advance();
        }
        self.skip_newlines();
        if !self.at(&TokenKind::OpenBrace) {
            return Err(self.unexpected("'{'"));
        }
        self.skip_balanced_braces()?;

        Ok(Node::new(
            NodeKind::TypeDefinition(Box::new(TypeDefinition { name, attributes })),
            self.extent_from(start),
        ))
    }

    fn skip_balanced_braces(&mut self) -> ParseResult<()> {
        let open = self.current().span.start;
        let mut depth = 0usize;
        loop {
            match self.advance().kind {
                TokenKind::OpenBrace | TokenKind::AtBrace => depth += 1,
                TokenKind::CloseBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnclosedBlock {
                        delimiter: '}',
                        position: open,
                    });
                }
                _ => {}
            }
        }
    }

    fn parse_script_block(&mut self) -> ParseResult<ScriptBlock> {
        let open = self.current().span.start;
        self.expect(TokenKind::OpenBrace)?;
        self.skip_separators();
        let param_block = self.try_parse_param_block()?;
        let statements = self.parse_statement_list(Closing::Brace)?;
        self.expect_close(Closing::Brace, open)?;
        Ok(ScriptBlock {
            param_block,
            statements,
        })
    }

    fn try_parse_param_block(&mut self) -> ParseResult<Option<ParamBlock>> {
        let saved = self.pos;
        let start = self.current().span.start;
        let attributes = if self.at(&TokenKind::OpenBracket) {
            match self.parse_attribute_list() {
                Ok(attributes) => attributes,
                Err(_) => {
                    self.pos = saved;
                    return Ok(None);
                }
            }
        } else {
            Vec::new()
        };

        if !self.at_word("param") {
            self.pos = saved;
            return Ok(None);
        }
        self.advance();
        self.skip_newlines();
        if !self.at(&TokenKind::OpenParen) {
            return Err(self.unexpected("'('"));
        }
        let parameters = self.parse_parameter_list()?;

        Ok(Some(ParamBlock {
            attributes,
            parameters,
            extent: self.extent_from(start),
        }))
    }

    fn parse_parameter_list(&mut self) -> ParseResult<Vec<Parameter>> {
        let open = self.current().span.start;
        self.advance();
        let mut parameters = Vec::new();
        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::CloseParen => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnclosedBlock {
                        delimiter: ')',
                        position: open,
                    });
                }
                _ => {}
            }

            let start = self.current().span.start;
            let attributes = self.parse_attribute_list()?;
            let name = match &self.current().kind {
                TokenKind::Variable(name) => name.clone(),
                _ => return Err(self.unexpected("parameter variable")),
            };
            self.advance();
            let default = if self.at(&TokenKind::Equals) {
                self.advance();
                self.skip_newlines();
                Some(self.parse_expression(false)?)
            } else {
                None
            };
            parameters.push(Parameter {
                attributes,
                name,
                default,
                extent: self.extent_from(start),
            });

            self.skip_newlines();
            match self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::CloseParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
        Ok(parameters)
    }

    fn parse_attribute_list(&mut self) -> ParseResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        while self.at(&TokenKind::OpenBracket) {
            attributes.push(self.parse_attribute()?);
            self.skip_newlines();
        }
        Ok(attributes)
    }

    fn parse_attribute(&mut self) -> ParseResult<Attribute> {
        let start = self.current().span.start;
        self.advance();
        let type_name = self.parse_type_name()?;
        let mut positional = Vec::new();
        let mut named = Vec::new();

        if self.at(&TokenKind::OpenParen) {
            let open = self.current().span.start;
            self.advance();
            loop {
                self.skip_newlines();
                match &self.current().kind {
                    TokenKind::CloseParen => {
                        self.advance();
                        break;
                    }
                    TokenKind::Eof => {
                        return Err(ParseError::UnclosedBlock {
                            delimiter: ')',
                            position: open,
                        });
                    }
                    TokenKind::Word(name) if self.peek(1).kind == TokenKind::Equals => {
                        let name = name.clone();
                        self.advance();
                        self.advance();
                        self.skip_newlines();
                        let value = self.parse_expression(false)?;
                        named.push(NamedArgument {
                            name,
                            value: Some(value),
                        });
                    }
                    TokenKind::Word(name)
                        if matches!(
                            self.peek(1).kind,
                            TokenKind::Comma | TokenKind::CloseParen | TokenKind::Newline
                        ) =>
                    {
                        named.push(NamedArgument {
                            name: name.clone(),
                            value: None,
                        });
                        self.advance();
                    }
                    _ => positional.push(self.parse_expression(false)?),
                }

                self.skip_newlines();
                match self.current().kind {
                    TokenKind::Comma => {
                        self.advance();
                    }
                    TokenKind::CloseParen => {
                        self.advance();
                        break;
                    }
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }
        self.expect(TokenKind::CloseBracket)?;

        Ok(Attribute {
            type_name,
            positional,
            named,
            extent: self.extent_from(start),
        })
    }

    /// `Name` or `Name[]`, with the opening `[` already consumed.
    fn parse_type_name(&mut self) -> ParseResult<String> {
        let mut name = match &self.current().kind {
            TokenKind::Word(name) => name.clone(),
            _ => return Err(self.unexpected("type name")),
        };
        self.advance();
        while self.at(&TokenKind::OpenBracket) && self.peek(1).kind == TokenKind::CloseBracket {
            self.advance();
            self.advance();
            name.push_str("[]");
        }
        Ok(name)
    }

    fn parse_pipeline_statement(&mut self) -> ParseResult<Node> {
        let start = self.current().span.start;
        let first = self.parse_pipeline_element()?;

        let assignment = match &self.current().kind {
            TokenKind::Equals => Some("=".to_string()),
            TokenKind::Operator(op) if op.len() == 2 && op.ends_with('=') => Some(op.clone()),
            _ => None,
        };
        if let Some(operator) = assignment {
            self.advance();
            self.skip_newlines();
            let value = self.parse_pipeline_statement()?;
            return Ok(Node::new(
                NodeKind::Assignment {
                    target: Box::new(first),
                    operator,
                    value: Box::new(value),
                },
                self.extent_from(start),
            ));
        }

        let mut elements = vec![first];
        while self.at(&TokenKind::Pipe) {
            self.advance();
            self.skip_newlines();
            elements.push(self.parse_pipeline_element()?);
        }
        if elements.len() == 1 {
            return Ok(elements.remove(0));
        }
        Ok(Node::new(
            NodeKind::Pipeline(elements),
            self.extent_from(start),
        ))
    }

    fn parse_pipeline_element(&mut self) -> ParseResult<Node> {
        match &self.current().kind {
            TokenKind::Word(_) => self.parse_command(),
            TokenKind::Operator(op) if op == "&" => self.parse_command(),
            _ => self.parse_expression(true),
        }
    }

    fn parse_command(&mut self) -> ParseResult<Node> {
        let name_token = self.advance();
        let start = name_token.span.start;
        let name = match &name_token.kind {
            TokenKind::Word(word) => word.clone(),
            TokenKind::Operator(op) => op.clone(),
            _ => return Err(self.unexpected("command name")),
        };
        let name_extent = self.extent(name_token.span.start, name_token.span.end);

        let mut arguments = Vec::new();
        loop {
            let token = self.current();
            let token_extent = self.extent(token.span.start, token.span.end);
            match &token.kind {
                TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Comment(_)
                | TokenKind::CloseBrace
                | TokenKind::CloseParen
                | TokenKind::Pipe
                | TokenKind::Eof => break,
                TokenKind::DashWord(word) => {
                    arguments.push(Node::new(
                        NodeKind::CommandParameter(word.clone()),
                        token_extent,
                    ));
                    self.advance();
                }
                TokenKind::Word(word) | TokenKind::Operator(word) => {
                    arguments.push(Node::new(NodeKind::BareWord(word.clone()), token_extent));
                    self.advance();
                }
                TokenKind::Dot => {
                    arguments.push(Node::new(
                        NodeKind::BareWord(".".to_string()),
                        token_extent,
                    ));
                    self.advance();
                }
                // `-Recurse:$false`
                TokenKind::Colon if matches!(self.prev_kind(), Some(TokenKind::DashWord(_))) => {
                    self.advance();
                }
                TokenKind::Equals
                | TokenKind::Colon
                | TokenKind::DoubleColon
                | TokenKind::Comma
                | TokenKind::CloseBracket => return Err(self.unexpected("command argument")),
                _ => arguments.push(self.parse_comma_operand(true)?),
            }
        }

        Ok(Node::new(
            NodeKind::Command {
                name,
                name_extent,
                arguments,
            },
            self.extent_from(start),
        ))
    }

    /// Binary expression over (optionally comma-separated) unary operands.
    ///
    /// `allow_comma` is false where commas separate items of an enclosing
    /// list, as in parameter defaults and attribute arguments.
    fn parse_expression(&mut self, allow_comma: bool) -> ParseResult<Node> {
        self.parse_binary(allow_comma, 0)
    }

    fn parse_binary(&mut self, allow_comma: bool, min_precedence: u8) -> ParseResult<Node> {
        let mut left = self.parse_comma_operand(allow_comma)?;
        while let Some((operator, precedence)) = self.binary_operator() {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_binary(allow_comma, precedence + 1)?;
            let extent = self.extent(left.extent.span().start, right.extent.span().end);
            left = Node::new(
                NodeKind::BinaryExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                extent,
            );
        }
        Ok(left)
    }

    fn binary_operator(&self) -> Option<(String, u8)> {
        match &self.current().kind {
            TokenKind::Operator(op) if matches!(op.as_str(), "*" | "/" | "%") => {
                Some((op.clone(), 4))
            }
            TokenKind::Operator(op) if matches!(op.as_str(), "+" | "-") => Some((op.clone(), 3)),
            TokenKind::DashWord(word) => {
                let lower = word.to_ascii_lowercase();
                let name = &lower[1..];
                if matches!(name, "and" | "or" | "xor") {
                    Some((lower, 1))
                } else if is_comparison_operator(name) {
                    Some((lower, 2))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_comma_operand(&mut self, allow_comma: bool) -> ParseResult<Node> {
        let first = self.parse_unary()?;
        if !allow_comma || !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let start = first.extent.span().start;
        let mut items = vec![first];
        while self.at(&TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            items.push(self.parse_unary()?);
        }
        Ok(Node::new(
            NodeKind::ArrayLiteral(items),
            self.extent_from(start),
        ))
    }

    fn parse_unary(&mut self) -> ParseResult<Node> {
        let token = self.current();
        let start = token.span.start;
        match &token.kind {
            TokenKind::Operator(op) if matches!(op.as_str(), "-" | "+" | "!" | "++" | "--") => {
                let operator = op.clone();
                self.advance();
                let operand = self.parse_unary()?;
                if operator == "-"
                    && let NodeKind::Number(number) = operand.kind
                {
                    return Ok(Node::new(
                        NodeKind::Number(number.negate()),
                        self.extent_from(start),
                    ));
                }
                Ok(Node::new(
                    NodeKind::UnaryExpression {
                        operator,
                        operand: Box::new(operand),
                    },
                    self.extent_from(start),
                ))
            }
            TokenKind::DashWord(word) if word.eq_ignore_ascii_case("-not") => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Node::new(
                    NodeKind::UnaryExpression {
                        operator: "-not".to_string(),
                        operand: Box::new(operand),
                    },
                    self.extent_from(start),
                ))
            }
            TokenKind::OpenBracket => {
                self.advance();
                let type_name = self.parse_type_name()?;
                self.expect(TokenKind::CloseBracket)?;
                if self.starts_operand() {
                    let operand = self.parse_unary()?;
                    return Ok(Node::new(
                        NodeKind::Convert {
                            type_name,
                            operand: Box::new(operand),
                        },
                        self.extent_from(start),
                    ));
                }
                let literal = Node::new(NodeKind::TypeLiteral(type_name), self.extent_from(start));
                self.parse_postfix(literal)
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    /// Whether the current token can begin the operand of a cast.
    fn starts_operand(&self) -> bool {
        match &self.current().kind {
            TokenKind::AtBrace
            | TokenKind::AtParen
            | TokenKind::DollarParen
            | TokenKind::OpenParen
            | TokenKind::OpenBracket
            | TokenKind::StringLiteral { .. }
            | TokenKind::Number(_)
            | TokenKind::Variable(_) => true,
            TokenKind::Operator(op) => matches!(op.as_str(), "-" | "!"),
            TokenKind::DashWord(word) => word.eq_ignore_ascii_case("-not"),
            _ => false,
        }
    }

    fn parse_postfix(&mut self, mut node: Node) -> ParseResult<Node> {
        loop {
            let token = self.current();
            let adjacent = token.span.start.offset == node.extent.span().end.offset;
            match &token.kind {
                TokenKind::Dot | TokenKind::DoubleColon if adjacent => {
                    let is_static = token.kind == TokenKind::DoubleColon;
                    self.advance();
                    let member = match &self.current().kind {
                        TokenKind::Word(word) => word.clone(),
                        TokenKind::StringLiteral { value, .. } => value.clone(),
                        _ => return Err(self.unexpected("member name")),
                    };
                    self.advance();
                    let arguments = if self.at(&TokenKind::OpenParen)
                        && self.current().span.start.offset == self.prev_end().offset
                    {
                        Some(self.parse_method_arguments()?)
                    } else {
                        None
                    };
                    let start = node.extent.span().start;
                    node = Node::new(
                        NodeKind::MemberAccess {
                            target: Box::new(node),
                            member,
                            is_static,
                            arguments,
                        },
                        self.extent_from(start),
                    );
                }
                TokenKind::OpenBracket if adjacent => {
                    let open = token.span.start;
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expression(true)?;
                    self.skip_newlines();
                    if matches!(self.current().kind, TokenKind::Eof) {
                        return Err(ParseError::UnclosedBlock {
                            delimiter: ']',
                            position: open,
                        });
                    }
                    self.expect(TokenKind::CloseBracket)?;
                    let start = node.extent.span().start;
                    node = Node::new(
                        NodeKind::Index {
                            target: Box::new(node),
                            index: Box::new(index),
                        },
                        self.extent_from(start),
                    );
                }
                TokenKind::Operator(op) if adjacent && matches!(op.as_str(), "++" | "--") => {
                    let operator = op.clone();
                    self.advance();
                    let start = node.extent.span().start;
                    node = Node::new(
                        NodeKind::UnaryExpression {
                            operator,
                            operand: Box::new(node),
                        },
                        self.extent_from(start),
                    );
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_method_arguments(&mut self) -> ParseResult<Vec<Node>> {
        let open = self.current().span.start;
        self.advance();
        let mut arguments = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::CloseParen) {
                self.advance();
                break;
            }
            if matches!(self.current().kind, TokenKind::Eof) {
                return Err(ParseError::UnclosedBlock {
                    delimiter: ')',
                    position: open,
                });
            }
            arguments.push(self.parse_expression(false)?);
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::CloseParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Node> {
        let token = self.current();
        let start = token.span.start;
        let kind = match &token.kind {
            TokenKind::AtBrace => return self.parse_hashtable(),
            TokenKind::AtParen => {
                self.advance();
                let items = self.parse_statement_list(Closing::Paren)?;
                self.expect_close(Closing::Paren, start)?;
                NodeKind::ArrayExpression(items)
            }
            TokenKind::DollarParen => {
                self.advance();
                let items = self.parse_statement_list(Closing::Paren)?;
                self.expect_close(Closing::Paren, start)?;
                NodeKind::SubExpression(items)
            }
            TokenKind::OpenParen => {
                self.advance();
                let mut items = self.parse_statement_list(Closing::Paren)?;
                self.expect_close(Closing::Paren, start)?;
                if items.len() == 1 {
                    NodeKind::Paren(Box::new(items.remove(0)))
                } else {
                    NodeKind::SubExpression(items)
                }
            }
            TokenKind::OpenBrace => {
                let block = self.parse_script_block()?;
                NodeKind::ScriptBlock(Box::new(block))
            }
            TokenKind::StringLiteral {
                value,
                quote,
                expandable,
            } => {
                self.advance();
                if *expandable {
                    NodeKind::ExpandableString {
                        value: value.clone(),
                        quote: *quote,
                    }
                } else {
                    NodeKind::StringConstant {
                        value: value.clone(),
                        quote: *quote,
                    }
                }
            }
            TokenKind::Number(number) => {
                self.advance();
                NodeKind::Number(*number)
            }
            TokenKind::Variable(name) => {
                self.advance();
                NodeKind::Variable(name.clone())
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Node::new(kind, self.extent_from(start)))
    }

    fn parse_hashtable(&mut self) -> ParseResult<Node> {
        let start = self.current().span.start;
        self.advance();
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        loop {
            self.skip_separators();
            match self.current().kind {
                TokenKind::CloseBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnclosedBlock {
                        delimiter: '}',
                        position: start,
                    });
                }
                _ => {}
            }

            let key_token = self.current();
            let key = match &key_token.kind {
                TokenKind::Word(word) => word.clone(),
                TokenKind::StringLiteral {
                    value,
                    expandable: false,
                    ..
                } => value.clone(),
                TokenKind::Number(number) => number.to_string(),
                _ => return Err(self.unexpected("hashtable key")),
            };
            let key_extent = self.extent(key_token.span.start, key_token.span.end);
            self.advance();
            self.expect(TokenKind::Equals)?;
            self.skip_newlines();
            let value = self.parse_statement()?;

            if !seen.insert(key.to_lowercase()) {
                return Err(ParseError::DuplicateKey {
                    key,
                    position: key_token.span.start,
                });
            }
            entries.push(HashEntry {
                key,
                key_extent,
                value,
            });

            match self.current().kind {
                TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Comment(_)
                | TokenKind::CloseBrace => {}
                _ => return Err(self.unexpected("newline, ';' or '}'")),
            }
        }

        Ok(Node::new(
            NodeKind::Hashtable(entries),
            self.extent_from(start),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Number, QuoteKind};

    fn single_statement(source: &str) -> Node {
        let ast = parse_string(source).unwrap();
        assert_eq!(ast.statements.len(), 1, "statements: {:?}", ast.statements);
        ast.statements.into_iter().next().unwrap()
    }

    fn entries(node: &Node) -> &[HashEntry] {
        match &node.kind {
            NodeKind::Hashtable(entries) => entries,
            other => panic!("expected hashtable, got {}", other.describe()),
        }
    }

    #[test]
    fn test_simple_hashtable() {
        let node = single_statement("@{ Severity = 'Error'; Count = 3 }");
        let entries = entries(&node);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "Severity");
        assert_eq!(
            entries[0].value.kind,
            NodeKind::StringConstant {
                value: "Error".to_string(),
                quote: QuoteKind::Single
            }
        );
        assert_eq!(entries[1].value.kind, NodeKind::Number(Number::Int(3)));
    }

    #[test]
    fn test_multiline_settings_file() {
        let source = r#"
# Settings
@{
    IncludeRules = @(
        'AvoidUsingCmdletAliases',
        'AvoidTrailingWhitespace'
    )
    Rules = @{
        AvoidUsingCmdletAliases = @{
            Allowlist = @('cd')
        }
    }
    IncludeDefaultRules = $true
}
"#;
        let node = single_statement(source);
        let entries = entries(&node);
        assert_eq!(entries.len(), 3);

        let NodeKind::ArrayExpression(items) = &entries[0].value.kind else {
            panic!("expected array expression");
        };
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0].kind, NodeKind::ArrayLiteral(list) if list.len() == 2));

        assert!(matches!(entries[1].value.kind, NodeKind::Hashtable(_)));
        assert_eq!(
            entries[2].value.kind,
            NodeKind::Variable("true".to_string())
        );
    }

    #[test]
    fn test_quoted_and_numeric_keys() {
        let node = single_statement("@{ 'quoted key' = 1; 42 = 'answer' }");
        let entries = entries(&node);
        assert_eq!(entries[0].key, "quoted key");
        assert_eq!(entries[1].key, "42");
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let err = parse_string("@{ a = 1; A = 2 }").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { ref key, .. } if key == "A"));
    }

    #[test]
    fn test_unclosed_hashtable() {
        let err = parse_string("@{ a = 1").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnclosedBlock { delimiter: '}', .. }
        ));
    }

    #[test]
    fn test_negative_number_folds() {
        let node = single_statement("@{ Offset = -5 }");
        assert_eq!(entries(&node)[0].value.kind, NodeKind::Number(Number::Int(-5)));
    }

    #[test]
    fn test_paren_wraps_single_statement() {
        let node = single_statement("('x')");
        let NodeKind::Paren(inner) = &node.kind else {
            panic!("expected paren, got {}", node.kind.describe());
        };
        assert!(matches!(inner.kind, NodeKind::StringConstant { .. }));
    }

    #[test]
    fn test_command_with_arguments() {
        let node = single_statement("gci -Path . -Recurse");
        let NodeKind::Command {
            name,
            name_extent,
            arguments,
        } = &node.kind
        else {
            panic!("expected command");
        };
        assert_eq!(name, "gci");
        assert_eq!(name_extent.text, "gci");
        assert_eq!(name_extent.start_column(), 1);
        assert_eq!(arguments.len(), 3);
        assert_eq!(
            arguments[0].kind,
            NodeKind::CommandParameter("-Path".to_string())
        );
        assert_eq!(arguments[1].kind, NodeKind::BareWord(".".to_string()));
    }

    #[test]
    fn test_pipeline() {
        let node = single_statement("Get-Process | Where-Object { $_.CPU -gt 10 } | sort");
        let NodeKind::Pipeline(elements) = &node.kind else {
            panic!("expected pipeline");
        };
        assert_eq!(elements.len(), 3);
        let NodeKind::Command { arguments, .. } = &elements[1].kind else {
            panic!("expected command");
        };
        let NodeKind::ScriptBlock(block) = &arguments[0].kind else {
            panic!("expected script block");
        };
        assert!(matches!(
            &block.statements[0].kind,
            NodeKind::BinaryExpression { operator, .. } if operator == "-gt"
        ));
    }

    #[test]
    fn test_assignment_and_precedence() {
        let node = single_statement("$total = 1 + 2 * 3");
        let NodeKind::Assignment { target, value, .. } = &node.kind else {
            panic!("expected assignment");
        };
        assert_eq!(target.kind, NodeKind::Variable("total".to_string()));
        let NodeKind::BinaryExpression {
            operator, right, ..
        } = &value.kind
        else {
            panic!("expected binary expression");
        };
        assert_eq!(operator, "+");
        assert!(matches!(
            &right.kind,
            NodeKind::BinaryExpression { operator, .. } if operator == "*"
        ));
    }

    #[test]
    fn test_member_access_and_index() {
        let node = single_statement("$list[0].ToUpper()");
        let NodeKind::MemberAccess {
            target,
            member,
            arguments,
            is_static,
        } = &node.kind
        else {
            panic!("expected member access");
        };
        assert_eq!(member, "ToUpper");
        assert!(!is_static);
        assert_eq!(arguments.as_ref().map(Vec::len), Some(0));
        assert!(matches!(target.kind, NodeKind::Index { .. }));
    }

    #[test]
    fn test_static_member_and_cast() {
        let node = single_statement("[int]'5' + [Math]::Max(1, 2)");
        let NodeKind::BinaryExpression { left, right, .. } = &node.kind else {
            panic!("expected binary expression");
        };
        assert!(matches!(&left.kind, NodeKind::Convert { type_name, .. } if type_name == "int"));
        assert!(matches!(
            &right.kind,
            NodeKind::MemberAccess { is_static: true, arguments: Some(args), .. } if args.len() == 2
        ));
    }

    #[test]
    fn test_function_with_param_block_attributes() {
        let source = r#"
function Get-Thing {
    [CmdletBinding()]
    [Diagnostics.CodeAnalysis.SuppressMessageAttribute('PSAvoidUsingCmdletAliases', '', Scope = 'Function')]
    param(
        [Parameter(Mandatory)]
        [string]$Name,
        [int]$Count = 1
    )
    gci $Name
}
"#;
        let node = single_statement(source);
        let NodeKind::FunctionDefinition(function) = &node.kind else {
            panic!("expected function");
        };
        assert_eq!(function.name, "Get-Thing");
        let param_block = function.body.param_block.as_ref().unwrap();
        assert_eq!(param_block.attributes.len(), 2);

        let suppression = &param_block.attributes[1];
        assert_eq!(
            suppression.type_name,
            "Diagnostics.CodeAnalysis.SuppressMessageAttribute"
        );
        assert_eq!(suppression.positional.len(), 2);
        assert!(suppression.named_argument("scope").is_some());

        assert_eq!(param_block.parameters.len(), 2);
        assert_eq!(param_block.parameters[0].name, "Name");
        let mandatory = &param_block.parameters[0].attributes[0];
        assert!(mandatory.named_argument("Mandatory").unwrap().value.is_none());
        assert_eq!(
            param_block.parameters[1].default.as_ref().unwrap().kind,
            NodeKind::Number(Number::Int(1))
        );
        assert_eq!(function.body.statements.len(), 1);
    }

    #[test]
    fn test_script_level_param_block() {
        let ast = parse_string("[CmdletBinding()]\nparam($Path)\nWrite-Output $Path\n").unwrap();
        let param_block = ast.param_block.as_ref().unwrap();
        assert_eq!(param_block.attributes[0].type_name, "CmdletBinding");
        assert_eq!(param_block.parameters[0].name, "Path");
        assert_eq!(ast.statements.len(), 1);
    }

    #[test]
    fn test_class_with_attributes() {
        let source = "[SuppressMessageAttribute('Rule', '')]\nclass Widget : Base {\n  [string]$Name\n  [void] Run() { gci }\n}\n";
        let node = single_statement(source);
        let NodeKind::TypeDefinition(class) = &node.kind else {
            panic!("expected class");
        };
        assert_eq!(class.name, "Widget");
        assert_eq!(class.attributes.len(), 1);
        assert_eq!(node.extent.start_line(), 1);
        assert_eq!(node.extent.end_line(), 5);
    }

    #[test]
    fn test_cast_statement_is_not_class_attribute() {
        let node = single_statement("[int]$x = 5");
        assert!(matches!(node.kind, NodeKind::Assignment { .. }));
    }

    #[test]
    fn test_control_flow_statements() {
        let source = r#"
if ($a -eq 1) { 'one' } else { 'other' }
foreach ($item in $items) { $item }
for ($i = 0; $i -lt 3; $i++) { $i }
switch ($x) { 'a' { 1 } default { 2 } }
try { gci } catch [System.Exception] { throw }
"#;
        let ast = parse_string(source).unwrap();
        assert_eq!(ast.statements.len(), 5);
        assert!(ast.statements.iter().all(|s| matches!(s.kind, NodeKind::Command { .. })));
    }

    #[test]
    fn test_extent_text_is_source_slice() {
        let source = "@{\n  Key = 'value'\n}";
        let node = single_statement(source);
        assert_eq!(node.extent.text, source);
        let entry = &entries(&node)[0];
        assert_eq!(entry.key_extent.text, "Key");
        assert_eq!(entry.key_extent.start_line(), 2);
        assert_eq!(entry.key_extent.start_column(), 3);
        assert_eq!(entry.value.extent.text, "'value'");
    }

    #[test]
    fn test_file_recorded_in_extents() {
        let path = Path::new("/tmp/script.ps1");
        let ast = parse_source("gci", Some(path)).unwrap();
        assert_eq!(ast.file(), Some(path));
        assert_eq!(ast.statements[0].extent.file.as_deref(), Some(path));
    }

    #[test]
    fn test_unexpected_closing_brace() {
        let err = parse_string("gci }").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_default_parser_reports_errors() {
        let output = DefaultParser.parse("@{ a = ", None);
        assert!(output.has_errors());
        assert!(output.ast.statements.is_empty());
        assert_eq!(output.ast.source(), "@{ a = ");

        let output = DefaultParser.parse("'open", None);
        assert!(matches!(output.errors[0], ParseError::Lexer(_)));
        assert!(output.tokens.is_empty());
    }

    #[test]
    fn test_comments_between_entries() {
        let node = single_statement("@{\n  # first\n  a = 1 # trailing\n  <# block #>\n  b = 2\n}");
        assert_eq!(entries(&node).len(), 2);
    }
}
