use crate::ast::{Number, Position, QuoteKind, Span};
use crate::error::{LexerError, ParseResult};

/// Token types for PowerShell source
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `@{`
    AtBrace,
    /// `@(`
    AtParen,
    /// `$(`
    DollarParen,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
    Equals,
    Pipe,
    /// `.` directly followed by a member name
    Dot,
    Colon,
    DoubleColon,
    /// Arithmetic, unary and compound-assignment operators (`+`, `-=`, `!`, `&`, ...)
    Operator(String),
    /// A dash followed by a word: `-eq`, `-not`, `-Path` (stored with the dash)
    DashWord(String),
    /// String literal (content with quotes and escapes processed)
    StringLiteral {
        value: String,
        quote: QuoteKind,
        expandable: bool,
    },
    Number(Number),
    /// Variable (`$name`, stored without the `$`)
    Variable(String),
    /// Bare word: command names, hashtable keys, keywords, arguments
    Word(String),
    /// Comment (`# ...` or `<# ... #>`)
    Comment(String),
    Newline,
    Eof,
}

impl TokenKind {
    /// Returns a human-readable name for this token kind, used in error messages.
    pub fn display_name(&self) -> String {
        match self {
            TokenKind::AtBrace => "'@{'".to_string(),
            TokenKind::AtParen => "'@('".to_string(),
            TokenKind::DollarParen => "'$('".to_string(),
            TokenKind::OpenBrace => "'{'".to_string(),
            TokenKind::CloseBrace => "'}'".to_string(),
            TokenKind::OpenParen => "'('".to_string(),
            TokenKind::CloseParen => "')'".to_string(),
            TokenKind::OpenBracket => "'['".to_string(),
            TokenKind::CloseBracket => "']'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::DoubleColon => "'::'".to_string(),
            TokenKind::Operator(op) => format!("operator '{}'", op),
            TokenKind::DashWord(word) => format!("'{}'", word),
            TokenKind::StringLiteral { .. } => "string".to_string(),
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Variable(name) => format!("variable '${}'", name),
            TokenKind::Word(word) => format!("'{}'", word),
            TokenKind::Comment(_) => "comment".to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// A token with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind and optional payload of this token.
    pub kind: TokenKind,
    /// Source span of the token (excluding leading whitespace).
    pub span: Span,
    /// Original source text of the token (e.g. `'hello'` including quotes).
    pub raw: String,
}

/// Lexer for tokenizing PowerShell source.
///
/// Converts source text into a stream of [`Token`]s. Use [`new`](Lexer::new) to
/// create a lexer and [`tokenize`](Lexer::tokenize) to consume the entire input.
pub struct Lexer<'a> {
    source: &'a str,
    line: usize,
    column: usize,
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.offset..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    /// Skip spaces, tabs, carriage returns and backtick line continuations.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\u{feff}' => {
                    self.advance();
                }
                '`' if matches!(self.peek_second(), Some('\n') | Some('\r')) => {
                    self.advance();
                    if self.peek() == Some('\r') {
                        self.advance();
                    }
                    self.advance();
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_trivia();

        let start_pos = self.position();
        let start_offset = self.offset;

        let Some(ch) = self.advance() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start_pos, start_pos),
                raw: String::new(),
            });
        };

        let kind = match ch {
            '\n' => TokenKind::Newline,
            '#' => {
                let mut text = String::from('#');
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                TokenKind::Comment(text.trim_end_matches('\r').to_string())
            }
            '<' if self.peek() == Some('#') => self.read_block_comment(start_pos)?,
            '@' => match self.peek() {
                Some('{') => {
                    self.advance();
                    TokenKind::AtBrace
                }
                Some('(') => {
                    self.advance();
                    TokenKind::AtParen
                }
                Some(quote @ ('\'' | '"')) => {
                    self.advance();
                    self.read_here_string(quote, start_pos)?
                }
                _ => {
                    return Err(LexerError::UnexpectedChar {
                        ch,
                        position: start_pos,
                    }
                    .into());
                }
            },
            '$' => match self.peek() {
                Some('(') => {
                    self.advance();
                    TokenKind::DollarParen
                }
                Some('{') => {
                    self.advance();
                    TokenKind::Variable(self.read_braced_variable(start_pos)?)
                }
                Some(c) if is_variable_char(c) => TokenKind::Variable(self.read_variable_name()),
                Some(c @ ('?' | '$' | '^')) => {
                    self.advance();
                    TokenKind::Variable(c.to_string())
                }
                _ => {
                    return Err(LexerError::UnexpectedChar {
                        ch,
                        position: start_pos,
                    }
                    .into());
                }
            },
            '{' => TokenKind::OpenBrace,
            '}' => TokenKind::CloseBrace,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Equals,
            '|' => TokenKind::Pipe,
            '&' | '!' => TokenKind::Operator(ch.to_string()),
            ':' => {
                if self.peek() == Some(':') {
                    self.advance();
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            '+' if self.peek() == Some('+') => {
                self.advance();
                TokenKind::Operator("++".to_string())
            }
            '+' | '*' | '/' => self.read_operator(ch),
            '%' | '?' if self.at_word_boundary() => TokenKind::Word(ch.to_string()),
            '%' => self.read_operator(ch),
            '-' => match self.peek() {
                Some(c) if c.is_alphabetic() => {
                    let mut word = String::from('-');
                    while let Some(c) = self.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            word.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    TokenKind::DashWord(word)
                }
                Some('-') => {
                    self.advance();
                    TokenKind::Operator("--".to_string())
                }
                _ => self.read_operator(ch),
            },
            '.' => match self.peek() {
                Some(c) if c.is_whitespace() => TokenKind::Word(".".to_string()),
                _ => TokenKind::Dot,
            },
            '\'' => TokenKind::StringLiteral {
                value: self.read_single_quoted_string(start_pos)?,
                quote: QuoteKind::Single,
                expandable: false,
            },
            '"' => {
                let (value, expandable) = self.read_double_quoted_string(start_pos)?;
                TokenKind::StringLiteral {
                    value,
                    quote: QuoteKind::Double,
                    expandable,
                }
            }
            _ if ch.is_ascii_digit() => self.read_number_or_word(ch),
            _ if is_word_start(ch) => TokenKind::Word(self.read_word(ch)),
            _ => {
                return Err(LexerError::UnexpectedChar {
                    ch,
                    position: start_pos,
                }
                .into());
            }
        };

        let end_pos = self.position();
        let raw = self.source[start_offset..self.offset].to_string();

        Ok(Token {
            kind,
            span: Span::new(start_pos, end_pos),
            raw,
        })
    }

    /// `%` and `?` are command aliases when they stand alone.
    fn at_word_boundary(&self) -> bool {
        match self.peek() {
            None => true,
            Some(c) => c.is_whitespace() || c == '{',
        }
    }

    fn read_operator(&mut self, first: char) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            TokenKind::Operator(format!("{}=", first))
        } else {
            TokenKind::Operator(first.to_string())
        }
    }

    fn read_block_comment(&mut self, start_pos: Position) -> ParseResult<TokenKind> {
        self.advance(); // consume '#'
        let mut text = String::from("<#");
        loop {
            match self.advance() {
                Some('#') if self.peek() == Some('>') => {
                    self.advance();
                    text.push_str("#>");
                    return Ok(TokenKind::Comment(text));
                }
                Some(c) => text.push(c),
                None => {
                    return Err(LexerError::UnterminatedComment {
                        position: start_pos,
                    }
                    .into());
                }
            }
        }
    }

    fn read_single_quoted_string(&mut self, start_pos: Position) -> ParseResult<String> {
        let mut value = String::new();

        loop {
            match self.advance() {
                Some('\'') => {
                    // '' is an escaped quote
                    if self.peek() == Some('\'') {
                        self.advance();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(ch) => value.push(ch),
                None => {
                    return Err(LexerError::UnterminatedString {
                        position: start_pos,
                    }
                    .into());
                }
            }
        }

        Ok(value)
    }

    fn read_double_quoted_string(&mut self, start_pos: Position) -> ParseResult<(String, bool)> {
        let mut value = String::new();
        let mut expandable = false;

        loop {
            match self.advance() {
                Some('"') => {
                    if self.peek() == Some('"') {
                        self.advance();
                        value.push('"');
                    } else {
                        break;
                    }
                }
                Some('`') => match self.advance() {
                    Some(c) => value.push(backtick_escape(c)),
                    None => {
                        return Err(LexerError::UnterminatedString {
                            position: start_pos,
                        }
                        .into());
                    }
                },
                Some('$') => {
                    if self.peek().is_some_and(starts_interpolation) {
                        expandable = true;
                    }
                    value.push('$');
                }
                Some(ch) => value.push(ch),
                None => {
                    return Err(LexerError::UnterminatedString {
                        position: start_pos,
                    }
                    .into());
                }
            }
        }

        Ok((value, expandable))
    }

    /// Here-strings: `@'` / `@"` must end the line, and the string ends at a
    /// line starting with `'@` / `"@`.
    fn read_here_string(&mut self, quote: char, start_pos: Position) -> ParseResult<TokenKind> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    break;
                }
                _ => {
                    return Err(LexerError::UnexpectedChar {
                        ch: c,
                        position: self.position(),
                    }
                    .into());
                }
            }
        }

        let mut lines: Vec<String> = Vec::new();
        loop {
            if self.peek().is_none() {
                return Err(LexerError::UnterminatedString {
                    position: start_pos,
                }
                .into());
            }
            if self.peek() == Some(quote) && self.peek_second() == Some('@') {
                self.advance();
                self.advance();
                break;
            }
            let mut line = String::new();
            while let Some(c) = self.advance() {
                if c == '\n' {
                    break;
                }
                line.push(c);
            }
            lines.push(line.trim_end_matches('\r').to_string());
        }

        let value = lines.join("\n");
        let is_double = quote == '"';
        let expandable = is_double
            && value
                .char_indices()
                .any(|(i, c)| c == '$' && value[i + 1..].chars().next().is_some_and(starts_interpolation));

        Ok(TokenKind::StringLiteral {
            value,
            quote: if is_double {
                QuoteKind::DoubleHere
            } else {
                QuoteKind::SingleHere
            },
            expandable,
        })
    }

    fn read_braced_variable(&mut self, start_pos: Position) -> ParseResult<String> {
        let mut name = String::new();
        loop {
            match self.advance() {
                Some('}') => return Ok(name),
                Some(c) => name.push(c),
                None => {
                    return Err(LexerError::UnterminatedString {
                        position: start_pos,
                    }
                    .into());
                }
            }
        }
    }

    fn read_variable_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            // `$env:PATH`, `$script:count`
            if is_variable_char(ch) || (ch == ':' && !name.is_empty() && self.peek_second().is_some_and(is_variable_char)) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn read_word(&mut self, first: char) -> String {
        let mut value = String::from(first);
        while let Some(ch) = self.peek() {
            if is_word_continue(ch) {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        value
    }

    /// Numbers such as `42`, `1.5`, `0xFF` or `10kb`. A digit run that is not a
    /// valid number (`7zip`, `10.0.0.1`) is a bare word.
    fn read_number_or_word(&mut self, first: char) -> TokenKind {
        let mut text = String::from(first);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '.' || ch == '_' {
                // `1..10` is a range, not a number
                if ch == '.' && self.peek_second() == Some('.') {
                    break;
                }
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match parse_number(&text) {
            Some(number) => TokenKind::Number(number),
            None => {
                while let Some(ch) = self.peek() {
                    if is_word_continue(ch) {
                        text.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
                TokenKind::Word(text)
            }
        }
    }

    /// Tokenize the entire input and return all tokens
    pub fn tokenize(&mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok().map(Number::Int);
    }

    let (digits, multiplier): (&str, i64) = [
        ("kb", 1 << 10),
        ("mb", 1 << 20),
        ("gb", 1 << 30),
        ("tb", 1 << 40),
        ("pb", 1 << 50),
    ]
    .iter()
    .find_map(|(suffix, factor)| lower.strip_suffix(suffix).map(|d| (d, *factor)))
    .unwrap_or((lower.as_str(), 1));

    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(value) = digits.parse::<i64>() {
        return value.checked_mul(multiplier).map(Number::Int);
    }
    if digits
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == 'e')
    {
        return digits
            .parse::<f64>()
            .ok()
            .map(|value| Number::Float(value * multiplier as f64));
    }
    None
}

fn backtick_escape(ch: char) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        'e' => '\u{1b}',
        other => other,
    }
}

fn starts_interpolation(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '{' | '(' | '?' | '$' | '^')
}

/// Check if a character can appear in a `$variable` name
fn is_variable_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Check if a character can start a bare word
fn is_word_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

/// Check if a character can continue a bare word (`Get-ChildItem`,
/// `Microsoft.PowerShell.Management\Get-Item`)
fn is_word_continue(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '\\')
}
