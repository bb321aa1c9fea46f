//! The scanner converts source text into a stream of tokens.

use rscope_ast::SyntaxKind;
use rscope_core::text::TextSpan;
use rscope_diagnostics::{messages, Diagnostic, DiagnosticCollection, DiagnosticMessage};

/// The scanner converts source text into tokens on demand.
pub struct Scanner {
    /// The source text being scanned.
    text: Vec<char>,
    /// Current position in the text.
    pos: usize,
    /// Start of the current token (after leading trivia).
    token_start: usize,
    token: SyntaxKind,
    /// Identifier name, decoded string contents, or numeric text.
    token_value: String,
    preceding_line_break: bool,
    diagnostics: DiagnosticCollection,
}

impl Scanner {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.chars().collect(),
            pos: 0,
            token_start: 0,
            token: SyntaxKind::Unknown,
            token_value: String::new(),
            preceding_line_break: false,
            diagnostics: DiagnosticCollection::new(),
        }
    }

    #[inline]
    pub fn token(&self) -> SyntaxKind {
        self.token
    }

    #[inline]
    pub fn token_value(&self) -> &str {
        &self.token_value
    }

    #[inline]
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// The current position (end of current token).
    #[inline]
    pub fn token_end(&self) -> usize {
        self.pos
    }

    /// Whether the current token was preceded by a line break.
    #[inline]
    pub fn has_preceding_line_break(&self) -> bool {
        self.preceding_line_break
    }

    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    // ========================================================================
    // Core scanning
    // ========================================================================

    #[inline]
    fn current_char(&self) -> Option<char> {
        self.text.get(self.pos).copied()
    }

    #[inline]
    fn char_at(&self, offset: usize) -> Option<char> {
        self.text.get(self.pos + offset).copied()
    }

    fn error(&mut self, message: &DiagnosticMessage, start: usize) {
        let span = TextSpan::from_bounds(start as u32, self.pos.max(start) as u32);
        self.diagnostics
            .add(Diagnostic::with_location(String::new(), span, message, &[]));
    }

    /// Skip whitespace and comments, recording whether a line break was seen.
    fn skip_trivia(&mut self) {
        loop {
            let Some(ch) = self.current_char() else {
                return;
            };
            match ch {
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    self.preceding_line_break = true;
                    self.pos += 1;
                }
                '/' if self.char_at(1) == Some('/') => {
                    self.pos += 2;
                    while let Some(c) = self.current_char() {
                        if is_line_break(c) {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '/' if self.char_at(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut closed = false;
                    while let Some(c) = self.current_char() {
                        if c == '*' && self.char_at(1) == Some('/') {
                            self.pos += 2;
                            closed = true;
                            break;
                        }
                        if is_line_break(c) {
                            self.preceding_line_break = true;
                        }
                        self.pos += 1;
                    }
                    if !closed {
                        self.error(&messages::ASTERISK_SLASH_EXPECTED, start);
                    }
                }
                c if c.is_whitespace() || c == '\u{FEFF}' => {
                    self.pos += 1;
                }
                _ => return,
            }
        }
    }

    /// Scan the next token and return its kind.
    pub fn scan(&mut self) -> SyntaxKind {
        self.preceding_line_break = false;
        self.token_value.clear();

        self.skip_trivia();
        self.token_start = self.pos;

        let Some(ch) = self.current_char() else {
            self.token = SyntaxKind::EndOfFileToken;
            return self.token;
        };

        self.token = match ch {
            '(' => self.single(SyntaxKind::OpenParenToken),
            ')' => self.single(SyntaxKind::CloseParenToken),
            '{' => self.single(SyntaxKind::OpenBraceToken),
            '}' => self.single(SyntaxKind::CloseBraceToken),
            ';' => self.single(SyntaxKind::SemicolonToken),
            ',' => self.single(SyntaxKind::CommaToken),
            '+' => self.single(SyntaxKind::PlusToken),
            '-' => self.single(SyntaxKind::MinusToken),
            '*' => self.single(SyntaxKind::AsteriskToken),
            '/' => self.single(SyntaxKind::SlashToken),
            '%' => self.single(SyntaxKind::PercentToken),
            '<' => self.with_equals(SyntaxKind::LessThanToken, SyntaxKind::LessThanEqualsToken),
            '>' => self.with_equals(SyntaxKind::GreaterThanToken, SyntaxKind::GreaterThanEqualsToken),
            '=' => self.scan_equality(
                SyntaxKind::EqualsToken,
                SyntaxKind::EqualsEqualsToken,
                SyntaxKind::EqualsEqualsEqualsToken,
            ),
            '!' => self.scan_equality(
                SyntaxKind::ExclamationToken,
                SyntaxKind::ExclamationEqualsToken,
                SyntaxKind::ExclamationEqualsEqualsToken,
            ),
            '&' if self.char_at(1) == Some('&') => {
                self.pos += 2;
                SyntaxKind::AmpersandAmpersandToken
            }
            '|' if self.char_at(1) == Some('|') => {
                self.pos += 2;
                SyntaxKind::BarBarToken
            }
            '"' | '\'' => self.scan_string(ch),
            c if c.is_ascii_digit() => self.scan_number(),
            '.' if self.char_at(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            c if is_identifier_start(c) => self.scan_identifier(),
            _ => {
                self.pos += 1;
                self.error(&messages::INVALID_CHARACTER, self.token_start);
                SyntaxKind::Unknown
            }
        };
        self.token
    }

    fn single(&mut self, kind: SyntaxKind) -> SyntaxKind {
        self.pos += 1;
        kind
    }

    fn with_equals(&mut self, plain: SyntaxKind, equals: SyntaxKind) -> SyntaxKind {
        if self.char_at(1) == Some('=') {
            self.pos += 2;
            equals
        } else {
            self.pos += 1;
            plain
        }
    }

    fn scan_equality(&mut self, one: SyntaxKind, two: SyntaxKind, three: SyntaxKind) -> SyntaxKind {
        if self.char_at(1) != Some('=') {
            self.pos += 1;
            return one;
        }
        if self.char_at(2) == Some('=') {
            self.pos += 3;
            three
        } else {
            self.pos += 2;
            two
        }
    }

    fn scan_identifier(&mut self) -> SyntaxKind {
        let start = self.pos;
        while self.current_char().is_some_and(is_identifier_part) {
            self.pos += 1;
        }
        self.token_value = self.text[start..self.pos].iter().collect();
        SyntaxKind::from_keyword(&self.token_value).unwrap_or(SyntaxKind::Identifier)
    }

    fn scan_number(&mut self) -> SyntaxKind {
        let start = self.pos;
        if self.current_char() == Some('0') && matches!(self.char_at(1), Some('x' | 'X')) {
            self.pos += 2;
            while self.current_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            self.token_value = self.text[start..self.pos].iter().collect();
            return SyntaxKind::NumericLiteral;
        }
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.current_char() == Some('.') {
            self.pos += 1;
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let exponent_start = self.pos;
            self.pos += 1;
            if matches!(self.current_char(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = exponent_start;
            }
        }
        self.token_value = self.text[start..self.pos].iter().collect();
        SyntaxKind::NumericLiteral
    }

    fn scan_string(&mut self, quote: char) -> SyntaxKind {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.current_char() else {
                self.error(&messages::UNTERMINATED_STRING_LITERAL, start);
                break;
            };
            if c == quote {
                self.pos += 1;
                break;
            }
            if is_line_break(c) {
                self.error(&messages::UNTERMINATED_STRING_LITERAL, start);
                break;
            }
            self.pos += 1;
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some(escaped) = self.current_char() else {
                continue;
            };
            self.pos += 1;
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                'u' => match self.scan_unicode_escape() {
                    Some(decoded) => value.push(decoded),
                    None => value.push('u'),
                },
                // Line continuation.
                '\n' => {}
                other => value.push(other),
            }
        }
        self.token_value = value;
        SyntaxKind::StringLiteral
    }

    /// `\uXXXX`, with the `\u` already consumed.
    fn scan_unicode_escape(&mut self) -> Option<char> {
        let digits: String = self.text.get(self.pos..self.pos + 4)?.iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok()?;
        let decoded = char::from_u32(code)?;
        self.pos += 4;
        Some(decoded)
    }
}

fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_identifier_start(ch: char) -> bool {
    ch == '$' || ch == '_' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

fn is_identifier_part(ch: char) -> bool {
    ch == '$' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}
