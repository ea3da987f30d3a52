//! The scanner that produces tokens from source text.

use super::token::lookup_reserved;
use super::{Span, Token, TokenKind};
use crate::error::{Error, Result};

/// A saved scanner position, used to rewind for the second compiler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerPoint {
    /// Byte offset into the source
    pub offset: usize,
    /// Line number at `offset`
    pub line: u32,
}

/// A scanner that tokenizes ES5 source code on demand.
///
/// The caller decides per token whether a leading `/` starts a regular
/// expression literal, and whether strict mode reserved words apply.
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
        }
    }

    /// Returns the current position.
    pub fn checkpoint(&self) -> LexerPoint {
        LexerPoint {
            offset: self.pos,
            line: self.line,
        }
    }

    /// Restores a position previously returned by [`Scanner::checkpoint`].
    pub fn rewind(&mut self, point: LexerPoint) {
        self.pos = point.offset;
        self.line = point.line;
    }

    /// Returns the next token from the source.
    ///
    /// After the input is exhausted this keeps returning `Eof`.
    pub fn next_token(&mut self, strict: bool, regexp_mode: bool) -> Result<Token> {
        let lineterm = self.skip_whitespace_and_comments()?;

        let start = self.pos;
        let line = self.line;
        let mut num_escapes = 0;

        let kind = match self.advance() {
            None => TokenKind::Eof,
            Some(ch) => match ch {
                // Single-character tokens
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '[' => TokenKind::LeftBracket,
                ']' => TokenKind::RightBracket,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                '~' => TokenKind::Tilde,
                '?' => TokenKind::Question,

                // Multi-character tokens
                '.' if matches!(self.peek(), Some(c) if c.is_ascii_digit()) => {
                    self.scan_number('.', strict)?
                }
                '.' => TokenKind::Dot,
                '+' => self.scan_plus(),
                '-' => self.scan_minus(),
                '*' => self.with_assign(TokenKind::Star, TokenKind::StarEqual),
                '%' => self.with_assign(TokenKind::Percent, TokenKind::PercentEqual),
                '^' => self.with_assign(TokenKind::Caret, TokenKind::CaretEqual),
                '/' if regexp_mode => self.scan_regexp()?,
                '/' => self.with_assign(TokenKind::Slash, TokenKind::SlashEqual),
                '<' => self.scan_less_than(),
                '>' => self.scan_greater_than(),
                '=' => self.scan_equal(),
                '!' => self.scan_bang(),
                '&' => self.scan_ampersand(),
                '|' => self.scan_pipe(),

                // String literals
                '"' | '\'' => self.scan_string(ch, strict, &mut num_escapes)?,

                // Numbers
                '0'..='9' => self.scan_number(ch, strict)?,

                // Identifiers and reserved words
                '\\' => self.scan_identifier(None, strict, &mut num_escapes)?,
                _ if is_id_start(ch) => self.scan_identifier(Some(ch), strict, &mut num_escapes)?,

                _ => return Err(self.error(format!("invalid token character {:?}", ch))),
            },
        };

        let allow_auto_semi = lineterm || matches!(kind, TokenKind::RightBrace | TokenKind::Eof);

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
            line,
            lineterm,
            allow_auto_semi,
            num_escapes,
        })
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, self.line)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a line terminator whose first char was already read.
    fn finish_line_terminator(&mut self, ch: char) {
        if ch == '\r' {
            self.eat('\n');
        }
        self.line += 1;
    }

    /// Skips whitespace and comments, returning true if a line terminator was
    /// crossed (a multi-line comment containing one counts as well).
    fn skip_whitespace_and_comments(&mut self) -> Result<bool> {
        let mut lineterm = false;
        loop {
            match self.peek() {
                Some(ch) if is_line_terminator(ch) => {
                    self.advance();
                    self.finish_line_terminator(ch);
                    lineterm = true;
                }
                Some(ch) if is_whitespace(ch) => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        self.advance();
                        self.advance();
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        loop {
                            match self.advance() {
                                None => {
                                    return Err(self.error("eof while parsing multiline comment"));
                                }
                                Some('*') if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some(ch) if is_line_terminator(ch) => {
                                    self.finish_line_terminator(ch);
                                    lineterm = true;
                                }
                                Some(_) => {}
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        Ok(lineterm)
    }

    fn with_assign(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        if self.eat('=') { assign } else { plain }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.eat('+') {
            TokenKind::PlusPlus
        } else {
            self.with_assign(TokenKind::Plus, TokenKind::PlusEqual)
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.eat('-') {
            TokenKind::MinusMinus
        } else {
            self.with_assign(TokenKind::Minus, TokenKind::MinusEqual)
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.eat('<') {
            self.with_assign(TokenKind::LeftShift, TokenKind::LeftShiftEqual)
        } else {
            self.with_assign(TokenKind::LessThan, TokenKind::LessThanEqual)
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.eat('>') {
            if self.eat('>') {
                self.with_assign(
                    TokenKind::UnsignedRightShift,
                    TokenKind::UnsignedRightShiftEqual,
                )
            } else {
                self.with_assign(TokenKind::RightShift, TokenKind::RightShiftEqual)
            }
        } else {
            self.with_assign(TokenKind::GreaterThan, TokenKind::GreaterThanEqual)
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.eat('=') {
            self.with_assign(TokenKind::EqualEqual, TokenKind::StrictEqual)
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.eat('=') {
            self.with_assign(TokenKind::NotEqual, TokenKind::StrictNotEqual)
        } else {
            TokenKind::Bang
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        if self.eat('&') {
            TokenKind::AmpersandAmpersand
        } else {
            self.with_assign(TokenKind::Ampersand, TokenKind::AmpersandEqual)
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        if self.eat('|') {
            TokenKind::PipePipe
        } else {
            self.with_assign(TokenKind::Pipe, TokenKind::PipeEqual)
        }
    }

    fn scan_hex_digits(&mut self, count: usize) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self
                .advance()
                .and_then(|ch| ch.to_digit(16))
                .ok_or_else(|| self.error("invalid escape sequence"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn scan_string(&mut self, quote: char, strict: bool, num_escapes: &mut u32) -> Result<TokenKind> {
        let mut units: Vec<u16> = Vec::new();

        loop {
            let ch = match self.advance() {
                None => return Err(self.error("unterminated string literal")),
                Some(ch) if is_line_terminator(ch) => {
                    return Err(self.error("unterminated string literal"));
                }
                Some(ch) => ch,
            };

            if ch == quote {
                break;
            }
            if ch != '\\' {
                let mut buf = [0u16; 2];
                units.extend_from_slice(ch.encode_utf16(&mut buf));
                continue;
            }

            *num_escapes += 1;
            let escaped = self
                .advance()
                .ok_or_else(|| self.error("unterminated string literal"))?;
            match escaped {
                c if is_line_terminator(c) => {
                    // Line continuation contributes nothing.
                    self.finish_line_terminator(c);
                }
                'b' => units.push(0x08),
                'f' => units.push(0x0c),
                'n' => units.push(0x0a),
                'r' => units.push(0x0d),
                't' => units.push(0x09),
                'v' => units.push(0x0b),
                '0' if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) => units.push(0),
                '0'..='7' => {
                    if strict {
                        return Err(self.error("octal escape not allowed in strict mode"));
                    }
                    let mut value = escaped as u32 - '0' as u32;
                    let max_digits = if value <= 3 { 2 } else { 1 };
                    for _ in 0..max_digits {
                        match self.peek().and_then(|c| c.to_digit(8)) {
                            Some(d) => {
                                self.advance();
                                value = value * 8 + d;
                            }
                            None => break,
                        }
                    }
                    units.push(value as u16);
                }
                'x' => {
                    let value = self.scan_hex_digits(2)?;
                    units.push(value as u16);
                }
                'u' => {
                    let value = self.scan_hex_digits(4)?;
                    units.push(value as u16);
                }
                other => {
                    let mut buf = [0u16; 2];
                    units.extend_from_slice(other.encode_utf16(&mut buf));
                }
            }
        }

        Ok(TokenKind::String(String::from_utf16_lossy(&units)))
    }

    fn scan_number(&mut self, first: char, strict: bool) -> Result<TokenKind> {
        let start = self.pos - first.len_utf8();

        let value = if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut value = 0f64;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                self.advance();
                value = value * 16.0 + d as f64;
                digits += 1;
            }
            if digits == 0 {
                return Err(self.error("invalid numeric literal"));
            }
            value
        } else if first == '0' && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
            let text = &self.source[start..self.pos];
            if text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                if strict {
                    return Err(self.error("octal literal not allowed in strict mode"));
                }
                text.bytes()
                    .fold(0f64, |acc, b| acc * 8.0 + (b - b'0') as f64)
            } else {
                text.parse::<f64>()
                    .map_err(|_| self.error("invalid numeric literal"))?
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
            if first != '.' && self.eat('.') {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    return Err(self.error("invalid numeric literal"));
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
            self.source[start..self.pos]
                .parse::<f64>()
                .map_err(|_| self.error("invalid numeric literal"))?
        };

        // A literal may not run straight into an identifier or digit.
        if matches!(self.peek(), Some(c) if is_id_start(c) || c.is_ascii_digit() || c == '\\') {
            return Err(self.error("invalid numeric literal"));
        }

        Ok(TokenKind::Number(value))
    }

    fn scan_identifier(
        &mut self,
        first: Option<char>,
        strict: bool,
        num_escapes: &mut u32,
    ) -> Result<TokenKind> {
        let mut name = String::new();
        let mut is_first = true;

        if let Some(ch) = first {
            name.push(ch);
            is_first = false;
        } else {
            // The backslash has been consumed already.
            self.pos -= 1;
        }

        loop {
            match self.peek() {
                Some('\\') => {
                    self.advance();
                    if !self.eat('u') {
                        return Err(self.error("invalid unicode escape while parsing identifier"));
                    }
                    let code = self.scan_hex_digits(4)?;
                    let ch = char::from_u32(code)
                        .filter(|c| if is_first { is_id_start(*c) } else { is_id_continue(*c) })
                        .ok_or_else(|| {
                            self.error("invalid unicode escaped character while parsing identifier")
                        })?;
                    name.push(ch);
                    *num_escapes += 1;
                }
                Some(ch) if is_id_continue(ch) => {
                    self.advance();
                    name.push(ch);
                }
                _ => break,
            }
            is_first = false;
        }

        // An escape anywhere disables reserved word recognition.
        if *num_escapes == 0 {
            if let Some(kind) = lookup_reserved(&name, strict) {
                return Ok(kind);
            }
        }
        Ok(TokenKind::Identifier(name))
    }

    fn scan_regexp(&mut self) -> Result<TokenKind> {
        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            let ch = match self.advance() {
                Some(ch) if !is_line_terminator(ch) => ch,
                _ => return Err(self.error("unterminated regexp literal")),
            };
            match ch {
                '/' if !in_class => break,
                '\\' => {
                    pattern.push(ch);
                    match self.advance() {
                        Some(next) if !is_line_terminator(next) => pattern.push(next),
                        _ => return Err(self.error("unterminated regexp literal")),
                    }
                    continue;
                }
                '[' => in_class = true,
                ']' => in_class = false,
                _ => {}
            }
            pattern.push(ch);
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.advance();
            flags.push(ch);
        }

        Ok(TokenKind::RegExp { pattern, flags })
    }
}

/// Tokenizes a whole source string the way the compiler would see it in
/// non-strict code: a `/` is a regexp literal unless the previous token ends
/// an operand.
pub fn tokenize(source: &str, strict: bool) -> Result<Vec<Token>> {
    let mut scanner = Scanner::new(source);
    let mut tokens: Vec<Token> = Vec::new();
    loop {
        let regexp_mode = tokens.last().is_none_or(|prev| !prev.kind.rejects_regexp());
        let token = scanner.next_token(strict, regexp_mode)?;
        if token.kind == TokenKind::Eof {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

/// Checks if a character is an ES5 line terminator.
pub(crate) fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, '\t' | '\u{0B}' | '\u{0C}' | ' ' | '\u{A0}' | '\u{FEFF}')
        || (ch.is_whitespace() && !is_line_terminator(ch))
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_'
        || ch == '$'
        || ch == '\u{200C}'
        || ch == '\u{200D}'
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, false)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("{ } ( ) ;"),
            vec![
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("a >>>= b !== c <<= d"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::UnsignedRightShiftEqual,
                TokenKind::Identifier("b".into()),
                TokenKind::StrictNotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::LeftShiftEqual,
                TokenKind::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.14 0xff .5 1e3 017"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Number(3.14),
                TokenKind::Number(255.0),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(15.0),
            ]
        );
    }

    #[test]
    fn test_octal_rejected_in_strict_mode() {
        let mut scanner = Scanner::new("017");
        let err = scanner.next_token(true, true).unwrap_err();
        assert!(err.is_syntax_error());
    }

    #[test]
    fn test_number_followed_by_identifier_is_error() {
        assert!(tokenize("3in x", false).is_err());
    }

    #[test]
    fn test_strings_and_escapes() {
        let tokens = tokenize(r#""a\nb" 'it\'s' "\x41B" "use strict""#, false).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String("a\nb".into()));
        assert_eq!(tokens[1].kind, TokenKind::String("it's".into()));
        assert_eq!(tokens[2].kind, TokenKind::String("AB".into()));
        assert_eq!(tokens[3].kind, TokenKind::String("use strict".into()));
        assert_eq!(tokens[3].num_escapes, 0);
        assert_eq!(tokens[0].num_escapes, 1);
        assert_eq!(tokens[1].num_escapes, 1);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("'abc", false).unwrap_err();
        assert_eq!(err.message(), "unterminated string literal");
    }

    #[test]
    fn test_line_continuation_counts_lines() {
        let tokens = tokenize("'a\\\nb' x", false).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String("ab".into()));
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_keywords_and_strict_reserved() {
        assert_eq!(
            kinds("function var let"),
            vec![
                TokenKind::Function,
                TokenKind::Var,
                TokenKind::Identifier("let".into()),
            ]
        );
        let tokens = tokenize("let", true).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Let);
    }

    #[test]
    fn test_escaped_keyword_is_identifier() {
        let tokens = tokenize("\\u0069f", false).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("if".into()));
        assert_eq!(tokens[0].num_escapes, 1);
    }

    #[test]
    fn test_lineterm_and_auto_semi_flags() {
        let tokens = tokenize("a\nb /* x\n */ c }", false).unwrap();
        assert!(!tokens[0].lineterm);
        assert!(tokens[1].lineterm);
        assert_eq!(tokens[1].line, 2);
        assert!(tokens[2].lineterm);
        assert_eq!(tokens[2].line, 3);
        assert!(tokens[3].allow_auto_semi);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n2 /* two */ 3"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.0),
                TokenKind::Number(3.0),
            ]
        );
    }

    #[test]
    fn test_regexp_vs_division() {
        assert_eq!(
            kinds("x = /a[/]b/gi; y = 6 / 2"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Equal,
                TokenKind::RegExp {
                    pattern: "a[/]b".into(),
                    flags: "gi".into()
                },
                TokenKind::Semicolon,
                TokenKind::Identifier("y".into()),
                TokenKind::Equal,
                TokenKind::Number(6.0),
                TokenKind::Slash,
                TokenKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_checkpoint_and_rewind() {
        let mut scanner = Scanner::new("a\nb c");
        scanner.next_token(false, true).unwrap();
        let point = scanner.checkpoint();
        let b = scanner.next_token(false, false).unwrap();
        scanner.next_token(false, false).unwrap();
        scanner.rewind(point);
        let again = scanner.next_token(false, false).unwrap();
        assert_eq!(b, again);
        assert_eq!(again.line, 2);
    }

    #[test]
    fn test_eof_repeats() {
        let mut scanner = Scanner::new("");
        assert_eq!(scanner.next_token(false, true).unwrap().kind, TokenKind::Eof);
        assert_eq!(scanner.next_token(false, true).unwrap().kind, TokenKind::Eof);
    }
}
