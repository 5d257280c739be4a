//! Scanner turning formula source into tokens.

use crate::error::LexerError;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
///
/// Each scanner owns its position state, so scanning one formula never
/// affects another.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source. The last token is always `Eof`.
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        match c {
            '(' => Ok(self.make_token(TokenKind::LeftParen)),
            ')' => Ok(self.make_token(TokenKind::RightParen)),
            '{' => Ok(self.make_token(TokenKind::LeftBrace)),
            '}' => Ok(self.make_token(TokenKind::RightBrace)),
            ',' => Ok(self.make_token(TokenKind::Comma)),
            '.' => Ok(self.make_token(TokenKind::Dot)),
            ';' => Ok(self.make_token(TokenKind::Semicolon)),
            '-' => Ok(self.make_token(TokenKind::Minus)),
            '+' => Ok(self.make_token(TokenKind::Plus)),
            '/' => Ok(self.make_token(TokenKind::Slash)),
            '%' => Ok(self.make_token(TokenKind::Percent)),

            '*' => {
                if self.match_char('*') {
                    Ok(self.make_token(TokenKind::StarStar))
                } else {
                    Ok(self.make_token(TokenKind::Star))
                }
            }
            '=' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::EqualEqual))
                } else {
                    Ok(self.make_token(TokenKind::Equal))
                }
            }
            '!' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::BangEqual))
                } else {
                    Ok(self.make_token(TokenKind::Bang))
                }
            }
            '<' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::LessEqual))
                } else {
                    Ok(self.make_token(TokenKind::Less))
                }
            }
            '>' => {
                if self.match_char('=') {
                    Ok(self.make_token(TokenKind::GreaterEqual))
                } else {
                    Ok(self.make_token(TokenKind::Greater))
                }
            }
            '&' => {
                if self.match_char('&') {
                    Ok(self.make_token(TokenKind::And))
                } else {
                    Err(LexerError::unexpected_char(c, self.current_span()))
                }
            }
            '|' => {
                if self.match_char('|') {
                    Ok(self.make_token(TokenKind::Or))
                } else {
                    Err(LexerError::unexpected_char(c, self.current_span()))
                }
            }

            '"' => self.scan_string(),

            c if c.is_ascii_digit() => self.scan_number(),

            c if is_identifier_start(c) => Ok(self.scan_identifier()),

            _ => Err(LexerError::unexpected_char(c, self.current_span())),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Double-quoted string. Contents are taken verbatim: no escapes, newlines allowed.
    fn scan_string(&mut self) -> Result<Token, LexerError> {
        loop {
            match self.advance() {
                None => return Err(LexerError::unterminated_string(self.current_span())),
                Some((_, '"')) => break,
                Some((_, '\n')) => {
                    self.line += 1;
                    self.column = 1;
                }
                Some(_) => {}
            }
        }

        let value = &self.source[self.start_pos + 1..self.current_pos - 1];
        Ok(self.make_token(TokenKind::StringLiteral(value.to_string())))
    }

    fn scan_number(&mut self) -> Result<Token, LexerError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_double = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.source[self.start_pos..self.current_pos];
        let kind = if is_double {
            text.parse::<f64>().map(TokenKind::DoubleLiteral).ok()
        } else {
            text.parse::<i32>().map(TokenKind::IntLiteral).ok()
        };

        match kind {
            Some(kind) => Ok(self.make_token(kind)),
            None => Err(LexerError::invalid_number(text, self.current_span())),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(is_identifier_part) {
            self.advance();
        }

        let text = &self.source[self.start_pos..self.current_pos];
        let kind =
            TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()));
        self.make_token(kind)
    }

    // ===== Character helpers =====

    fn advance(&mut self) -> Option<(usize, char)> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
            Some((pos, c))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let lexeme = &self.source[self.start_pos..self.current_pos];
        Token::new(kind, lexeme, self.current_span())
    }
}

/// CJK Unified Ideographs and Extension A, so formulas can name variables in Chinese.
fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || is_cjk(c)
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}
