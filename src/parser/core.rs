//! Core parser struct and helper methods.

use crate::ast::Expr;
use crate::error::ParserError;
use crate::lexer::{Scanner, Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for a single formula.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) current: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map_or(Span::default(), |t| t.span);
            tokens.push(Token::eof(end.end, end.line.max(1), end.column));
        }
        Self { tokens, current: 0 }
    }

    /// Scan and parse one formula.
    pub fn parse_source(source: &str) -> ParseResult<Expr> {
        let tokens = Scanner::new(source).scan_tokens()?;
        Parser::new(tokens).parse()
    }

    /// Parse a complete formula. Every token up to `Eof` must be consumed.
    pub fn parse(&mut self) -> ParseResult<Expr> {
        let expr = self.expression()?;

        if !self.is_at_end() {
            let token = self.peek();
            return Err(ParserError::general(
                "unknown token",
                token.lexeme.clone(),
                token.span,
            ));
        }

        Ok(expr)
    }

    // ===== Token manipulation =====

    pub(crate) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
            self.tokens[self.current - 1].clone()
        } else {
            self.peek().clone()
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParserError::unexpected_token(
                format!("'{}'", kind),
                self.peek().lexeme.clone(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParserError::unexpected_token(
                "property name",
                self.peek().lexeme.clone(),
                self.current_span(),
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn previous_span(&self) -> Span {
        self.previous().span
    }
}
