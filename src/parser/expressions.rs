//! Expression parsing using Pratt precedence.

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::TokenKind;
use crate::span::Span;

use super::core::{ParseResult, Parser};
use super::precedence::{get_precedence, is_right_associative, Precedence};
use super::MAX_ARGUMENTS;

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.parse_precedence(Precedence::Assignment)
    }

    pub(crate) fn parse_precedence(&mut self, min_precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.is_at_end() {
            let precedence = get_precedence(&self.peek().kind);
            if precedence == Precedence::None || precedence < min_precedence {
                break;
            }

            left = self.parse_infix(left, precedence)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self.advance();
        let start_span = token.span;

        match &token.kind {
            TokenKind::IntLiteral(n) => Ok(literal(Literal::Integer(*n), start_span)),
            TokenKind::DoubleLiteral(n) => Ok(literal(Literal::Double(*n), start_span)),
            TokenKind::StringLiteral(s) => Ok(literal(Literal::String(s.clone()), start_span)),
            TokenKind::True => Ok(literal(Literal::Boolean(true), start_span)),
            TokenKind::False => Ok(literal(Literal::Boolean(false), start_span)),
            TokenKind::Null => Ok(literal(Literal::Null, start_span)),

            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Identifier(name.clone()), start_span))
            }

            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::Minus => self.unary_expr(UnaryOp::Negate, start_span),
            TokenKind::Bang => self.unary_expr(UnaryOp::Not, start_span),

            TokenKind::If => self.if_expr(start_span),

            TokenKind::Eof => Err(ParserError::unexpected_token(
                "expression",
                "end",
                token.span,
            )),

            _ => Err(ParserError::general(
                "unknown token",
                token.lexeme.clone(),
                token.span,
            )),
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> ParseResult<Expr> {
        let token = self.advance();
        let start_span = left.span;

        // Right-associative operators recurse at their own level.
        let operand_precedence = if is_right_associative(&token.kind) {
            precedence
        } else {
            precedence.next()
        };

        match &token.kind {
            TokenKind::Plus => self.binary_expr(left, BinaryOp::Add, operand_precedence),
            TokenKind::Minus => self.binary_expr(left, BinaryOp::Subtract, operand_precedence),
            TokenKind::Star => self.binary_expr(left, BinaryOp::Multiply, operand_precedence),
            TokenKind::Slash => self.binary_expr(left, BinaryOp::Divide, operand_precedence),
            TokenKind::Percent => self.binary_expr(left, BinaryOp::Modulo, operand_precedence),
            TokenKind::StarStar => self.binary_expr(left, BinaryOp::Power, operand_precedence),
            TokenKind::EqualEqual => self.binary_expr(left, BinaryOp::Equal, operand_precedence),
            TokenKind::BangEqual => {
                self.binary_expr(left, BinaryOp::NotEqual, operand_precedence)
            }
            TokenKind::Less => self.binary_expr(left, BinaryOp::Less, operand_precedence),
            TokenKind::LessEqual => {
                self.binary_expr(left, BinaryOp::LessEqual, operand_precedence)
            }
            TokenKind::Greater => self.binary_expr(left, BinaryOp::Greater, operand_precedence),
            TokenKind::GreaterEqual => {
                self.binary_expr(left, BinaryOp::GreaterEqual, operand_precedence)
            }

            TokenKind::And => self.logic_expr(left, LogicOp::And, operand_precedence),
            TokenKind::Or => self.logic_expr(left, LogicOp::Or, operand_precedence),

            // Assignment; `obj.name = value` becomes a property set
            TokenKind::Equal => {
                let value = self.parse_precedence(operand_precedence)?;
                let span = start_span.merge(&value.span);

                match left.kind {
                    ExprKind::Get { object, name } => Ok(Expr::new(
                        ExprKind::Set {
                            object,
                            name,
                            value: Box::new(value),
                        },
                        span,
                    )),
                    kind => Ok(Expr::new(
                        ExprKind::Assign {
                            target: Box::new(Expr::new(kind, left.span)),
                            value: Box::new(value),
                        },
                        span,
                    )),
                }
            }

            TokenKind::LeftParen => {
                let name = match left.kind {
                    ExprKind::Identifier(name) => name,
                    _ => {
                        return Err(ParserError::general(
                            "only named functions can be called",
                            token.lexeme.clone(),
                            token.span,
                        ))
                    }
                };
                let arguments = self.parse_arguments()?;
                self.expect(&TokenKind::RightParen)?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(ExprKind::Call { name, arguments }, span))
            }

            TokenKind::Dot => {
                let name = self.expect_identifier()?;
                let span = start_span.merge(&self.previous_span());
                Ok(Expr::new(
                    ExprKind::Get {
                        object: Box::new(left),
                        name,
                    },
                    span,
                ))
            }

            _ => Err(ParserError::general(
                "unknown token",
                token.lexeme.clone(),
                token.span,
            )),
        }
    }

    fn binary_expr(
        &mut self,
        left: Expr,
        operator: BinaryOp,
        operand_precedence: Precedence,
    ) -> ParseResult<Expr> {
        let right = self.parse_precedence(operand_precedence)?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn logic_expr(
        &mut self,
        left: Expr,
        operator: LogicOp,
        operand_precedence: Precedence,
    ) -> ParseResult<Expr> {
        let right = self.parse_precedence(operand_precedence)?;
        let span = left.span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Logic {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        ))
    }

    fn unary_expr(&mut self, operator: UnaryOp, start_span: Span) -> ParseResult<Expr> {
        let operand = self.parse_precedence(Precedence::Unary)?;
        let span = start_span.merge(&operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `if(condition, then[, else])`
    fn if_expr(&mut self, start_span: Span) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(&TokenKind::Comma)?;
        let then_branch = self.expression()?;
        let else_branch = if self.match_token(&TokenKind::Comma) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.expect(&TokenKind::RightParen)?;

        let span = start_span.merge(&self.previous_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            span,
        ))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut arguments = Vec::new();
        if self.check(&TokenKind::RightParen) {
            return Ok(arguments);
        }

        loop {
            if arguments.len() >= MAX_ARGUMENTS {
                let token = self.peek();
                return Err(ParserError::too_many_arguments(
                    token.lexeme.clone(),
                    token.span,
                ));
            }
            arguments.push(self.expression()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(arguments)
    }
}

fn literal(value: Literal, span: Span) -> Expr {
    Expr::new(ExprKind::Literal(value), span)
}
