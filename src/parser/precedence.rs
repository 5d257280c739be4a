//! Operator precedence for Pratt parsing.

use crate::lexer::TokenKind;

/// Operator precedence levels (higher = tighter binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Assignment = 1, // =
    Or = 2,         // ||
    And = 3,        // &&
    Equality = 4,   // == !=
    Comparison = 5, // < > <= >=
    Term = 6,       // + -
    Modulo = 7,     // %
    Factor = 8,     // * /
    Power = 9,      // **
    Unary = 10,     // ! -
    Call = 11,      // . ()
    Primary = 12,
}

impl Precedence {
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Modulo,
            Precedence::Modulo => Precedence::Factor,
            Precedence::Factor => Precedence::Power,
            Precedence::Power => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

pub fn get_precedence(kind: &TokenKind) -> Precedence {
    match kind {
        TokenKind::Equal => Precedence::Assignment,
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equality,
        TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
            Precedence::Comparison
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Percent => Precedence::Modulo,
        TokenKind::Star | TokenKind::Slash => Precedence::Factor,
        TokenKind::StarStar => Precedence::Power,
        TokenKind::LeftParen | TokenKind::Dot => Precedence::Call,
        _ => Precedence::None,
    }
}

/// Right-associative operators recurse at their own level instead of the next one.
pub fn is_right_associative(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Equal | TokenKind::StarStar)
}
