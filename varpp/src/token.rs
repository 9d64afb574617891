use std::fmt;

use serde::Serialize;

/// Check if a character can start an identifier (letter or underscore)
pub const fn is_identifier_start(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || c == '_'
}

/// Check if a character can continue an identifier (letter, digit, or underscore)
pub const fn is_identifier_continue(c: char) -> bool {
    (c >= 'a' && c <= 'z') || (c >= 'A' && c <= 'Z') || (c >= '0' && c <= '9') || c == '_'
}

/// Location of a token in the original source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    /// 1-based physical line of the first character
    pub line: u32,
    /// 1-based column of the first character
    pub column: u32,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
}

impl Span {
    /// Create a span
    #[must_use]
    pub const fn new(line: u32, column: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            column,
            start,
            end,
        }
    }

    /// Smallest span covering both `self` and `other`
    #[must_use]
    pub fn to(self, other: Span) -> Span {
        if other.start < self.start {
            return other.to(self);
        }
        Span {
            line: self.line,
            column: self.column,
            start: self.start,
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Classification of a preprocessing token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Identifier or keyword
    Identifier,
    /// Preprocessing number
    Number,
    /// String literal, prefix included
    StringLiteral,
    /// Character literal, prefix included
    CharLiteral,
    /// Operator or other punctuation
    Punctuator,
    /// A quote with no closing quote on its line. Only an error in code that
    /// is compiled under some configuration.
    Unterminated,
    /// `#name` at the start of a logical line; the text is the directive name
    Directive,
    /// End of the logical line that carried a directive
    DirectiveEnd,
}

/// A preprocessing token
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Classification
    pub kind: TokenKind,
    /// Spelling, with line splices removed
    pub text: String,
    /// Source location
    pub span: Span,
    /// Whitespace or a comment precedes the token on its logical line
    #[serde(skip)]
    pub leading_space: bool,
    /// Produced inside the expansion of a macro with the same name; never expanded again
    #[serde(skip)]
    pub painted: bool,
}

impl Token {
    /// Token without leading space or paint
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
            leading_space: false,
            painted: false,
        }
    }

    /// Builder for [`Token::leading_space`]
    #[must_use]
    pub fn with_leading_space(mut self, leading_space: bool) -> Self {
        self.leading_space = leading_space;
        self
    }

    /// Whether the token is an identifier
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// True for the punctuator `p`
    #[must_use]
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.text == p
    }

    /// True for directive markers and directive terminators
    #[must_use]
    pub fn is_directive_marker(&self) -> bool {
        matches!(self.kind, TokenKind::Directive | TokenKind::DirectiveEnd)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Join tokens back into text, inserting a space wherever the source had whitespace
pub fn spell(tokens: &[Token]) -> String {
    let total_len: usize = tokens.iter().map(|t| t.text.len() + 1).sum();
    let mut out = String::with_capacity(total_len);
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 && t.leading_space {
            out.push(' ');
        }
        out.push_str(&t.text);
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ExprToken {
    Number(i64),
    Identifier(String),
    LParen,
    RParen,
    Not,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,
    Question,
    Colon,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spell_respects_leading_space() {
        let toks = vec![
            Token::new(TokenKind::Identifier, "a", Span::default()),
            Token::new(TokenKind::Punctuator, "=", Span::default()).with_leading_space(true),
            Token::new(TokenKind::Number, "3", Span::default()).with_leading_space(true),
            Token::new(TokenKind::Punctuator, ";", Span::default()),
        ];
        assert_eq!(spell(&toks), "a = 3;");
    }

    #[test]
    fn span_union_is_order_independent() {
        let a = Span::new(1, 1, 0, 3);
        let b = Span::new(2, 5, 10, 12);
        assert_eq!(a.to(b), Span::new(1, 1, 0, 12));
        assert_eq!(b.to(a), Span::new(1, 1, 0, 12));
    }
}
