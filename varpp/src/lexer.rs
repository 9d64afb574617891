//! Tokenizer and directive scanner.
//!
//! Backslash-newline splices are skipped transparently by the cursor, so
//! they never show up in token text, while spans keep reporting physical
//! lines and byte offsets of the original text.

use crate::error::AnalysisError;
use crate::token::{Span, Token, TokenKind, is_identifier_continue, is_identifier_start};

const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "*=",
    "/=", "%=", "+=", "-=", "&=", "^=", "|=", "##",
];

/// Tokenize a whole translation unit, recognizing directives. A quote
/// left open at the end of its line becomes an [`TokenKind::Unterminated`]
/// token, since skipped groups may hold arbitrary text.
///
/// # Errors
/// Returns `AnalysisError::Lex` for unterminated block comments.
pub fn lex(source: &str) -> Result<Vec<Token>, AnalysisError> {
    Lexer::new(source, true).run()
}

/// Tokenize a standalone fragment (a pasted lexeme or a `-D` body)
///
/// # Errors
/// Returns `AnalysisError::Lex` for unterminated literals or block comments.
pub fn lex_fragment(text: &str) -> Result<Vec<Token>, AnalysisError> {
    Lexer::new(text, false).run()
}

/// The error deferred in an [`TokenKind::Unterminated`] token
pub(crate) fn unterminated_literal(token: &Token) -> AnalysisError {
    let what = if token.text.ends_with('"') {
        "unterminated string literal"
    } else {
        "unterminated character literal"
    };
    AnalysisError::lex(token.span, what)
}

/// Fails on the first unterminated literal among `tokens`
pub(crate) fn ensure_terminated(tokens: &[Token]) -> Result<(), AnalysisError> {
    match tokens.iter().find(|t| t.kind == TokenKind::Unterminated) {
        Some(t) => Err(unterminated_literal(t)),
        None => Ok(()),
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    directives: bool,
    at_line_start: bool,
    in_directive: bool,
    leading_space: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, directives: bool) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            directives,
            at_line_start: true,
            in_directive: false,
            leading_space: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, AnalysisError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Length of a line splice starting at byte `at`, if any
    fn splice_len(&self, at: usize) -> Option<usize> {
        let rest = &self.src.as_bytes()[at..];
        match rest {
            [b'\\', b'\n', ..] => Some(2),
            [b'\\', b'\r', b'\n', ..] => Some(3),
            _ => None,
        }
    }

    fn skip_splices(&mut self) {
        while let Some(len) = self.splice_len(self.pos) {
            self.pos += len;
            self.line += 1;
            self.column = 1;
        }
    }

    /// Character `n` positions ahead, looking through splices
    fn peek_at(&self, n: usize) -> Option<char> {
        let mut at = self.pos;
        let mut remaining = n;
        loop {
            while let Some(len) = self.splice_len(at) {
                at += len;
            }
            let c = self.src[at..].chars().next()?;
            if remaining == 0 {
                return Some(c);
            }
            remaining -= 1;
            at += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn bump(&mut self) -> Option<char> {
        self.skip_splices();
        let c = self.src[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&mut self) -> Span {
        self.skip_splices();
        Span::new(self.line, self.column, self.pos, self.pos)
    }

    fn finish(&self, kind: TokenKind, text: String, mut span: Span) -> Token {
        span.end = self.pos;
        Token::new(kind, text, span)
    }

    fn next_token(&mut self) -> Result<Option<Token>, AnalysisError> {
        loop {
            let start = self.here();
            let Some(c) = self.peek() else {
                if self.in_directive {
                    self.in_directive = false;
                    return Ok(Some(self.finish(TokenKind::DirectiveEnd, String::new(), start)));
                }
                return Ok(None);
            };

            match c {
                '\n' => {
                    self.bump();
                    self.leading_space = false;
                    self.at_line_start = true;
                    if self.in_directive {
                        self.in_directive = false;
                        let mut span = start;
                        span.end = start.start;
                        return Ok(Some(Token::new(TokenKind::DirectiveEnd, "", span)));
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                    self.leading_space = true;
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                    self.leading_space = true;
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.skip_block_comment(start)?;
                    self.leading_space = true;
                }
                '#' if self.directives && self.at_line_start && !self.in_directive => {
                    self.bump();
                    let token = self.directive_marker(start)?;
                    return Ok(Some(token));
                }
                _ => {
                    let leading_space = std::mem::take(&mut self.leading_space);
                    self.at_line_start = false;
                    let token = self.lex_token(c, start)?;
                    return Ok(Some(token.with_leading_space(leading_space)));
                }
            }
        }
    }

    fn skip_block_comment(&mut self, start: Span) -> Result<(), AnalysisError> {
        self.bump();
        self.bump();
        let mut prev = '\0';
        loop {
            let Some(c) = self.bump() else {
                return Err(AnalysisError::lex(start, "unterminated block comment"));
            };
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }
    }

    /// Called after the introducing `#`; reads the directive name if present
    fn directive_marker(&mut self, start: Span) -> Result<Token, AnalysisError> {
        self.in_directive = true;
        self.at_line_start = false;
        loop {
            match self.peek() {
                Some(c) if c != '\n' && c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let here = self.here();
                    self.skip_block_comment(here)?;
                }
                _ => break,
            }
        }
        let mut name = String::new();
        if self.peek().is_some_and(is_identifier_start) {
            while let Some(c) = self.peek().filter(|&c| is_identifier_continue(c)) {
                name.push(c);
                self.bump();
            }
        }
        self.leading_space = false;
        Ok(self.finish(TokenKind::Directive, name, start))
    }

    fn lex_token(&mut self, c: char, start: Span) -> Result<Token, AnalysisError> {
        if is_identifier_start(c) || c == '$' {
            let mut text = String::new();
            while let Some(c) = self.peek().filter(|&c| is_identifier_continue(c) || c == '$') {
                text.push(c);
                self.bump();
            }
            let is_prefix = matches!(text.as_str(), "L" | "u" | "U" | "u8");
            if is_prefix {
                if let Some(quote @ ('"' | '\'')) = self.peek() {
                    return self.lex_literal(text, quote, start);
                }
            }
            return Ok(self.finish(TokenKind::Identifier, text, start));
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return Ok(self.lex_number(start));
        }

        if c == '"' || c == '\'' {
            return self.lex_literal(String::new(), c, start);
        }

        for p in PUNCTUATORS {
            let matches = p
                .chars()
                .enumerate()
                .all(|(i, pc)| self.peek_at(i) == Some(pc));
            if matches {
                for _ in 0..p.chars().count() {
                    self.bump();
                }
                return Ok(self.finish(TokenKind::Punctuator, (*p).to_string(), start));
            }
        }

        self.bump();
        Ok(self.finish(TokenKind::Punctuator, c.to_string(), start))
    }

    fn lex_number(&mut self, start: Span) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && text
                    .chars()
                    .last()
                    .is_some_and(|p| matches!(p, 'e' | 'E' | 'p' | 'P'));
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        self.finish(TokenKind::Number, text, start)
    }

    fn lex_literal(
        &mut self,
        mut text: String,
        quote: char,
        start: Span,
    ) -> Result<Token, AnalysisError> {
        let what = if quote == '"' {
            "unterminated string literal"
        } else {
            "unterminated character literal"
        };
        text.push(quote);
        self.bump();
        let opening = text.clone();
        let resume = (self.pos, self.line, self.column);
        loop {
            match self.peek() {
                None | Some('\n') => return self.unterminated(opening, start, resume, what),
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    match self.peek() {
                        None | Some('\n') => return self.unterminated(opening, start, resume, what),
                        Some(c) => {
                            text.push(c);
                            self.bump();
                        }
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                    if c == quote {
                        break;
                    }
                }
            }
        }
        let kind = if quote == '"' {
            TokenKind::StringLiteral
        } else {
            TokenKind::CharLiteral
        };
        Ok(self.finish(kind, text, start))
    }

    /// Lexing resumes right after the opening quote
    fn unterminated(
        &mut self,
        opening: String,
        start: Span,
        resume: (usize, u32, u32),
        what: &str,
    ) -> Result<Token, AnalysisError> {
        if !self.directives {
            return Err(AnalysisError::lex(start, what));
        }
        (self.pos, self.line, self.column) = resume;
        Ok(self.finish(TokenKind::Unterminated, opening, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn punctuators_use_longest_match() {
        let tokens = lex("a <<= b ... c->d ## e").unwrap();
        assert_eq!(texts(&tokens), ["a", "<<=", "b", "...", "c", "->", "d", "##", "e"]);
    }

    #[test]
    fn directive_marker_and_end() {
        let tokens = lex("  #  define X 1\nint x;\n").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "define");
        assert_eq!(texts(&tokens[1..3]), ["X", "1"]);
        assert_eq!(tokens[3].kind, TokenKind::DirectiveEnd);
        assert_eq!(texts(&tokens[4..]), ["int", "x", ";"]);
    }

    #[test]
    fn hash_inside_line_is_punctuator() {
        let tokens = lex("a # b\n").unwrap();
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Directive));
    }

    #[test]
    fn splices_are_invisible_but_spans_stay_physical() {
        let src = "#define A \\\n  1\nfoo\\\nbar";
        let tokens = lex(src).unwrap();
        assert_eq!(texts(&tokens), ["define", "A", "1", "", "foobar"]);
        let one = &tokens[2];
        assert_eq!(one.span.line, 2);
        assert_eq!(&src[one.span.start..one.span.end], "1");
        assert_eq!(tokens[4].span.line, 3);
    }

    #[test]
    fn block_comment_does_not_end_directive() {
        let tokens = lex("#if A /* spans\n lines */ && B\nx\n").unwrap();
        assert_eq!(texts(&tokens), ["if", "A", "&&", "B", "", "x"]);
    }

    #[test]
    fn null_directive_has_empty_name() {
        let tokens = lex("#\nx").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "");
        assert_eq!(tokens[1].kind, TokenKind::DirectiveEnd);
    }

    #[test]
    fn literals_with_prefixes_and_escapes() {
        let tokens = lex(r#"L"a\"b" u8'c' 0x1fUL 1e+5 .5"#).unwrap();
        assert_eq!(texts(&tokens), [r#"L"a\"b""#, "u8'c'", "0x1fUL", "1e+5", ".5"]);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[2].kind, TokenKind::Number);
    }

    #[test]
    fn leading_space_is_tracked() {
        let tokens = lex("a/**/b c").unwrap();
        assert!(!tokens[0].leading_space);
        assert!(tokens[1].leading_space);
        assert!(tokens[2].leading_space);
    }

    #[test]
    fn unterminated_comment_is_a_lex_error() {
        assert!(matches!(lex("x /* never closed"), Err(AnalysisError::Lex { .. })));
        assert!(matches!(lex_fragment("\"abc"), Err(AnalysisError::Lex { .. })));
        assert!(matches!(lex_fragment("'a"), Err(AnalysisError::Lex { .. })));
    }

    #[test]
    fn open_quote_is_deferred_to_a_token() {
        let tokens = lex("this doesn't end\nx = \"abc\n").unwrap();
        assert_eq!(texts(&tokens), ["this", "doesn", "'", "t", "end", "x", "=", "\"", "abc"]);
        assert_eq!(tokens[2].kind, TokenKind::Unterminated);
        assert_eq!((tokens[2].span.line, tokens[2].span.column), (1, 11));
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
        assert_eq!(tokens[7].kind, TokenKind::Unterminated);

        let err = ensure_terminated(&tokens).unwrap_err();
        assert_eq!(err.to_string(), unterminated_literal(&tokens[2]).to_string());
        assert!(err.to_string().contains("character literal"));
        assert!(ensure_terminated(&tokens[3..7]).is_ok());
    }

    #[test]
    fn fragments_do_not_recognize_directives() {
        let tokens = lex_fragment("# define").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Punctuator);
    }
}
