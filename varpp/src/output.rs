use std::fmt::Write as _;
use std::ops::Range;

use serde::Serialize;

use crate::condition::PresenceCondition;
use crate::conditional::BranchRecord;
use crate::error::Diagnostic;
use crate::expand::Variant;
use crate::token::{Span, Token, spell};

/// What a record carries: one token, or the alternatives of an
/// invocation whose expansion depends on the configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordContent {
    /// A token compiled under the record's condition
    Token {
        /// The token
        token: Token,
    },
    /// An invocation expanding differently across configurations
    Variants {
        /// Alternatives with pairwise disjoint conditions
        variants: Vec<Variant>,
    },
}

/// One emitted piece of code with its presence condition
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Source location; the whole invocation for expanded tokens
    pub span: Span,
    /// Index into [`Artifact::statements`]
    pub statement: usize,
    /// Configurations under which the record is compiled
    pub condition: PresenceCondition,
    /// Token or alternatives
    pub content: RecordContent,
}

impl Record {
    /// Text of the record; alternatives are listed with their conditions
    #[must_use]
    pub fn text(&self) -> String {
        match &self.content {
            RecordContent::Token { token } => token.text.clone(),
            RecordContent::Variants { variants } => {
                let alternatives: Vec<String> = variants
                    .iter()
                    .map(|v| format!("{}: {}", v.condition, spell(&v.tokens)))
                    .collect();
                format!("<<{}>>", alternatives.join(" | "))
            }
        }
    }

    fn leading_space(&self) -> bool {
        match &self.content {
            RecordContent::Token { token } => token.leading_space,
            RecordContent::Variants { variants } => variants
                .first()
                .and_then(|v| v.tokens.first())
                .is_some_and(|t| t.leading_space),
        }
    }
}

/// Tokens up to and including a `;`, `{` or `}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// From the first to the last record
    pub span: Span,
    /// Disjunction of the conditions of its records
    pub condition: PresenceCondition,
    /// Indices into [`Artifact::records`]
    pub records: Range<usize>,
}

/// Consecutive source lines sharing one presence condition
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Condition shared by every record of the block
    pub condition: PresenceCondition,
    /// First source line
    pub first_line: u32,
    /// Last source line
    pub last_line: u32,
    /// Spelled tokens, one output line per source line
    pub text: String,
}

/// Everything computed for one translation unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Name the unit was analyzed under
    pub file: String,
    /// Emitted code in source order
    pub records: Vec<Record>,
    /// Statement segmentation of `records`
    pub statements: Vec<Statement>,
    /// Every conditional branch in directive order
    pub branches: Vec<BranchRecord>,
    /// Recovered errors and warnings
    pub diagnostics: Vec<Diagnostic>,
}

impl Artifact {
    /// Group consecutive records with equal conditions into line blocks
    #[must_use]
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        let mut last_line = 0;
        for record in &self.records {
            let line = record.span.line;
            let same = blocks
                .last()
                .is_some_and(|b| b.condition == record.condition);
            if !same {
                blocks.push(Block {
                    condition: record.condition.clone(),
                    first_line: line,
                    last_line: line,
                    text: String::new(),
                });
            } else if line != last_line {
                if let Some(b) = blocks.last_mut() {
                    b.text.push('\n');
                }
            }
            if let Some(b) = blocks.last_mut() {
                if !b.text.is_empty() && !b.text.ends_with('\n') && record.leading_space() {
                    b.text.push(' ');
                }
                b.text.push_str(&record.text());
                b.last_line = b.last_line.max(line);
            }
            last_line = line;
        }
        blocks
    }

    /// Render the unit as text annotated with presence conditions
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in self.blocks() {
            let _ = writeln!(out, "//@ {}", block.condition);
            out.push_str(&block.text);
            out.push('\n');
        }
        out
    }

    /// Records of the statement with index `index`
    #[must_use]
    pub fn statement_records(&self, index: usize) -> &[Record] {
        self.statements
            .get(index)
            .map_or(&[], |s| &self.records[s.records.clone()])
    }
}

/// Builds records and statements in source order
#[derive(Debug, Default)]
pub(crate) struct Assembler {
    records: Vec<Record>,
    statements: Vec<Statement>,
    open_from: usize,
}

impl Assembler {
    pub(crate) fn push_token(&mut self, token: Token, condition: PresenceCondition) {
        let terminates = token.is_punct(";") || token.is_punct("{") || token.is_punct("}");
        self.records.push(Record {
            span: token.span,
            statement: self.statements.len(),
            condition,
            content: RecordContent::Token { token },
        });
        if terminates {
            self.close_statement();
        }
    }

    pub(crate) fn push_variants(&mut self, span: Span, variants: Vec<Variant>) {
        let condition = PresenceCondition::any(variants.iter().map(|v| &v.condition));
        self.records.push(Record {
            span,
            statement: self.statements.len(),
            condition,
            content: RecordContent::Variants { variants },
        });
    }

    fn close_statement(&mut self) {
        let range = self.open_from..self.records.len();
        let open = &self.records[range.clone()];
        let (Some(first), Some(last)) = (open.first(), open.last()) else {
            return;
        };
        let span = first.span.to(last.span);
        let condition = PresenceCondition::any(open.iter().map(|r| &r.condition));
        self.statements.push(Statement {
            span,
            condition,
            records: range,
        });
        self.open_from = self.records.len();
    }

    pub(crate) fn finish(mut self) -> (Vec<Record>, Vec<Statement>) {
        self.close_statement();
        (self.records, self.statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::atom;
    use crate::token::TokenKind;

    fn tok(text: &str, line: u32, kind: TokenKind) -> Token {
        Token::new(kind, text, Span::new(line, 1, 0, 0)).with_leading_space(true)
    }

    #[test]
    fn statement_condition_is_the_disjunction_of_its_tokens() {
        let x = atom("X");
        let mut asm = Assembler::default();
        asm.push_token(tok("a", 1, TokenKind::Identifier), PresenceCondition::always());
        asm.push_token(tok("=", 1, TokenKind::Punctuator), PresenceCondition::always());
        asm.push_token(tok("3", 2, TokenKind::Number), x.clone());
        asm.push_token(tok("4", 3, TokenKind::Number), x.not());
        asm.push_token(tok(";", 4, TokenKind::Punctuator), PresenceCondition::always());
        asm.push_token(tok("b", 5, TokenKind::Identifier), x.clone());
        let (records, statements) = asm.finish();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].condition.is_true());
        assert_eq!(statements[0].records, 0..5);
        assert_eq!(statements[1].condition, x);
        assert_eq!(records[2].statement, 0);
        assert_eq!(records[5].statement, 1);
    }

    #[test]
    fn blocks_group_equal_conditions() {
        let x = atom("X");
        let mut asm = Assembler::default();
        asm.push_token(tok("int", 1, TokenKind::Identifier), PresenceCondition::always());
        asm.push_token(tok("a", 1, TokenKind::Identifier), PresenceCondition::always());
        asm.push_token(tok(";", 1, TokenKind::Punctuator), PresenceCondition::always());
        asm.push_token(tok("f", 3, TokenKind::Identifier), x.clone());
        asm.push_token(tok("g", 4, TokenKind::Identifier), x.clone());
        let (records, statements) = asm.finish();
        let artifact = Artifact {
            file: "t.c".into(),
            records,
            statements,
            branches: Vec::new(),
            diagnostics: Vec::new(),
        };
        let blocks = artifact.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "int a ;");
        assert_eq!((blocks[1].first_line, blocks[1].last_line), (3, 4));
        assert_eq!(blocks[1].text, "f\ng");
        assert!(artifact.render().contains("//@ X\nf\ng"));
    }
}
