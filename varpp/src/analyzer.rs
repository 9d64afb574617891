//! Per-unit analysis driver.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::condition::PresenceCondition;
use crate::conditional::{BranchKind, ConditionalStack};
use crate::config::ConfigEnvironment;
use crate::error::{AnalysisError, Diagnostic};
use crate::expand::{ExpansionContext, Expander, Variant};
use crate::expr;
use crate::lexer::{ensure_terminated, lex, lex_fragment};
use crate::macro_def::{MacroDefinition, directive_name, parse_define};
use crate::macro_table::MacroTable;
use crate::output::{Artifact, Assembler};
use crate::token::{Span, Token, TokenKind};

/// Runs the preprocessing analysis of one translation unit
pub struct Analyzer {
    table: MacroTable,
    diagnostics: Vec<Diagnostic>,
}

impl Analyzer {
    /// Create an analyzer; atoms the environment marks as defined are
    /// predefined with the value `1`
    #[must_use]
    pub fn new(env: &ConfigEnvironment) -> Self {
        let mut table = MacroTable::new(env);
        for name in &env.defined_atoms {
            let one = Token::new(TokenKind::Number, "1", Span::default());
            let def = MacroDefinition::object(name, vec![one], PresenceCondition::always(), Span::default());
            table.define(def, &PresenceCondition::always());
        }
        Self {
            table,
            diagnostics: Vec::new(),
        }
    }

    /// Predefine a macro the way `-D` does: `NAME`, `NAME=VALUE` or `F(x)=BODY`
    ///
    /// # Errors
    /// Returns an error when the definition does not lex or parse.
    pub fn define(&mut self, definition: &str) -> Result<(), AnalysisError> {
        let (head, body) = definition.split_once('=').unwrap_or((definition, "1"));
        let mut tokens = lex_fragment(head)?;
        let mut body_tokens = lex_fragment(body)?;
        if let Some(first) = body_tokens.first_mut() {
            first.leading_space = true;
        }
        tokens.append(&mut body_tokens);
        let always = PresenceCondition::always();
        let def = parse_define(&tokens, Span::default(), always.clone())?;
        self.table.define(def, &always);
        Ok(())
    }

    /// Remove a macro the way `-U` does
    pub fn undef(&mut self, name: &str) {
        self.table.undef(name, &PresenceCondition::always());
    }

    /// Macro definitions as left by the last run
    #[must_use]
    pub fn macros(&self) -> &MacroTable {
        &self.table
    }

    /// Analyze `source`, continuing from the macro state of earlier calls
    ///
    /// # Errors
    /// Returns the first lex, directive or evaluation error; the unit is
    /// abandoned at that point. An unterminated literal is only an error
    /// where its line is not excluded under every configuration.
    pub fn run(&mut self, file: &str, source: &str) -> Result<Artifact, AnalysisError> {
        debug!(file, "analyzing unit");
        let tokens = lex(source)?;
        let mut stack = ConditionalStack::new();
        let mut assembler = Assembler::default();

        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            if tok.kind == TokenKind::Directive {
                let end = tokens[i..]
                    .iter()
                    .position(|t| t.kind == TokenKind::DirectiveEnd)
                    .map_or(tokens.len(), |p| i + p);
                self.directive(tok, &tokens[i + 1..end], &mut stack)?;
                i = end + 1;
                continue;
            }

            let ambient = stack.ambient();
            if ambient.is_false() {
                i += 1;
                continue;
            }
            if !tok.is_identifier() || self.table.entries(&tok.text).is_empty() {
                ensure_terminated(std::slice::from_ref(tok))?;
                assembler.push_token(tok.clone(), ambient);
                i += 1;
                continue;
            }

            let (variants, end) = self.expand_segment(&tokens, i, &ambient)?;
            ensure_terminated(&tokens[i..end])?;
            let span = tokens[i].span.to(tokens[end - 1].span);
            match variants.len() {
                1 => {
                    for v in variants {
                        for t in v.tokens {
                            assembler.push_token(t, v.condition.clone());
                        }
                    }
                }
                _ => assembler.push_variants(span, variants),
            }
            i = end;
        }

        let branches = stack.finish()?;
        let (records, statements) = assembler.finish();
        debug!(
            file,
            records = records.len(),
            statements = statements.len(),
            diagnostics = self.diagnostics.len(),
            "finished unit"
        );
        Ok(Artifact {
            file: file.to_string(),
            records,
            statements,
            branches,
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }

    /// Expand the invocation starting at `start`. The segment grows while
    /// an alternative ends in a function-like macro name that the
    /// following parenthesized input would complete.
    fn expand_segment(
        &mut self,
        tokens: &[Token],
        start: usize,
        ambient: &PresenceCondition,
    ) -> Result<(Vec<Variant>, usize), AnalysisError> {
        let mut end = start + 1;
        if self.table.has_function_like(&tokens[start].text) {
            if let Some(close) = paren_group_end(tokens, end) {
                end = close;
            }
        }
        loop {
            let mut expander = Expander::new(&self.table);
            let variants = expander.expand(&tokens[start..end], ambient, &ExpansionContext::text())?;
            let wants_more = variants.iter().any(|v| {
                v.tokens.last().is_some_and(|t| {
                    t.is_identifier() && !t.painted && self.table.has_function_like(&t.text)
                })
            });
            let extended = if wants_more {
                paren_group_end(tokens, end)
            } else {
                None
            };
            match extended {
                Some(close) => end = close,
                None => {
                    self.diagnostics
                        .extend(expander.take_errors().into_iter().map(Diagnostic::Macro));
                    return Ok((variants, end));
                }
            }
        }
    }

    fn directive(
        &mut self,
        marker: &Token,
        args: &[Token],
        stack: &mut ConditionalStack,
    ) -> Result<(), AnalysisError> {
        let span = marker.span;
        let ambient = stack.ambient();
        let live = !ambient.is_false();
        let evaluated = match marker.text.as_str() {
            "define" | "undef" | "ifdef" | "ifndef" | "if" => live,
            "elif" => stack.elif_scope(span)?.is_some(),
            _ => false,
        };
        if evaluated {
            ensure_terminated(args)?;
        }
        match marker.text.as_str() {
            "define" => {
                if live {
                    let def = parse_define(args, span, ambient.clone())?;
                    let warnings = self.table.define(def, &ambient);
                    self.diagnostics
                        .extend(warnings.into_iter().map(Diagnostic::Redefinition));
                } else if let Ok(def) = parse_define(args, span, ambient.clone()) {
                    self.table.define(def, &ambient);
                }
            }
            "undef" => {
                if live {
                    let name = directive_name("undef", args, span)?;
                    self.table.undef(name, &ambient);
                }
            }
            "ifdef" | "ifndef" => {
                let kind = if marker.text == "ifdef" {
                    BranchKind::Ifdef
                } else {
                    BranchKind::Ifndef
                };
                let condition = if live {
                    let name = directive_name(kind.as_str(), args, span)?;
                    let defined = self.table.defined_condition(name);
                    if kind == BranchKind::Ifdef { defined } else { defined.not() }
                } else {
                    PresenceCondition::never()
                };
                stack.push_if(kind, condition, span);
            }
            "if" => {
                let condition = if live {
                    self.controlling_expression("if", args, &ambient, span)?
                } else {
                    PresenceCondition::never()
                };
                stack.push_if(BranchKind::If, condition, span);
            }
            "elif" => {
                let condition = match stack.elif_scope(span)? {
                    Some(scope) => self.controlling_expression("elif", args, &scope, span)?,
                    None => PresenceCondition::never(),
                };
                stack.elif(condition, span)?;
            }
            "else" => stack.else_branch(span)?,
            "endif" => stack.endif(span)?,
            other => debug!(directive = other, %span, "ignoring directive"),
        }
        Ok(())
    }

    /// Expand and evaluate an `#if`/`#elif` expression under `scope`
    fn controlling_expression(
        &mut self,
        directive: &str,
        args: &[Token],
        scope: &PresenceCondition,
        span: Span,
    ) -> Result<PresenceCondition, AnalysisError> {
        if args.is_empty() {
            return Err(AnalysisError::directive(
                span,
                format!("#{directive} with no expression"),
            ));
        }
        let mut expander = Expander::new(&self.table);
        let variants = expander.expand(args, scope, &ExpansionContext::directive())?;
        self.diagnostics
            .extend(expander.take_errors().into_iter().map(Diagnostic::Macro));

        let mut condition = PresenceCondition::never();
        for v in &variants {
            let value = expr::evaluate(&v.tokens, &self.table, span)?;
            condition = condition.or(&v.condition.and(&value));
        }
        Ok(condition)
    }
}

/// Index one past the `)` matching the `(` at `open`, if the group closes
/// before the next directive
fn paren_group_end(tokens: &[Token], open: usize) -> Option<usize> {
    if !tokens.get(open)?.is_punct("(") {
        return None;
    }
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.is_directive_marker() {
            return None;
        }
        if t.is_punct("(") {
            depth += 1;
        } else if t.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

/// Analyze one translation unit
///
/// # Errors
/// Returns the first lex, directive or evaluation error of the unit.
pub fn analyze_source(
    file: &str,
    source: &str,
    env: &ConfigEnvironment,
) -> Result<Artifact, AnalysisError> {
    Analyzer::new(env).run(file, source)
}

/// A translation unit to analyze
#[derive(Clone, Debug)]
pub struct SourceUnit {
    /// Name used in the artifact and in logs
    pub file: String,
    /// Source text
    pub source: String,
}

impl SourceUnit {
    /// Pair a name with its source text
    #[must_use]
    pub fn new(file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source: source.into(),
        }
    }
}

/// Result of analyzing one unit of a batch
#[derive(Debug, Serialize)]
pub struct UnitOutcome {
    /// Name of the unit
    pub file: String,
    /// Artifact, or the error that aborted the unit
    pub result: Result<Artifact, AnalysisError>,
}

/// Analyze independent units in parallel; a failing unit does not affect the others
pub fn analyze_batch(units: &[SourceUnit], env: &ConfigEnvironment) -> Vec<UnitOutcome> {
    let outcomes: Vec<UnitOutcome> = units
        .par_iter()
        .map(|unit| UnitOutcome {
            file: unit.file.clone(),
            result: analyze_source(&unit.file, &unit.source, env),
        })
        .collect();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(units = outcomes.len(), failed, "batch analyzed");
    outcomes
}
