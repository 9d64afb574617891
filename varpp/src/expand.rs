//! Variability-aware macro expansion.
//!
//! Expansion works on a worklist of partial results. Whenever a name has
//! several live definitions under the current condition, the partial is
//! split, one successor per definition, each carrying the narrowed
//! condition. Identifiers of macros currently being expanded along the
//! active call path are painted and never expanded again.

use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tracing::{trace, warn};

use crate::condition::PresenceCondition;
use crate::error::{AnalysisError, MacroError};
use crate::lexer::lex_fragment;
use crate::macro_def::MacroDefinition;
use crate::macro_table::MacroTable;
use crate::token::{Span, Token, TokenKind, spell};

/// Names of the macros being expanded along the current call path
#[derive(Clone, Debug, Default)]
pub struct ExpansionContext {
    active: Vec<String>,
    directive: bool,
}

impl ExpansionContext {
    /// Context for ordinary source text
    #[must_use]
    pub fn text() -> Self {
        Self::default()
    }

    /// Context for `#if`/`#elif` controlling expressions, where the operands
    /// of `defined` are not expanded
    #[must_use]
    pub fn directive() -> Self {
        Self {
            active: Vec::new(),
            directive: true,
        }
    }

    /// Whether `name` is being expanded along this path
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.active.iter().any(|n| n == name)
    }

    /// Whether this is a controlling-expression context
    #[must_use]
    pub fn is_directive(&self) -> bool {
        self.directive
    }

    /// The context for rescanning the replacement of `name`
    #[must_use]
    pub fn with(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.active.push(name.to_string());
        next
    }
}

/// One alternative result of an expansion
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Variant {
    /// Configurations that produce this alternative
    pub condition: PresenceCondition,
    /// Fully expanded tokens
    pub tokens: Vec<Token>,
}

enum Failure {
    Macro(MacroError),
    Analysis(AnalysisError),
}

impl From<AnalysisError> for Failure {
    fn from(e: AnalysisError) -> Self {
        Failure::Analysis(e)
    }
}

impl From<MacroError> for Failure {
    fn from(e: MacroError) -> Self {
        Failure::Macro(e)
    }
}

#[derive(Clone)]
struct Partial {
    cond: PresenceCondition,
    out: Vec<Token>,
    /// Tokens to read before continuing with the input
    pending: VecDeque<Token>,
    pos: usize,
}

impl Partial {
    fn peek<'t>(&'t self, tokens: &'t [Token], n: usize) -> Option<&'t Token> {
        if n < self.pending.len() {
            self.pending.get(n)
        } else {
            tokens.get(self.pos + n - self.pending.len())
        }
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if self.pending.pop_front().is_none() {
                self.pos += 1;
            }
        }
    }

    fn next(&mut self, tokens: &[Token]) -> Option<Token> {
        let tok = self.peek(tokens, 0)?.clone();
        self.advance(1);
        Some(tok)
    }
}

struct Invocation {
    args: Vec<Vec<Token>>,
    /// Input tokens consumed after the macro name, closing parenthesis included
    consumed: usize,
    span: Span,
}

enum Piece {
    Tok(Token),
    Placemarker { variadic: bool },
    Paste,
}

/// Expands token sequences against a [`MacroTable`]
pub struct Expander<'a> {
    table: &'a MacroTable,
    max_variants: usize,
    errors: Vec<MacroError>,
}

impl<'a> Expander<'a> {
    /// Expander over the current state of `table`
    #[must_use]
    pub fn new(table: &'a MacroTable) -> Self {
        Self {
            table,
            max_variants: table.env().max_variants.max(1),
            errors: Vec::new(),
        }
    }

    /// Macro errors recovered from since the last call
    pub fn take_errors(&mut self) -> Vec<MacroError> {
        std::mem::take(&mut self.errors)
    }

    fn record(&mut self, error: MacroError) {
        warn!(name = %error.name, span = %error.span, "{}", error.message);
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    /// Fully expand `tokens` under `cond`. Variants with identical output
    /// are merged, so every returned variant spells differently.
    ///
    /// # Errors
    /// Returns `AnalysisError::Eval` when a concrete configuration leaves a
    /// macro ambiguous.
    pub fn expand(
        &mut self,
        tokens: &[Token],
        cond: &PresenceCondition,
        ctx: &ExpansionContext,
    ) -> Result<Vec<Variant>, AnalysisError> {
        let mut work = vec![Partial {
            cond: cond.clone(),
            out: Vec::new(),
            pending: VecDeque::new(),
            pos: 0,
        }];
        let mut done: Vec<Variant> = Vec::new();

        while let Some(mut p) = work.pop() {
            loop {
                let Some(mut tok) = p.next(tokens) else {
                    done.push(Variant {
                        condition: p.cond,
                        tokens: p.out,
                    });
                    break;
                };
                if !tok.is_identifier() || tok.painted {
                    p.out.push(tok);
                    continue;
                }
                if ctx.contains(&tok.text) {
                    tok.painted = true;
                    p.out.push(tok);
                    continue;
                }
                if ctx.is_directive() && tok.text == "defined" {
                    let operand_len = match (p.peek(tokens, 0), p.peek(tokens, 1), p.peek(tokens, 2)) {
                        (Some(l), Some(id), Some(r))
                            if l.is_punct("(") && id.is_identifier() && r.is_punct(")") =>
                        {
                            3
                        }
                        (Some(id), _, _) if id.is_identifier() => 1,
                        _ => 0,
                    };
                    p.out.push(tok);
                    for _ in 0..operand_len {
                        if let Some(t) = p.next(tokens) {
                            p.out.push(t);
                        }
                    }
                    continue;
                }

                let pending_total = work.len() + done.len();
                match self.invoke(&p, &tok, tokens, ctx, pending_total)? {
                    None => p.out.push(tok),
                    Some(mut successors) => {
                        successors.reverse();
                        let Some(first) = successors.pop() else {
                            break;
                        };
                        work.extend(successors);
                        p = first;
                    }
                }
            }
        }

        let mut merged: Vec<Variant> = Vec::with_capacity(done.len());
        for v in done {
            match merged.iter_mut().find(|m| same_spelling(&m.tokens, &v.tokens)) {
                Some(m) => m.condition = m.condition.or(&v.condition),
                None => merged.push(v),
            }
        }
        Ok(merged)
    }

    /// Expand the invocation of `name` at the head of `p`'s input. `None`
    /// leaves the name as it is.
    fn invoke(
        &mut self,
        p: &Partial,
        name: &Token,
        tokens: &[Token],
        ctx: &ExpansionContext,
        pending_total: usize,
    ) -> Result<Option<Vec<Partial>>, AnalysisError> {
        let resolutions = self.table.resolve(&name.text, &p.cond, name.span)?;
        if resolutions.iter().all(|r| r.definition.is_none()) {
            return Ok(None);
        }

        let needs_args = resolutions
            .iter()
            .any(|r| r.definition.as_ref().is_some_and(|d| d.is_function_like()));
        let invocation = if needs_args {
            match collect_args(p, tokens, name) {
                Some(Ok(inv)) => Some(inv),
                Some(Err(e)) => {
                    self.record(e);
                    None
                }
                None => None,
            }
        } else {
            None
        };

        let mut successors = Vec::new();
        for res in resolutions {
            let unchanged = |cond: PresenceCondition| {
                let mut s = p.clone();
                s.cond = cond;
                s.out.push(name.clone());
                s
            };
            let Some(def) = res.definition else {
                successors.push(unchanged(res.condition));
                continue;
            };

            let (variants, consumed, span) = if def.is_function_like() {
                let Some(inv) = &invocation else {
                    successors.push(unchanged(res.condition));
                    continue;
                };
                let result = self.expand_function(&def, inv, &res.condition, ctx);
                (result, inv.consumed, name.span.to(inv.span))
            } else {
                let result = self.expand_object(&def, &res.condition, ctx);
                (result, 0, name.span)
            };

            let variants = match variants {
                Ok(v) => v,
                Err(Failure::Macro(e)) => {
                    self.record(e);
                    successors.push(unchanged(res.condition));
                    continue;
                }
                Err(Failure::Analysis(e)) => return Err(e),
            };

            trace!(name = %def.name, variants = variants.len(), "expanded macro invocation");
            for variant in variants {
                let mut s = p.clone();
                s.cond = variant.condition;
                s.advance(consumed);
                let mut produced = variant.tokens;
                for (i, t) in produced.iter_mut().enumerate() {
                    t.span = span;
                    if i == 0 {
                        t.leading_space = name.leading_space;
                    }
                }
                let continues = produced.last().is_some_and(|last| {
                    last.is_identifier()
                        && !last.painted
                        && !ctx.contains(&last.text)
                        && self.table.has_function_like(&last.text)
                }) && s.peek(tokens, 0).is_some_and(|t| t.is_punct("("));
                if continues {
                    if let Some(last) = produced.pop() {
                        s.pending.push_front(last);
                    }
                }
                s.out.extend(produced);
                successors.push(s);
            }
        }

        if successors.len() > 1 && pending_total + successors.len() > self.max_variants {
            self.record(MacroError::new(
                &name.text,
                name.span,
                format!("expansion exceeds {} variants", self.max_variants),
            ));
            return Ok(None);
        }
        Ok(Some(successors))
    }

    fn expand_object(
        &mut self,
        def: &Rc<MacroDefinition>,
        cond: &PresenceCondition,
        ctx: &ExpansionContext,
    ) -> Result<Vec<Variant>, Failure> {
        let body = substitute(def, &[], &[])?;
        Ok(self.expand(&body, cond, &ctx.with(&def.name))?)
    }

    fn expand_function(
        &mut self,
        def: &Rc<MacroDefinition>,
        inv: &Invocation,
        cond: &PresenceCondition,
        ctx: &ExpansionContext,
    ) -> Result<Vec<Variant>, Failure> {
        let args = bind_args(def, inv.args.clone(), inv.span)?;

        // Parameters used outside of `#`/`##` are fully expanded first
        let body = &def.body;
        let mut needs_expansion = vec![false; args.len()];
        for (i, t) in body.iter().enumerate() {
            if !t.is_identifier() {
                continue;
            }
            let Some(idx) = def.param_index(&t.text) else {
                continue;
            };
            let prev = i.checked_sub(1).map(|j| &body[j]);
            let next = body.get(i + 1);
            let operand = prev.is_some_and(|t| t.is_punct("#") || t.is_punct("##"))
                || next.is_some_and(|t| t.is_punct("##"));
            if !operand {
                needs_expansion[idx] = true;
            }
        }

        let mut combos: Vec<(PresenceCondition, Vec<Option<Vec<Token>>>)> =
            vec![(cond.clone(), vec![None; args.len()])];
        for (idx, arg) in args.iter().enumerate() {
            if !needs_expansion[idx] {
                continue;
            }
            let variants = self.expand(arg, cond, ctx)?;
            let mut next = Vec::with_capacity(combos.len() * variants.len());
            for (c, slots) in &combos {
                for v in &variants {
                    let joint = c.and(&v.condition);
                    if joint.is_false() {
                        continue;
                    }
                    let mut slots = slots.clone();
                    slots[idx] = Some(v.tokens.clone());
                    next.push((joint, slots));
                }
            }
            if next.len() > self.max_variants {
                return Err(MacroError::new(
                    &def.name,
                    inv.span,
                    format!("expansion exceeds {} variants", self.max_variants),
                )
                .into());
            }
            combos = next;
        }

        let rescan_ctx = ctx.with(&def.name);
        let mut out = Vec::new();
        for (c, expanded) in combos {
            let substituted = substitute(def, &args, &expanded)?;
            out.extend(self.expand(&substituted, &c, &rescan_ctx)?);
            if out.len() > self.max_variants {
                return Err(MacroError::new(
                    &def.name,
                    inv.span,
                    format!("expansion exceeds {} variants", self.max_variants),
                )
                .into());
            }
        }
        Ok(out)
    }
}

fn same_spelling(a: &[Token], b: &[Token]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.kind == y.kind && x.text == y.text && x.painted == y.painted)
}

/// Collect a parenthesized argument list following the macro name. `None`
/// when the next token is not `(`.
fn collect_args(
    p: &Partial,
    tokens: &[Token],
    name: &Token,
) -> Option<Result<Invocation, MacroError>> {
    if !p.peek(tokens, 0)?.is_punct("(") {
        return None;
    }
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 0usize;
    let mut n = 1;
    loop {
        let Some(tok) = p.peek(tokens, n) else {
            return Some(Err(MacroError::new(
                &name.text,
                name.span,
                "unterminated argument list",
            )));
        };
        n += 1;
        if tok.is_directive_marker() {
            return Some(Err(MacroError::new(
                &name.text,
                name.span,
                "unterminated argument list",
            )));
        }
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            if depth == 0 {
                return Some(Ok(Invocation {
                    args,
                    consumed: n,
                    span: tok.span,
                }));
            }
            depth -= 1;
        } else if tok.is_punct(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }
        if let Some(current) = args.last_mut() {
            current.push(tok.clone());
        }
    }
}

/// Bind collected arguments to parameters; the variadic capture, if any,
/// is the last element
fn bind_args(
    def: &MacroDefinition,
    mut args: Vec<Vec<Token>>,
    span: Span,
) -> Result<Vec<Vec<Token>>, MacroError> {
    let arity = def.arity();
    let mismatch = |given: usize| {
        MacroError::new(
            &def.name,
            span,
            format!("macro {} requires {arity} arguments, but {given} given", def.name),
        )
    };

    if arity == 0 && args.len() == 1 && args[0].is_empty() {
        args.clear();
    }
    if def.variadic.is_none() {
        if args.len() != arity {
            return Err(mismatch(args.len()));
        }
        return Ok(args);
    }

    if args.len() < arity {
        return Err(mismatch(args.len()));
    }
    let rest = args.split_off(arity);
    let mut captured = Vec::new();
    for (i, arg) in rest.into_iter().enumerate() {
        if i > 0 {
            let at = arg.first().map_or(span, |t| t.span);
            captured.push(Token::new(TokenKind::Punctuator, ",", at));
        }
        captured.extend(arg);
    }
    args.push(captured);
    Ok(args)
}

fn stringify(arg: &[Token], span: Span) -> Token {
    let mut text = String::from("\"");
    for (i, t) in arg.iter().enumerate() {
        if i > 0 && t.leading_space {
            text.push(' ');
        }
        if matches!(t.kind, TokenKind::StringLiteral | TokenKind::CharLiteral) {
            for c in t.text.chars() {
                if c == '"' || c == '\\' {
                    text.push('\\');
                }
                text.push(c);
            }
        } else {
            text.push_str(&t.text);
        }
    }
    text.push('"');
    Token::new(TokenKind::StringLiteral, text, span)
}

fn paste(def: &MacroDefinition, left: &Token, right: &Token) -> Result<Token, MacroError> {
    let combined = format!("{}{}", left.text, right.text);
    match lex_fragment(&combined) {
        Ok(mut toks) if toks.len() == 1 => {
            let mut tok = toks.remove(0);
            tok.span = left.span;
            tok.leading_space = left.leading_space;
            Ok(tok)
        }
        _ => Err(MacroError::new(
            &def.name,
            left.span,
            format!(
                "pasting \"{}\" and \"{}\" does not give a valid preprocessing token",
                left.text, right.text
            ),
        )),
    }
}

/// Replace parameters in the body of `def`, then apply `#` and `##`
fn substitute(
    def: &MacroDefinition,
    args: &[Vec<Token>],
    expanded: &[Option<Vec<Token>>],
) -> Result<Vec<Token>, MacroError> {
    let body = &def.body;
    let variadic_index = def.variadic.as_ref().map(|_| def.arity());
    let mut pieces: Vec<Piece> = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let t = &body[i];
        if t.is_punct("##") {
            if i == 0 || i + 1 == body.len() {
                return Err(MacroError::new(
                    &def.name,
                    t.span,
                    "'##' cannot appear at either end of a macro expansion",
                ));
            }
            pieces.push(Piece::Paste);
            i += 1;
            continue;
        }
        if def.is_function_like() && t.is_punct("#") {
            let param = body
                .get(i + 1)
                .filter(|n| n.is_identifier())
                .and_then(|n| def.param_index(&n.text));
            let Some(idx) = param else {
                return Err(MacroError::new(
                    &def.name,
                    t.span,
                    "'#' is not followed by a macro parameter",
                ));
            };
            let mut s = stringify(&args[idx], t.span);
            s.leading_space = t.leading_space;
            pieces.push(Piece::Tok(s));
            i += 2;
            continue;
        }
        if let Some(idx) = t.is_identifier().then(|| def.param_index(&t.text)).flatten() {
            let replacement = match expanded.get(idx) {
                Some(Some(e)) => e.as_slice(),
                _ => args[idx].as_slice(),
            };
            if replacement.is_empty() {
                pieces.push(Piece::Placemarker {
                    variadic: variadic_index == Some(idx),
                });
            } else {
                for (k, r) in replacement.iter().enumerate() {
                    let mut r = r.clone();
                    if k == 0 {
                        r.leading_space = t.leading_space;
                    }
                    pieces.push(Piece::Tok(r));
                }
            }
            i += 1;
            continue;
        }
        pieces.push(Piece::Tok(t.clone()));
        i += 1;
    }

    let mut out: Vec<Piece> = Vec::with_capacity(pieces.len());
    let mut iter = pieces.into_iter();
    while let Some(piece) = iter.next() {
        if !matches!(piece, Piece::Paste) {
            out.push(piece);
            continue;
        }
        let (Some(left), Some(right)) = (out.pop(), iter.next()) else {
            continue;
        };
        let joined = match (left, right) {
            (Piece::Tok(l), Piece::Placemarker { variadic: true }) if l.is_punct(",") => {
                Piece::Placemarker { variadic: false }
            }
            (Piece::Tok(l), Piece::Tok(r)) => Piece::Tok(paste(def, &l, &r)?),
            (Piece::Tok(l), _) => Piece::Tok(l),
            (_, right) => right,
        };
        out.push(joined);
    }

    Ok(out
        .into_iter()
        .filter_map(|p| match p {
            Piece::Tok(t) => Some(t),
            _ => None,
        })
        .collect())
}

/// Spell every variant, for diagnostics and tests
#[must_use]
pub fn spell_variants(variants: &[Variant]) -> Vec<(String, String)> {
    variants
        .iter()
        .map(|v| (v.condition.to_string(), spell(&v.tokens)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::atom;
    use crate::config::ConfigEnvironment;
    use crate::lexer::lex;
    use crate::macro_def::parse_define;
    use pretty_assertions::assert_eq;

    fn table_with(env: &ConfigEnvironment, defines: &[(&str, PresenceCondition)]) -> MacroTable {
        let mut table = MacroTable::new(env);
        for (text, cond) in defines {
            let tokens = lex_fragment(text).unwrap();
            let def = parse_define(&tokens, Span::default(), cond.clone()).unwrap();
            table.define(def, cond);
        }
        table
    }

    fn always(defines: &[&str]) -> MacroTable {
        let with_cond: Vec<(&str, PresenceCondition)> = defines
            .iter()
            .map(|d| (*d, PresenceCondition::always()))
            .collect();
        table_with(&ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_"), &with_cond)
    }

    fn expand_text(table: &MacroTable, text: &str) -> Vec<(String, String)> {
        let tokens = lex(text).unwrap();
        let mut expander = Expander::new(table);
        let variants = expander
            .expand(&tokens, &PresenceCondition::always(), &ExpansionContext::text())
            .unwrap();
        spell_variants(&variants)
    }

    fn single(table: &MacroTable, text: &str) -> String {
        let variants = expand_text(table, text);
        assert_eq!(variants.len(), 1, "{variants:?}");
        variants[0].1.clone()
    }

    #[test]
    fn object_and_function_like() {
        let table = always(&["PI 3", "SQ(x) ((x) * (x))", "F f"]);
        assert_eq!(single(&table, "PI + SQ(PI + 1)"), "3 + ((3 + 1) * (3 + 1))");
        assert_eq!(single(&table, "SQ"), "SQ");
    }

    #[test]
    fn self_reference_is_painted() {
        let table = always(&["foo foo + 1", "a b", "b a"]);
        assert_eq!(single(&table, "foo"), "foo + 1");
        assert_eq!(single(&table, "a"), "a");
    }

    #[test]
    fn stringize_and_paste() {
        let table = always(&[
            "STR(x) #x",
            "CAT(a, b) a ## b",
            "NAME(n) n ## _suffix",
        ]);
        assert_eq!(single(&table, r#"STR(a  "b\n" c)"#), r#""a \"b\\n\" c""#);
        assert_eq!(single(&table, "CAT(foo, bar)"), "foobar");
        assert_eq!(single(&table, "CAT(, bar)"), "bar");
        assert_eq!(single(&table, "NAME(x)"), "x_suffix");
    }

    #[test]
    fn variadic_capture() {
        let table = always(&[
            "LOG(fmt, ...) printf(fmt, __VA_ARGS__)",
            "GLOG(fmt, args...) printf(fmt , ## args)",
            "ZERO(...) [__VA_ARGS__]",
        ]);
        assert_eq!(single(&table, "LOG(\"%d %d\", 1, 2)"), "printf(\"%d %d\", 1, 2)");
        assert_eq!(single(&table, "GLOG(\"x\")"), "printf(\"x\")");
        assert_eq!(single(&table, "ZERO()"), "[]");
    }

    #[test]
    fn argument_count_mismatch_is_recovered() {
        let table = always(&["TWO(a, b) a b"]);
        let tokens = lex("TWO(1) rest").unwrap();
        let mut expander = Expander::new(&table);
        let variants = expander
            .expand(&tokens, &PresenceCondition::always(), &ExpansionContext::text())
            .unwrap();
        assert_eq!(spell(&variants[0].tokens), "TWO(1) rest");
        assert_eq!(expander.take_errors().len(), 1);
    }

    #[test]
    fn bad_paste_is_a_macro_error() {
        let table = always(&["BAD(a) a ## +", "EDGE ## x"]);
        let tokens = lex("BAD(x) EDGE").unwrap();
        let mut expander = Expander::new(&table);
        expander
            .expand(&tokens, &PresenceCondition::always(), &ExpansionContext::text())
            .unwrap();
        assert_eq!(expander.take_errors().len(), 2);
    }

    #[test]
    fn guarded_definitions_split_into_variants() {
        let env = ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_");
        let mmu = atom("CONFIG_MMU");
        let table = table_with(
            &env,
            &[("SPLIT 999999", mmu.not()), ("SPLIT 4", mmu.clone())],
        );
        let variants = expand_text(&table, "x = SPLIT;");
        assert_eq!(
            variants,
            vec![
                ("!CONFIG_MMU".to_string(), "x = 999999;".to_string()),
                ("CONFIG_MMU".to_string(), "x = 4;".to_string()),
            ]
        );
    }

    #[test]
    fn partially_defined_name_keeps_unexpanded_remainder() {
        let env = ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_");
        let table = table_with(&env, &[("N 8", atom("CONFIG_A"))]);
        let variants = expand_text(&table, "N");
        assert_eq!(
            variants,
            vec![
                ("CONFIG_A".to_string(), "8".to_string()),
                ("!CONFIG_A".to_string(), "N".to_string()),
            ]
        );
    }

    #[test]
    fn variant_cap_leaves_invocation_unexpanded() {
        let env = ConfigEnvironment::symbolic()
            .with_atom_prefix("CONFIG_")
            .with_max_variants(2);
        let table = table_with(
            &env,
            &[
                ("A 1", atom("CONFIG_X")),
                ("A 2", atom("CONFIG_X").not()),
                ("B 1", atom("CONFIG_Y")),
                ("B 2", atom("CONFIG_Y").not()),
            ],
        );
        let tokens = lex("A B").unwrap();
        let mut expander = Expander::new(&table);
        let variants = expander
            .expand(&tokens, &PresenceCondition::always(), &ExpansionContext::text())
            .unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().all(|v| v.tokens[1].text == "B"));
        assert_eq!(expander.take_errors().len(), 1);
    }

    #[test]
    fn directive_mode_keeps_defined_operands() {
        let table = always(&["CONFIG_X 1", "config_enabled(cfg) defined(cfg)"]);
        let tokens = lex_fragment("defined CONFIG_X || defined(CONFIG_X) || CONFIG_X").unwrap();
        let mut expander = Expander::new(&table);
        let variants = expander
            .expand(&tokens, &PresenceCondition::always(), &ExpansionContext::directive())
            .unwrap();
        assert_eq!(
            spell(&variants[0].tokens),
            "defined CONFIG_X || defined(CONFIG_X) || 1"
        );
    }

    #[test]
    fn trailing_function_name_continues_with_following_input() {
        let table = always(&["G(x) [x]", "F G"]);
        assert_eq!(single(&table, "F(2)"), "[2]");
    }
}
