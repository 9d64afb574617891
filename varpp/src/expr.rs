//! Typed evaluation of `#if`/`#elif` controlling expressions.
//!
//! Operands are integers, presence conditions or opaque symbolic values
//! (configuration atoms with unknown numeric values). Boolean operators
//! over conditions build conditions; arithmetic and comparisons over
//! opaque values build opaque terms. Used as a truth value, an opaque term
//! is compared against zero and becomes an atom such as `CONFIG_X!=0`,
//! distinct from the atom `CONFIG_X` that `defined(CONFIG_X)` yields.

use crate::condition::PresenceCondition;
use crate::error::AnalysisError;
use crate::macro_table::MacroTable;
use crate::token::{ExprToken, Span, Token, TokenKind, is_identifier_continue};

/// Value of a (sub)expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Known integer
    Int(i64),
    /// Truth value depending on the configuration
    Cond(PresenceCondition),
    /// Term over configuration values the environment does not fix
    Opaque(String),
}

impl Value {
    fn truth(&self) -> PresenceCondition {
        match self {
            Value::Int(n) => PresenceCondition::constant(*n != 0),
            Value::Cond(c) => c.clone(),
            Value::Opaque(_) => PresenceCondition::atom(&format!("{}!=0", self.term())),
        }
    }

    /// Boolean-valued: a condition or the integers 0 and 1
    fn as_boolean(&self) -> Option<PresenceCondition> {
        match self {
            Value::Int(0) => Some(PresenceCondition::never()),
            Value::Int(1) => Some(PresenceCondition::always()),
            Value::Cond(c) => Some(c.clone()),
            _ => None,
        }
    }

    /// Text used when the value becomes part of an opaque term
    fn term(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Opaque(s) if s.chars().all(is_identifier_continue) => s.clone(),
            Value::Opaque(s) => format!("({s})"),
            Value::Cond(c) => format!("({})", c.to_string().replace(' ', "")),
        }
    }

    fn from_cond(c: PresenceCondition) -> Value {
        match c.as_constant() {
            Some(b) => Value::Int(i64::from(b)),
            None => Value::Cond(c),
        }
    }
}

fn xor(a: &PresenceCondition, b: &PresenceCondition) -> PresenceCondition {
    a.and(&b.not()).or(&a.not().and(b))
}

/// Evaluate a fully expanded controlling expression
///
/// # Errors
/// Returns `AnalysisError::Directive` for malformed expressions and
/// division by zero, `AnalysisError::Eval` in concrete mode when the
/// result depends on a value the configuration does not fix.
pub fn evaluate(
    tokens: &[Token],
    table: &MacroTable,
    span: Span,
) -> Result<PresenceCondition, AnalysisError> {
    let evaluator = ExprEvaluator { table, span };
    let expr_tokens = evaluator.tokenize(tokens)?;
    if expr_tokens.is_empty() {
        return Err(AnalysisError::directive(span, "missing controlling expression"));
    }
    let mut pos = 0;
    let value = evaluator.parse_conditional(&expr_tokens, &mut pos)?;
    if pos != expr_tokens.len() {
        return Err(AnalysisError::directive(
            span,
            "unexpected tokens at end of expression",
        ));
    }
    if table.env().is_concrete() && !matches!(value, Value::Int(_)) {
        return Err(AnalysisError::eval(
            span,
            format!("controlling expression is not constant in a concrete configuration: {}", value.truth()),
        ));
    }
    Ok(value.truth())
}

/// Parse an integer constant with optional `u`/`l` suffixes
pub(crate) fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if body.is_empty() {
        return None;
    }
    u64::from_str_radix(body, radix).ok().map(|v| v as i64)
}

/// Value of a character constant such as `'a'`, `'\n'` or `L'\x41'`
pub(crate) fn parse_char(text: &str) -> Option<i64> {
    let start = text.find('\'')?;
    let inner = text[start + 1..].strip_suffix('\'')?;
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(i64::from(u32::from(first)));
    }
    let rest: String = chars.collect();
    let simple = match rest.as_str() {
        "n" => Some(10),
        "t" => Some(9),
        "r" => Some(13),
        "0" => Some(0),
        "a" => Some(7),
        "b" => Some(8),
        "f" => Some(12),
        "v" => Some(11),
        "\\" => Some(92),
        "'" => Some(39),
        "\"" => Some(34),
        "?" => Some(63),
        _ => None,
    };
    if simple.is_some() {
        return simple;
    }
    if let Some(hex) = rest.strip_prefix('x') {
        return i64::from_str_radix(hex, 16).ok();
    }
    i64::from_str_radix(&rest, 8).ok()
}

struct ExprEvaluator<'a> {
    table: &'a MacroTable,
    span: Span,
}

impl ExprEvaluator<'_> {
    fn error(&self, message: impl Into<String>) -> AnalysisError {
        AnalysisError::directive(self.span, message)
    }

    fn tokenize(&self, tokens: &[Token]) -> Result<Vec<ExprToken>, AnalysisError> {
        let mut out = Vec::with_capacity(tokens.len());
        for tok in tokens {
            let et = match tok.kind {
                TokenKind::Identifier => ExprToken::Identifier(tok.text.clone()),
                TokenKind::Number => match parse_integer(&tok.text) {
                    Some(n) => ExprToken::Number(n),
                    None => {
                        return Err(self.error(format!("invalid integer constant {}", tok.text)));
                    }
                },
                TokenKind::CharLiteral => match parse_char(&tok.text) {
                    Some(n) => ExprToken::Number(n),
                    None => {
                        return Err(self.error(format!("invalid character constant {}", tok.text)));
                    }
                },
                TokenKind::Punctuator => match tok.text.as_str() {
                    "(" => ExprToken::LParen,
                    ")" => ExprToken::RParen,
                    "!" => ExprToken::Not,
                    "+" => ExprToken::Plus,
                    "-" => ExprToken::Minus,
                    "*" => ExprToken::Multiply,
                    "/" => ExprToken::Divide,
                    "%" => ExprToken::Modulo,
                    "==" => ExprToken::Equal,
                    "!=" => ExprToken::NotEqual,
                    "<" => ExprToken::Less,
                    "<=" => ExprToken::LessEqual,
                    ">" => ExprToken::Greater,
                    ">=" => ExprToken::GreaterEqual,
                    "&&" => ExprToken::And,
                    "||" => ExprToken::Or,
                    "&" => ExprToken::BitAnd,
                    "|" => ExprToken::BitOr,
                    "^" => ExprToken::BitXor,
                    "~" => ExprToken::BitNot,
                    "<<" => ExprToken::ShiftLeft,
                    ">>" => ExprToken::ShiftRight,
                    "?" => ExprToken::Question,
                    ":" => ExprToken::Colon,
                    other => {
                        return Err(self.error(format!("invalid operator {other} in expression")));
                    }
                },
                TokenKind::StringLiteral
                | TokenKind::Unterminated
                | TokenKind::Directive
                | TokenKind::DirectiveEnd => {
                    return Err(self.error(format!("unexpected {} in expression", tok.text)));
                }
            };
            out.push(et);
        }
        Ok(out)
    }

    fn parse_conditional(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let cond = self.parse_or(tokens, pos)?;
        if tokens.get(*pos) != Some(&ExprToken::Question) {
            return Ok(cond);
        }
        *pos += 1;
        let then = self.parse_conditional(tokens, pos)?;
        if tokens.get(*pos) != Some(&ExprToken::Colon) {
            return Err(self.error("expected : in conditional expression"));
        }
        *pos += 1;
        let otherwise = self.parse_conditional(tokens, pos)?;

        let c = cond.truth();
        match c.as_constant() {
            Some(true) => Ok(then),
            Some(false) => Ok(otherwise),
            None => match (then.as_boolean(), otherwise.as_boolean()) {
                (Some(t), Some(e)) => Ok(Value::from_cond(c.and(&t).or(&c.not().and(&e)))),
                _ => Ok(Value::Opaque(format!(
                    "{}?{}:{}",
                    cond.term(),
                    then.term(),
                    otherwise.term()
                ))),
            },
        }
    }

    fn parse_or(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_and(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::Or) {
            *pos += 1;
            let right = self.parse_and(tokens, pos)?;
            left = Value::from_cond(left.truth().or(&right.truth()));
        }
        Ok(left)
    }

    fn parse_and(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_bit_or(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::And) {
            *pos += 1;
            let right = self.parse_bit_or(tokens, pos)?;
            left = Value::from_cond(left.truth().and(&right.truth()));
        }
        Ok(left)
    }

    fn parse_bit_or(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_bit_xor(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::BitOr) {
            *pos += 1;
            let right = self.parse_bit_xor(tokens, pos)?;
            left = self.binary(&ExprToken::BitOr, left, right)?;
        }
        Ok(left)
    }

    fn parse_bit_xor(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_bit_and(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::BitXor) {
            *pos += 1;
            let right = self.parse_bit_and(tokens, pos)?;
            left = self.binary(&ExprToken::BitXor, left, right)?;
        }
        Ok(left)
    }

    fn parse_bit_and(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_equality(tokens, pos)?;
        while tokens.get(*pos) == Some(&ExprToken::BitAnd) {
            *pos += 1;
            let right = self.parse_equality(tokens, pos)?;
            left = self.binary(&ExprToken::BitAnd, left, right)?;
        }
        Ok(left)
    }

    fn parse_equality(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_relational(tokens, pos)?;
        while let Some(op @ (ExprToken::Equal | ExprToken::NotEqual)) = tokens.get(*pos) {
            *pos += 1;
            let right = self.parse_relational(tokens, pos)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_relational(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_shift(tokens, pos)?;
        while let Some(
            op @ (ExprToken::Less
            | ExprToken::LessEqual
            | ExprToken::Greater
            | ExprToken::GreaterEqual),
        ) = tokens.get(*pos)
        {
            *pos += 1;
            let right = self.parse_shift(tokens, pos)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_shift(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_additive(tokens, pos)?;
        while let Some(op @ (ExprToken::ShiftLeft | ExprToken::ShiftRight)) = tokens.get(*pos) {
            *pos += 1;
            let right = self.parse_additive(tokens, pos)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_additive(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let mut left = self.parse_multiplicative(tokens, pos)?;
        while let Some(op @ (ExprToken::Plus | ExprToken::Minus)) = tokens.get(*pos) {
            *pos += 1;
            let right = self.parse_multiplicative(tokens, pos)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(
        &self,
        tokens: &[ExprToken],
        pos: &mut usize,
    ) -> Result<Value, AnalysisError> {
        let mut left = self.parse_unary(tokens, pos)?;
        while let Some(op @ (ExprToken::Multiply | ExprToken::Divide | ExprToken::Modulo)) =
            tokens.get(*pos)
        {
            *pos += 1;
            let right = self.parse_unary(tokens, pos)?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let Some(op) = tokens.get(*pos) else {
            return Err(self.error("unexpected end of expression"));
        };
        let symbol = match op {
            ExprToken::Not => "!",
            ExprToken::Minus => "-",
            ExprToken::Plus => "+",
            ExprToken::BitNot => "~",
            _ => return self.parse_primary(tokens, pos),
        };
        *pos += 1;
        let operand = self.parse_unary(tokens, pos)?;
        Ok(match (symbol, operand) {
            ("!", v) => Value::from_cond(v.truth().not()),
            ("+", v) => v,
            ("-", Value::Int(n)) => Value::Int(n.wrapping_neg()),
            ("~", Value::Int(n)) => Value::Int(!n),
            (_, v) => Value::Opaque(format!("{symbol}{}", v.term())),
        })
    }

    fn parse_primary(&self, tokens: &[ExprToken], pos: &mut usize) -> Result<Value, AnalysisError> {
        let Some(tok) = tokens.get(*pos) else {
            return Err(self.error("unexpected end of expression"));
        };
        *pos += 1;
        match tok {
            ExprToken::Number(n) => Ok(Value::Int(*n)),
            ExprToken::Identifier(ident) if ident == "defined" => {
                let parenthesized = tokens.get(*pos) == Some(&ExprToken::LParen);
                if parenthesized {
                    *pos += 1;
                }
                let Some(ExprToken::Identifier(name)) = tokens.get(*pos) else {
                    return Err(self.error("defined must be followed by identifier or (identifier)"));
                };
                *pos += 1;
                if parenthesized {
                    if tokens.get(*pos) != Some(&ExprToken::RParen) {
                        return Err(self.error("expected ) after defined(identifier"));
                    }
                    *pos += 1;
                }
                Ok(Value::from_cond(self.table.defined_condition(name)))
            }
            ExprToken::Identifier(ident) => {
                if self.table.external_condition(ident).is_false() {
                    Ok(Value::Int(0))
                } else {
                    Ok(Value::Opaque(ident.clone()))
                }
            }
            ExprToken::LParen => {
                let inner = self.parse_conditional(tokens, pos)?;
                if tokens.get(*pos) != Some(&ExprToken::RParen) {
                    return Err(self.error("expected )"));
                }
                *pos += 1;
                Ok(inner)
            }
            _ => Err(self.error("expected number, identifier, or (")),
        }
    }

    fn binary(&self, op: &ExprToken, left: Value, right: Value) -> Result<Value, AnalysisError> {
        if let (Value::Int(l), Value::Int(r)) = (&left, &right) {
            return self.fold_int(op, *l, *r).map(Value::Int);
        }

        if let (Some(l), Some(r)) = (left.as_boolean(), right.as_boolean()) {
            let logical = match op {
                ExprToken::BitAnd => Some(l.and(&r)),
                ExprToken::BitOr => Some(l.or(&r)),
                ExprToken::BitXor | ExprToken::NotEqual => Some(xor(&l, &r)),
                ExprToken::Equal => Some(xor(&l, &r).not()),
                _ => None,
            };
            if let Some(c) = logical {
                return Ok(Value::from_cond(c));
            }
        }

        let symbol = match op {
            ExprToken::Plus => "+",
            ExprToken::Minus => "-",
            ExprToken::Multiply => "*",
            ExprToken::Divide => "/",
            ExprToken::Modulo => "%",
            ExprToken::ShiftLeft => "<<",
            ExprToken::ShiftRight => ">>",
            ExprToken::BitAnd => "&",
            ExprToken::BitOr => "|",
            ExprToken::BitXor => "^",
            ExprToken::Equal => "==",
            ExprToken::NotEqual => "!=",
            ExprToken::Less => "<",
            ExprToken::LessEqual => "<=",
            ExprToken::Greater => ">",
            ExprToken::GreaterEqual => ">=",
            _ => return Err(self.error("invalid binary operator")),
        };
        if matches!(op, ExprToken::Divide | ExprToken::Modulo) && right == Value::Int(0) {
            return Err(self.error(if symbol == "/" { "division by zero" } else { "modulo by zero" }));
        }
        let term = format!("{}{symbol}{}", left.term(), right.term());
        let comparison = matches!(
            op,
            ExprToken::Equal
                | ExprToken::NotEqual
                | ExprToken::Less
                | ExprToken::LessEqual
                | ExprToken::Greater
                | ExprToken::GreaterEqual
        );
        if comparison {
            Ok(Value::Cond(PresenceCondition::atom(&term)))
        } else {
            Ok(Value::Opaque(term))
        }
    }

    fn fold_int(&self, op: &ExprToken, l: i64, r: i64) -> Result<i64, AnalysisError> {
        Ok(match op {
            ExprToken::Plus => l.wrapping_add(r),
            ExprToken::Minus => l.wrapping_sub(r),
            ExprToken::Multiply => l.wrapping_mul(r),
            ExprToken::Divide => {
                if r == 0 {
                    return Err(self.error("division by zero"));
                }
                l.wrapping_div(r)
            }
            ExprToken::Modulo => {
                if r == 0 {
                    return Err(self.error("modulo by zero"));
                }
                l.wrapping_rem(r)
            }
            ExprToken::ShiftLeft => l.wrapping_shl(r as u32),
            ExprToken::ShiftRight => l.wrapping_shr(r as u32),
            ExprToken::BitAnd => l & r,
            ExprToken::BitOr => l | r,
            ExprToken::BitXor => l ^ r,
            ExprToken::Equal => i64::from(l == r),
            ExprToken::NotEqual => i64::from(l != r),
            ExprToken::Less => i64::from(l < r),
            ExprToken::LessEqual => i64::from(l <= r),
            ExprToken::Greater => i64::from(l > r),
            ExprToken::GreaterEqual => i64::from(l >= r),
            _ => return Err(self.error("invalid binary operator")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::atom;
    use crate::config::ConfigEnvironment;
    use crate::lexer::lex_fragment;
    use pretty_assertions::assert_eq;

    fn eval_in(table: &MacroTable, text: &str) -> Result<PresenceCondition, AnalysisError> {
        evaluate(&lex_fragment(text).unwrap(), table, Span::default())
    }

    fn eval(text: &str) -> PresenceCondition {
        let table = MacroTable::new(&ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_"));
        eval_in(&table, text).unwrap()
    }

    #[test]
    fn integer_arithmetic_follows_c_precedence() {
        assert!(eval("1 + 2 * 3 == 7").is_true());
        assert!(eval("(1 << 4) - 1 == 0xf").is_true());
        assert!(eval("010 == 8 && 0b11 == 3 && 10UL == 10").is_true());
        assert!(eval("'A' == 65 && '\\n' == 10").is_true());
        assert!(eval("1 ? 0 : 1").is_false());
        assert!(eval("-1 < 0 && ~0 == -1").is_true());
    }

    #[test]
    fn defined_builds_conditions() {
        assert_eq!(eval("defined(CONFIG_A) && !defined CONFIG_B"), atom("CONFIG_A").and(&atom("CONFIG_B").not()));
        assert!(eval("defined(__KERNEL__)").is_false());
    }

    #[test]
    fn bitwise_operators_on_conditions_are_logical() {
        assert_eq!(
            eval("defined(CONFIG_PM_SLEEP) & defined(CONFIG_ACPI)"),
            atom("CONFIG_PM_SLEEP").and(&atom("CONFIG_ACPI"))
        );
        assert_eq!(eval("defined(CONFIG_A) | 0"), atom("CONFIG_A"));
        assert_eq!(eval("defined(CONFIG_A) == 0"), atom("CONFIG_A").not());
    }

    #[test]
    fn opaque_comparisons_become_atoms() {
        assert_eq!(eval("CONFIG_NR_CPUS >= 4"), atom("CONFIG_NR_CPUS>=4"));
        assert_eq!(eval("CONFIG_A"), atom("CONFIG_A!=0"));
        assert_eq!(eval("CONFIG_X + 1"), atom("(CONFIG_X+1)!=0"));
        assert_eq!(eval("CONFIG_X + 1 > 2"), atom("(CONFIG_X+1)>2"));
        assert!(eval("UNKNOWN_NAME + 1 == 1").is_true());
    }

    #[test]
    fn value_test_is_not_definedness() {
        let c = eval("defined(CONFIG_X) && !CONFIG_X");
        assert!(!c.is_false());
        assert_eq!(c, atom("CONFIG_X").and(&atom("CONFIG_X!=0").not()));
        assert_eq!(c.to_string(), "CONFIG_X && !CONFIG_X!=0");
        assert_eq!(c.to_string().parse::<PresenceCondition>().unwrap(), c);
    }

    #[test]
    fn errors_are_directive_errors() {
        let table = MacroTable::new(&ConfigEnvironment::symbolic());
        for bad in ["1 / 0", "5 % (2 - 2)", "(1", "1 +", "defined", "\"s\"", "1 ? 2", ""] {
            assert!(
                matches!(eval_in(&table, bad), Err(AnalysisError::Directive { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn concrete_mode_requires_constant_results() {
        let table = MacroTable::new(&ConfigEnvironment::concrete().with_defined(["CONFIG_A"]));
        assert!(eval_in(&table, "defined(CONFIG_B) || 1").unwrap().is_true());
        assert!(eval_in(&table, "CONFIG_B").unwrap().is_false());
    }
}
