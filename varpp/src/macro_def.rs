use crate::condition::PresenceCondition;
use crate::error::AnalysisError;
use crate::token::{Span, Token, TokenKind};

/// Name bound to the variadic capture of `...`
pub const VA_ARGS: &str = "__VA_ARGS__";

/// A macro definition as written in one `#define`
#[derive(Clone, Debug)]
pub struct MacroDefinition {
    /// Macro name
    pub name: String,
    /// `None` for object-like macros
    pub params: Option<Vec<String>>,
    /// Name of the trailing variadic capture, `__VA_ARGS__` for a bare `...`
    pub variadic: Option<String>,
    /// Replacement list
    pub body: Vec<Token>,
    /// Ambient condition at the point of definition
    pub condition: PresenceCondition,
    /// Location of the `#define`
    pub span: Span,
}

impl MacroDefinition {
    /// Object-like macro with the given replacement list
    #[must_use]
    pub fn object(name: &str, body: Vec<Token>, condition: PresenceCondition, span: Span) -> Self {
        Self {
            name: name.to_string(),
            params: None,
            variadic: None,
            body,
            condition,
            span,
        }
    }

    /// Whether the macro takes a parameter list
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Number of named (non-variadic) parameters
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.as_ref().map_or(0, Vec::len)
    }

    /// Position of `name` among the parameters, the variadic capture last
    #[must_use]
    pub fn param_index(&self, name: &str) -> Option<usize> {
        let params = self.params.as_ref()?;
        if let Some(i) = params.iter().position(|p| p == name) {
            return Some(i);
        }
        (self.variadic.as_deref() == Some(name)).then_some(params.len())
    }

    /// Token-identical redefinition: same parameters and the same
    /// replacement list with the same whitespace separation
    #[must_use]
    pub fn same_definition(&self, other: &MacroDefinition) -> bool {
        self.params == other.params
            && self.variadic == other.variadic
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .enumerate()
                .all(|(i, (a, b))| {
                    a.kind == b.kind
                        && a.text == b.text
                        && (i == 0 || a.leading_space == b.leading_space)
                })
    }
}

/// Parse the argument tokens of a `#define` directive
///
/// # Errors
/// Returns `AnalysisError::Directive` when the name is missing or the
/// parameter list is malformed or repeats a parameter.
pub(crate) fn parse_define(
    args: &[Token],
    span: Span,
    condition: PresenceCondition,
) -> Result<MacroDefinition, AnalysisError> {
    let Some(name_tok) = args.first().filter(|t| t.is_identifier()) else {
        return Err(AnalysisError::directive(span, "#define requires a macro name"));
    };
    let name = name_tok.text.as_str();

    let function_like = args
        .get(1)
        .is_some_and(|t| t.is_punct("(") && !t.leading_space);
    if !function_like {
        let body = normalize_body(&args[1..]);
        return Ok(MacroDefinition::object(name, body, condition, span));
    }

    let mut params: Vec<String> = Vec::new();
    let mut variadic = None;
    let mut i = 2;
    let malformed = |msg: &str| AnalysisError::directive(span, format!("#define {name}: {msg}"));

    if args.get(i).is_some_and(|t| t.is_punct(")")) {
        i += 1;
    } else {
        loop {
            let Some(tok) = args.get(i) else {
                return Err(malformed("missing ')' in parameter list"));
            };
            if tok.is_punct("...") {
                variadic = Some(VA_ARGS.to_string());
                i += 1;
            } else if tok.is_identifier() {
                if tok.text == VA_ARGS {
                    return Err(malformed("__VA_ARGS__ can not be a parameter name"));
                }
                if params.contains(&tok.text) {
                    return Err(malformed(&format!("duplicate parameter {}", tok.text)));
                }
                i += 1;
                if args.get(i).is_some_and(|t| t.is_punct("...")) {
                    variadic = Some(tok.text.clone());
                    i += 1;
                } else {
                    params.push(tok.text.clone());
                }
            } else {
                return Err(malformed(&format!("unexpected '{}' in parameter list", tok.text)));
            }

            match args.get(i) {
                Some(t) if t.is_punct(")") => {
                    i += 1;
                    break;
                }
                Some(t) if t.is_punct(",") && variadic.is_none() => i += 1,
                Some(t) => {
                    return Err(malformed(&format!("unexpected '{}' in parameter list", t.text)));
                }
                None => return Err(malformed("missing ')' in parameter list")),
            }
        }
    }

    Ok(MacroDefinition {
        name: name.to_string(),
        params: Some(params),
        variadic,
        body: normalize_body(&args[i..]),
        condition,
        span,
    })
}

/// Parse the name operand of `#undef`, `#ifdef` or `#ifndef`
pub(crate) fn directive_name<'t>(
    directive: &str,
    args: &'t [Token],
    span: Span,
) -> Result<&'t str, AnalysisError> {
    match args.first() {
        Some(t) if t.kind == TokenKind::Identifier => Ok(&t.text),
        _ => Err(AnalysisError::directive(
            span,
            format!("#{directive} requires a macro name"),
        )),
    }
}

fn normalize_body(tokens: &[Token]) -> Vec<Token> {
    let mut body = tokens.to_vec();
    if let Some(first) = body.first_mut() {
        first.leading_space = false;
    }
    body
}
