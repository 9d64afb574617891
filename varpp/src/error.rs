use serde::Serialize;
use thiserror::Error;

use crate::condition::PresenceCondition;
use crate::token::Span;

/// Errors that abort the analysis of a translation unit
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    /// Unterminated string/char literal or block comment
    #[error("{span}: lex error: {message}")]
    Lex {
        /// Where the error was raised
        span: Span,
        /// What went wrong
        message: String,
    },
    /// Unbalanced conditional directives or malformed directive arguments
    #[error("{span}: directive error: {message}")]
    Directive {
        /// Where the error was raised
        span: Span,
        /// What went wrong
        message: String,
    },
    /// Concrete evaluation could not resolve a macro or controlling expression
    #[error("{span}: evaluation error: {message}")]
    Eval {
        /// Where the error was raised
        span: Span,
        /// What went wrong
        message: String,
    },
}

impl AnalysisError {
    pub(crate) fn lex(span: Span, message: impl Into<String>) -> Self {
        Self::Lex {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn directive(span: Span, message: impl Into<String>) -> Self {
        Self::Directive {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn eval(span: Span, message: impl Into<String>) -> Self {
        Self::Eval {
            span,
            message: message.into(),
        }
    }

    /// Location the error was raised at
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            Self::Lex { span, .. } | Self::Directive { span, .. } | Self::Eval { span, .. } => {
                *span
            }
        }
    }
}

/// A failed macro invocation; the invocation is left unexpanded
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{span}: macro error in {name}: {message}")]
pub struct MacroError {
    /// Macro being invoked
    pub name: String,
    /// Location of the invocation
    pub span: Span,
    /// What went wrong
    pub message: String,
}

impl MacroError {
    pub(crate) fn new(name: &str, span: Span, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            span,
            message: message.into(),
        }
    }
}

/// A `#define` whose guard is not provably disjoint from an earlier live definition
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{span}: {name} redefined while the definition at {previous} may still apply under {overlap}")]
pub struct RedefinitionOverlapWarning {
    /// Redefined macro
    pub name: String,
    /// Location of the new `#define`
    pub span: Span,
    /// Location of the overlapped definition
    pub previous: Span,
    /// Condition under which both definitions could apply
    pub overlap: PresenceCondition,
}

/// Non-fatal findings recorded alongside the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A `#define` overlapping an earlier live definition
    Redefinition(RedefinitionOverlapWarning),
    /// An invocation left unexpanded
    Macro(MacroError),
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Redefinition(w) => w.fmt(f),
            Diagnostic::Macro(e) => e.fmt(f),
        }
    }
}
