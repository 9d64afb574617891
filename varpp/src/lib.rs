#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Variability-aware C preprocessor analysis
//!
//! This library runs the C preprocessor over a translation unit without
//! fixing a configuration. Instead of producing one preprocessed text it
//! computes, for every token and statement, a presence condition: a
//! boolean formula over configuration macros (`CONFIG_*` style feature
//! flags) stating under which configurations the code is compiled.
//!
//! ## Features
//!
//! - Conditional compilation (`#if`, `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`)
//!   evaluated symbolically, including directives in the middle of a statement
//! - Macro definitions tagged with the condition they were defined under;
//!   alternative definitions expand into condition-tagged variants
//! - Object-like and function-like macros with stringizing, token pasting
//!   and variadic capture, so idioms such as `IS_ENABLED()` work unchanged
//! - Symbolic or concrete analysis driven by a [`ConfigEnvironment`]
//! - Parallel batch analysis of independent units
//!
//! ## Example
//!
//! ```rust
//! use varpp::{ConfigEnvironment, analyze_source};
//!
//! let code = r#"
//! #ifdef CONFIG_SMP
//! int cpus = 8;
//! #else
//! int cpus = 1;
//! #endif
//! "#;
//!
//! let env = ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_");
//! let artifact = analyze_source("cpus.c", code, &env).unwrap();
//! for block in artifact.blocks() {
//!     println!("{}: {}", block.condition, block.text);
//! }
//! ```

mod analyzer;
mod condition;
mod conditional;
mod config;
mod error;
mod expand;
mod expr;
mod lexer;
mod macro_def;
mod macro_table;
mod output;
mod token;

pub use analyzer::{Analyzer, SourceUnit, UnitOutcome, analyze_batch, analyze_source};
pub use condition::{ConditionParseError, Node, PresenceCondition, and, atom, not, or};
pub use conditional::{BranchKind, BranchRecord, ConditionalFrame, ConditionalStack};
pub use config::{AnalysisMode, ConfigEnvironment, DEFAULT_MAX_VARIANTS};
pub use error::{AnalysisError, Diagnostic, MacroError, RedefinitionOverlapWarning};
pub use expand::{ExpansionContext, Expander, Variant, spell_variants};
pub use expr::{Value, evaluate as evaluate_expression};
pub use lexer::{lex, lex_fragment};
pub use macro_def::{MacroDefinition, VA_ARGS};
pub use macro_table::{MacroEntry, MacroTable, Resolution};
pub use output::{Artifact, Block, Record, RecordContent, Statement};
pub use token::{Span, Token, TokenKind, spell};
