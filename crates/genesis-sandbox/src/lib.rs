//! The trait DSL: a small, deliberately inexpressive language a Coder
//! Agent (or an operator, by hand) writes new entity behaviour in, plus
//! the validator that stands between untrusted source text and the live
//! [`genesis_world::registry::TraitRegistry`].
//!
//! Pipeline: [`lexer::lex`] -> [`parser::parse`] -> [`validator::validate`]
//! -> [`interpreter::DslTrait`]. Nothing past the validator ever sees
//! source text that hasn't cleared all nine checks.

/// The trait DSL's abstract syntax tree.
pub mod ast;
/// Tree-walking interpreter and the `Trait`-implementing wrapper.
pub mod interpreter;
/// Tokenizer.
pub mod lexer;
/// Recursive-descent parser.
pub mod parser;
/// The nine-step source validator.
pub mod validator;

pub use ast::{AssignOp, AssignTarget, BinOp, Builtin, ConstDecl, Expr, Method, Stmt, TraitDef, UnOp};
pub use interpreter::{DslTrait, RuntimeError};
pub use lexer::{lex, LexError, Token};
pub use parser::{parse, ParseError};
pub use validator::{content_hash, validate, ValidationError};
