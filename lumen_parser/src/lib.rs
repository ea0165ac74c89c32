//! Lumen parser.
//!
//! This crate provides the complete front end for Lumen source text: a lexer,
//! a recursive descent parser with Pratt expression parsing, the tail-call
//! marker recognizer, and a canonical printer. Marker recognition happens
//! during parsing and produces a dedicated AST node; which marker surface is
//! active is chosen through [`MarkerGrammar`].

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

pub use ast::*;
pub use lexer::{tokenize, Lexer};
pub use parser::{parse, parse_with, MarkerGrammar, Parser, MARKER_NOT_CALL};
pub use printer::print;
pub use token::{Keyword, Token, TokenKind};
