//! # tactics
//! tactics recognizes linear-algebra idioms in tensor comprehensions, such as
//! matrix multiplication, matrix-vector products, transposes, reshapes and
//! convolutions. It lowers each one to a sequence of builder calls for a
//! downstream code generator.
//!
//! A program is a list of tactics:
//!
//! ```text
//! def TTGT {
//!   what
//!   C(a,b,c) += A(a,c,d) * B(d,b)
//!   how
//!   D(f,b) = C(a,b,c) where f = a * c
//!   E(f,d) = A(a,c,d) where f = a * c
//!   D(f,b) += E(f,d) * B(d,b)
//!   C(a,b,c) = D(f,b) where f = a * c
//! }
//! ```
//!
//! The `what` statement is the computation being replaced. It is only rendered
//! as the tag of the output record. Every `how` statement must be recognized by
//! one of the builders in [`recognize`]. [`plan`] then breaks it into primitive
//! steps, and the [`Emitter`] writes those steps out.
//!
//! ```
//! let out = tactics::compile_program(
//!     None,
//!     "def MM { what C(i,j) += A(i,k) * B(k,j) how C(i,j) += A(i,k) * B(k,j) }",
//!     tactics::EmitConfig { header: false, ..Default::default() },
//! )
//! .unwrap();
//! assert!(out.contains("matmulBuilder<StrExpr<\"N\">, StrExpr<\"N\">"));
//! ```
pub mod ast;
pub mod cli;
mod emit;
pub mod matcher;
pub mod plan;
pub mod recognize;
pub mod util;

pub use ast::*;
pub use emit::{EmitConfig, Emitter};
pub use plan::{plan, Operand, ReshapeMap, Step};
pub use recognize::{recognize, Builder, Trans};
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;
pub use util::SymbolTable;
use util::*;

pub type Symbol = symbol_table::GlobalSymbol;

/// Parses `input` and lowers every tactic in it with a fresh [`Emitter`].
pub fn compile_program(
    filename: Option<String>,
    input: &str,
    config: EmitConfig,
) -> Result<String, Error> {
    Emitter::new(config).parse_and_emit_program(filename, input)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ParseError(#[from] ParseError),
    #[error("{0}\nUnrecognized builder: no primitive matches this statement")]
    Unrecognized(Span),
    #[error("{1}\nFold variable {0} appears on neither side of the statement")]
    FoldNotFound(Symbol, Span),
    #[error("{1}\nFold variable {0} appears on both sides of the statement")]
    FoldOnBothSides(Symbol, Span),
    #[error("{2}\nIndex {1} folded into {0} is not on the expected side")]
    FoldOperandsMisplaced(Symbol, Symbol, Span),
    #[error("{1}\nFold {0} must group at least two indices")]
    TooFewFoldOperands(Symbol, Span),
    #[error("{1}\nExpected at most {0} where clause(s)")]
    TooManyFolds(usize, Span),
    #[error("{0}\nBoth sides must index the same dimensions, each exactly once")]
    IndexMismatch(Span),
    #[error("{1}\nUnsupported: {0}")]
    Unsupported(String, Span),
    #[error("{0}\nThe what statement cannot have where clauses")]
    WhereInSpecification(Span),
    #[error("{0}\nNo temporary has been emitted to read from")]
    MissingTemporary(Span),
    #[error("IO error: {0}: {1}")]
    IoError(PathBuf, std::io::Error),
    #[error(transparent)]
    FormatError(#[from] std::fmt::Error),
}

impl Error {
    /// The span of the offending statement, when there is one.
    pub fn span(&self) -> Option<&Span> {
        match self {
            Error::Unrecognized(span)
            | Error::IndexMismatch(span)
            | Error::WhereInSpecification(span)
            | Error::MissingTemporary(span)
            | Error::FoldNotFound(_, span)
            | Error::FoldOnBothSides(_, span)
            | Error::TooFewFoldOperands(_, span)
            | Error::TooManyFolds(_, span)
            | Error::Unsupported(_, span)
            | Error::FoldOperandsMisplaced(_, _, span) => Some(span),
            Error::ParseError(_) | Error::IoError(..) | Error::FormatError(_) => None,
        }
    }
}
