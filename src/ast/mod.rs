mod expr;
pub mod parse;

use crate::*;
pub use expr::*;
pub use parse::*;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assignment {
    /// `=`
    Overwrite,
    /// `+=`
    Accumulate,
}

impl Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assignment::Overwrite => f.write_str("="),
            Assignment::Accumulate => f.write_str("+="),
        }
    }
}

/// A `where` clause `f = a * c`: the index `f` ranges over the flattened
/// product of the ranges of `a` and `c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fold {
    pub span: Span,
    pub name: Symbol,
    pub operands: Vec<Symbol>,
}

impl Fold {
    pub fn new<S: Into<Symbol>>(name: impl Into<Symbol>, operands: impl IntoIterator<Item = S>) -> Self {
        Self {
            span: DUMMY_SPAN.clone(),
            name: name.into(),
            operands: operands.into_iter().map(Into::into).collect(),
        }
    }
}

impl Display for Fold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, ListDisplay(&self.operands, " * "))
    }
}

/// One tensor equation, e.g. `D(f, b) = C(a, b, c) where f = a * c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comprehension {
    pub span: Span,
    pub name: Symbol,
    pub indices: Vec<Symbol>,
    pub assignment: Assignment,
    pub rhs: Expr,
    pub folds: Vec<Fold>,
}

impl Comprehension {
    pub fn new<S: Into<Symbol>>(
        name: impl Into<Symbol>,
        indices: impl IntoIterator<Item = S>,
        assignment: Assignment,
        rhs: Expr,
    ) -> Self {
        Self {
            span: DUMMY_SPAN.clone(),
            name: name.into(),
            indices: indices.into_iter().map(Into::into).collect(),
            assignment,
            rhs,
            folds: vec![],
        }
    }

    pub fn with_fold(mut self, fold: Fold) -> Self {
        self.folds.push(fold);
        self
    }

    /// The statement without its `where` clauses.
    pub fn equation(&self) -> impl Display + '_ {
        struct Equation<'a>(&'a Comprehension);
        impl Display for Equation<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let c = self.0;
                write!(
                    f,
                    "{}({}) {} {}",
                    c.name,
                    ListDisplay(&c.indices, ", "),
                    c.assignment,
                    c.rhs
                )
            }
        }
        Equation(self)
    }
}

impl Display for Comprehension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.equation())?;
        if !self.folds.is_empty() {
            write!(f, " where {}", ListDisplay(&self.folds, ", "))?;
        }
        Ok(())
    }
}

/// `def Name { what <spec> how <statements> }`. The `what` statement names the
/// computation being replaced; the `how` statements are lowered in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tactic {
    pub span: Span,
    pub name: Symbol,
    pub what: Comprehension,
    pub how: Vec<Comprehension>,
}

impl Display for Tactic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "def {} {{", self.name)?;
        writeln!(f, "  what")?;
        writeln!(f, "  {}", self.what)?;
        writeln!(f, "  how")?;
        for statement in &self.how {
            writeln!(f, "  {statement}")?;
        }
        write!(f, "}}")
    }
}
