use crate::*;

use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BinOp {
    Add,
    Mul,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => f.write_str("+"),
            BinOp::Mul => f.write_str("*"),
        }
    }
}

/// The right-hand side of a comprehension.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Expr {
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    /// An array access `A(i, j)`.
    Apply(Symbol, Vec<Expr>),
    Ident(Symbol),
}

impl Expr {
    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::Mul(Box::new(lhs), Box::new(rhs))
    }

    pub fn apply<S: Into<Symbol>>(name: impl Into<Symbol>, indices: impl IntoIterator<Item = S>) -> Self {
        Expr::Apply(
            name.into(),
            indices.into_iter().map(|i| Expr::Ident(i.into())).collect(),
        )
    }

    pub fn ident(name: impl Into<Symbol>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn as_binary(&self) -> Option<(BinOp, &Expr, &Expr)> {
        match self {
            Expr::Add(lhs, rhs) => Some((BinOp::Add, &**lhs, &**rhs)),
            Expr::Mul(lhs, rhs) => Some((BinOp::Mul, &**lhs, &**rhs)),
            Expr::Apply(..) | Expr::Ident(_) => None,
        }
    }

    pub fn children(&self) -> Vec<&Self> {
        match self {
            Expr::Add(lhs, rhs) | Expr::Mul(lhs, rhs) => vec![&**lhs, &**rhs],
            Expr::Apply(_, args) => args.iter().collect(),
            Expr::Ident(_) => vec![],
        }
    }

    /// Visits `self` and all of its descendants in preorder.
    pub fn walk(&self, pre: &mut impl FnMut(&Self)) {
        pre(self);
        self.children().into_iter().for_each(|child| child.walk(pre));
    }

    /// Number of array accesses in the tree.
    pub fn applications(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |e| {
            if matches!(e, Expr::Apply(..)) {
                count += 1;
            }
        });
        count
    }

    /// If this is an access whose indices are all plain identifiers, returns
    /// the array name and the index names.
    pub fn as_access(&self) -> Option<(Symbol, Vec<Symbol>)> {
        let Expr::Apply(name, args) = self else {
            return None;
        };
        let indices = args
            .iter()
            .map(|arg| match arg {
                Expr::Ident(index) => Some(*index),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        Some((*name, indices))
    }

    fn fmt_operand(&self, f: &mut std::fmt::Formatter<'_>, parens: bool) -> std::fmt::Result {
        if parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Infix rendering; `*` binds tighter than `+` and both associate to the
/// left, so parentheses are only printed where the tree shape needs them.
impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Add(lhs, rhs) => {
                lhs.fmt_operand(f, false)?;
                write!(f, " + ")?;
                rhs.fmt_operand(f, matches!(**rhs, Expr::Add(..)))
            }
            Expr::Mul(lhs, rhs) => {
                lhs.fmt_operand(f, matches!(**lhs, Expr::Add(..)))?;
                write!(f, " * ")?;
                rhs.fmt_operand(f, rhs.as_binary().is_some())
            }
            Expr::Apply(name, args) => write!(f, "{name}({})", ListDisplay(args, ", ")),
            Expr::Ident(name) => Display::fmt(name, f),
        }
    }
}
