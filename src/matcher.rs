//! Structural matchers over [`Expr`] trees.
//!
//! A pattern is assembled from placeholders handed out by a [`Bindings`] and
//! the combinators below ([`m_add`], [`m_mul`], [`m_any`], [`m_access`], ...),
//! then run against an expression with [`Matcher::matches`]. A successful match
//! leaves every placeholder it touched bound to a concrete name. A failed match
//! may leave some bindings behind, so each top-level attempt starts from a
//! fresh [`Bindings`].
//!
//! ```
//! use tactics::ast::parse_expr;
//! use tactics::matcher::*;
//!
//! let expr = parse_expr(None, "A(i, k) * B(k, j)").unwrap();
//! let mut ctx = Bindings::new();
//! let [i, j, k] = ctx.placeholders();
//! let a = ctx.array([i, k]);
//! let b = ctx.array([k, j]);
//! assert!(m_mul(m_access(a.clone()), m_access(b)).matches(&expr, &mut ctx));
//! assert_eq!(ctx.get(a.id()).unwrap().as_str(), "A");
//! assert_eq!(ctx.get(k).unwrap().as_str(), "k");
//! ```

use crate::*;
use smallvec::SmallVec;

/// A matching-time variable standing for one index or array name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Placeholder(u32);

/// An array placeholder together with the placeholders of its indices, in
/// positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayPlaceholder {
    id: Placeholder,
    indices: SmallVec<[Placeholder; 4]>,
}

impl ArrayPlaceholder {
    pub fn id(&self) -> Placeholder {
        self.id
    }

    pub fn indices(&self) -> &[Placeholder] {
        &self.indices
    }

    pub fn arity(&self) -> usize {
        self.indices.len()
    }
}

/// The unification context of one match attempt.
///
/// Allocates placeholders and records the name each one is bound to. A
/// placeholder binds at most one name: binding it again to the same name
/// succeeds, binding it to a different name fails.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    next_id: u32,
    assigned: HashMap<Placeholder, Symbol>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placeholder(&mut self) -> Placeholder {
        let placeholder = Placeholder(self.next_id);
        self.next_id += 1;
        placeholder
    }

    pub fn placeholders<const N: usize>(&mut self) -> [Placeholder; N] {
        std::array::from_fn(|_| self.placeholder())
    }

    pub fn array(&mut self, indices: impl IntoIterator<Item = Placeholder>) -> ArrayPlaceholder {
        ArrayPlaceholder {
            id: self.placeholder(),
            indices: indices.into_iter().collect(),
        }
    }

    /// A fresh placeholder already bound to `value`.
    pub fn bound(&mut self, value: Symbol) -> Placeholder {
        let placeholder = self.placeholder();
        self.assigned.insert(placeholder, value);
        placeholder
    }

    /// Unifies `placeholder` with `value`.
    #[must_use]
    pub fn bind(&mut self, placeholder: Placeholder, value: Symbol) -> bool {
        match self.assigned.entry(placeholder) {
            HEntry::Vacant(entry) => {
                entry.insert(value);
                true
            }
            HEntry::Occupied(entry) if *entry.get() == value => true,
            HEntry::Occupied(entry) => {
                log::trace!(
                    "{placeholder:?} is bound to {}, cannot rebind it to {value}",
                    entry.get()
                );
                false
            }
        }
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<Symbol> {
        self.assigned.get(&placeholder).copied()
    }

    pub fn is_bound(&self, placeholder: Placeholder) -> bool {
        self.assigned.contains_key(&placeholder)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

pub trait Matcher {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool;
}

impl<M: Matcher + ?Sized> Matcher for &M {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        (**self).matches(expr, bindings)
    }
}

/// Matches `lhs op rhs`, left operand first. Operands are never swapped.
#[derive(Debug, Clone)]
pub struct BinaryOpMatch<L, R> {
    op: BinOp,
    lhs: L,
    rhs: R,
}

impl<L: Matcher, R: Matcher> Matcher for BinaryOpMatch<L, R> {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        match expr.as_binary() {
            Some((op, lhs, rhs)) if op == self.op => {
                self.lhs.matches(lhs, bindings) && self.rhs.matches(rhs, bindings)
            }
            _ => false,
        }
    }
}

/// Accepts any expression. With a capture placeholder, a bare identifier is
/// also bound to it; other expressions are accepted without binding.
#[derive(Debug, Clone)]
pub struct AnyValue {
    capture: Option<Placeholder>,
}

impl Matcher for AnyValue {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        match (self.capture, expr) {
            (Some(placeholder), Expr::Ident(name)) => bindings.bind(placeholder, *name),
            _ => true,
        }
    }
}

/// Matches an access `A(i, j, ...)` whose indices are plain identifiers,
/// unifying every index with its placeholder and then the array name.
#[derive(Debug, Clone)]
pub struct Access {
    array: ArrayPlaceholder,
}

impl Matcher for Access {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        let Expr::Apply(name, args) = expr else {
            return false;
        };
        if args.len() != self.array.arity() {
            return false;
        }
        for (arg, &index) in args.iter().zip(self.array.indices()) {
            let Expr::Ident(arg) = arg else {
                return false;
            };
            if !bindings.bind(index, *arg) {
                return false;
            }
        }
        bindings.bind(self.array.id(), *name)
    }
}

/// Matches any access regardless of its indices, binding only the array name.
#[derive(Debug, Clone)]
pub struct AnyAccess {
    array: Placeholder,
}

impl Matcher for AnyAccess {
    fn matches(&self, expr: &Expr, bindings: &mut Bindings) -> bool {
        match expr {
            Expr::Apply(name, _) => bindings.bind(self.array, *name),
            _ => false,
        }
    }
}

pub fn m_add<L: Matcher, R: Matcher>(lhs: L, rhs: R) -> BinaryOpMatch<L, R> {
    BinaryOpMatch {
        op: BinOp::Add,
        lhs,
        rhs,
    }
}

pub fn m_mul<L: Matcher, R: Matcher>(lhs: L, rhs: R) -> BinaryOpMatch<L, R> {
    BinaryOpMatch {
        op: BinOp::Mul,
        lhs,
        rhs,
    }
}

pub fn m_any() -> AnyValue {
    AnyValue { capture: None }
}

/// A leading scalar factor; its name is captured when it is an identifier.
pub fn m_scalar(capture: Placeholder) -> AnyValue {
    AnyValue {
        capture: Some(capture),
    }
}

pub fn m_access(array: ArrayPlaceholder) -> Access {
    Access { array }
}

pub fn m_apply(array: Placeholder) -> AnyAccess {
    AnyAccess { array }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_expr;

    fn expr(s: &str) -> Expr {
        parse_expr(None, s).unwrap()
    }

    #[test]
    fn bind_is_idempotent_and_consistent() {
        let mut ctx = Bindings::new();
        let p = ctx.placeholder();
        assert!(!ctx.is_bound(p));
        assert!(ctx.bind(p, "i".into()));
        assert!(ctx.bind(p, "i".into()));
        assert!(!ctx.bind(p, "j".into()));
        assert_eq!(ctx.get(p), Some("i".into()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn placeholders_are_distinct() {
        let mut ctx = Bindings::new();
        let [a, b, c] = ctx.placeholders();
        let array = ctx.array([a, b]);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(array.id(), c);
        assert_eq!(array.indices(), &[a, b]);
        assert!(ctx.is_empty());
    }

    #[test]
    fn bound_placeholder_constrains_the_match() {
        let mut ctx = Bindings::new();
        let i = ctx.bound("m".into());
        let [k] = ctx.placeholders();
        let a = ctx.array([i, k]);
        assert_eq!(ctx.get(i), Some("m".into()));
        assert!(!m_access(a.clone()).matches(&expr("A(k, m)"), &mut ctx));

        let mut ctx = Bindings::new();
        let i = ctx.bound("m".into());
        let [k] = ctx.placeholders();
        let a = ctx.array([i, k]);
        assert!(m_access(a).matches(&expr("A(m, k)"), &mut ctx));
        assert_eq!(ctx.get(k), Some("k".into()));
    }

    #[test]
    fn access_unifies_shared_index() {
        let mut ctx = Bindings::new();
        let [i, j, k] = ctx.placeholders();
        let a = ctx.array([i, k]);
        let b = ctx.array([k, j]);
        let pattern = m_mul(m_access(a.clone()), m_access(b.clone()));

        assert!(pattern.matches(&expr("A(m, p) * B(p, n)"), &mut ctx));
        assert_eq!(ctx.get(i), Some("m".into()));
        assert_eq!(ctx.get(j), Some("n".into()));
        assert_eq!(ctx.get(k), Some("p".into()));
        assert_eq!(ctx.get(b.id()), Some("B".into()));

        let mut ctx2 = Bindings::new();
        let [i, j, k] = ctx2.placeholders();
        let a = ctx2.array([i, k]);
        let b = ctx2.array([k, j]);
        let pattern = m_mul(m_access(a), m_access(b));
        assert!(!pattern.matches(&expr("A(m, p) * B(q, n)"), &mut ctx2));
    }

    #[test]
    fn access_rejects_arity_and_non_identifiers() {
        let mut ctx = Bindings::new();
        let [i, j] = ctx.placeholders();
        let a = m_access(ctx.array([i, j]));
        assert!(!a.matches(&expr("A(i)"), &mut ctx));
        assert!(!a.matches(&expr("A(i, j, k)"), &mut ctx));
        assert!(!a.matches(&expr("A(i, j + k)"), &mut ctx));
        assert!(!a.matches(&expr("alpha"), &mut ctx));
        assert!(a.matches(&expr("A(i, j)"), &mut ctx));
    }

    #[test]
    fn array_name_must_unify() {
        // The same array placeholder used twice must name the same array.
        let mut ctx = Bindings::new();
        let [i] = ctx.placeholders();
        let a = ctx.array([i]);
        let pattern = m_add(m_access(a.clone()), m_access(a));
        assert!(pattern.matches(&expr("x(i) + x(i)"), &mut Bindings::new()));
        assert!(!pattern.matches(&expr("x(i) + y(i)"), &mut ctx));
    }

    #[test]
    fn operator_and_order_are_fixed() {
        let mut ctx = Bindings::new();
        let [i] = ctx.placeholders();
        let a = ctx.array([i]);
        let s = ctx.placeholder();
        let pattern = m_mul(m_scalar(s), m_access(a));
        assert!(!pattern.matches(&expr("x(i) * alpha"), &mut ctx.clone()));
        assert!(!pattern.matches(&expr("alpha + x(i)"), &mut ctx.clone()));
        assert!(pattern.matches(&expr("alpha * x(i)"), &mut ctx));
        assert_eq!(ctx.get(s), Some("alpha".into()));
    }

    #[test]
    fn wildcards() {
        let mut ctx = Bindings::new();
        assert!(m_any().matches(&expr("A(i) * B(i) + c"), &mut ctx));
        assert!(ctx.is_empty());

        let s = ctx.placeholder();
        assert!(m_scalar(s).matches(&expr("(a + b)"), &mut ctx));
        assert!(!ctx.is_bound(s));

        let f = ctx.placeholder();
        assert!(m_apply(f).matches(&expr("I(n, h + kh)"), &mut ctx));
        assert_eq!(ctx.get(f), Some("I".into()));
        assert!(!m_apply(f).matches(&expr("n"), &mut ctx));
    }
}
