//! Canonical-form recognizers.
//!
//! Each recognizer looks at one comprehension and returns `Ok(Some(info))` when
//! the statement has its shape. It returns `Ok(None)` when it does not, so the
//! next recognizer gets a try. An `Err` means the statement has the shape but
//! misuses it (for example a matmul with two `where` clauses). Such errors are
//! never retried. [`recognize`] tries them in priority order: matmul, matvec,
//! reshape, transpose, convolution.

use crate::matcher::*;
use crate::*;

/// Orientation of an operand: as stored, or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trans {
    N,
    T,
}

impl Display for Trans {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trans::N => f.write_str("N"),
            Trans::T => f.write_str("T"),
        }
    }
}

/// `C(i, j) += alpha * (A(i, k) * B(k, j))`, in any of four orientations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatMulInfo {
    pub output: Symbol,
    pub a: Symbol,
    pub b: Symbol,
    pub i: Symbol,
    pub j: Symbol,
    pub k: Symbol,
    pub trans_a: Trans,
    pub trans_b: Trans,
    pub alpha: Symbol,
    pub beta: Symbol,
    /// Number of physical dimensions folded into each logical axis.
    pub fold_m: usize,
    pub fold_n: usize,
    pub fold_k: usize,
}

/// `x(i) += alpha * (A(i, j) * y(j))`, or with `A(j, i)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatVecInfo {
    pub output: Symbol,
    pub a: Symbol,
    pub x: Symbol,
    pub trans: Trans,
    pub alpha: Symbol,
    pub beta: Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReshapeInfo {
    pub input: Symbol,
    pub output: Symbol,
    pub input_indices: Vec<Symbol>,
    pub output_indices: Vec<Symbol>,
    /// One or two fold clauses describing the grouping.
    pub folds: Vec<Fold>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeInfo {
    pub input: Symbol,
    pub output: Symbol,
    /// `ordering[d]` is the input position feeding output position `d`.
    pub ordering: Vec<usize>,
}

/// `O(a, b) += F(...) * I(...)`. The index arithmetic is not inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvInfo {
    pub output: Symbol,
    pub filter: Symbol,
    pub image: Symbol,
}

/// The recognized form of one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builder {
    MatMul(MatMulInfo),
    MatVec(MatVecInfo),
    Reshape(ReshapeInfo),
    Transpose(TransposeInfo),
    Conv(ConvInfo),
}

impl Builder {
    pub fn kind(&self) -> &'static str {
        match self {
            Builder::MatMul(_) => "matmul",
            Builder::MatVec(_) => "matvec",
            Builder::Reshape(_) => "reshape",
            Builder::Transpose(_) => "transpose",
            Builder::Conv(_) => "conv",
        }
    }
}

pub fn recognize(statement: &Comprehension) -> Result<Builder, Error> {
    let builder = if let Some(info) = matmul(statement)? {
        Builder::MatMul(info)
    } else if let Some(info) = matvec(statement)? {
        Builder::MatVec(info)
    } else if let Some(info) = reshape(statement)? {
        Builder::Reshape(info)
    } else if let Some(info) = transpose(statement)? {
        Builder::Transpose(info)
    } else if let Some(info) = conv(statement)? {
        Builder::Conv(info)
    } else {
        return Err(Error::Unrecognized(statement.span.clone()));
    };
    log::debug!("{} recognized as {}", statement.equation(), builder.kind());
    Ok(builder)
}

const ORIENTATIONS: [(Trans, Trans); 4] = [
    (Trans::N, Trans::N),
    (Trans::T, Trans::N),
    (Trans::N, Trans::T),
    (Trans::T, Trans::T),
];

fn one() -> Symbol {
    Symbol::from("1")
}

/// The coefficient for a matched leading scalar: its own name when it is an
/// identifier, `alpha` otherwise.
fn scalar_name(bindings: &Bindings, scalar: Placeholder) -> Symbol {
    bindings
        .get(scalar)
        .unwrap_or_else(|| Symbol::from("alpha"))
}

/// Matches `product` against `rhs`, first bare and then behind a leading
/// scalar factor. Returns the alpha coefficient on success.
fn match_scaled(
    product: impl Matcher,
    rhs: &Expr,
    bindings: &mut Bindings,
    scalar: Placeholder,
) -> Option<Symbol> {
    let mut bare = bindings.clone();
    if product.matches(rhs, &mut bare) {
        *bindings = bare;
        return Some(one());
    }
    if m_mul(m_scalar(scalar), &product).matches(rhs, bindings) {
        return Some(scalar_name(bindings, scalar));
    }
    None
}

pub fn matmul(statement: &Comprehension) -> Result<Option<MatMulInfo>, Error> {
    if statement.assignment != Assignment::Accumulate || statement.indices.len() != 2 {
        return Ok(None);
    }

    for (trans_a, trans_b) in ORIENTATIONS {
        let mut ctx = Bindings::new();
        let i = ctx.bound(statement.indices[0]);
        let j = ctx.bound(statement.indices[1]);
        let [k, scalar] = ctx.placeholders();
        let a = ctx.array(match trans_a {
            Trans::N => [i, k],
            Trans::T => [k, i],
        });
        let b = ctx.array(match trans_b {
            Trans::N => [k, j],
            Trans::T => [j, k],
        });

        let product = m_mul(m_access(a.clone()), m_access(b.clone()));
        let Some(alpha) = match_scaled(&product, &statement.rhs, &mut ctx, scalar) else {
            log::trace!("{} is not a {trans_a}{trans_b} matmul", statement.equation());
            continue;
        };
        let (Some(a), Some(b), Some(k)) = (ctx.get(a.id()), ctx.get(b.id()), ctx.get(k)) else {
            continue;
        };
        if statement.name == a || statement.name == b {
            log::trace!("{} writes one of its operands", statement.equation());
            continue;
        }

        let (i, j) = (statement.indices[0], statement.indices[1]);
        let (mut fold_m, mut fold_n, mut fold_k) = (1, 1, 1);
        match statement.folds.as_slice() {
            [] => {}
            [fold] => {
                let count = fold.operands.len();
                if fold.name == i {
                    fold_m = count;
                }
                if fold.name == j {
                    fold_n = count;
                }
                if fold.name == k {
                    fold_k = count;
                }
            }
            _ => return Err(Error::TooManyFolds(1, statement.span.clone())),
        }

        return Ok(Some(MatMulInfo {
            output: statement.name,
            a,
            b,
            i,
            j,
            k,
            trans_a,
            trans_b,
            alpha,
            beta: one(),
            fold_m,
            fold_n,
            fold_k,
        }));
    }
    Ok(None)
}

pub fn matvec(statement: &Comprehension) -> Result<Option<MatVecInfo>, Error> {
    if statement.assignment != Assignment::Accumulate || statement.indices.len() != 1 {
        return Ok(None);
    }

    for trans in [Trans::N, Trans::T] {
        let mut ctx = Bindings::new();
        let i = ctx.bound(statement.indices[0]);
        let [j, scalar] = ctx.placeholders();
        let a = ctx.array(match trans {
            Trans::N => [i, j],
            Trans::T => [j, i],
        });
        let x = ctx.array([j]);

        let product = m_mul(m_access(a.clone()), m_access(x.clone()));
        let Some(alpha) = match_scaled(&product, &statement.rhs, &mut ctx, scalar) else {
            log::trace!("{} is not a {trans} matvec", statement.equation());
            continue;
        };
        let (Some(a), Some(x)) = (ctx.get(a.id()), ctx.get(x.id())) else {
            continue;
        };
        if statement.name == a || statement.name == x {
            continue;
        }
        return Ok(Some(MatVecInfo {
            output: statement.name,
            a,
            x,
            trans,
            alpha,
            beta: one(),
        }));
    }
    Ok(None)
}

/// The single access of a reshape or transpose, which must be the whole
/// right-hand side with identifier arguments.
fn single_access(statement: &Comprehension) -> Result<Option<(Symbol, Vec<Symbol>)>, Error> {
    if statement.assignment != Assignment::Overwrite || statement.rhs.applications() != 1 {
        return Ok(None);
    }
    match statement.rhs.as_access() {
        Some(access) => Ok(Some(access)),
        None => Err(Error::Unsupported(
            format!(
                "expected a single array access with plain indices, found {}",
                statement.rhs
            ),
            statement.span.clone(),
        )),
    }
}

pub fn reshape(statement: &Comprehension) -> Result<Option<ReshapeInfo>, Error> {
    if statement.assignment != Assignment::Overwrite || statement.rhs.applications() != 1 {
        return Ok(None);
    }
    let arity = match &statement.rhs {
        Expr::Apply(_, args) => args.len(),
        _ => 0,
    };
    if arity == statement.indices.len() {
        return Ok(None);
    }
    let Some((input, input_indices)) = single_access(statement)? else {
        return Ok(None);
    };
    if statement.name == input {
        return Ok(None);
    }

    match statement.folds.len() {
        0 => return Ok(None),
        1 | 2 => {}
        _ => return Err(Error::TooManyFolds(2, statement.span.clone())),
    }
    if let Some(fold) = statement.folds.iter().find(|fold| fold.operands.len() < 2) {
        return Err(Error::TooFewFoldOperands(fold.name, statement.span.clone()));
    }

    Ok(Some(ReshapeInfo {
        input,
        output: statement.name,
        input_indices,
        output_indices: statement.indices.clone(),
        folds: statement.folds.clone(),
    }))
}

pub fn transpose(statement: &Comprehension) -> Result<Option<TransposeInfo>, Error> {
    if !statement.folds.is_empty() {
        return Ok(None);
    }
    let Some((input, input_indices)) = single_access(statement)? else {
        return Ok(None);
    };
    if input_indices.len() != statement.indices.len() || statement.name == input {
        return Ok(None);
    }
    let Some(ordering) = plan::ordering(&input_indices, &statement.indices) else {
        return Ok(None);
    };
    if plan::is_consecutive(&ordering) {
        log::trace!("{} does not permute anything", statement.equation());
        return Ok(None);
    }
    Ok(Some(TransposeInfo {
        input,
        output: statement.name,
        ordering,
    }))
}

pub fn conv(statement: &Comprehension) -> Result<Option<ConvInfo>, Error> {
    if statement.assignment != Assignment::Accumulate || statement.indices.len() != 2 {
        return Ok(None);
    }
    let mut ctx = Bindings::new();
    let [filter, image] = ctx.placeholders();
    if !m_mul(m_apply(filter), m_apply(image)).matches(&statement.rhs, &mut ctx) {
        return Ok(None);
    }
    let (Some(filter), Some(image)) = (ctx.get(filter), ctx.get(image)) else {
        return Ok(None);
    };
    if statement.name == filter || statement.name == image {
        return Ok(None);
    }
    Ok(Some(ConvInfo {
        output: statement.name,
        filter,
        image,
    }))
}
