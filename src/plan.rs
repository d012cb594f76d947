//! Index algebra: turns a recognized builder into primitive steps.
//!
//! Most builders become one step. A reshape whose folded indices are not
//! already adjacent and in order on the other side gets a permutation as well.
//! The permutation reads the input and the reshape writes the output when the
//! fold is on the output side. When the fold is on the input side, the reshape
//! reads the input and the permutation writes the output. The intermediate array is a
//! fresh temporary allocated by the emitter ([`Operand::Fresh`]) and read back
//! by the following step ([`Operand::Last`]).

use crate::recognize::*;
use crate::*;

/// An array a step reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Array(Symbol),
    /// A new temporary, allocated when the step is emitted.
    Fresh,
    /// The temporary most recently allocated.
    Last,
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Array(name) => write!(f, "{name}"),
            Operand::Fresh => f.write_str("<fresh>"),
            Operand::Last => f.write_str("<last>"),
        }
    }
}

/// Which dimensions of the higher-rank side collapse into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReshapeMap {
    /// Each inner vector is one dimension of the lower-rank side, listing the
    /// dimensions of the higher-rank side it spans.
    Groups(Vec<Vec<usize>>),
    /// Two fold groups written side by side, as found on the opposite side.
    Paired(Vec<usize>, Vec<usize>),
}

impl ReshapeMap {
    /// `len` dimensions where the `width` of them starting at `start` collapse
    /// into one and the rest stay as they are.
    pub fn collapse(len: usize, start: usize, width: usize) -> Self {
        let mut groups = Vec::with_capacity(len + 1 - width);
        let mut d = 0;
        while d < len {
            if d == start {
                groups.push((start..start + width).collect());
                d += width;
            } else {
                groups.push(vec![d]);
                d += 1;
            }
        }
        ReshapeMap::Groups(groups)
    }
}

struct Group<'a>(&'a [usize]);

impl Display for Group<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", ListDisplay(self.0, ", "))
    }
}

impl Display for ReshapeMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReshapeMap::Groups(groups) => {
                f.write_str("{")?;
                for (n, group) in groups.iter().enumerate() {
                    if n > 0 {
                        f.write_str(", ")?;
                    }
                    match group.as_slice() {
                        [d] => write!(f, "{d}")?,
                        group => write!(f, "{}", Group(group))?,
                    }
                }
                f.write_str("}")
            }
            ReshapeMap::Paired(first, second) => {
                write!(f, "{{{}, {}}}", Group(first), Group(second))
            }
        }
    }
}

/// One primitive builder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    MatMul(MatMulInfo),
    MatVec(MatVecInfo),
    Reshape {
        input: Operand,
        output: Operand,
        map: ReshapeMap,
    },
    Permutation {
        input: Operand,
        output: Operand,
        ordering: Vec<usize>,
    },
    Conv(ConvInfo),
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::MatMul(mm) => write!(
                f,
                "matmul({}, {}, {}, {}, {}, {}, {}, [{}, {}], [{}])",
                mm.trans_a,
                mm.trans_b,
                mm.fold_m,
                mm.fold_n,
                mm.fold_k,
                mm.alpha,
                mm.beta,
                mm.a,
                mm.b,
                mm.output
            ),
            Step::MatVec(mv) => write!(
                f,
                "matvec({}, [{}, {}], [{}], {}, {})",
                mv.trans, mv.a, mv.x, mv.output, mv.alpha, mv.beta
            ),
            Step::Reshape { input, output, map } => {
                write!(f, "reshape([{input}], [{output}], {map})")
            }
            Step::Permutation {
                input,
                output,
                ordering,
            } => write!(
                f,
                "permutation([{input}], [{output}], {{{}}})",
                ListDisplay(ordering, ",")
            ),
            Step::Conv(conv) => write!(
                f,
                "convolution([{}, {}], [{}])",
                conv.filter, conv.image, conv.output
            ),
        }
    }
}

/// Breaks a recognized builder into the steps that implement it, in order.
pub fn plan(builder: Builder, span: &Span) -> Result<Vec<Step>, Error> {
    let steps = match builder {
        Builder::MatMul(info) => vec![Step::MatMul(info)],
        Builder::MatVec(info) => vec![Step::MatVec(info)],
        Builder::Conv(info) => vec![Step::Conv(info)],
        Builder::Transpose(info) => vec![Step::Permutation {
            input: Operand::Array(info.input),
            output: Operand::Array(info.output),
            ordering: info.ordering,
        }],
        Builder::Reshape(info) => match info.folds.as_slice() {
            [fold] => plan_single_fold(&info, fold, span)?,
            [first, second] => vec![plan_paired_folds(&info, first, second, span)?],
            _ => return Err(Error::TooManyFolds(2, span.clone())),
        },
    };
    for step in &steps {
        log::debug!("  {step}");
    }
    Ok(steps)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Input,
    Output,
}

/// Finds which side of the reshape carries `fold`.
fn fold_side(info: &ReshapeInfo, fold: &Fold, span: &Span) -> Result<Side, Error> {
    let on_input = info.input_indices.contains(&fold.name);
    let on_output = info.output_indices.contains(&fold.name);
    match (on_input, on_output) {
        (true, false) => Ok(Side::Input),
        (false, true) => Ok(Side::Output),
        (false, false) => Err(Error::FoldNotFound(fold.name, span.clone())),
        (true, true) => Err(Error::FoldOnBothSides(fold.name, span.clone())),
    }
}

fn plan_single_fold(info: &ReshapeInfo, fold: &Fold, span: &Span) -> Result<Vec<Step>, Error> {
    let side = fold_side(info, fold, span)?;
    let (folded, other) = match side {
        Side::Input => (&info.input_indices, &info.output_indices),
        Side::Output => (&info.output_indices, &info.input_indices),
    };
    if let Some(operand) = fold.operands.iter().find(|v| !other.contains(v)) {
        return Err(Error::FoldOperandsMisplaced(fold.name, *operand, span.clone()));
    }

    let expanded = substitute(folded, fold.name, &fold.operands);
    let start = folded
        .iter()
        .position(|&name| name == fold.name)
        .ok_or_else(|| Error::FoldNotFound(fold.name, span.clone()))?;
    let map = ReshapeMap::collapse(expanded.len(), start, fold.operands.len());

    let (source, dest) = match side {
        Side::Input => (&expanded, &info.output_indices),
        Side::Output => (&info.input_indices, &expanded),
    };
    let ordering = ordering(source, dest).ok_or_else(|| Error::IndexMismatch(span.clone()))?;

    let input = Operand::Array(info.input);
    let output = Operand::Array(info.output);
    if is_consecutive(&ordering) {
        return Ok(vec![Step::Reshape { input, output, map }]);
    }

    log::debug!(
        "folding {} needs a permutation {{{}}}",
        fold.name,
        ListDisplay(&ordering, ",")
    );
    Ok(match side {
        Side::Output => vec![
            Step::Permutation {
                input,
                output: Operand::Fresh,
                ordering,
            },
            Step::Reshape {
                input: Operand::Last,
                output,
                map,
            },
        ],
        Side::Input => vec![
            Step::Reshape {
                input,
                output: Operand::Fresh,
                map,
            },
            Step::Permutation {
                input: Operand::Last,
                output,
                ordering,
            },
        ],
    })
}

/// Two folds become one reshape whose groups are the positions of each fold's
/// operands on the opposite side. Index order is taken as given, but both
/// sides must hold the same indices once the folds are expanded.
fn plan_paired_folds(
    info: &ReshapeInfo,
    first: &Fold,
    second: &Fold,
    span: &Span,
) -> Result<Step, Error> {
    let mut input = info.input_indices.clone();
    let mut output = info.output_indices.clone();
    let positions = |fold: &Fold, side: Side| -> Result<Vec<usize>, Error> {
        let other = match side {
            Side::Input => &info.output_indices,
            Side::Output => &info.input_indices,
        };
        fold.operands
            .iter()
            .map(|operand| {
                other
                    .iter()
                    .position(|name| name == operand)
                    .ok_or_else(|| Error::FoldOperandsMisplaced(fold.name, *operand, span.clone()))
            })
            .collect()
    };

    let sides = [fold_side(info, first, span)?, fold_side(info, second, span)?];
    let map = ReshapeMap::Paired(positions(first, sides[0])?, positions(second, sides[1])?);
    for (fold, side) in [first, second].into_iter().zip(sides) {
        let expanded = match side {
            Side::Input => &mut input,
            Side::Output => &mut output,
        };
        *expanded = substitute(expanded, fold.name, &fold.operands);
    }
    if ordering(&input, &output).is_none() {
        return Err(Error::IndexMismatch(span.clone()));
    }

    Ok(Step::Reshape {
        input: Operand::Array(info.input),
        output: Operand::Array(info.output),
        map,
    })
}

/// Replaces `name` in `indices` by `with`, in place.
pub fn substitute(indices: &[Symbol], name: Symbol, with: &[Symbol]) -> Vec<Symbol> {
    let mut out = Vec::with_capacity(indices.len() + with.len());
    for &index in indices {
        if index == name {
            out.extend_from_slice(with);
        } else {
            out.push(index);
        }
    }
    out
}

/// For each position of `dest`, the position in `source` holding the same
/// index. `None` unless both lists hold the same indices, each exactly once.
pub fn ordering(source: &[Symbol], dest: &[Symbol]) -> Option<Vec<usize>> {
    if source.len() != dest.len() {
        return None;
    }
    let source: IndexSet<Symbol> = source.iter().copied().collect();
    if source.len() != dest.len() {
        return None;
    }
    let mut seen = IndexSet::default();
    dest.iter()
        .map(|index| {
            if !seen.insert(*index) {
                return None;
            }
            source.get_index_of(index)
        })
        .collect()
}

/// Whether every position follows the previous one by exactly one.
pub fn is_consecutive(ordering: &[usize]) -> bool {
    ordering.windows(2).all(|w| w[1] == w[0] + 1)
}
