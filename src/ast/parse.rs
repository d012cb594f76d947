//! Parse a string into tactics.

use crate::*;
use std::sync::Arc;

const KEYWORDS: &[&str] = &["def", "what", "how", "where"];

pub fn parse_program(filename: Option<String>, input: &str) -> Result<Vec<Tactic>, ParseError> {
    let (out, _rest) = program(&Context::new(filename, input))?;
    Ok(out)
}

pub fn parse_comprehension(
    filename: Option<String>,
    input: &str,
) -> Result<Comprehension, ParseError> {
    let (out, rest) = comprehension(&Context::new(filename, input))?;
    rest.expect_end()?;
    Ok(out)
}

pub fn parse_expr(filename: Option<String>, input: &str) -> Result<Expr, ParseError> {
    let (out, rest) = expr(&Context::new(filename, input))?;
    rest.expect_end()?;
    Ok(out)
}

/// A [`Span`] contains the file name and a pair of offsets representing the start and the end.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span(Arc<SrcFile>, usize, usize);

lazy_static::lazy_static! {
    pub static ref DUMMY_SPAN: Span = Span(Arc::new(SrcFile {name: None, contents: String::new()}), 0, 0);
}

impl Span {
    pub fn string(&self) -> &str {
        &self.0.contents[self.1..self.2]
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct SrcFile {
    name: Option<String>,
    contents: String,
}

struct Location {
    line: usize,
    col: usize,
}

impl SrcFile {
    pub fn get_location(&self, offset: usize) -> Location {
        let mut line = 1;
        let mut col = 1;
        for (i, c) in self.contents.char_indices() {
            if i == offset {
                break;
            }
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Location { line, col }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let start = self.0.get_location(self.1);
        let end = self.0.get_location(self.2.saturating_sub(1).max(self.1));
        let quote = self.string();
        match (&self.0.name, start.line == end.line) {
            (Some(filename), true) => write!(
                f,
                "In {}:{}-{} of {filename}: {quote}",
                start.line, start.col, end.col
            ),
            (Some(filename), false) => write!(
                f,
                "In {}:{}-{}:{} of {filename}: {quote}",
                start.line, start.col, end.line, end.col
            ),
            (None, false) => write!(
                f,
                "In {}:{}-{}:{}: {quote}",
                start.line, start.col, end.line, end.col
            ),
            (None, true) => write!(f, "In {}:{}-{}: {quote}", start.line, start.col, end.col),
        }
    }
}

#[derive(Clone, Debug)]
struct Context {
    source: Arc<SrcFile>,
    index: usize,
    /// End of the last token consumed, before any trailing whitespace.
    end: usize,
}

impl Context {
    pub fn new(name: Option<String>, contents: &str) -> Context {
        let mut next = Context {
            source: Arc::new(SrcFile {
                name,
                contents: contents.to_string(),
            }),
            index: 0,
            end: 0,
        };
        next.advance_past_whitespace();
        next
    }

    pub fn advance_text(&self, s: &str) -> Option<(Span, Context)> {
        if self.source.contents[self.index..].starts_with(s) {
            let mut next = self.clone();
            next.index += s.len();
            next.end = next.index;
            next.advance_past_whitespace();
            Some((Span(self.source.clone(), self.index, next.end), next))
        } else {
            None
        }
    }

    fn advance_past_whitespace(&mut self) {
        let mut iter = self.source.contents[self.index..].char_indices();
        loop {
            let end = match iter.next() {
                Some((_, c)) if c.is_whitespace() => None,
                Some((_, '#')) => {
                    loop {
                        if matches!(iter.next(), Some((_, '\n' | '\r')) | None) {
                            break;
                        }
                    }
                    None
                }
                Some((i, _)) => Some(self.index + i),
                None => Some(self.source.contents.len()),
            };
            if let Some(i) = end {
                self.index = i;
                return;
            }
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.index == self.source.contents.len()
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.is_at_end() {
            Ok(())
        } else {
            let span = Span(self.source.clone(), self.index, self.source.contents.len());
            Err(ParseError::TrailingInput(span))
        }
    }
}

type Res<T> = Result<(T, Context), ParseError>;

trait Parser<T>: Fn(&Context) -> Res<T> + Clone {}
impl<T, F: Fn(&Context) -> Res<T> + Clone> Parser<T> for F {}

fn text(s: &str) -> impl Parser<Span> + '_ {
    move |ctx| {
        if let Some((span, next)) = ctx.advance_text(s) {
            Ok((span, next))
        } else {
            let span = Span(ctx.source.clone(), ctx.index, ctx.index);
            Err(ParseError::ExpectedText(span, s.to_string()))
        }
    }
}

fn repeat<T>(parser: impl Parser<T>) -> impl Parser<Vec<T>> {
    move |ctx| {
        let mut vec = Vec::new();
        let mut next = ctx.clone();
        while let Ok((x, rest)) = parser(&next) {
            vec.push(x);
            next = rest;
        }
        Ok((vec, next))
    }
}

fn repeat1<T>(parser: impl Parser<T>) -> impl Parser<Vec<T>> {
    move |ctx| {
        let (x, next) = (parser.clone())(ctx)?;
        let (mut xs, next) = repeat(parser.clone())(&next)?;
        xs.insert(0, x);
        Ok((xs, next))
    }
}

fn repeat_all<T>(parser: impl Parser<T>) -> impl Parser<Vec<T>> {
    move |ctx| {
        let mut vec = Vec::new();
        let mut next = ctx.clone();
        while !next.is_at_end() {
            let (x, rest) = parser(&next)?;
            vec.push(x);
            next = rest;
        }
        Ok((vec, next))
    }
}

/// One or more `parser`s separated by `sep`.
fn sep_by1<T>(parser: impl Parser<T>, sep: &'static str) -> impl Parser<Vec<T>> {
    move |ctx| {
        let (x, next) = parser(ctx)?;
        let (mut xs, next) = repeat(map(sequence(text(sep), parser.clone()), snd))(&next)?;
        xs.insert(0, x);
        Ok((xs, next))
    }
}

fn choice<T>(a: impl Parser<T>, b: impl Parser<T>) -> impl Parser<T> {
    move |ctx| a(ctx).or_else(|_| b(ctx))
}

macro_rules! choices {
    ( $x:expr , ) => { $x };
    ( $x:expr $( , $xs:expr )+ , ) => {
        choice( $x, choices!( $( $xs , )+ ) )
    };
}

fn map<T, U>(parser: impl Parser<T>, f: impl Fn(T) -> U + Clone) -> impl Parser<U> {
    move |ctx| {
        let (x, next) = parser(ctx)?;
        Ok((f(x), next))
    }
}

fn sequence<T, U>(a: impl Parser<T>, b: impl Parser<U>) -> impl Parser<(T, U)> {
    move |ctx| {
        let (x, next) = a(ctx)?;
        let (y, next) = b(&next)?;
        Ok(((x, y), next))
    }
}

fn sequence3<T, U, V>(
    a: impl Parser<T>,
    b: impl Parser<U>,
    c: impl Parser<V>,
) -> impl Parser<(T, U, V)> {
    move |ctx| {
        let (x, next) = a(ctx)?;
        let (y, next) = b(&next)?;
        let (z, next) = c(&next)?;
        Ok(((x, y, z), next))
    }
}

macro_rules! sequences {
    ( $x:expr , ) => { $x };
    ( $x:expr $( , $xs:expr )+ , ) => {
        sequence( $x, sequences!( $( $xs , )+ ) )
    };
}

fn option<T>(parser: impl Parser<T>) -> impl Parser<Option<T>> {
    move |ctx| match parser(ctx) {
        Ok((x, next)) => Ok((Some(x), next)),
        Err(_) => Ok((None, ctx.clone())),
    }
}

/// Pairs the result of `parser` with the span of the text it consumed.
fn spanned<T>(parser: impl Parser<T>) -> impl Parser<(Span, T)> {
    move |ctx| {
        let (x, next) = parser(ctx)?;
        Ok(((Span(ctx.source.clone(), ctx.index, next.end), x), next))
    }
}

fn parens<T>(f: impl Parser<T>) -> impl Parser<T> {
    move |ctx| {
        let ((_, x, _), next) = choice(
            sequence3(text("("), f.clone(), text(")")),
            sequence3(text("["), f.clone(), text("]")),
        )(ctx)?;
        Ok((x, next))
    }
}

fn snd<T, U>((_, x): (T, U)) -> U {
    x
}

fn program(ctx: &Context) -> Res<Vec<Tactic>> {
    repeat_all(tactic)(ctx)
}

fn tactic(ctx: &Context) -> Res<Tactic> {
    map(
        spanned(sequences!(
            keyword("def"),
            ident,
            text("{"),
            keyword("what"),
            comprehension,
            keyword("how"),
            repeat1(comprehension),
            text("}"),
        )),
        |(span, (_, (name, (_, (_, (what, (_, (how, _))))))))| Tactic {
            span,
            name,
            what,
            how,
        },
    )(ctx)
}

fn comprehension(ctx: &Context) -> Res<Comprehension> {
    map(
        spanned(sequences!(
            ident,
            parens(sep_by1(ident, ",")),
            assignment,
            expr,
            map(option(sequence(keyword("where"), sep_by1(fold, ","))), |x| {
                x.map(snd).unwrap_or_default()
            }),
        )),
        |(span, (name, (indices, (assignment, (rhs, folds)))))| Comprehension {
            span,
            name,
            indices,
            assignment,
            rhs,
            folds,
        },
    )(ctx)
}

fn assignment(ctx: &Context) -> Res<Assignment> {
    choice(
        map(text("+="), |_| Assignment::Accumulate),
        map(text("="), |_| Assignment::Overwrite),
    )(ctx)
}

fn fold(ctx: &Context) -> Res<Fold> {
    map(
        spanned(sequence3(ident, text("="), sep_by1(ident, "*"))),
        |(span, (name, _, operands))| Fold {
            span,
            name,
            operands,
        },
    )(ctx)
}

fn expr(ctx: &Context) -> Res<Expr> {
    map(
        sequence(term, repeat(map(sequence(text("+"), term), snd))),
        |(first, rest)| rest.into_iter().fold(first, Expr::add),
    )(ctx)
}

fn term(ctx: &Context) -> Res<Expr> {
    map(
        sequence(factor, repeat(map(sequence(text("*"), factor), snd))),
        |(first, rest)| rest.into_iter().fold(first, Expr::mul),
    )(ctx)
}

fn factor(ctx: &Context) -> Res<Expr> {
    choices!(
        map(sequence(ident, parens(sep_by1(expr, ","))), |(name, args)| {
            Expr::Apply(name, args)
        }),
        map(ident, Expr::Ident),
        parens(expr),
    )(ctx)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn word(ctx: &Context) -> Res<Span> {
    let rest = &ctx.source.contents[ctx.index..];
    let len = rest
        .char_indices()
        .find(|&(i, c)| !(c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit())))
        .map_or(rest.len(), |(i, _)| i);
    let span = Span(ctx.source.clone(), ctx.index, ctx.index + len);
    if len == 0 {
        return Err(ParseError::ExpectedIdent(span));
    }

    let mut next = ctx.clone();
    next.index += len;
    next.end = next.index;
    next.advance_past_whitespace();
    Ok((span, next))
}

fn keyword(kw: &'static str) -> impl Parser<Span> {
    move |ctx| {
        let (span, next) = word(ctx).map_err(|err| match err {
            ParseError::ExpectedIdent(span) => ParseError::ExpectedText(span, kw.to_string()),
            err => err,
        })?;
        if span.string() == kw {
            Ok((span, next))
        } else {
            Err(ParseError::ExpectedText(span, kw.to_string()))
        }
    }
}

fn ident(ctx: &Context) -> Res<Symbol> {
    let (span, next) = word(ctx)?;
    if KEYWORDS.contains(&span.string()) {
        return Err(ParseError::ReservedKeyword(span));
    }
    Ok((Symbol::from(span.string()), next))
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}\nexpected {1}, found {}", .0.string())]
    ExpectedText(Span, String),
    #[error("{0}\nexpected identifier")]
    ExpectedIdent(Span),
    #[error("{0}\n{} is a keyword and cannot name an array or index", .0.string())]
    ReservedKeyword(Span),
    #[error("{0}\nunexpected trailing input")]
    TrailingInput(Span),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTGT: &str = r#"
    # transpose-transpose-gemm-transpose
    def TTGT {
      what
      C(a,b,c) += A(a,c,d) * B(d,b) + K(o)
      how
      D(f,b) = C(a,b,c) where f = a * c
      E(f,d) = A(a,c,d) where f = a * c
      D(f,b) += E(f,d) * B(d,b)
      C(a,b,c) = D(f,b) where f = a * c
    }
    "#;

    #[test]
    fn test_parse_tactic() {
        let tactics = parse_program(None, TTGT).unwrap();
        assert_eq!(tactics.len(), 1);
        let tactic = &tactics[0];
        assert_eq!(tactic.name.as_str(), "TTGT");
        assert_eq!(
            tactic.what.to_string(),
            "C(a, b, c) += A(a, c, d) * B(d, b) + K(o)"
        );
        assert_eq!(tactic.how.len(), 4);
        assert_eq!(tactic.how[0].assignment, Assignment::Overwrite);
        assert_eq!(tactic.how[2].assignment, Assignment::Accumulate);
        assert_eq!(
            tactic.how[0].folds,
            vec![Fold {
                span: tactic.how[0].folds[0].span.clone(),
                name: "f".into(),
                operands: vec!["a".into(), "c".into()],
            }]
        );
        assert_eq!(
            tactic.how[3].span.string(),
            "C(a,b,c) = D(f,b) where f = a * c"
        );
    }

    #[test]
    fn test_parser_display_roundtrip() {
        for s in [
            "A(i, k) * B(k, j)",
            "alpha * (A(i, k) * B(k, j))",
            "A(a, c, d) * B(d, b) + K(o)",
            "(A(i) + B(i)) * y(i)",
            "I(n, h + kh)",
            "X(i, j)",
        ] {
            let e = parse_expr(None, s).unwrap();
            assert_eq!(e.to_string(), s);
        }
    }

    #[test]
    fn test_precedence_and_associativity() {
        let e = parse_expr(None, "a * b + c * d + e").unwrap();
        let expected = Expr::add(
            Expr::add(
                Expr::mul(Expr::ident("a"), Expr::ident("b")),
                Expr::mul(Expr::ident("c"), Expr::ident("d")),
            ),
            Expr::ident("e"),
        );
        assert_eq!(e, expected);
    }

    #[test]
    fn test_multiple_where_clauses() {
        let c = parse_comprehension(None, "A(f, g) = B(a, b, c, d) where f = a * b, g = c * d")
            .unwrap();
        assert_eq!(c.folds.len(), 2);
        assert_eq!(c.folds[1].to_string(), "g = c * d");
        assert_eq!(c.to_string(), "A(f, g) = B(a, b, c, d) where f = a * b, g = c * d");
    }

    #[test]
    fn test_square_brackets() {
        let c = parse_comprehension(None, "C[i, j] += A[i, k] * B[k, j]").unwrap();
        assert_eq!(c.to_string(), "C(i, j) += A(i, k) * B(k, j)");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_comprehension(None, "C(i, j) += A(i, k) *"),
            Err(ParseError::TrailingInput(_))
        ));
        assert!(parse_comprehension(None, "C(where) = A(where)").is_err());
        assert!(matches!(
            ident(&Context::new(None, "where")),
            Err(ParseError::ReservedKeyword(_))
        ));
        assert!(parse_program(None, "def T { what C(i) = A(i) }").is_err());
        assert!(parse_program(None, "def T { C(i) = A(i) how B(i) = A(i) }").is_err());
        assert_eq!(parse_program(None, "  # nothing here\n").unwrap(), vec![]);
    }

    #[test]
    fn test_span_display() {
        let tactics = parse_program(Some("ttgt.tac".into()), TTGT).unwrap();
        let span = &tactics[0].how[1].span;
        assert_eq!(span.file_name(), Some("ttgt.tac"));
        assert_eq!(
            span.to_string(),
            "In 8:7-39 of ttgt.tac: E(f,d) = A(a,c,d) where f = a * c"
        );
        assert_eq!(DUMMY_SPAN.to_string(), "In 1:1-1: ");
    }
}
