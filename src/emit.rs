use crate::*;
use std::fmt::Write;

/// Options for rendering builder records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitConfig {
    /// Whether to start the output with a generated-file comment.
    pub header: bool,
    /// Number of spaces before each builder line.
    pub indent: usize,
}

impl Default for EmitConfig {
    fn default() -> Self {
        EmitConfig {
            header: true,
            indent: 2,
        }
    }
}

/// Lowers tactics to builder records.
///
/// An emitter holds the state of one run. Temporaries are numbered across
/// everything it emits, so one emitter should be used for all the tactics
/// that end up in the same output.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    symbols: SymbolTable,
    config: EmitConfig,
}

impl Emitter {
    pub fn new(config: EmitConfig) -> Self {
        Self {
            symbols: SymbolTable::default(),
            config,
        }
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn parse_and_emit_program(
        &mut self,
        filename: Option<String>,
        input: &str,
    ) -> Result<String, Error> {
        let tactics = parse_program(filename, input)?;
        let mut out = String::new();
        self.emit_program(&tactics, &mut out)?;
        Ok(out)
    }

    /// Writes the records for every tactic, or nothing if any of them fails.
    pub fn emit_program(&mut self, tactics: &[Tactic], out: &mut impl Write) -> Result<(), Error> {
        let mut program = String::new();
        if self.config.header {
            writeln!(
                program,
                "// Tactics: generated by tactics {}. Do not edit.",
                env!("CARGO_PKG_VERSION")
            )?;
        }
        for tactic in tactics {
            self.emit_tactic(tactic, &mut program)?;
        }
        out.write_str(&program)?;
        Ok(())
    }

    /// Writes the record for one tactic. Nothing is written if any statement
    /// fails to lower.
    pub fn emit_tactic(&mut self, tactic: &Tactic, out: &mut impl Write) -> Result<(), Error> {
        log::debug!("Lowering tactic {}", tactic.name);
        let mut body = String::new();
        for statement in &tactic.how {
            self.emit_statement(statement, &mut body)?;
        }
        writeln!(
            out,
            "def {} : Tactics<\"{}\", [",
            tactic.name,
            self.emit_specification(&tactic.what)?
        )?;
        out.write_str(&body)?;
        writeln!(out, "{:indent$}eraseOpBuilder", "", indent = self.config.indent)?;
        writeln!(out, "]>;")?;
        Ok(())
    }

    /// Renders the `what` statement, which is never lowered.
    pub fn emit_specification(&self, what: &Comprehension) -> Result<String, Error> {
        if !what.folds.is_empty() {
            return Err(Error::WhereInSpecification(what.span.clone()));
        }
        Ok(what.equation().to_string())
    }

    pub fn emit_statement(
        &mut self,
        statement: &Comprehension,
        out: &mut impl Write,
    ) -> Result<(), Error> {
        for name in std::iter::once(statement.name).chain(array_names(&statement.rhs)) {
            if self.symbols.is_reserved(name.as_str()) {
                log::warn!(
                    "{}\nArray {name} may collide with a generated temporary",
                    statement.span
                );
            }
        }
        let builder = recognize(statement)?;
        for step in plan(builder, &statement.span)? {
            self.emit_step(&step, &statement.span, out)?;
        }
        Ok(())
    }

    fn resolve(&mut self, operand: Operand, span: &Span) -> Result<Symbol, Error> {
        match operand {
            Operand::Array(name) => Ok(name),
            Operand::Fresh => Ok(self.symbols.fresh()),
            Operand::Last => self
                .symbols
                .last_emitted()
                .ok_or_else(|| Error::MissingTemporary(span.clone())),
        }
    }

    fn emit_step(&mut self, step: &Step, span: &Span, out: &mut impl Write) -> Result<(), Error> {
        write!(out, "{:indent$}", "", indent = self.config.indent)?;
        match step {
            Step::MatMul(mm) => write!(
                out,
                "matmulBuilder<StrExpr<\"{}\">, StrExpr<\"{}\">, M<{}>, N<{}>, K<{}>, \
                 Constant<\"{}\">, Constant<\"{}\">, Inputs<[\"{}\",\"{}\"]>, Outputs<[\"{}\"]>>",
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
            )?,
            Step::MatVec(mv) => write!(
                out,
                "matvecBuilder<StrExpr<\"{}\">, Inputs<[\"{}\",\"{}\"]>, Outputs<[\"{}\"]>, \
                 Constant<\"{}\">, Constant<\"{}\">>",
                mv.trans, mv.a, mv.x, mv.output, mv.alpha, mv.beta
            )?,
            Step::Reshape { input, output, map } => {
                // The input is resolved first so that `Last` refers to the
                // temporary written by the previous step.
                let input = self.resolve(*input, span)?;
                let output = self.resolve(*output, span)?;
                write!(
                    out,
                    "reshapeBuilder<Inputs<[\"{input}\"]>, Outputs<[\"{output}\"]>, StrExpr<\"{map}\">>"
                )?
            }
            Step::Permutation {
                input,
                output,
                ordering,
            } => {
                let input = self.resolve(*input, span)?;
                let output = self.resolve(*output, span)?;
                write!(
                    out,
                    "permutationBuilder<Inputs<[\"{input}\"]>, Outputs<[\"{output}\"]>, StrExpr<\"{{{}}}\">>",
                    ListDisplay(ordering, ",")
                )?
            }
            Step::Conv(conv) => write!(
                out,
                "convBuilder<Inputs<[\"{}\", \"{}\"]>, Outputs<[\"{}\"]>, \
                 StrExpr<\"{{1, 1, 1, 1}}\">, StrExpr<\"{{0, 0}}\">>",
                conv.filter, conv.image, conv.output
            )?,
        }
        writeln!(out, ",")?;
        Ok(())
    }
}

fn array_names(expr: &Expr) -> Vec<Symbol> {
    let mut names = vec![];
    expr.walk(&mut |e| {
        if let Expr::Apply(name, _) = e {
            names.push(*name);
        }
    });
    names
}
