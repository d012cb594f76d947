use tactics::*;

fn config() -> EmitConfig {
    EmitConfig {
        header: false,
        ..Default::default()
    }
}

/// Lowers a single `how` statement inside a throwaway tactic and returns its
/// builder lines.
fn lower(statement: &str) -> Result<Vec<String>, Error> {
    let _ = env_logger::builder().is_test(true).try_init();
    let program = format!("def T {{ what Z(z) = Y(z) how {statement} }}");
    let out = compile_program(None, &program, config())?;
    Ok(out
        .lines()
        .skip(1)
        .filter(|line| line.starts_with("  ") && line.trim() != "eraseOpBuilder")
        .map(|line| line.trim().trim_end_matches(',').to_string())
        .collect())
}

#[test]
fn test_matmul_nn() {
    assert_eq!(
        lower("C(m,n) += A(m,k) * B(k,n)").unwrap(),
        vec![
            "matmulBuilder<StrExpr<\"N\">, StrExpr<\"N\">, M<1>, N<1>, K<1>, Constant<\"1\">, \
             Constant<\"1\">, Inputs<[\"A\",\"B\"]>, Outputs<[\"C\"]>>"
        ]
    );
}

#[test]
fn test_matmul_tt() {
    assert_eq!(
        lower("C(i,j) += A(k,i) * B(j,k)").unwrap(),
        vec![
            "matmulBuilder<StrExpr<\"T\">, StrExpr<\"T\">, M<1>, N<1>, K<1>, Constant<\"1\">, \
             Constant<\"1\">, Inputs<[\"A\",\"B\"]>, Outputs<[\"C\"]>>"
        ]
    );
}

#[test]
fn test_matmul_orientations() {
    for (statement, flags) in [
        ("C(i,j) += A(i,k) * B(k,j)", "StrExpr<\"N\">, StrExpr<\"N\">"),
        ("C(i,j) += A(k,i) * B(k,j)", "StrExpr<\"T\">, StrExpr<\"N\">"),
        ("C(i,j) += A(i,k) * B(j,k)", "StrExpr<\"N\">, StrExpr<\"T\">"),
        ("C(i,j) += A(k,i) * B(j,k)", "StrExpr<\"T\">, StrExpr<\"T\">"),
    ] {
        let lines = lower(statement).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(
            lines[0].starts_with(&format!("matmulBuilder<{flags}, ")),
            "{statement}: {}",
            lines[0]
        );
        assert!(lines[0].ends_with("Inputs<[\"A\",\"B\"]>, Outputs<[\"C\"]>>"));
    }
}

#[test]
fn test_matvec_t() {
    assert_eq!(
        lower("x(i) += A(j,i) * y(j)").unwrap(),
        vec![
            "matvecBuilder<StrExpr<\"T\">, Inputs<[\"A\",\"y\"]>, Outputs<[\"x\"]>, \
             Constant<\"1\">, Constant<\"1\">>"
        ]
    );
}

#[test]
fn test_alpha_is_the_source_name() {
    let lines = lower("C(i,j) += alpha * (A(i,k) * B(k,j))").unwrap();
    assert!(lines[0].contains("Constant<\"alpha\">, Constant<\"1\">"));
    let lines = lower("x(i) += alpha * (A(i,j) * y(j))").unwrap();
    assert!(lines[0].contains("Constant<\"alpha\">, Constant<\"1\">"));
    let lines = lower("C(i,j) += A(i,k) * B(k,j)").unwrap();
    assert!(lines[0].contains("Constant<\"1\">, Constant<\"1\">"));
}

#[test]
fn test_unrecognized_statement() {
    let err = lower("C(i,j) += A(i,j) + B(i,j)").unwrap_err();
    assert!(matches!(err, Error::Unrecognized(_)));
    let message = err.to_string();
    assert!(message.contains("C(i,j) += A(i,j) + B(i,j)"), "{message}");
    assert!(message.contains("Unrecognized builder"), "{message}");
}

#[test]
fn test_reshape_step_count() {
    // Already in order: a single reshape.
    assert_eq!(
        lower("E(f,d) = A(a,c,d) where f = a * c").unwrap(),
        vec!["reshapeBuilder<Inputs<[\"A\"]>, Outputs<[\"E\"]>, StrExpr<\"{{0, 1}, 2}\">>"]
    );
    // Out of order, fold on the output: permutation, then reshape.
    assert_eq!(
        lower("D(f,b) = C(a,b,c) where f = a * c").unwrap(),
        vec![
            "permutationBuilder<Inputs<[\"C\"]>, Outputs<[\"tmp0\"]>, StrExpr<\"{0,2,1}\">>",
            "reshapeBuilder<Inputs<[\"tmp0\"]>, Outputs<[\"D\"]>, StrExpr<\"{{0, 1}, 2}\">>",
        ]
    );
    // Out of order, fold on the input: reshape, then permutation.
    assert_eq!(
        lower("C(a,b,c) = D(f,b) where f = a * c").unwrap(),
        vec![
            "reshapeBuilder<Inputs<[\"D\"]>, Outputs<[\"tmp0\"]>, StrExpr<\"{{0, 1}, 2}\">>",
            "permutationBuilder<Inputs<[\"tmp0\"]>, Outputs<[\"C\"]>, StrExpr<\"{0,2,1}\">>",
        ]
    );
}

#[test]
fn test_temporaries_are_unique_per_run() {
    let mut emitter = Emitter::new(config());
    let program = r#"
        def First {
          what
          C(a,b,c) = A(a,b,c)
          how
          D(f,b) = A(a,b,c) where f = a * c
          C(a,b,c) = D(f,b) where f = a * c
        }
        def Second {
          what
          C(a,b,c) = A(a,b,c)
          how
          D(f,b) = A(a,b,c) where f = a * c
        }
    "#;
    let out = emitter.parse_and_emit_program(None, program).unwrap();
    let temps: Vec<_> = out
        .match_indices("Outputs<[\"tmp")
        .map(|(i, _)| {
            let rest = &out[i + "Outputs<[\"".len()..];
            rest[..rest.find('"').unwrap()].to_string()
        })
        .collect();
    assert_eq!(temps, ["tmp0", "tmp1", "tmp2"]);
    assert_eq!(emitter.symbols().last_emitted(), Some("tmp2".into()));
}

#[test]
fn test_specification_round_trip() {
    let out = compile_program(
        None,
        "def Copy { what B( i , j )=A(j,i) how B(i,j) = A(j,i) }",
        config(),
    )
    .unwrap();
    assert!(out.starts_with("def Copy : Tactics<\"B(i, j) = A(j, i)\", [\n"));
}

#[test]
fn test_where_in_specification() {
    let err = compile_program(
        None,
        "def W { what D(f) = C(a,c) where f = a * c how D(f) = C(a,c) where f = a * c }",
        config(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::WhereInSpecification(_)));
}

#[test]
fn test_ttgt() {
    let out = compile_program(
        Some("ttgt.tac".into()),
        r#"
        def TTGT {
          what
          C(a,b,c) += A(a,c,d) * B(d,b)
          how
          D(f,b) = C(a,b,c) where f = a * c
          E(f,d) = A(a,c,d) where f = a * c
          D(f,b) += E(f,d) * B(d,b) where f = a * c
          C(a,b,c) = D(f,b) where f = a * c
        }"#,
        config(),
    )
    .unwrap();
    assert_eq!(out, include_str!("ttgt.out"));
}

#[test]
fn test_errors_carry_the_statement() {
    let err = compile_program(
        Some("bad.tac".into()),
        "def Bad { what C(i) = A(i) how D(q,b) = C(a,b,c) where f = a * c }",
        config(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::FoldNotFound(..)));
    let span = err.span().unwrap();
    assert_eq!(span.file_name(), Some("bad.tac"));
    assert_eq!(span.string(), "D(q,b) = C(a,b,c) where f = a * c");
}
