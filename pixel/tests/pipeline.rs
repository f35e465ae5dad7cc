use pixel::backends::recording::RecordingBuilder;
use pixel::backends::{BackendType, ModuleBuilder};
use pixel::ir::ast::{BinaryOperator, Expression, Statement};
use pixel::ir::instr::{Instr, LabelKind};
use pixel::{CompileError, CompileOptions, Location, parser, transform};

fn record(source: &str) -> RecordingBuilder {
    let mut builder = RecordingBuilder::new("test");
    pixel::build(source, &mut builder).unwrap();
    builder
}

#[test]
fn test_tokenize_parse_round_trip() {
    let program = parser::parse("let x = 1\necho x\n").unwrap();
    assert_eq!(
        program.statements,
        vec![
            Statement::VarDeclAssign {
                name: "x".into(),
                value: Expression::NumberLiteral { value: 1.0, location: Location::new(1, 9) },
                location: Location::new(1, 5),
            },
            Statement::Print {
                expression: Expression::Identifier { name: "x".into(), location: Location::new(2, 6) },
                location: Location::new(2, 1),
            },
        ]
    );
}

#[test]
fn test_declared_before_use() {
    let mut builder = RecordingBuilder::new("test");
    let err = pixel::build("echo x", &mut builder).unwrap_err();
    assert!(matches!(err, CompileError::ResolutionError { .. }));

    let builder = record("let x = 1\necho x");
    let main = builder.function("main").unwrap();
    assert_eq!(main.locals, vec!["x".to_string()]);
    assert!(main.body.contains(&Instr::LocalGet(0)));
}

#[test]
fn test_slots_ignore_use_order() {
    let builder = record("let a = 1\nlet b = 2\necho b\necho a");
    let main = builder.function("main").unwrap();
    assert_eq!(main.locals, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_chained_operators_nest_to_the_right() {
    let program = parser::parse("echo 1 + 2 * 3").unwrap();
    let Statement::Print { expression, .. } = &program.statements[0] else {
        panic!("expected a print statement");
    };
    let expected = Expression::BinaryExpr {
        left: Box::new(Expression::NumberLiteral { value: 1.0, location: Location::new(1, 6) }),
        op: BinaryOperator::Add,
        right: Box::new(Expression::BinaryExpr {
            left: Box::new(Expression::NumberLiteral { value: 2.0, location: Location::new(1, 10) }),
            op: BinaryOperator::Multiply,
            right: Box::new(Expression::NumberLiteral { value: 3.0, location: Location::new(1, 14) }),
            location: Location::new(1, 12),
        }),
        location: Location::new(1, 8),
    };
    assert_eq!(expression, &expected);
}

#[test]
fn test_sequential_and_nested_loops_get_distinct_labels() {
    let builder = record("while (0)\n  while (0) end\nend\nwhile (0) end");
    let main = builder.function("main").unwrap();

    let Instr::Block { label: first, body } = &main.body[0] else {
        panic!("expected a block");
    };
    let Instr::Loop { body: loop_body, .. } = &body[0] else {
        panic!("expected a loop");
    };
    let inner = loop_body
        .iter()
        .find_map(|i| match i {
            Instr::Block { label, .. } => Some(*label),
            _ => None,
        })
        .unwrap();
    let Instr::Block { label: last, .. } = &main.body[1] else {
        panic!("expected a block");
    };

    assert_eq!(first.kind, LabelKind::WhileExit);
    assert_eq!((first.id, inner.id, last.id), (0, 1, 2));
}

#[test]
fn test_repeated_compilations_start_fresh() {
    let source = "let a = 1\nwhile (a < 3) a = a + 1 end";
    let first = record(source);
    let second = record(source);
    assert_eq!(first.functions(), second.functions());
}

#[test]
fn test_entry_synthesis_collects_free_statements() {
    let program = parser::parse("let a = 1\nproc helper end\necho a\na = 2").unwrap();
    let program = transform::wrap_with_main(program);

    assert_eq!(program.statements.len(), 2);
    let Statement::ProcDecl { name, export, body, .. } = &program.statements[0] else {
        panic!("expected main first");
    };
    assert_eq!(name, "main");
    assert!(*export);
    assert_eq!(body.len(), 3);
    assert!(matches!(body[0], Statement::VarDeclAssign { .. }));
    assert!(matches!(body[1], Statement::Print { .. }));
    assert!(matches!(body[2], Statement::VarAssign { .. }));
    assert!(matches!(&program.statements[1], Statement::ProcDecl { name, .. } if name == "helper"));
}

#[test]
fn test_existing_main_is_not_duplicated() {
    let builder = record("proc helper end\nexport proc main\n  echo 1\nend");
    let names: Vec<&str> = builder.functions().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["helper", "main"]);
}

#[test]
fn test_program_without_statements_still_has_main() {
    let builder = record("// nothing here\n");
    let main = builder.function("main").unwrap();
    assert!(main.export);
    assert!(main.body.is_empty());
}

#[test]
fn test_unclosed_parenthesis() {
    let err = parser::parse("echo (1 + 2").unwrap_err();
    match err {
        CompileError::SyntaxError { location, .. } => assert_eq!(location, Location::new(1, 6)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_first_error_wins() {
    // the lexical error on line 2 is found before the unknown name on line 1
    let err = pixel::compile("echo x\nlet y = $", "bad", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::LexicalError { .. }));
    assert_eq!(err.location(), Some(Location::new(2, 9)));
}

#[test]
fn test_compile_to_wasm() {
    let artifact = pixel::compile(
        "let i = 0\nwhile (i < 3)\n  if ((i % 2) == 0) echo i else echo 0 - i end\n  i = i + 1\nend",
        "counter",
        &CompileOptions::default(),
    )
    .unwrap();

    assert_eq!(artifact.unit, "counter");
    assert_eq!(&artifact.binary[..4], b"\0asm");
    assert!(artifact.text.contains("(module $counter"));
    assert!(artifact.text.contains("(export \"main\""));
    assert!(artifact.text.contains("i32.rem_u"));
    assert!(artifact.text.contains("loop"));
    wasmparser::validate(&artifact.binary).unwrap();
}

#[test]
fn test_optimized_and_multi_proc_modules_validate() {
    let source = "\
let n = 10
while (n > 0)
  if (n >> 1) echo n << 2 else echo n && 1 end
  n = n - 1
end
proc helper
  let t = 1 || 0
  echo (t / 2) == 0.5
end
export proc tick
  echo 3 % 2
end";
    for optimize in [false, true] {
        let artifact = pixel::compile(source, "many", &CompileOptions { optimize }).unwrap();
        wasmparser::validate(&artifact.binary).unwrap();
    }
}

#[test]
fn test_proc_cannot_be_exported_as_memory() {
    let err = pixel::compile(
        "echo 1\nexport proc memory\n  echo 2\nend",
        "clash",
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::BackendError { .. }));

    let artifact = pixel::compile("proc memory\n  echo 2\nend", "private", &CompileOptions::default()).unwrap();
    wasmparser::validate(&artifact.binary).unwrap();
}

#[test]
fn test_optimize_folds_constants() {
    let options = CompileOptions { optimize: true };
    let mut builder = RecordingBuilder::new("folded");
    let artifact = pixel::compile_with("echo 1 + 2 * 3", "folded", &options, &mut builder).unwrap();

    assert_eq!(
        builder.function("main").unwrap().body,
        vec![Instr::F32Const(7.0), Instr::Call("echo".into())]
    );
    assert!(artifact.text.contains("f32.const 7"));
    assert!(artifact.binary.is_empty());

    let plain = pixel::compile("echo 1 + 2 * 3", "folded", &CompileOptions::default()).unwrap();
    let optimized = pixel::compile("echo 1 + 2 * 3", "folded", &options).unwrap();
    assert!(optimized.binary.len() < plain.binary.len());
}

#[test]
fn test_every_target_builds() {
    for target in BackendType::all() {
        let mut builder = target.create("any");
        pixel::build("let a = 1\necho a", builder.as_mut()).unwrap();
        assert!(!builder.emit_text().unwrap().is_empty());
    }
    assert_eq!(BackendType::from_name("listing"), Some(BackendType::Listing));
    assert_eq!(BackendType::from_name("x86"), None);
}
