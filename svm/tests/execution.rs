use proptest::prelude::*;

use pixel::CompileError;
use pixel::backends::ModuleBuilder;
use pixel::backends::recording::RecordingBuilder;
use svm::{Machine, MachineConfig, Trap};

fn module(source: &str, optimize: bool) -> RecordingBuilder {
    let mut builder = RecordingBuilder::new("test");
    pixel::build(source, &mut builder).unwrap();
    if optimize {
        builder.optimize();
    }
    builder
}

fn run_with(source: &str, config: MachineConfig) -> Result<Vec<f32>, Trap> {
    let mut printed = Vec::<f32>::new();
    Machine::new(config).run(&module(source, false), "main", &mut printed)?;
    Ok(printed)
}

fn run(source: &str) -> Vec<f32> {
    run_with(source, MachineConfig::default()).unwrap()
}

#[test]
fn test_false_loop_never_prints() {
    assert!(run("let x = 0\nwhile (x > 1) echo 99 end").is_empty());
}

#[test]
fn test_counting_loop() {
    let source = "let i = 0\nwhile (i < 3)\n  echo i\n  i = i + 1\nend";
    assert_eq!(run(source), vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_if_else_picks_one_branch() {
    assert_eq!(run("let x = 5\nif (x > 3) echo 1 else echo 0 end"), vec![1.0]);
    assert_eq!(run("let x = 2\nif (x > 3) echo 1 else echo 0 end"), vec![0.0]);
    assert_eq!(run("if (0) echo 1 end\necho 2"), vec![2.0]);
}

#[test]
fn test_empty_else() {
    assert!(run("if (0) echo 1 else end").is_empty());
    assert_eq!(run("if (1) echo 1 else end"), vec![1.0]);
}

#[test]
fn test_nested_loops() {
    let source = "\
let i = 0
while (i < 2)
  let j = 0
  while (j < 2)
    echo (i * 10) + j
    j = j + 1
  end
  i = i + 1
end";
    assert_eq!(run(source), vec![0.0, 1.0, 10.0, 11.0]);
}

#[test]
fn test_right_nested_arithmetic() {
    assert_eq!(run("echo 1 + 2 * 3"), vec![7.0]);
    // 10 - (4 - 1)
    assert_eq!(run("echo 10 - 4 - 1"), vec![7.0]);
    assert_eq!(run("echo 1 / 4"), vec![0.25]);
}

#[test]
fn test_remainder_is_unsigned() {
    assert_eq!(run("echo 7 % 3"), vec![1.0]);
    assert_eq!(run("echo 7.9 % 3"), vec![1.0]);
    // -1 reinterpreted as 4294967295
    assert_eq!(run("echo -1 % 10"), vec![5.0]);
}

#[test]
fn test_remainder_traps() {
    let config = MachineConfig::default();
    assert_eq!(run_with("echo 7 % 0", config), Err(Trap::DivisionByZero));
    assert!(matches!(
        run_with("echo 3000000000 % 2", config),
        Err(Trap::InvalidConversion { .. })
    ));
}

#[test]
fn test_shifts_and_logic() {
    assert_eq!(run("echo 1 << 3"), vec![8.0]);
    assert_eq!(run("echo -16 >> 2"), vec![-4.0]);
    assert_eq!(run("echo 2 && 0"), vec![0.0]);
    assert_eq!(run("echo 0 || 3"), vec![1.0]);
    assert_eq!(run("echo 2 == 2"), vec![1.0]);
}

#[test]
fn test_logical_condition() {
    let source = "let a = 1\nlet b = 0\nif (a || b) echo 1 end\nif (a && b) echo 2 end";
    assert_eq!(run(source), vec![1.0]);
}

#[test]
fn test_explicit_main() {
    let source = "proc helper\n  echo 1\nend\nexport proc main\n  let x = 4\n  echo x\nend";
    assert_eq!(run(source), vec![4.0]);
}

#[test]
fn test_other_entry() {
    let source = "export proc tick\n  echo 3\nend";
    let mut printed = Vec::<f32>::new();
    Machine::new(MachineConfig::default())
        .run(&module(source, false), "tick", &mut printed)
        .unwrap();
    assert_eq!(printed, vec![3.0]);
}

#[test]
fn test_endless_loop_hits_step_limit() {
    let config = MachineConfig { max_steps: 1_000, trace: false };
    assert_eq!(run_with("while (1) end", config), Err(Trap::StepLimit { limit: 1_000 }));
}

#[test]
fn test_machine_can_be_reused() {
    let mut machine = Machine::new(MachineConfig { trace: true, ..MachineConfig::default() });
    let program = module("let a = 2\necho a", false);

    let mut first = Vec::<f32>::new();
    machine.run(&program, "main", &mut first).unwrap();
    let steps = machine.steps();
    let trace_len = machine.trace().len();

    let mut second = Vec::<f32>::new();
    machine.run(&program, "main", &mut second).unwrap();
    assert_eq!(first, second);
    assert_eq!(machine.steps(), steps);
    assert_eq!(machine.trace().len(), trace_len);
}

#[test]
fn test_compile_errors_stop_before_running() {
    let mut builder = RecordingBuilder::new("bad");
    let err = pixel::build("echo y", &mut builder).unwrap_err();
    assert!(matches!(err, CompileError::ResolutionError { .. }));
}

fn arithmetic() -> impl Strategy<Value = String> {
    let operand = (0u8..20).prop_map(|n| n.to_string());
    let operator = prop_oneof![Just("+"), Just("-"), Just("*")];
    (operand.clone(), prop::collection::vec((operator, operand), 0..4)).prop_map(|(first, rest)| {
        let mut expression = first;
        for (op, operand) in rest {
            expression.push_str(&format!(" {} {}", op, operand));
        }
        expression
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn false_condition_skips_the_body(start in -50i32..=1, bound in 1i32..50) {
        let source = format!("let x = {}\nwhile (x > {}) echo 99 end", start, bound);
        prop_assert!(run(&source).is_empty());
    }

    #[test]
    fn optimizing_keeps_behavior(expressions in prop::collection::vec(arithmetic(), 1..5)) {
        let source: String = expressions.iter().map(|e| format!("echo {}\n", e)).collect();

        let mut plain = Vec::<f32>::new();
        Machine::new(MachineConfig::default()).run(&module(&source, false), "main", &mut plain).unwrap();
        let mut optimized = Vec::<f32>::new();
        Machine::new(MachineConfig::default()).run(&module(&source, true), "main", &mut optimized).unwrap();

        prop_assert_eq!(plain, optimized);
    }
}
