//! Optimization passes run by builders when optimization is requested.

use crate::ir::instr::Instr;

pub fn run(body: &mut Vec<Instr>) {
    let folded = fold_constants(std::mem::take(body));
    *body = strip_after_branch(folded);
}

/// Folds float arithmetic and comparisons whose operands are both constants.
fn fold_constants(body: Vec<Instr>) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(body.len());

    for instr in body {
        let instr = match instr {
            Instr::Block { label, body } => Instr::Block { label, body: fold_constants(body) },
            Instr::Loop { label, body } => Instr::Loop { label, body: fold_constants(body) },
            other => other,
        };

        let operands = match out.as_slice() {
            [.., Instr::F32Const(a), Instr::F32Const(b)] => Some((*a, *b)),
            _ => None,
        };

        let folded = operands.and_then(|(a, b)| fold(&instr, a, b));
        match folded {
            Some(value) => {
                out.truncate(out.len() - 2);
                out.push(value);
            }
            None => out.push(instr),
        }
    }

    out
}

fn fold(instr: &Instr, a: f32, b: f32) -> Option<Instr> {
    let flag = |cond: bool| Instr::I32Const(cond as i32);
    let folded = match instr {
        Instr::F32Add => Instr::F32Const(a + b),
        Instr::F32Sub => Instr::F32Const(a - b),
        Instr::F32Mul => Instr::F32Const(a * b),
        Instr::F32Div => Instr::F32Const(a / b),
        Instr::F32Lt => flag(a < b),
        Instr::F32Gt => flag(a > b),
        Instr::F32Le => flag(a <= b),
        Instr::F32Ge => flag(a >= b),
        Instr::F32Eq => flag(a == b),
        Instr::F32Ne => flag(a != b),
        _ => return None,
    };
    Some(folded)
}

/// Nothing after an unconditional branch in the same block can run.
fn strip_after_branch(body: Vec<Instr>) -> Vec<Instr> {
    let mut out = Vec::with_capacity(body.len());

    for instr in body {
        let instr = match instr {
            Instr::Block { label, body } => Instr::Block { label, body: strip_after_branch(body) },
            Instr::Loop { label, body } => Instr::Loop { label, body: strip_after_branch(body) },
            other => other,
        };
        let ends_block = matches!(instr, Instr::Br(_));
        out.push(instr);
        if ends_block {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::{Label, LabelKind};

    #[test]
    fn test_folds_nested_arithmetic() {
        // 1 + (2 * 3)
        let mut body = vec![
            Instr::F32Const(1.0),
            Instr::F32Const(2.0),
            Instr::F32Const(3.0),
            Instr::F32Mul,
            Instr::F32Add,
            Instr::Call("echo".into()),
        ];
        run(&mut body);
        assert_eq!(body, vec![Instr::F32Const(7.0), Instr::Call("echo".into())]);
    }

    #[test]
    fn test_comparison_folds_to_flag() {
        let mut body = vec![Instr::F32Const(0.0), Instr::F32Const(1.0), Instr::F32Gt, Instr::I32Eqz];
        run(&mut body);
        assert_eq!(body, vec![Instr::I32Const(0), Instr::I32Eqz]);
    }

    #[test]
    fn test_locals_are_not_folded() {
        let original = vec![Instr::LocalGet(0), Instr::F32Const(1.0), Instr::F32Add];
        let mut body = original.clone();
        run(&mut body);
        assert_eq!(body, original);
    }

    #[test]
    fn test_code_after_br_is_dropped() {
        let exit = Label::new(LabelKind::IfExit, 0);
        let mut body = vec![Instr::Block {
            label: exit,
            body: vec![Instr::Br(exit), Instr::F32Const(1.0), Instr::Call("echo".into())],
        }];
        run(&mut body);
        assert_eq!(body, vec![Instr::Block { label: exit, body: vec![Instr::Br(exit)] }]);
    }
}
