//! Lowers the AST into structured instructions for a [`ModuleBuilder`].
//!
//! Every procedure gets its own symbol table; the label counter lives as long
//! as one call to [`generate`], so ids never repeat inside a unit and never
//! carry over into the next one.

pub mod scope;

use std::collections::HashSet;

use crate::backends::ModuleBuilder;
use crate::error::CompileError;
use crate::ir::ast::{BinaryOperator, Expression, Program, Statement};
use crate::ir::instr::{Effect, FunctionDef, Instr, Label, LabelKind};
use crate::span::Location;

use scope::{LabelCounter, SymbolTable};

pub fn generate(program: &Program, builder: &mut dyn ModuleBuilder) -> Result<(), CompileError> {
    Generator::new().compile_program(program, builder)
}

/// What an expression leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Float,
    Int,
    /// i32 holding 0 or 1
    Bool,
}

struct Generator {
    labels: LabelCounter,
    symbols: SymbolTable,
    print: Effect,
}

impl Generator {
    fn new() -> Self {
        Self {
            labels: LabelCounter::new(),
            symbols: SymbolTable::new(),
            print: Effect::echo(),
        }
    }

    fn compile_program(&mut self, program: &Program, builder: &mut dyn ModuleBuilder) -> Result<(), CompileError> {
        let mut declared = HashSet::new();
        let mut functions = Vec::new();
        for statement in &program.statements {
            match statement {
                Statement::ProcDecl { name, export, body, location } => {
                    if !declared.insert(name.as_str()) {
                        return Err(CompileError::resolution(
                            *location,
                            format!("Procedure `{}` is already declared", name),
                        ));
                    }
                    functions.push(self.compile_proc(name, *export, body)?);
                }
                // only reachable when `main` was declared explicitly
                other => {
                    return Err(CompileError::syntax(
                        other.location(),
                        "Statement outside of a procedure in a program that declares `main`",
                    ));
                }
            }
        }

        // nothing reaches the builder until every procedure has lowered
        builder.import_effect(self.print.clone())?;
        for function in functions {
            builder.add_function(function)?;
        }

        Ok(())
    }

    fn compile_proc(&mut self, name: &str, export: bool, statements: &[Statement]) -> Result<FunctionDef, CompileError> {
        self.symbols = SymbolTable::new();

        let mut body = Vec::new();
        for statement in statements {
            self.compile_statement(statement, &mut body)?;
        }

        let locals = std::mem::take(&mut self.symbols).into_names();
        Ok(FunctionDef {
            name: name.to_string(),
            export,
            locals,
            body,
        })
    }

    fn compile_statement(&mut self, statement: &Statement, out: &mut Vec<Instr>) -> Result<(), CompileError> {
        match statement {
            Statement::Print { expression, .. } => {
                let kind = self.compile_expression(expression, out)?;
                coerce(kind, ValueKind::Float, out);
                out.push(Instr::Call(self.print.name.clone()));
            }
            Statement::VarDeclAssign { name, value, .. } => {
                let kind = self.compile_expression(value, out)?;
                coerce(kind, ValueKind::Float, out);
                let slot = self.symbols.declare(name);
                out.push(Instr::LocalSet(slot));
            }
            Statement::VarAssign { name, value, location } => {
                let kind = self.compile_expression(value, out)?;
                coerce(kind, ValueKind::Float, out);
                let slot = self.resolve(name, *location)?;
                out.push(Instr::LocalSet(slot));
            }
            Statement::While { condition, body, location } => {
                self.compile_while(condition, body, *location, out)?;
            }
            Statement::If { condition, then_branch, else_branch, location } => {
                self.compile_if(condition, then_branch, else_branch.as_deref(), *location, out)?;
            }
            Statement::ProcDecl { location, .. } => {
                return Err(CompileError::codegen(
                    *location,
                    "Procedure declaration inside a procedure body",
                ));
            }
        }
        Ok(())
    }

    /// block $exit
    ///   loop $loop
    ///     <cond> i32.eqz br_if $exit
    ///     <body>
    ///     br $loop
    fn compile_while(
        &mut self,
        condition: &Expression,
        body: &[Statement],
        location: Location,
        out: &mut Vec<Instr>,
    ) -> Result<(), CompileError> {
        let id = self.labels.next_id(location)?;
        let exit = Label::new(LabelKind::WhileExit, id);
        let head = Label::new(LabelKind::WhileLoop, id);

        let mut inner = Vec::new();
        self.compile_condition(condition, &mut inner)?;
        inner.push(Instr::BrIf(exit));
        for statement in body {
            self.compile_statement(statement, &mut inner)?;
        }
        inner.push(Instr::Br(head));

        out.push(Instr::Block {
            label: exit,
            body: vec![Instr::Loop { label: head, body: inner }],
        });
        Ok(())
    }

    /// Without `else`:
    ///   block $then  <cond> i32.eqz br_if $then  <then>
    /// With `else`:
    ///   block $exit
    ///     block $then  <cond> i32.eqz br_if $then  <then>  br $exit
    ///     <else>
    fn compile_if(
        &mut self,
        condition: &Expression,
        then_branch: &[Statement],
        else_branch: Option<&[Statement]>,
        location: Location,
        out: &mut Vec<Instr>,
    ) -> Result<(), CompileError> {
        let id = self.labels.next_id(location)?;
        let then_label = Label::new(LabelKind::IfThen, id);

        let mut guarded = Vec::new();
        self.compile_condition(condition, &mut guarded)?;
        guarded.push(Instr::BrIf(then_label));
        for statement in then_branch {
            self.compile_statement(statement, &mut guarded)?;
        }

        let Some(else_branch) = else_branch else {
            out.push(Instr::Block { label: then_label, body: guarded });
            return Ok(());
        };

        let exit = Label::new(LabelKind::IfExit, id);
        guarded.push(Instr::Br(exit));

        let mut outer = vec![Instr::Block { label: then_label, body: guarded }];
        for statement in else_branch {
            self.compile_statement(statement, &mut outer)?;
        }
        out.push(Instr::Block { label: exit, body: outer });
        Ok(())
    }

    /// Leaves 1 on the stack when the condition is false.
    fn compile_condition(&mut self, condition: &Expression, out: &mut Vec<Instr>) -> Result<(), CompileError> {
        let kind = self.compile_expression(condition, out)?;
        coerce(kind, ValueKind::Bool, out);
        out.push(Instr::I32Eqz);
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression, out: &mut Vec<Instr>) -> Result<ValueKind, CompileError> {
        match expression {
            Expression::NumberLiteral { value, .. } => {
                out.push(Instr::F32Const(*value));
                Ok(ValueKind::Float)
            }
            Expression::Identifier { name, location } => {
                let slot = self.resolve(name, *location)?;
                out.push(Instr::LocalGet(slot));
                Ok(ValueKind::Float)
            }
            Expression::SubExpr { expression, .. } => self.compile_expression(expression, out),
            Expression::BinaryExpr { left, op, right, .. } => {
                let (operands, result) = domain(*op);

                let left_kind = self.compile_expression(left, out)?;
                self.coerce_operand(*op, left_kind, operands, out);
                let right_kind = self.compile_expression(right, out)?;
                self.coerce_operand(*op, right_kind, operands, out);

                out.extend(operator_instrs(*op));
                Ok(result)
            }
        }
    }

    /// `%` truncates float operands with the trapping conversion; every
    /// other operator goes through the regular coercions.
    fn coerce_operand(&self, op: BinaryOperator, kind: ValueKind, target: ValueKind, out: &mut Vec<Instr>) {
        if op == BinaryOperator::Remainder && kind == ValueKind::Float {
            out.push(Instr::I32TruncF32S);
        } else {
            coerce(kind, target, out);
        }
    }

    fn resolve(&self, name: &str, location: Location) -> Result<u32, CompileError> {
        self.symbols.resolve(name).ok_or_else(|| {
            CompileError::resolution(location, format!("Unknown identifier `{}`", name))
        })
    }
}

/// Operand domain and result kind of each operator.
fn domain(op: BinaryOperator) -> (ValueKind, ValueKind) {
    use BinaryOperator::*;
    match op {
        Add | Subtract | Multiply | Divide => (ValueKind::Float, ValueKind::Float),
        Less | Greater | LessEqual | GreaterEqual | Equal => (ValueKind::Float, ValueKind::Bool),
        ShiftLeft | ShiftRight => (ValueKind::Int, ValueKind::Int),
        And | Or => (ValueKind::Bool, ValueKind::Bool),
        Remainder => (ValueKind::Int, ValueKind::Float),
    }
}

fn operator_instrs(op: BinaryOperator) -> Vec<Instr> {
    use BinaryOperator::*;
    match op {
        Add => vec![Instr::F32Add],
        Subtract => vec![Instr::F32Sub],
        Multiply => vec![Instr::F32Mul],
        Divide => vec![Instr::F32Div],
        Less => vec![Instr::F32Lt],
        Greater => vec![Instr::F32Gt],
        LessEqual => vec![Instr::F32Le],
        GreaterEqual => vec![Instr::F32Ge],
        Equal => vec![Instr::F32Eq],
        ShiftLeft => vec![Instr::I32Shl],
        ShiftRight => vec![Instr::I32ShrS],
        And => vec![Instr::I32And],
        Or => vec![Instr::I32Or],
        // integer remainder, then back to float
        Remainder => vec![Instr::I32RemU, Instr::F32ConvertI32U],
    }
}

fn coerce(from: ValueKind, to: ValueKind, out: &mut Vec<Instr>) {
    match (from, to) {
        (ValueKind::Int, ValueKind::Float) => out.push(Instr::F32ConvertI32S),
        (ValueKind::Bool, ValueKind::Float) => out.push(Instr::F32ConvertI32U),
        (ValueKind::Float, ValueKind::Int) => out.push(Instr::I32TruncSatF32S),
        (ValueKind::Float, ValueKind::Bool) => {
            out.push(Instr::F32Const(0.0));
            out.push(Instr::F32Ne);
        }
        (ValueKind::Int, ValueKind::Bool) => {
            out.push(Instr::I32Const(0));
            out.push(Instr::I32Ne);
        }
        // a 0/1 flag is already a valid integer
        (ValueKind::Bool, ValueKind::Int) => {}
        (ValueKind::Float, ValueKind::Float)
        | (ValueKind::Int, ValueKind::Int)
        | (ValueKind::Bool, ValueKind::Bool) => {}
    }
}
