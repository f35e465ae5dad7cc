//! Executes recorded modules instruction by instruction.
//!
//! A branch to a block leaves it, a branch to a loop starts it over. Values
//! left above a scope's entry height are dropped when a branch leaves it.

use std::fmt;

use pixel::backends::recording::RecordingBuilder;
use pixel::ir::instr::{FunctionDef, Instr, Label, NumKind};

use crate::host::Host;
use crate::trap::Trap;

pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;
pub const CALL_STACK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    F32(f32),
    I32(i32),
}

impl Value {
    pub fn kind(&self) -> NumKind {
        match self {
            Value::F32(_) => NumKind::F32,
            Value::I32(_) => NumKind::I32,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::F32(v) => write!(f, "{}:f32", v),
            Value::I32(v) => write!(f, "{}:i32", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Instructions executed before the run is stopped with a trap.
    pub max_steps: u64,
    /// Record a [`TraceEntry`] for every executed instruction.
    pub trace: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            trace: false,
        }
    }
}

/// One executed instruction and the operand stack right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub step: u64,
    pub function: String,
    pub instr: String,
    pub stack: Vec<Value>,
}

enum Flow {
    Next,
    Branch(Label),
}

struct Frame<'m> {
    function: &'m str,
    locals: Vec<f32>,
}

impl Frame<'_> {
    fn slot(&mut self, slot: u32) -> Result<&mut f32, Trap> {
        let function = self.function;
        self.locals.get_mut(slot as usize).ok_or_else(|| Trap::UnknownLocal {
            function: function.to_string(),
            slot,
        })
    }
}

pub struct Machine {
    config: MachineConfig,
    stack: Vec<Value>,
    steps: u64,
    depth: usize,
    trace: Vec<TraceEntry>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            steps: 0,
            depth: 0,
            trace: Vec::new(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Run `entry` to completion. State from a previous run is discarded first.
    pub fn run(&mut self, module: &RecordingBuilder, entry: &str, host: &mut dyn Host) -> Result<(), Trap> {
        self.stack.clear();
        self.steps = 0;
        self.depth = 0;
        self.trace.clear();

        let function = module
            .function(entry)
            .ok_or_else(|| Trap::UnknownFunction { name: entry.to_string() })?;
        self.call(module, function, host)
    }

    fn call(&mut self, module: &RecordingBuilder, function: &FunctionDef, host: &mut dyn Host) -> Result<(), Trap> {
        if self.depth == CALL_STACK_SIZE {
            return Err(Trap::CallStackOverflow { depth: self.depth });
        }

        self.depth += 1;
        let mut frame = Frame {
            function: &function.name,
            locals: vec![0.0; function.locals.len()],
        };
        let flow = self.execute_body(module, &mut frame, &function.body, host);
        self.depth -= 1;

        match flow? {
            Flow::Next => Ok(()),
            Flow::Branch(label) => Err(Trap::UnknownLabel { label: label.to_string() }),
        }
    }

    fn call_named(&mut self, module: &RecordingBuilder, name: &str, host: &mut dyn Host) -> Result<(), Trap> {
        if let Some(effect) = module.imports().iter().find(|e| e.name == name) {
            // echo is the only effect a host knows about
            if effect.field != "echo" {
                return Err(Trap::UnknownFunction { name: name.to_string() });
            }
            let value = self.pop_f32(&format!("call ${}", name))?;
            host.echo(value);
            return Ok(());
        }

        let function = module
            .function(name)
            .ok_or_else(|| Trap::UnknownFunction { name: name.to_string() })?;
        self.call(module, function, host)
    }

    fn execute_body(
        &mut self,
        module: &RecordingBuilder,
        frame: &mut Frame,
        body: &[Instr],
        host: &mut dyn Host,
    ) -> Result<Flow, Trap> {
        for instr in body {
            if let Flow::Branch(label) = self.execute(module, frame, instr, host)? {
                return Ok(Flow::Branch(label));
            }
        }
        Ok(Flow::Next)
    }

    fn execute(
        &mut self,
        module: &RecordingBuilder,
        frame: &mut Frame,
        instr: &Instr,
        host: &mut dyn Host,
    ) -> Result<Flow, Trap> {
        if self.steps == self.config.max_steps {
            return Err(Trap::StepLimit { limit: self.config.max_steps });
        }
        self.steps += 1;

        let flow = match instr {
            Instr::Block { label, body } => {
                self.record(frame, instr);
                let height = self.stack.len();
                return match self.execute_body(module, frame, body, host)? {
                    Flow::Branch(target) if target == *label => {
                        self.stack.truncate(height);
                        Ok(Flow::Next)
                    }
                    flow => Ok(flow),
                };
            }
            Instr::Loop { label, body } => {
                self.record(frame, instr);
                let height = self.stack.len();
                loop {
                    match self.execute_body(module, frame, body, host)? {
                        Flow::Branch(target) if target == *label => self.stack.truncate(height),
                        flow => return Ok(flow),
                    }
                }
            }
            Instr::Br(label) => Flow::Branch(*label),
            Instr::BrIf(label) => {
                if self.pop_i32(instr)? != 0 {
                    Flow::Branch(*label)
                } else {
                    Flow::Next
                }
            }
            Instr::Call(name) => {
                self.call_named(module, name, host)?;
                Flow::Next
            }
            Instr::LocalGet(slot) => {
                let value = *frame.slot(*slot)?;
                self.push(Value::F32(value))
            }
            Instr::LocalSet(slot) => {
                let value = self.pop_f32(&instr.mnemonic())?;
                *frame.slot(*slot)? = value;
                Flow::Next
            }

            Instr::F32Const(v) => self.push(Value::F32(*v)),
            Instr::I32Const(v) => self.push(Value::I32(*v)),

            Instr::F32Add => self.f32_binary(instr, |a, b| a + b)?,
            Instr::F32Sub => self.f32_binary(instr, |a, b| a - b)?,
            Instr::F32Mul => self.f32_binary(instr, |a, b| a * b)?,
            Instr::F32Div => self.f32_binary(instr, |a, b| a / b)?,

            Instr::F32Lt => self.f32_compare(instr, |a, b| a < b)?,
            Instr::F32Gt => self.f32_compare(instr, |a, b| a > b)?,
            Instr::F32Le => self.f32_compare(instr, |a, b| a <= b)?,
            Instr::F32Ge => self.f32_compare(instr, |a, b| a >= b)?,
            Instr::F32Eq => self.f32_compare(instr, |a, b| a == b)?,
            Instr::F32Ne => self.f32_compare(instr, |a, b| a != b)?,

            // shift counts are taken modulo 32
            Instr::I32Shl => self.i32_binary(instr, |a, b| a.wrapping_shl(b as u32))?,
            Instr::I32ShrS => self.i32_binary(instr, |a, b| a.wrapping_shr(b as u32))?,
            Instr::I32And => self.i32_binary(instr, |a, b| a & b)?,
            Instr::I32Or => self.i32_binary(instr, |a, b| a | b)?,
            Instr::I32Ne => self.i32_binary(instr, |a, b| (a != b) as i32)?,
            Instr::I32Eqz => {
                let v = self.pop_i32(instr)?;
                self.push(Value::I32((v == 0) as i32))
            }
            Instr::I32RemU => {
                let b = self.pop_i32(instr)? as u32;
                let a = self.pop_i32(instr)? as u32;
                if b == 0 {
                    return Err(Trap::DivisionByZero);
                }
                self.push(Value::I32((a % b) as i32))
            }

            Instr::I32TruncF32S => {
                let v = self.pop_f32(&instr.mnemonic())?;
                self.push(Value::I32(truncate(v)?))
            }
            // `as` saturates and maps NaN to 0
            Instr::I32TruncSatF32S => {
                let v = self.pop_f32(&instr.mnemonic())?;
                self.push(Value::I32(v as i32))
            }
            Instr::F32ConvertI32S => {
                let v = self.pop_i32(instr)?;
                self.push(Value::F32(v as f32))
            }
            Instr::F32ConvertI32U => {
                let v = self.pop_i32(instr)?;
                self.push(Value::F32(v as u32 as f32))
            }
        };

        self.record(frame, instr);
        Ok(flow)
    }

    fn push(&mut self, value: Value) -> Flow {
        self.stack.push(value);
        Flow::Next
    }

    fn f32_binary(&mut self, instr: &Instr, op: impl Fn(f32, f32) -> f32) -> Result<Flow, Trap> {
        let name = instr.mnemonic();
        let b = self.pop_f32(&name)?;
        let a = self.pop_f32(&name)?;
        Ok(self.push(Value::F32(op(a, b))))
    }

    fn f32_compare(&mut self, instr: &Instr, op: impl Fn(f32, f32) -> bool) -> Result<Flow, Trap> {
        let name = instr.mnemonic();
        let b = self.pop_f32(&name)?;
        let a = self.pop_f32(&name)?;
        Ok(self.push(Value::I32(op(a, b) as i32)))
    }

    fn i32_binary(&mut self, instr: &Instr, op: impl Fn(i32, i32) -> i32) -> Result<Flow, Trap> {
        let b = self.pop_i32(instr)?;
        let a = self.pop_i32(instr)?;
        Ok(self.push(Value::I32(op(a, b))))
    }

    fn pop(&mut self, instr: &str) -> Result<Value, Trap> {
        self.stack
            .pop()
            .ok_or_else(|| Trap::StackUnderflow { instr: instr.to_string() })
    }

    fn pop_f32(&mut self, instr: &str) -> Result<f32, Trap> {
        match self.pop(instr)? {
            Value::F32(v) => Ok(v),
            other => Err(Trap::TypeMismatch {
                instr: instr.to_string(),
                expected: NumKind::F32,
                found: other.kind(),
            }),
        }
    }

    fn pop_i32(&mut self, instr: &Instr) -> Result<i32, Trap> {
        let name = instr.mnemonic();
        match self.pop(&name)? {
            Value::I32(v) => Ok(v),
            other => Err(Trap::TypeMismatch {
                instr: name,
                expected: NumKind::I32,
                found: other.kind(),
            }),
        }
    }

    fn record(&mut self, frame: &Frame, instr: &Instr) {
        if !self.config.trace {
            return;
        }
        self.trace.push(TraceEntry {
            step: self.steps,
            function: frame.function.to_string(),
            instr: instr.mnemonic(),
            stack: self.stack.clone(),
        });
    }
}

/// Trapping float to integer conversion.
fn truncate(value: f32) -> Result<i32, Trap> {
    let truncated = (value as f64).trunc();
    if value.is_nan() || truncated < i32::MIN as f64 || truncated > i32::MAX as f64 {
        return Err(Trap::InvalidConversion { value });
    }
    Ok(truncated as i32)
}
