//! Structured stack-machine instructions handed to a module builder.
//!
//! Control flow stays nested (`Block`/`Loop` own their bodies) and branches
//! name their target scope by label; encoders turn labels into whatever their
//! format needs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    F32,
    I32,
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumKind::F32 => write!(f, "f32"),
            NumKind::I32 => write!(f, "i32"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Block around a `while`, branching here leaves the loop.
    WhileExit,
    /// The loop itself, branching here re-checks the condition.
    WhileLoop,
    /// Block guarding the `then` branch of an `if`.
    IfThen,
    /// Outer block of an `if` with `else`, skipped to after the `then` branch.
    IfExit,
}

/// Scope name, unique inside one compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub kind: LabelKind,
    pub id: u32,
}

impl Label {
    pub fn new(kind: LabelKind, id: u32) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            LabelKind::WhileExit => "while_exit",
            LabelKind::WhileLoop => "while_loop",
            LabelKind::IfThen => "if_then",
            LabelKind::IfExit => "if_exit",
        };
        write!(f, "${}{}", prefix, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    F32Const(f32),
    I32Const(i32),

    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F32Eq,
    F32Ne,

    I32Shl,
    I32ShrS,
    I32And,
    I32Or,
    I32Ne,
    I32Eqz,
    I32RemU,

    /// Traps on NaN or when the value does not fit.
    I32TruncF32S,
    /// Saturates instead of trapping, NaN becomes 0.
    I32TruncSatF32S,
    F32ConvertI32S,
    F32ConvertI32U,

    LocalGet(u32),
    LocalSet(u32),
    /// Call an imported effect or a function by name.
    Call(String),

    Block { label: Label, body: Vec<Instr> },
    Loop { label: Label, body: Vec<Instr> },
    Br(Label),
    BrIf(Label),
}

impl Instr {
    /// Mnemonic in the usual text syntax, without nested bodies.
    pub fn mnemonic(&self) -> String {
        match self {
            Instr::F32Const(v) => format!("f32.const {}", v),
            Instr::I32Const(v) => format!("i32.const {}", v),
            Instr::F32Add => "f32.add".into(),
            Instr::F32Sub => "f32.sub".into(),
            Instr::F32Mul => "f32.mul".into(),
            Instr::F32Div => "f32.div".into(),
            Instr::F32Lt => "f32.lt".into(),
            Instr::F32Gt => "f32.gt".into(),
            Instr::F32Le => "f32.le".into(),
            Instr::F32Ge => "f32.ge".into(),
            Instr::F32Eq => "f32.eq".into(),
            Instr::F32Ne => "f32.ne".into(),
            Instr::I32Shl => "i32.shl".into(),
            Instr::I32ShrS => "i32.shr_s".into(),
            Instr::I32And => "i32.and".into(),
            Instr::I32Or => "i32.or".into(),
            Instr::I32Ne => "i32.ne".into(),
            Instr::I32Eqz => "i32.eqz".into(),
            Instr::I32RemU => "i32.rem_u".into(),
            Instr::I32TruncF32S => "i32.trunc_f32_s".into(),
            Instr::I32TruncSatF32S => "i32.trunc_sat_f32_s".into(),
            Instr::F32ConvertI32S => "f32.convert_i32_s".into(),
            Instr::F32ConvertI32U => "f32.convert_i32_u".into(),
            Instr::LocalGet(slot) => format!("local.get {}", slot),
            Instr::LocalSet(slot) => format!("local.set {}", slot),
            Instr::Call(name) => format!("call ${}", name),
            Instr::Block { label, .. } => format!("block {}", label),
            Instr::Loop { label, .. } => format!("loop {}", label),
            Instr::Br(label) => format!("br {}", label),
            Instr::BrIf(label) => format!("br_if {}", label),
        }
    }
}

/// Host function the module imports, taking one parameter and returning
/// nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub name: String,
    pub module: String,
    pub field: String,
    pub param: NumKind,
}

impl Effect {
    /// The print effect, `env.echo(f32)`.
    pub fn echo() -> Self {
        Self {
            name: "echo".into(),
            module: "env".into(),
            field: "echo".into(),
            param: NumKind::F32,
        }
    }
}

/// One function of the output module. `locals` lists the f32 frame in slot
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub export: bool,
    pub locals: Vec<String>,
    pub body: Vec<Instr>,
}
