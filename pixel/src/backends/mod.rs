pub mod passes;
pub mod recording;
pub mod wasm;

use crate::error::CompileError;
use crate::ir::instr::{Effect, FunctionDef};

/// Everything the code generator needs from a module encoder.
pub trait ModuleBuilder {
    /// Declare a host function the module imports.
    fn import_effect(&mut self, effect: Effect) -> Result<(), CompileError>;

    /// Add one function: its f32 locals frame and ordered body.
    fn add_function(&mut self, function: FunctionDef) -> Result<(), CompileError>;

    /// Run the builder's own optimization passes.
    fn optimize(&mut self);

    fn emit_text(&self) -> Result<String, CompileError>;

    fn emit_binary(&self) -> Result<Vec<u8>, CompileError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Wasm,
    Listing,
}

impl BackendType {
    pub fn all() -> Vec<Self> {
        vec![Self::Wasm, Self::Listing]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Wasm => "wasm",
            Self::Listing => "listing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Wasm => "WebAssembly module (.wat text and .wasm binary)",
            Self::Listing => "Structured instruction listing (.lst)",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|b| b.name() == name)
    }

    pub fn create(&self, unit: &str) -> Box<dyn ModuleBuilder> {
        match self {
            Self::Wasm => Box::new(wasm::WasmBuilder::new(unit)),
            Self::Listing => Box::new(recording::RecordingBuilder::new(unit)),
        }
    }
}
