//! Builder that keeps what it is given.
//!
//! Used by tests to look at the lowered instructions, by the `listing`
//! target, and by the stack machine which executes recorded modules.

use std::fmt::{self, Write};

use crate::error::CompileError;
use crate::ir::instr::{Effect, FunctionDef, Instr};

use super::{passes, ModuleBuilder};

#[derive(Debug, Clone, Default)]
pub struct RecordingBuilder {
    unit: String,
    imports: Vec<Effect>,
    functions: Vec<FunctionDef>,
}

impl RecordingBuilder {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            imports: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn imports(&self) -> &[Effect] {
        &self.imports
    }

    pub fn functions(&self) -> &[FunctionDef] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|f| f.name == name)
    }

    fn render(&self) -> Result<String, fmt::Error> {
        let mut out = String::new();
        writeln!(out, "(module ${}", self.unit)?;

        for effect in &self.imports {
            writeln!(
                out,
                "  (import \"{}\" \"{}\" (func ${} (param {})))",
                effect.module, effect.field, effect.name, effect.param
            )?;
        }

        for function in &self.functions {
            write!(out, "  (func ${}", function.name)?;
            if function.export {
                write!(out, " (export \"{}\")", function.name)?;
            }
            for local in &function.locals {
                write!(out, " (local ${} f32)", local)?;
            }
            out.push('\n');
            render_body(&mut out, &function.body, 2)?;
            out.push_str("  )\n");
        }

        out.push_str(")\n");
        Ok(out)
    }
}

impl ModuleBuilder for RecordingBuilder {
    fn import_effect(&mut self, effect: Effect) -> Result<(), CompileError> {
        self.imports.push(effect);
        Ok(())
    }

    fn add_function(&mut self, function: FunctionDef) -> Result<(), CompileError> {
        self.functions.push(function);
        Ok(())
    }

    fn optimize(&mut self) {
        for function in &mut self.functions {
            passes::run(&mut function.body);
        }
    }

    fn emit_text(&self) -> Result<String, CompileError> {
        self.render()
            .map_err(|e| CompileError::backend(format!("failed to write listing: {}", e)))
    }

    /// Listings have no binary form.
    fn emit_binary(&self) -> Result<Vec<u8>, CompileError> {
        Ok(Vec::new())
    }
}

fn render_body(out: &mut String, body: &[Instr], depth: usize) -> fmt::Result {
    for instr in body {
        let indent = "  ".repeat(depth);
        writeln!(out, "{}{}", indent, instr.mnemonic())?;
        if let Instr::Block { body, .. } | Instr::Loop { body, .. } = instr {
            render_body(out, body, depth + 1)?;
            writeln!(out, "{}end", indent)?;
        }
    }
    Ok(())
}
