//! WebAssembly encoder.
//!
//! Layout of the produced module:
//! - imported effects come first in the function index space,
//! - one linear memory (1 page, at most 2) exported as `memory`,
//! - a `name` section carrying the unit, function and local names.
//!
//! Labels become relative branch depths while the body is written out.

use std::collections::HashMap;

use wasm_encoder::{
    BlockType, CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection,
    ImportSection, IndirectNameMap, Instruction, MemorySection, MemoryType, Module, NameMap,
    NameSection, TypeSection, ValType,
};

use crate::error::CompileError;
use crate::ir::instr::{Effect, FunctionDef, Instr, Label, NumKind};

use super::{passes, ModuleBuilder};

const MEMORY_MIN_PAGES: u64 = 1;
const MEMORY_MAX_PAGES: u64 = 2;
/// Export name taken by the linear memory.
pub const MEMORY_EXPORT: &str = "memory";

pub struct WasmBuilder {
    unit: String,
    imports: Vec<Effect>,
    functions: Vec<FunctionDef>,
}

impl WasmBuilder {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            imports: Vec::new(),
            functions: Vec::new(),
        }
    }

    fn function_indices(&self) -> HashMap<&str, u32> {
        self.function_indices_in_order()
            .into_iter()
            .map(|(index, name)| (name, index))
            .collect()
    }

    fn encode(&self) -> Result<Vec<u8>, CompileError> {
        let mut types = TypeSection::new();
        let mut imports = ImportSection::new();
        let mut functions = FunctionSection::new();
        let mut memories = MemorySection::new();
        let mut exports = ExportSection::new();
        let mut code = CodeSection::new();

        let mut signatures: Vec<Option<NumKind>> = Vec::new();
        let mut signature_index = |param: Option<NumKind>, types: &mut TypeSection| -> u32 {
            if let Some(found) = signatures.iter().position(|s| *s == param) {
                return found as u32;
            }
            let params: Vec<ValType> = param.into_iter().map(val_type).collect();
            let no_results: [ValType; 0] = [];
            types.function(params, no_results);
            signatures.push(param);
            (signatures.len() - 1) as u32
        };

        for effect in &self.imports {
            let ty = signature_index(Some(effect.param), &mut types);
            imports.import(&effect.module, &effect.field, EntityType::Function(ty));
        }

        memories.memory(MemoryType {
            minimum: MEMORY_MIN_PAGES,
            maximum: Some(MEMORY_MAX_PAGES),
            memory64: false,
            shared: false,
        });
        exports.export(MEMORY_EXPORT, ExportKind::Memory, 0);

        let indices = self.function_indices();
        let first_defined = self.imports.len() as u32;

        for (offset, function) in self.functions.iter().enumerate() {
            let index = first_defined + offset as u32;
            let ty = signature_index(None, &mut types);
            functions.function(ty);
            if function.export {
                exports.export(&function.name, ExportKind::Func, index);
            }

            let local_count = function.locals.len() as u32;
            let locals = if local_count > 0 {
                vec![(local_count, ValType::F32)]
            } else {
                vec![]
            };
            let mut body = Function::new(locals);
            let mut scopes = Vec::new();
            write_body(&mut body, &function.body, &mut scopes, &indices)?;
            body.instruction(&Instruction::End);
            code.function(&body);
        }

        let mut module = Module::new();
        module.section(&types);
        module.section(&imports);
        module.section(&functions);
        module.section(&memories);
        module.section(&exports);
        module.section(&code);
        module.section(&self.names());
        Ok(module.finish())
    }

    fn names(&self) -> NameSection {
        let mut names = NameSection::new();
        names.module(&self.unit);

        let mut function_names = NameMap::new();
        for (index, name) in self.function_indices_in_order() {
            function_names.append(index, name);
        }
        names.functions(&function_names);

        let mut locals = IndirectNameMap::new();
        let first_defined = self.imports.len() as u32;
        for (offset, function) in self.functions.iter().enumerate() {
            let mut slots = NameMap::new();
            for (slot, local) in function.locals.iter().enumerate() {
                slots.append(slot as u32, local);
            }
            locals.append(first_defined + offset as u32, &slots);
        }
        names.locals(&locals);

        names
    }

    fn function_indices_in_order(&self) -> Vec<(u32, &str)> {
        self.imports
            .iter()
            .map(|e| e.name.as_str())
            .chain(self.functions.iter().map(|f| f.name.as_str()))
            .enumerate()
            .map(|(index, name)| (index as u32, name))
            .collect()
    }
}

impl ModuleBuilder for WasmBuilder {
    fn import_effect(&mut self, effect: Effect) -> Result<(), CompileError> {
        if !self.functions.is_empty() {
            return Err(CompileError::backend(format!(
                "effect `{}` must be imported before any function is added",
                effect.name
            )));
        }
        self.imports.push(effect);
        Ok(())
    }

    fn add_function(&mut self, function: FunctionDef) -> Result<(), CompileError> {
        if function.export && function.name == MEMORY_EXPORT {
            return Err(CompileError::backend(format!(
                "cannot export function `{}`: the name is taken by the module memory",
                function.name
            )));
        }
        self.functions.push(function);
        Ok(())
    }

    fn optimize(&mut self) {
        for function in &mut self.functions {
            passes::run(&mut function.body);
        }
    }

    fn emit_text(&self) -> Result<String, CompileError> {
        let binary = self.encode()?;
        wasmprinter::print_bytes(&binary)
            .map_err(|e| CompileError::backend(format!("failed to print module: {}", e)))
    }

    fn emit_binary(&self) -> Result<Vec<u8>, CompileError> {
        self.encode()
    }
}

fn val_type(kind: NumKind) -> ValType {
    match kind {
        NumKind::F32 => ValType::F32,
        NumKind::I32 => ValType::I32,
    }
}

fn write_body(
    out: &mut Function,
    body: &[Instr],
    scopes: &mut Vec<Label>,
    indices: &HashMap<&str, u32>,
) -> Result<(), CompileError> {
    for instr in body {
        match instr {
            Instr::Block { label, body } | Instr::Loop { label, body } => {
                let opener = if matches!(instr, Instr::Block { .. }) {
                    Instruction::Block(BlockType::Empty)
                } else {
                    Instruction::Loop(BlockType::Empty)
                };
                out.instruction(&opener);
                scopes.push(*label);
                write_body(out, body, scopes, indices)?;
                scopes.pop();
                out.instruction(&Instruction::End);
            }
            Instr::Br(label) => {
                out.instruction(&Instruction::Br(depth(scopes, label)?));
            }
            Instr::BrIf(label) => {
                out.instruction(&Instruction::BrIf(depth(scopes, label)?));
            }
            Instr::Call(name) => {
                let index = indices
                    .get(name.as_str())
                    .ok_or_else(|| CompileError::backend(format!("call to unknown function `{}`", name)))?;
                out.instruction(&Instruction::Call(*index));
            }
            Instr::F32Const(v) => {
                out.instruction(&Instruction::F32Const(*v));
            }
            Instr::I32Const(v) => {
                out.instruction(&Instruction::I32Const(*v));
            }
            Instr::LocalGet(slot) => {
                out.instruction(&Instruction::LocalGet(*slot));
            }
            Instr::LocalSet(slot) => {
                out.instruction(&Instruction::LocalSet(*slot));
            }
            simple => {
                let encoded = numeric(simple).ok_or_else(|| {
                    CompileError::backend(format!("no encoding for `{}`", simple.mnemonic()))
                })?;
                out.instruction(&encoded);
            }
        }
    }
    Ok(())
}

/// Relative depth of `label` from the innermost open scope.
fn depth(scopes: &[Label], label: &Label) -> Result<u32, CompileError> {
    scopes
        .iter()
        .rev()
        .position(|open| open == label)
        .map(|d| d as u32)
        .ok_or_else(|| CompileError::backend(format!("branch to {} outside of its scope", label)))
}

/// Encoding of an operand-free instruction; `None` for the ones that
/// carry operands or scopes.
fn numeric(instr: &Instr) -> Option<Instruction<'static>> {
    let encoded = match instr {
        Instr::F32Add => Instruction::F32Add,
        Instr::F32Sub => Instruction::F32Sub,
        Instr::F32Mul => Instruction::F32Mul,
        Instr::F32Div => Instruction::F32Div,
        Instr::F32Lt => Instruction::F32Lt,
        Instr::F32Gt => Instruction::F32Gt,
        Instr::F32Le => Instruction::F32Le,
        Instr::F32Ge => Instruction::F32Ge,
        Instr::F32Eq => Instruction::F32Eq,
        Instr::F32Ne => Instruction::F32Ne,
        Instr::I32Shl => Instruction::I32Shl,
        Instr::I32ShrS => Instruction::I32ShrS,
        Instr::I32And => Instruction::I32And,
        Instr::I32Or => Instruction::I32Or,
        Instr::I32Ne => Instruction::I32Ne,
        Instr::I32Eqz => Instruction::I32Eqz,
        Instr::I32RemU => Instruction::I32RemU,
        Instr::I32TruncF32S => Instruction::I32TruncF32S,
        Instr::I32TruncSatF32S => Instruction::I32TruncSatF32S,
        Instr::F32ConvertI32S => Instruction::F32ConvertI32S,
        Instr::F32ConvertI32U => Instruction::F32ConvertI32U,
        Instr::F32Const(_)
        | Instr::I32Const(_)
        | Instr::LocalGet(_)
        | Instr::LocalSet(_)
        | Instr::Call(_)
        | Instr::Block { .. }
        | Instr::Loop { .. }
        | Instr::Br(_)
        | Instr::BrIf(_) => return None,
    };
    Some(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::LabelKind;

    fn module_with(body: Vec<Instr>) -> WasmBuilder {
        let mut builder = WasmBuilder::new("demo");
        builder.import_effect(Effect::echo()).unwrap();
        builder
            .add_function(FunctionDef {
                name: "main".into(),
                export: true,
                locals: vec!["counter".into()],
                body,
            })
            .unwrap();
        builder
    }

    #[test]
    fn test_binary_header() {
        let binary = module_with(vec![]).emit_binary().unwrap();
        assert_eq!(&binary[..8], b"\0asm\x01\0\0\0");
    }

    #[test]
    fn test_text_has_names_and_exports() {
        let text = module_with(vec![Instr::F32Const(2.0), Instr::LocalSet(0)])
            .emit_text()
            .unwrap();
        assert!(text.contains("(module $demo"));
        assert!(text.contains("(import \"env\" \"echo\""));
        assert!(text.contains("(export \"main\""));
        assert!(text.contains("(export \"memory\""));
        assert!(text.contains("$counter"));
    }

    #[test]
    fn test_labels_become_depths() {
        let exit = Label::new(LabelKind::WhileExit, 0);
        let head = Label::new(LabelKind::WhileLoop, 0);
        let text = module_with(vec![Instr::Block {
            label: exit,
            body: vec![Instr::Loop {
                label: head,
                body: vec![
                    Instr::I32Const(1),
                    Instr::BrIf(exit),
                    Instr::Br(head),
                ],
            }],
        }])
        .emit_text()
        .unwrap();
        assert!(text.contains("br_if 1"));
        assert!(text.contains("br 0"));
    }

    #[test]
    fn test_branch_outside_scope_fails() {
        let stray = Label::new(LabelKind::IfThen, 7);
        let err = module_with(vec![Instr::Br(stray)]).emit_binary().unwrap_err();
        assert!(matches!(err, CompileError::BackendError { .. }));
    }

    #[test]
    fn test_function_cannot_take_the_memory_export() {
        let mut builder = WasmBuilder::new("demo");
        let function = |export| FunctionDef {
            name: MEMORY_EXPORT.into(),
            export,
            locals: vec![],
            body: vec![],
        };

        let err = builder.add_function(function(true)).unwrap_err();
        assert!(matches!(err, CompileError::BackendError { .. }));

        // a private function may still be called `memory`
        builder.add_function(function(false)).unwrap();
        let binary = builder.emit_binary().unwrap();
        wasmparser::validate(&binary).unwrap();
    }

    #[test]
    fn test_structural_instructions_have_no_plain_encoding() {
        let label = Label::new(LabelKind::IfThen, 0);
        assert!(numeric(&Instr::Br(label)).is_none());
        assert!(numeric(&Instr::Block { label, body: vec![] }).is_none());
        assert!(numeric(&Instr::Call("echo".into())).is_none());
        assert!(matches!(numeric(&Instr::I32RemU), Some(Instruction::I32RemU)));
    }

    #[test]
    fn test_unknown_call_fails() {
        let err = module_with(vec![Instr::F32Const(1.0), Instr::Call("missing".into())])
            .emit_binary()
            .unwrap_err();
        assert!(matches!(err, CompileError::BackendError { .. }));
    }
}
