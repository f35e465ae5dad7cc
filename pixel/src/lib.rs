//! Compiler for the pixel language.
//!
//! text -> tokens -> AST -> AST with `main` -> structured instructions ->
//! module (text + binary). Each stage returns a `Result`; the first error
//! stops the whole compilation.

pub mod backends;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod parser;
pub mod span;
pub mod transform;

pub use error::CompileError;
pub use span::Location;

use backends::ModuleBuilder;
use backends::wasm::WasmBuilder;

/// Extension of pixel source files.
pub const EXTENSION: &str = "pix";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Ask the module builder to run its own optimization passes.
    pub optimize: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub unit: String,
    pub text: String,
    pub binary: Vec<u8>,
}

/// Lower `source` into `builder` without serializing anything.
pub fn build(source: &str, builder: &mut dyn ModuleBuilder) -> Result<(), CompileError> {
    let tokens = parser::lexer::tokenize(source)?;
    let program = parser::parser::parse_tokens(tokens)?;
    let program = transform::wrap_with_main(program);
    codegen::generate(&program, builder)
}

/// Compile `source` into a WebAssembly module named after `unit`.
pub fn compile(source: &str, unit: &str, options: &CompileOptions) -> Result<Artifact, CompileError> {
    let mut builder = WasmBuilder::new(unit);
    compile_with(source, unit, options, &mut builder)
}

pub fn compile_with(
    source: &str,
    unit: &str,
    options: &CompileOptions,
    builder: &mut dyn ModuleBuilder,
) -> Result<Artifact, CompileError> {
    build(source, builder)?;
    if options.optimize {
        builder.optimize();
    }

    Ok(Artifact {
        unit: unit.to_string(),
        text: builder.emit_text()?,
        binary: builder.emit_binary()?,
    })
}
