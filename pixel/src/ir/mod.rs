pub mod ast;
pub mod instr;
