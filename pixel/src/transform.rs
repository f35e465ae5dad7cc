use crate::ir::ast::{Program, Statement};
use crate::span::Location;

pub const ENTRY_POINT: &str = "main";

/// Gives the program an entry point.
///
/// Without a `main` procedure, every statement outside a procedure moves into
/// a new exported `main`, placed first and followed by the declared
/// procedures in their original order. A program that already has `main` is
/// returned as is.
pub fn wrap_with_main(program: Program) -> Program {
    let has_main = program
        .statements
        .iter()
        .any(|s| matches!(s, Statement::ProcDecl { name, .. } if name == ENTRY_POINT));
    if has_main {
        return program;
    }

    let (procs, free): (Vec<Statement>, Vec<Statement>) =
        program.statements.into_iter().partition(Statement::is_proc);

    let location = free
        .first()
        .map(Statement::location)
        .unwrap_or_else(Location::default);
    let main = Statement::ProcDecl {
        name: ENTRY_POINT.to_string(),
        export: true,
        body: free,
        location,
    };

    let mut statements = Vec::with_capacity(procs.len() + 1);
    statements.push(main);
    statements.extend(procs);
    Program { statements }
}
