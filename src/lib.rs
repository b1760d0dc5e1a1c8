//! Crate root: wires together the compilation pipeline.
//!
//! The stages are small and composable:
//! - `frontend` performs lexical analysis and parsing and owns the syntax
//!   tree model.
//! - `middle` resolves scoped symbols, evaluates compile-time constants,
//!   and lowers the syntax tree into the structured IR.
//! - `backend` allocates registers and emits RV32 assembly from the IR.

pub mod backend;
pub mod frontend;
pub mod index;
pub mod middle;

use backend::{CodeGenerator, CodegenOptions, Target};
use frontend::{SourceFile, ast::CompilationUnit, parser::Parser};
use middle::ir::{ast_lowering, text};

pub fn parse(source_file: &SourceFile) -> CompilationUnit<'_> {
    Parser::parse_compilation_unit(source_file)
}

/// Compiles a source file to the textual form of the IR
pub fn emit_ir(source_file: &SourceFile) -> String {
    let unit = parse(source_file);
    let program = ast_lowering::lower_to_ir(&unit);

    text::render_program(&program)
}

/// Compiles a source file all the way to RV32 assembly
pub fn emit_assembly(source_file: &SourceFile) -> String {
    let unit = parse(source_file);
    let program = ast_lowering::lower_to_ir(&unit);

    Target::Riscv32
        .get_code_generator()
        .translate_to_asm(&program, &CodegenOptions::default())
}
