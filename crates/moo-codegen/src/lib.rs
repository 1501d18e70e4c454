//! Moo bytecode code generation.
//!
//! This crate turns source text into an [`Executable`]:
//!
//! - `shaker` - binds identifiers to variable slots, builtins and members
//! - `coder` / `stmt` / `expr` - lowers the bound tree to bytecode
//! - `labels` - forward jump resolution for the coder
//! - `optimizer` - peephole rewrites over the finished code

mod coder;
mod error;
mod expr;
mod labels;
pub mod optimizer;
pub mod shaker;
mod stmt;

pub use coder::Coder;
pub use error::{CompileError, CompileResult};
pub use labels::{Label, LabelArena};

use std::rc::Rc;

use moo_vm::Executable;
use tracing::debug;

/// Knobs for [`compile_with`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Run the peephole optimizer.
    pub optimize: bool,
    /// Name of the executable, used in tracebacks.
    pub name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            name: "program".to_string(),
        }
    }
}

/// Compile a program with default options.
pub fn compile(source: &str) -> CompileResult<Executable> {
    compile_with(source, &CompileOptions::default())
}

pub fn compile_with(source: &str, options: &CompileOptions) -> CompileResult<Executable> {
    let mut program = moo_syntax::parse(source)?;
    let symbols = shaker::shake(&mut program);

    let mut coder = Coder::new();
    stmt::compile_block(&program, &mut coder)?;
    let mut exe = coder.finish(&options.name, symbols)?;

    if options.optimize {
        optimizer::optimize(&mut exe);
    }
    exe.source = Some(Rc::from(source));
    debug!(
        name = %exe.name,
        words = exe.len(),
        vars = exe.var_count(),
        blocks = exe.blocks.len(),
        "compiled"
    );
    Ok(exe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moo_vm::Opcode;

    fn opcodes(exe: &Executable) -> Vec<Opcode> {
        exe.code.iter().filter_map(|w| w.opcode()).collect()
    }

    #[test]
    fn test_syntax_error_passes_through() {
        let err = compile("x = ;").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
        assert!(err.span().is_some());
    }

    #[test]
    fn test_break_outside_loop_is_rejected() {
        let err = compile("break;").unwrap_err();
        match err {
            CompileError::Semantic { message, span } => {
                assert!(message.contains("break"));
                assert_eq!(span.line, 1);
            }
            other => panic!("expected a semantic error, got {:?}", other),
        }
    }

    #[test]
    fn test_break_inside_function_does_not_see_outer_loop() {
        assert!(compile("while (true) { f = fn () { break; }; }").is_err());
    }

    #[test]
    fn test_constant_expression_is_folded() {
        let opts = CompileOptions {
            optimize: false,
            ..Default::default()
        };
        let exe = compile_with("x = 14 * 10 + 71 / 3 ^ 3;", &opts).unwrap();
        assert_eq!(opcodes(&exe), vec![Opcode::Push, Opcode::SetVar]);
        assert_eq!(exe.code[1].as_lit(), Some(&moo_vm::Value::Int(142)));
    }

    #[test]
    fn test_break_out_of_try_pops_handlers() {
        let opts = CompileOptions {
            optimize: false,
            ..Default::default()
        };
        let exe = compile_with("while (true) { try { try { break; } catch { } } catch { } }", &opts).unwrap();
        let ops = opcodes(&exe);
        let jump_at = ops.iter().position(|op| *op == Opcode::Jump).unwrap();
        assert_eq!(&ops[jump_at - 2..jump_at], &[Opcode::TryPop, Opcode::TryPop]);
    }

    #[test]
    fn test_function_literal_registers_block() {
        let exe = compile("f = fn (a, b) -> a + b;").unwrap();
        assert_eq!(exe.blocks.len(), 1);
        let block = &exe.blocks[0];
        assert_eq!(block.params.len(), 2);
        assert_eq!(exe.code[block.start - 2].opcode(), Some(Opcode::Jump));
        assert_eq!(exe.code[block.start - 1].as_addr(), Some(block.end));
        exe.verify().unwrap();
    }

    #[test]
    fn test_source_is_attached() {
        let exe = compile("x = 1;\ny = 2;").unwrap();
        assert_eq!(exe.source_line(2), Some("y = 2;"));
        assert_eq!(exe.name, "program");
    }
}
