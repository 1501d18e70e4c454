//! `moo dump` - print one stage of the pipeline.

use std::path::Path;

use anyhow::{bail, Result};
use moo_common::SourceFile;

use super::{compile, load};
use crate::{CompileArgs, Stage};

pub fn run(path: &Path, stage: Stage, args: CompileArgs, color: bool) -> Result<()> {
    let file = load(path)?;
    print!("{}", render(&file, stage, args, color)?);
    Ok(())
}

fn render(file: &SourceFile, stage: Stage, args: CompileArgs, color: bool) -> Result<String> {
    let syntax_failed = |err: moo_syntax::SyntaxError| -> Result<String> {
        err.to_diagnostic().emit(file, color)?;
        bail!("could not parse {}", file.name())
    };

    Ok(match stage {
        Stage::Tokens => match moo_syntax::lexer::tokenize(file.source()) {
            Ok(tokens) => tokens
                .iter()
                .map(|t| format!("{:>4}:{:<3} {:?} {:?}\n", t.span.line, t.span.col, t.kind, t.text))
                .collect(),
            Err(err) => return syntax_failed(err),
        },
        Stage::Ast => match moo_syntax::parse(file.source()) {
            Ok(program) => format!("{:#?}\n", program),
            Err(err) => return syntax_failed(err),
        },
        Stage::Bytecode => compile(file, &args.options(), color)?.disassemble(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CompileArgs {
        CompileArgs { no_optimize: false }
    }

    #[test]
    fn test_every_stage_renders() {
        let file = SourceFile::new("t.moo", "x = 1;\nprint(x);");
        let tokens = render(&file, Stage::Tokens, args(), false).unwrap();
        assert!(tokens.lines().count() >= 8);
        assert!(tokens.starts_with("   1:1"));
        assert!(render(&file, Stage::Ast, args(), false).unwrap().contains("Assign"));
        assert!(!render(&file, Stage::Bytecode, args(), false).unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors_fail() {
        let file = SourceFile::new("t.moo", "x = ;");
        assert!(render(&file, Stage::Ast, args(), false).is_err());
        assert!(render(&file, Stage::Bytecode, args(), false).is_err());
    }
}
