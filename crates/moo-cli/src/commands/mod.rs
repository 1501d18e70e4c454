//! Subcommand implementations.

pub mod check;
pub mod dump;
pub mod run;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use moo_codegen::{CompileError, CompileOptions};
use moo_common::SourceFile;
use moo_vm::Executable;

/// Read a script from disk.
pub fn load(path: &Path) -> Result<SourceFile> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(SourceFile::new(path.display().to_string(), text))
}

/// Compile `file`, rendering any error as a diagnostic on stderr.
pub fn compile(file: &SourceFile, options: &CompileOptions, color: bool) -> Result<Executable> {
    let options = CompileOptions {
        name: program_name(file),
        ..options.clone()
    };
    match moo_codegen::compile_with(file.source(), &options) {
        Ok(exe) => Ok(exe),
        Err(err) => {
            report(&err, file, color)?;
            bail!("could not compile {}", file.name())
        }
    }
}

fn report(err: &CompileError, file: &SourceFile, color: bool) -> Result<()> {
    err.to_diagnostic()
        .emit(file, color)
        .context("cannot write diagnostics")
}

/// Frame name used in tracebacks: the file stem.
fn program_name(file: &SourceFile) -> String {
    Path::new(file.name())
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("program")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_is_file_stem() {
        let file = SourceFile::new("scripts/hello.moo", "print(1);");
        assert_eq!(program_name(&file), "hello");
        let file = SourceFile::new("", "");
        assert_eq!(program_name(&file), "program");
    }

    #[test]
    fn test_compile_names_executable_after_file() {
        let file = SourceFile::new("greet.moo", "print(\"hi\");");
        let exe = compile(&file, &CompileOptions::default(), false).unwrap();
        assert_eq!(exe.name, "greet");
        assert!(compile(&SourceFile::new("bad.moo", "x = ;"), &CompileOptions::default(), false).is_err());
    }
}
