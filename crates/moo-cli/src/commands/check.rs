//! `moo check` - compile without running.

use std::path::Path;

use anyhow::Result;

use super::{compile, load};
use crate::CompileArgs;

pub fn run(path: &Path, args: CompileArgs, color: bool) -> Result<()> {
    let file = load(path)?;
    let exe = compile(&file, &args.options(), color)?;
    println!(
        "{}: ok ({} words, {} variables, {} blocks)",
        file.name(),
        exe.len(),
        exe.var_count(),
        exe.blocks.len()
    );
    Ok(())
}
