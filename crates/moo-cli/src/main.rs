//! Moo command-line runner.
//!
//! Commands:
//! - `moo run <file>` - Compile a script and run it to completion
//! - `moo check <file>` - Compile only and report diagnostics
//! - `moo dump <file>` - Print tokens, the syntax tree or bytecode

mod commands;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use moo_vm::VmConfig;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "moo")]
#[command(about = "Moo scripting language runner", long_about = None)]
struct Cli {
    /// Log at debug level unless MOO_LOG or RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a script
    Run {
        file: PathBuf,

        #[command(flatten)]
        compile: CompileArgs,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Compile a script without running it
    Check {
        file: PathBuf,

        #[command(flatten)]
        compile: CompileArgs,
    },

    /// Show a compilation stage
    Dump {
        file: PathBuf,

        /// Which stage to print
        #[arg(long, value_enum, default_value_t = Stage::Bytecode)]
        stage: Stage,

        #[command(flatten)]
        compile: CompileArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct CompileArgs {
    /// Skip the peephole optimizer
    #[arg(long)]
    no_optimize: bool,
}

impl CompileArgs {
    pub fn options(&self) -> moo_codegen::CompileOptions {
        moo_codegen::CompileOptions {
            optimize: !self.no_optimize,
            ..Default::default()
        }
    }
}

/// Overrides for the per-task budgets. Unset flags fall back to
/// `MOO_MAX_TICKS`, `MOO_MAX_DEPTH`, `MOO_MAX_STACK` and then the defaults.
#[derive(Args, Debug, Clone, Copy)]
pub struct LimitArgs {
    /// Opcodes per task slice
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Nested call frames per task
    #[arg(long)]
    max_depth: Option<usize>,

    /// Operand stack entries per frame
    #[arg(long)]
    max_stack: Option<usize>,
}

impl LimitArgs {
    pub fn config(&self) -> VmConfig {
        let mut config = VmConfig::from_env();
        if let Some(n) = self.max_ticks {
            config = config.with_max_ticks(n);
        }
        if let Some(n) = self.max_depth {
            config = config.with_max_call_depth(n);
        }
        if let Some(n) = self.max_stack {
            config = config.with_max_stack(n);
        }
        config
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tokens,
    Ast,
    Bytecode,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("MOO_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let color = !cli.no_color;

    let result = match cli.command {
        Commands::Run { file, compile, limits } => commands::run::run(&file, compile, limits.config(), color),
        Commands::Check { file, compile } => commands::check::run(&file, compile, color),
        Commands::Dump { file, stage, compile } => commands::dump::run(&file, stage, compile, color),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}
