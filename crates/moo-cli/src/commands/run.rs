//! `moo run` - compile a script and drive the scheduler until it is idle.

use std::io::{self, BufRead};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use moo_vm::{Connection, Executable, Mcp, MemoryWorld, SystemClock, Value, VmConfig};
use tracing::{debug, warn};

use super::{compile, load};
use crate::output::{read_input, StdioConnection};
use crate::CompileArgs;

/// Object number the script runs as.
pub const PLAYER: i64 = 1;

pub fn run(path: &Path, args: CompileArgs, config: VmConfig, color: bool) -> Result<()> {
    let file = load(path)?;
    let exe = compile(&file, &args.options(), color)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    execute(exe, config, &mut input)?;
    Ok(())
}

/// Run `exe` as the player, feeding read requests from `input`.
/// Returns the number of tasks still parked when nothing is left to run.
pub fn execute(exe: Executable, config: VmConfig, input: &mut dyn BufRead) -> Result<usize> {
    let mut world = MemoryWorld::new();
    world.create(PLAYER);
    let conn = Rc::new(StdioConnection::new());
    let mut mcp = Mcp::new(SystemClock::new(), config);
    let main = mcp.spawn(
        Rc::new(exe),
        Value::Obj(PLAYER),
        Value::Obj(PLAYER),
        Some(conn.clone() as Rc<dyn Connection>),
        0.0,
    );
    debug!(task = main, "started");

    loop {
        let slices = mcp.run_until_idle(&mut world);
        debug!(slices, "scheduler idle");
        let Some((task, mode)) = conn.next_read() else {
            break;
        };
        let value = read_input(input, mode).context("cannot read input")?;
        if !mcp.resume_with_result(task, value) {
            warn!(task, "input for a task that is gone");
        }
    }

    if !mcp.is_empty() {
        warn!(tasks = mcp.len(), "exiting with suspended tasks");
    }
    Ok(mcp.len())
}
