//! Moo virtual machine.
//!
//! Values and bytecode, the stack interpreter, per-task contexts and the
//! MCP scheduler that runs tasks in time order on a single thread.

pub mod clock;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod exec;
pub mod executable;
pub mod frame;
pub mod instruction;
pub mod ops;
pub mod scheduler;
pub mod task;
pub mod value;
pub mod vm;
pub mod world;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VmConfig;
pub use connection::{BufferConnection, Connection, InputMode};
pub use context::{Context, RunOutcome, TaskIds};
pub use error::{RuntimeError, RuntimeResult, TraceEntry};
pub use executable::{Block, Executable, VarId};
pub use frame::{CallRequest, Frame};
pub use instruction::{Opcode, VmWord, Word};
pub use scheduler::{Mcp, TaskInfo, TimeId};
pub use task::{Task, TaskOutcome, TaskState};
pub use value::{ErrValue, Function, MapKey, ObjId, TaskId, Value, NOTHING};
pub use vm::{Signal, Wait};
pub use world::{MemoryWorld, World};
