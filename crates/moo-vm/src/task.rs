//! A schedulable unit of execution.

use tracing::{debug, warn};

use crate::context::{Context, RunOutcome};
use crate::error::RuntimeError;
use crate::scheduler::TimeId;
use crate::value::{TaskId, Value};
use crate::vm::Wait;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// In the time index, not yet due.
    Pending,
    Running,
    /// Parked outside the time index until resumed.
    Suspended,
    Finished,
    Cancelled,
}

#[derive(Debug)]
pub enum TaskOutcome {
    Finished(Value),
    Suspended(Wait),
    Failed(RuntimeError),
}

pub struct Task {
    pub id: TaskId,
    pub time_id: Option<TimeId>,
    pub ctx: Context,
    /// Delivered to the top frame on the next slice.
    pub resume: Option<Value>,
    pub state: TaskState,
    /// Parked on a read request from its connection.
    pub waiting_input: bool,
}

impl Task {
    pub fn new(ctx: Context) -> Self {
        Self {
            id: ctx.task_id,
            time_id: None,
            ctx,
            resume: None,
            state: TaskState::Pending,
            waiting_input: false,
        }
    }

    /// Run one slice: until the task finishes, fails or suspends.
    pub fn run(&mut self, world: &mut dyn World) -> TaskOutcome {
        self.state = TaskState::Running;
        self.waiting_input = false;
        self.ctx.refill_ticks();
        let resume = self.resume.take();
        match self.ctx.run(0, world, resume, true) {
            Ok(RunOutcome::Returned(value)) => {
                debug!(task = self.id, result = %value.literal(), "task finished");
                self.state = TaskState::Finished;
                TaskOutcome::Finished(value)
            }
            Ok(RunOutcome::Suspended(wait)) => {
                debug!(task = self.id, ?wait, "task suspended");
                self.state = TaskState::Suspended;
                // What the suspending expression yields unless resumed with a value.
                self.resume = Some(Value::Null);
                TaskOutcome::Suspended(wait)
            }
            Err(err) => {
                self.report(&err);
                self.state = TaskState::Finished;
                TaskOutcome::Failed(err)
            }
        }
    }

    /// Send an uncaught error to the task's connection, or log it.
    fn report(&self, err: &RuntimeError) {
        let lines = err.report();
        match &self.ctx.connection {
            Some(conn) => {
                for line in &lines {
                    conn.send(line);
                }
            }
            None => warn!(task = self.id, trace = ?&lines[1..], "{}", lines[0]),
        }
    }
}
