//! The MCP: a single-threaded, time-ordered task scheduler.
//!
//! Due tasks run one slice at a time in [`TimeId`] order. Forks and
//! cancels requested by a slice are applied after it yields, so a forked
//! task never runs before the task that forked it gives up control.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::VmConfig;
use crate::connection::Connection;
use crate::context::{Context, ForkRequest, TaskIds};
use crate::executable::Executable;
use crate::task::{Task, TaskOutcome, TaskState};
use crate::value::{TaskId, Value};
use crate::vm::Wait;
use crate::world::World;

/// Scheduler sort key: due time, then creation time, then entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeId {
    pub due_ms: u64,
    pub created_ns: u64,
    pub entropy: u32,
}

/// Fixed-width hex, so string order matches struct order.
impl fmt::Display for TimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}{:08x}", self.due_ms, self.created_ns, self.entropy)
    }
}

/// A row of [`Mcp::task_list`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub state: TaskState,
    pub due: Option<TimeId>,
    pub this: Value,
    pub name: String,
}

pub struct Mcp<C: Clock = SystemClock> {
    clock: C,
    config: VmConfig,
    queue: BTreeMap<TimeId, TaskId>,
    tasks: HashMap<TaskId, Task>,
    ids: TaskIds,
    last_ns: u64,
}

impl Mcp<SystemClock> {
    pub fn with_system_clock(config: VmConfig) -> Self {
        Self::new(SystemClock::new(), config)
    }
}

impl<C: Clock> Mcp<C> {
    pub fn new(clock: C, config: VmConfig) -> Self {
        Self {
            clock,
            config,
            queue: BTreeMap::new(),
            tasks: HashMap::new(),
            ids: TaskIds::new(),
            last_ns: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> VmConfig {
        self.config
    }

    /// Register a task running `exe` as `this`. It does not run until scheduled.
    pub fn create_task(
        &mut self,
        exe: Rc<Executable>,
        this: Value,
        user: Value,
        connection: Option<Rc<dyn Connection>>,
    ) -> TaskId {
        let id = self.ids.next();
        let ctx = Context::new(id, exe, this, user, connection, self.config, self.ids.clone());
        self.tasks.insert(id, Task::new(ctx));
        id
    }

    /// Create a task and schedule it `seconds` from now.
    pub fn spawn(
        &mut self,
        exe: Rc<Executable>,
        this: Value,
        user: Value,
        connection: Option<Rc<dyn Connection>>,
        seconds: f64,
    ) -> TaskId {
        let id = self.create_task(exe, this, user, connection);
        self.schedule(id, seconds);
        id
    }

    fn time_id(&mut self, seconds: f64) -> TimeId {
        let delay_ms = if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0).round() as u64
        } else {
            0
        };
        let now_ns = u64::try_from(self.clock.now_ns()).unwrap_or(u64::MAX);
        // Strictly increasing even if the clock stalls.
        let created_ns = now_ns.max(self.last_ns.saturating_add(1));
        self.last_ns = created_ns;
        TimeId {
            due_ms: self.clock.now_ms().saturating_add(delay_ms),
            created_ns,
            entropy: fastrand::u32(..),
        }
    }

    /// Put a known task in the time index `seconds` from now.
    pub fn schedule(&mut self, id: TaskId, seconds: f64) -> bool {
        let time_id = self.time_id(seconds);
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        if let Some(old) = task.time_id.take() {
            self.queue.remove(&old);
        }
        task.time_id = Some(time_id);
        task.state = TaskState::Pending;
        self.queue.insert(time_id, id);
        debug!(task = id, due = %time_id, "scheduled");
        true
    }

    /// Remove a task for good. A pending read request is withdrawn too.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(mut task) = self.tasks.remove(&id) else {
            return false;
        };
        if let Some(time_id) = task.time_id.take() {
            self.queue.remove(&time_id);
        }
        if task.waiting_input {
            if let Some(conn) = &task.ctx.connection {
                conn.cancel_read(id);
            }
        }
        task.state = TaskState::Cancelled;
        debug!(task = id, "cancelled");
        true
    }

    /// Make a parked or pending task due now. A pending read request is
    /// withdrawn.
    pub fn resume(&mut self, id: TaskId) -> bool {
        self.resume_inner(id, None)
    }

    /// Make a parked or pending task due now, handing `value` to the
    /// expression it suspended in.
    pub fn resume_with_result(&mut self, id: TaskId, value: Value) -> bool {
        self.resume_inner(id, Some(value))
    }

    fn resume_inner(&mut self, id: TaskId, value: Option<Value>) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        if task.state == TaskState::Running {
            return false;
        }
        if value.is_some() {
            task.resume = value;
        }
        if std::mem::take(&mut task.waiting_input) {
            if let Some(conn) = &task.ctx.connection {
                conn.cancel_read(id);
            }
        }
        self.schedule(id, 0.0)
    }

    pub fn is_valid_task(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(|t| t.state)
    }

    pub fn task_list(&self) -> Vec<TaskInfo> {
        let mut list: Vec<TaskInfo> = self
            .tasks
            .values()
            .map(|task| TaskInfo {
                id: task.id,
                state: task.state,
                due: task.time_id,
                this: task.ctx.this.clone(),
                name: task
                    .ctx
                    .frames
                    .first()
                    .map(|f| f.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        list.sort_by_key(|info| info.id);
        list
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Due time of the earliest queued task.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|t| t.due_ms)
    }

    /// Run every task due now, once each. Returns the number of slices run.
    ///
    /// Tasks created or rescheduled during the pass wait for the next one.
    pub fn run_due(&mut self, world: &mut dyn World) -> usize {
        let now = self.clock.now_ms();
        let due: Vec<(TimeId, TaskId)> = self
            .queue
            .iter()
            .take_while(|(t, _)| t.due_ms <= now)
            .map(|(t, id)| (*t, *id))
            .collect();

        let mut slices = 0;
        for (time_id, id) in due {
            // Cancelled or rescheduled by an earlier slice in this pass.
            if self.queue.get(&time_id) != Some(&id) {
                continue;
            }
            self.queue.remove(&time_id);
            let Some(mut task) = self.tasks.remove(&id) else {
                continue;
            };
            task.time_id = None;
            task.ctx.now_ms = now;
            slices += 1;

            let outcome = task.run(world);
            let forks = std::mem::take(&mut task.ctx.forks);
            let cancels = std::mem::take(&mut task.ctx.cancels);
            let user = task.ctx.user.clone();
            let connection = task.ctx.connection.clone();

            match outcome {
                TaskOutcome::Finished(_) | TaskOutcome::Failed(_) => {}
                TaskOutcome::Suspended(wait) => {
                    self.park(task, wait);
                }
            }
            for fork in forks {
                self.start_fork(fork, user.clone(), connection.clone());
            }
            for cancel in cancels {
                self.cancel(cancel);
            }
        }
        slices
    }

    fn park(&mut self, mut task: Task, wait: Wait) {
        let id = task.id;
        match wait {
            Wait::Seconds(secs) => {
                self.tasks.insert(id, task);
                self.schedule(id, secs);
            }
            Wait::Forever => {
                self.tasks.insert(id, task);
            }
            Wait::Input(mode) => {
                match &task.ctx.connection {
                    Some(conn) => {
                        conn.request_read(id, mode);
                        task.waiting_input = true;
                    }
                    None => warn!(task = id, "waiting for input without a connection"),
                }
                self.tasks.insert(id, task);
            }
        }
    }

    fn start_fork(&mut self, fork: ForkRequest, user: Value, connection: Option<Rc<dyn Connection>>) {
        match Context::for_fork(fork.id, &fork.function, user, connection, self.config, self.ids.clone()) {
            Ok(ctx) => {
                self.tasks.insert(fork.id, Task::new(ctx));
                self.schedule(fork.id, fork.delay);
            }
            Err(err) => warn!(task = fork.id, error = %err, "fork failed to start"),
        }
    }

    /// Drive the queue until nothing is scheduled, waiting on the clock
    /// between passes. Parked tasks do not keep it alive.
    pub fn run_until_idle(&mut self, world: &mut dyn World) -> usize {
        let mut slices = 0;
        while let Some(due) = self.next_due() {
            self.clock.wait_until(due);
            slices += self.run_due(world);
        }
        slices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_id_string_order_matches_struct_order() {
        let ids = [
            TimeId { due_ms: 5, created_ns: 9, entropy: 1 },
            TimeId { due_ms: 5, created_ns: 10, entropy: 0 },
            TimeId { due_ms: 6, created_ns: 0, entropy: 0 },
            TimeId { due_ms: 0x1_0000, created_ns: 0, entropy: 0 },
        ];
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_string() < pair[1].to_string());
        }
        assert_eq!(ids[0].to_string().len(), 40);
    }
}
