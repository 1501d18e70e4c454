//! Per-task execution state.
//!
//! A [`Context`] owns a task's call stack and budgets. It drives the
//! interpreter frame by frame: [`Signal::Call`] pushes a frame,
//! [`Signal::Return`] pops one and feeds the value to the caller, and
//! errors unwind until some frame's handler catches them.

use std::cell::Cell;
use std::rc::Rc;

use moo_common::ErrorKind;
use tracing::trace;

use crate::config::VmConfig;
use crate::connection::Connection;
use crate::error::RuntimeError;
use crate::executable::Executable;
use crate::frame::{CallRequest, Frame};
use crate::value::{Function, TaskId, Value};
use crate::vm::{self, Signal, Wait};
use crate::world::World;

/// Shared task id allocator.
#[derive(Debug, Clone)]
pub struct TaskIds(Rc<Cell<TaskId>>);

impl TaskIds {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(1)))
    }

    pub fn next(&self) -> TaskId {
        let id = self.0.get();
        self.0.set(id + 1);
        id
    }
}

impl Default for TaskIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A `fork` evaluated by the running slice, applied once it yields.
#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub id: TaskId,
    pub delay: f64,
    pub function: Rc<Function>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Returned(Value),
    Suspended(Wait),
}

pub struct Context {
    pub task_id: TaskId,
    pub this: Value,
    pub user: Value,
    pub connection: Option<Rc<dyn Connection>>,
    pub frames: Vec<Frame>,
    pub config: VmConfig,
    pub forks: Vec<ForkRequest>,
    pub cancels: Vec<TaskId>,
    /// Wall-clock time of the current slice.
    pub now_ms: u64,
    ticks_left: u64,
    calls_left: usize,
    /// The tick budget ran out and the grace allowance is in use.
    in_grace: bool,
    /// The grace allowance ran out too; handlers no longer catch.
    aborting: bool,
    ids: TaskIds,
}

impl Context {
    pub fn new(
        task_id: TaskId,
        exe: Rc<Executable>,
        this: Value,
        user: Value,
        connection: Option<Rc<dyn Connection>>,
        config: VmConfig,
        ids: TaskIds,
    ) -> Self {
        let root = Frame::new(exe, this.clone(), user.clone());
        Self {
            task_id,
            this,
            user,
            connection,
            frames: vec![root],
            config,
            forks: Vec::new(),
            cancels: Vec::new(),
            now_ms: 0,
            ticks_left: config.max_ticks,
            calls_left: config.max_call_depth.saturating_sub(1),
            in_grace: false,
            aborting: false,
            ids,
        }
    }

    /// Context whose root frame runs a forked function body.
    pub fn for_fork(
        task_id: TaskId,
        function: &Function,
        user: Value,
        connection: Option<Rc<dyn Connection>>,
        config: VmConfig,
        ids: TaskIds,
    ) -> Result<Self, RuntimeError> {
        let req = CallRequest {
            code: function.code.clone(),
            this: function.this.clone(),
            args: Vec::new(),
            params: None,
            captured: function.captured.clone(),
            name: format!("fork {}", task_id),
        };
        let root = Frame::for_call(req, user.clone())?;
        Ok(Self {
            task_id,
            this: function.this.clone(),
            user,
            connection,
            frames: vec![root],
            config,
            forks: Vec::new(),
            cancels: Vec::new(),
            now_ms: 0,
            ticks_left: config.max_ticks,
            calls_left: config.max_call_depth.saturating_sub(1),
            in_grace: false,
            aborting: false,
            ids,
        })
    }

    pub fn ticks_left(&self) -> u64 {
        self.ticks_left
    }

    pub fn calls_left(&self) -> usize {
        self.calls_left
    }

    /// Charge one opcode.
    ///
    /// Running out raises `E_RESOURCE` once and grants a tenth of the
    /// budget so a handler can clean up. Running out again aborts the task.
    pub fn tick(&mut self) -> Result<(), RuntimeError> {
        if self.ticks_left > 0 {
            self.ticks_left -= 1;
            return Ok(());
        }
        if self.in_grace {
            self.aborting = true;
        } else {
            self.in_grace = true;
            self.ticks_left = (self.config.max_ticks / 10).max(1);
        }
        Err(RuntimeError::new(ErrorKind::Resource, "task ran out of ticks"))
    }

    pub fn refill_ticks(&mut self) {
        self.ticks_left = self.config.max_ticks;
        self.in_grace = false;
    }

    /// Queue a fork and return the id its task will have.
    pub fn fork(&mut self, delay: f64, function: Rc<Function>) -> TaskId {
        let id = self.ids.next();
        self.forks.push(ForkRequest { id, delay, function });
        id
    }

    pub fn send(&self, text: &str) -> bool {
        match &self.connection {
            Some(conn) => {
                conn.send(text);
                true
            }
            None => false,
        }
    }

    fn enter_call(&mut self, req: CallRequest) -> Result<(), RuntimeError> {
        if self.calls_left == 0 {
            return Err(RuntimeError::new(
                ErrorKind::MaxRec,
                format!("call depth exceeds {}", self.config.max_call_depth),
            ));
        }
        let frame = Frame::for_call(req, self.user.clone())?;
        trace!(task = self.task_id, frame = %frame.name, depth = self.frames.len() + 1, "push frame");
        self.calls_left -= 1;
        self.frames.push(frame);
        Ok(())
    }

    fn leave_call(&mut self) {
        self.calls_left += 1;
    }

    /// Run frames until the one at index `base` returns or the task suspends.
    ///
    /// `resume` is delivered to the top frame first. With `allow_suspend`
    /// false a suspension raises `E_INVARG` in the suspending frame instead.
    pub fn run(
        &mut self,
        base: usize,
        world: &mut dyn World,
        mut resume: Option<Value>,
        allow_suspend: bool,
    ) -> Result<RunOutcome, RuntimeError> {
        loop {
            if self.frames.len() <= base {
                return Ok(RunOutcome::Returned(resume.unwrap_or(Value::Null)));
            }
            let Some(mut frame) = self.frames.pop() else {
                return Ok(RunOutcome::Returned(Value::Null));
            };
            let result = vm::execute(&mut frame, self, world, resume.take());
            match result {
                Ok(Signal::Return(value)) => {
                    self.leave_call();
                    if self.frames.len() == base {
                        return Ok(RunOutcome::Returned(value));
                    }
                    resume = Some(value);
                }
                Ok(Signal::Call(req)) => {
                    self.frames.push(frame);
                    if let Err(err) = self.enter_call(req) {
                        self.unwind(err, base)?;
                    }
                }
                Ok(Signal::Suspend(wait)) => {
                    if allow_suspend {
                        self.frames.push(frame);
                        return Ok(RunOutcome::Suspended(wait));
                    }
                    let err = RuntimeError::invalid_arg("cannot suspend inside a synchronous call")
                        .located(frame.pos());
                    frame.discard_result = false;
                    self.frames.push(frame);
                    self.unwind(err, base)?;
                }
                Err(err) => {
                    self.frames.push(frame);
                    self.unwind(err, base)?;
                }
            }
        }
    }

    /// Offer `err` to each frame above `base`, innermost first, popping
    /// those that do not catch it. Returns the error once `base` is reached.
    fn unwind(&mut self, mut err: RuntimeError, base: usize) -> Result<(), RuntimeError> {
        while self.frames.len() > base {
            let aborting = self.aborting;
            let Some(frame) = self.frames.last_mut() else { break };
            err = err.located(frame.pos());
            if !aborting && frame.catch(&err) {
                return Ok(());
            }
            err.trace.push(frame.trace_entry());
            self.frames.pop();
            self.leave_call();
        }
        Err(err)
    }

    /// Call a function value to completion on top of the current stack.
    pub fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        world: &mut dyn World,
    ) -> Result<Value, RuntimeError> {
        let base = self.frames.len();
        self.enter_call(CallRequest {
            code: function.code.clone(),
            this: function.this.clone(),
            args,
            params: Some(function.params.clone()),
            captured: function.captured.clone(),
            name: "fn".into(),
        })?;
        match self.run(base, world, None, false)? {
            RunOutcome::Returned(value) => Ok(value),
            RunOutcome::Suspended(_) => Err(RuntimeError::system("function suspended synchronously")),
        }
    }
}
