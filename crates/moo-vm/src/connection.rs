//! Player connections as seen by running tasks.

use std::cell::RefCell;

use crate::value::TaskId;

/// What a blocked task wants from the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// One line.
    Line,
    /// Lines up to a lone `.`.
    Lines,
}

pub trait Connection {
    fn send(&self, text: &str);

    /// Register `task` as the receiver of the next input.
    fn request_read(&self, task: TaskId, mode: InputMode);

    /// Drop a read request registered by `task`, if it is still pending.
    fn cancel_read(&self, task: TaskId);
}

/// Collects output and read requests in memory.
#[derive(Debug, Default)]
pub struct BufferConnection {
    output: RefCell<Vec<String>>,
    reads: RefCell<Vec<(TaskId, InputMode)>>,
}

impl BufferConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    pub fn take_output(&self) -> Vec<String> {
        self.output.take()
    }

    pub fn pending_reads(&self) -> Vec<(TaskId, InputMode)> {
        self.reads.borrow().clone()
    }
}

impl Connection for BufferConnection {
    fn send(&self, text: &str) {
        self.output.borrow_mut().push(text.to_string());
    }

    fn request_read(&self, task: TaskId, mode: InputMode) {
        self.reads.borrow_mut().push((task, mode));
    }

    fn cancel_read(&self, task: TaskId) {
        self.reads.borrow_mut().retain(|(t, _)| *t != task);
    }
}
