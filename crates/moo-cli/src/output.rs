//! The terminal as a player connection.
//!
//! Output goes to stdout. Read requests are queued and answered from an
//! input source once the scheduler has nothing else to run.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use moo_vm::{Connection, InputMode, TaskId, Value};

/// Line that ends a `read_lines()` block.
pub const END_OF_LINES: &str = ".";

#[derive(Debug, Default)]
pub struct StdioConnection {
    reads: RefCell<VecDeque<(TaskId, InputMode)>>,
}

impl StdioConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest read request still waiting.
    pub fn next_read(&self) -> Option<(TaskId, InputMode)> {
        self.reads.borrow_mut().pop_front()
    }
}

impl Connection for StdioConnection {
    fn send(&self, text: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        // A closed stdout is not the script's problem.
        let _ = writeln!(lock, "{}", text);
    }

    fn request_read(&self, task: TaskId, mode: InputMode) {
        self.reads.borrow_mut().push_back((task, mode));
    }

    fn cancel_read(&self, task: TaskId) {
        self.reads.borrow_mut().retain(|(t, _)| *t != task);
    }
}

/// Answer a read request from `input`.
///
/// `read_line()` gets one line without its terminator, or null at end of
/// input. `read_lines()` gets a list of lines up to a lone `.` or the end.
pub fn read_input(input: &mut dyn BufRead, mode: InputMode) -> io::Result<Value> {
    match mode {
        InputMode::Line => Ok(next_line(input)?.map_or(Value::Null, Value::from)),
        InputMode::Lines => {
            let mut lines = Vec::new();
            while let Some(line) = next_line(input)? {
                if line == END_OF_LINES {
                    break;
                }
                lines.push(Value::from(line));
            }
            Ok(Value::list(lines))
        }
    }
}

fn next_line(input: &mut dyn BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(|c: char| c == '\n' || c == '\r').len();
    line.truncate(trimmed);
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_line_strips_terminator() {
        let mut input = io::Cursor::new("hello\r\nworld\n");
        assert_eq!(read_input(&mut input, InputMode::Line).unwrap(), Value::str("hello"));
        assert_eq!(read_input(&mut input, InputMode::Line).unwrap(), Value::str("world"));
        assert_eq!(read_input(&mut input, InputMode::Line).unwrap(), Value::Null);
    }

    #[test]
    fn test_read_lines_stops_at_dot() {
        let mut input = io::Cursor::new("a\nb\n.\nc\n");
        let lines = read_input(&mut input, InputMode::Lines).unwrap();
        assert_eq!(lines, Value::list(vec![Value::str("a"), Value::str("b")]));
        assert_eq!(read_input(&mut input, InputMode::Line).unwrap(), Value::str("c"));
    }

    #[test]
    fn test_read_requests_are_fifo_and_cancellable() {
        let conn = StdioConnection::new();
        conn.request_read(3, InputMode::Line);
        conn.request_read(4, InputMode::Lines);
        conn.request_read(5, InputMode::Line);
        conn.cancel_read(4);
        assert_eq!(conn.next_read(), Some((3, InputMode::Line)));
        assert_eq!(conn.next_read(), Some((5, InputMode::Line)));
        assert_eq!(conn.next_read(), None);
    }
}
