//! Per-task resource limits.

use std::env;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_MAX_TICKS: u64 = 300_000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 50;
pub const DEFAULT_MAX_STACK: usize = 10_000;

/// Resource budgets applied to every task slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Opcodes a task may execute before it must suspend.
    pub max_ticks: u64,
    /// Nested verb/function frames allowed on one task's call stack.
    pub max_call_depth: usize,
    /// Operand stack entries allowed in one frame.
    pub max_stack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_ticks: DEFAULT_MAX_TICKS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack: DEFAULT_MAX_STACK,
        }
    }
}

impl VmConfig {
    /// Defaults overridden by `MOO_MAX_TICKS`, `MOO_MAX_DEPTH` and `MOO_MAX_STACK`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_ticks: env_or("MOO_MAX_TICKS", defaults.max_ticks),
            max_call_depth: env_or("MOO_MAX_DEPTH", defaults.max_call_depth),
            max_stack: env_or("MOO_MAX_STACK", defaults.max_stack),
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack(mut self, max_stack: usize) -> Self {
        self.max_stack = max_stack;
        self
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var, value = %raw, "ignoring unparsable limit, using {}", default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_override_defaults() {
        let config = VmConfig::default().with_max_ticks(10).with_max_call_depth(3);
        assert_eq!(config.max_ticks, 10);
        assert_eq!(config.max_call_depth, 3);
        assert_eq!(config.max_stack, DEFAULT_MAX_STACK);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("MOO_TEST_LIMIT_GARBAGE", "lots");
        assert_eq!(env_or("MOO_TEST_LIMIT_GARBAGE", 7u64), 7);
        env::set_var("MOO_TEST_LIMIT_OK", " 42 ");
        assert_eq!(env_or("MOO_TEST_LIMIT_OK", 7u64), 42);
        assert_eq!(env_or("MOO_TEST_LIMIT_UNSET_XYZ", 9usize), 9);
    }
}
