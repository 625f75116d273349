use std::collections::VecDeque;

use parking_lot::Mutex;

/// Bounded activity log.
///
/// Keeps the most recent `capacity` lines. Every pushed line is also emitted
/// at `info` level.
#[derive(Debug)]
pub struct ConsoleLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ConsoleLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "golemdb_console::activity", "{line}");
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Retained lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.lines.lock().back().cloned()
    }
}
