//! Bounded scrollback log with a viewport cursor.
//!
//! [`LogBuffer`] is the single-threaded ring buffer; [`LogSink`] wraps it in a
//! mutex so the connection loop can append while presentation code scrolls and
//! renders.
//!
//! Invariant: the viewport offset always lies in
//! `0..=len.saturating_sub(view_height)`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::LogLine;

/// Default number of stored lines
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default number of visible lines
pub const DEFAULT_VIEW_HEIGHT: usize = 4;

/// Visible window of the log at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    pub lines: Vec<LogLine>,
    pub total: usize,
    pub offset: usize,
    pub auto_scroll: bool,
}

impl LogView {
    /// Panel header, e.g. `Logs (42 total) [autoscroll]`
    pub fn title(&self) -> String {
        let mode = if self.auto_scroll { "[autoscroll]" } else { "[manual]" };
        format!("Logs ({} total) {mode}", self.total)
    }
}

/// Ring buffer of log lines plus scroll state
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
    view_height: usize,
    offset: usize,
    auto_scroll: bool,
}

impl LogBuffer {
    /// Both `capacity` and `view_height` are raised to at least 1.
    pub fn new(capacity: usize, view_height: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            view_height: view_height.max(1),
            offset: 0,
            auto_scroll: true,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn view_height(&self) -> usize {
        self.view_height
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.view_height)
    }

    /// Append a line (trailing whitespace trimmed), evicting the oldest lines
    /// past capacity. The viewport shifts left by the number evicted so the
    /// visible window stays on the same lines.
    pub fn append(&mut self, mut line: LogLine) {
        let trimmed = line.text.trim_end().len();
        line.text.truncate(trimmed);
        self.lines.push_back(line);

        if self.lines.len() > self.capacity {
            let evicted = self.lines.len() - self.capacity;
            self.lines.drain(..evicted);
            self.offset = self.offset.saturating_sub(evicted);
        }

        if self.auto_scroll {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.auto_scroll = false;
        self.offset = self.offset.saturating_sub(n.max(1));
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.auto_scroll = false;
        self.offset = self.offset.saturating_add(n.max(1)).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.view_height);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.view_height);
    }

    pub fn jump_to_top(&mut self) {
        self.auto_scroll = false;
        self.offset = 0;
    }

    /// Move to the last page and resume auto-scroll.
    pub fn jump_to_bottom(&mut self) {
        self.auto_scroll = true;
        self.offset = self.max_offset();
    }

    pub fn toggle_auto_scroll(&mut self) {
        self.auto_scroll = !self.auto_scroll;
        if self.auto_scroll {
            self.offset = self.max_offset();
        }
    }

    /// At most `view_height` lines starting at the viewport offset.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.iter().skip(self.offset).take(self.view_height).cloned().collect()
    }

    pub fn view(&self) -> LogView {
        LogView {
            lines: self.snapshot(),
            total: self.lines.len(),
            offset: self.offset,
            auto_scroll: self.auto_scroll,
        }
    }

    /// Every stored line, oldest first.
    pub fn all(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }
}

/// Thread-safe [`LogBuffer`] handle
#[derive(Debug)]
pub struct LogSink {
    inner: Mutex<LogBuffer>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_VIEW_HEIGHT)
    }
}

impl LogSink {
    pub fn new(capacity: usize, view_height: usize) -> Self {
        Self { inner: Mutex::new(LogBuffer::new(capacity, view_height)) }
    }

    // poisoning is ignored; no LogBuffer method can panic mid-update
    fn lock(&self) -> MutexGuard<'_, LogBuffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, line: LogLine) {
        self.lock().append(line);
    }

    pub fn scroll_up(&self, n: usize) {
        self.lock().scroll_up(n);
    }

    pub fn scroll_down(&self, n: usize) {
        self.lock().scroll_down(n);
    }

    pub fn page_up(&self) {
        self.lock().page_up();
    }

    pub fn page_down(&self) {
        self.lock().page_down();
    }

    pub fn jump_to_top(&self) {
        self.lock().jump_to_top();
    }

    pub fn jump_to_bottom(&self) {
        self.lock().jump_to_bottom();
    }

    pub fn toggle_auto_scroll(&self) {
        self.lock().toggle_auto_scroll();
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lock().snapshot()
    }

    pub fn view(&self) -> LogView {
        self.lock().view()
    }

    pub fn all(&self) -> Vec<LogLine> {
        self.lock().all()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
