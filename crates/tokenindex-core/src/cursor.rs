//! Monitor cursor: the next unprocessed height of one contract, plus the
//! confirmed-range and pagination arithmetic built on it.

use serde::{Deserialize, Serialize};

/// The monitor's position in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Next block height that has not been processed.
    pub next_height: u64,
}

impl Cursor {
    pub fn new(next_height: u64) -> Self {
        Self { next_height }
    }

    /// Move the cursor past `end` (inclusive). Never moves backwards.
    pub fn advance_past(&mut self, end: u64) {
        self.next_height = self.next_height.max(end + 1);
    }

    /// The confirmed range still to process, or `None` when the chain has
    /// not yet produced a new confirmed block.
    pub fn pending_range(&self, head: u64, confirmation_lag: u64) -> Option<(u64, u64)> {
        let end = confirmed_end(head, confirmation_lag)?;
        (end >= self.next_height).then_some((self.next_height, end))
    }
}

/// Highest height considered confirmed: `head - lag`, or `None` while the
/// chain is shorter than the lag.
pub fn confirmed_end(head: u64, confirmation_lag: u64) -> Option<u64> {
    head.checked_sub(confirmation_lag)
}

/// Splits an inclusive height range into fixed-size inclusive windows.
#[derive(Debug, Clone)]
pub struct BlockWindows {
    next: u64,
    end: u64,
    page_size: u64,
    done: bool,
}

impl BlockWindows {
    /// `page_size` must be non-zero; `IndexerConfig::validate` enforces it.
    pub fn new(start: u64, end: u64, page_size: u64) -> Self {
        Self {
            next: start,
            end,
            page_size: page_size.max(1),
            done: start > end,
        }
    }
}

impl Iterator for BlockWindows {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.next;
        let window_end = start.saturating_add(self.page_size - 1).min(self.end);
        if window_end == self.end {
            self.done = true;
        } else {
            self.next = window_end + 1;
        }
        Some((start, window_end))
    }
}
